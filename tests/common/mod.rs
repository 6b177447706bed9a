mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from bingoscan for tests
pub use bingoscan::{
    InMemoryTicket, Plate, PlateGenerator, PlateRepository, PlateStore, ScanConfig, ScanError,
    ScanGrid, ScanSession, ScanStage, ScriptedRecognizer, SegmentationMode, StoreError,
};
