pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use crate::core::{Plate, PlateGenerator, PlateRepository, PlateStore};
pub use detection::ScanConfig;
pub use detection::ocr::{DigitRecognizer, RecognizerConfig, ScriptedRecognizer, SegmentationMode};
pub use error::{ScanError, StoreError};
pub use models::{ScanGrid, TicketNumber};
pub use pipeline::{InMemoryTicket, ProgressListener, ScanSession, ScanStage, TicketSource};
