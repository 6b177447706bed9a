pub mod db;
pub mod plate;

pub use db::{PlateRepository, PlateStore};
pub use plate::{Plate, PlateGenerator};
