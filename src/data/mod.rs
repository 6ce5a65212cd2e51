//! Dataset model and storage.
//!
//! - **dataset**: the tabular `Dataset` value type
//! - **file_manager**: persistence backends (local JSON files, in-memory)
//! - **controller**: the `DataAccess` facade every stage receives

pub mod controller;
pub mod dataset;
pub mod file_manager;

pub use controller::{DataAccess, DataController, DATASET_EXTRACTING_DATE_COLUMN};
pub use dataset::{as_number, is_missing, Dataset, Row};
pub use file_manager::{FileManager, InMemoryFileManager, LocalFileManager};
