//! rekan-store: Question, result, and license store backends.
//!
//! Implements the `QuestionStore`, `ResultStore`, and `LicenseStore` traits
//! in memory, on the local filesystem, and against a PostgREST database.

mod error;
pub mod config;
pub mod file;
pub mod memory;
pub mod rest;

pub use config::{create_store, load_config, load_config_from, ExamConfig, RekanConfig, StoreConfig};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use rest::RestStore;
