//! rekan-core: Exam session engine, storage traits, and scoring.
//!
//! This crate defines the data model, the answer store, the scoring engine,
//! the session timer, navigation state, and the submission gatekeeper that
//! the rest of rekan builds on.

pub mod answer_key;
pub mod answers;
pub mod error;
pub mod gatekeeper;
pub mod model;
pub mod navigation;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod session;
pub mod statistics;
pub mod timer;
pub mod traits;
