//! Domain types and pure logic for the analysis-job service.
//!
//! Nothing in here talks to a database or an HTTP client; the storage,
//! pipeline and API crates build on these types.

pub mod blob;
pub mod catalog;
pub mod error;
pub mod execution;
pub mod intake;
pub mod parameters;
pub mod scheduling;
pub mod submission;
pub mod types;
