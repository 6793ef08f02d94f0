//! Zero-sized PostgreSQL repositories. Each takes the pool per call.

pub mod catalog_repo;
pub mod result_repo;
pub mod submission_repo;

pub use catalog_repo::CatalogRepo;
pub use result_repo::ResultRepo;
pub use submission_repo::SubmissionRepo;
