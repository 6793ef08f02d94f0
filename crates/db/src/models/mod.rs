//! Row types mapped from PostgreSQL with `sqlx::FromRow`, and their
//! conversion into domain entities.

pub mod catalog;
pub mod submission;
