/// Primary keys of catalog rows (jobs, tasks, parameters, backends, results).
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Globally unique, opaque submission identifier.
pub type SubmissionId = uuid::Uuid;
