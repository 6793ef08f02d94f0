//! Job catalog entities: backends, tasks, parameters, steps and jobs.
//!
//! These are reference data owned by the storage collaborator. A [`Job`] is
//! loaded as a fully resolved graph (steps carry their task, tasks carry their
//! backend and parameters) so the intake and execution paths never have to go
//! back to storage mid-flight.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::parameters::ParameterRule;
use crate::types::DbId;

/// An execution target. Tasks owned by a backend run under its `root_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub id: DbId,
    pub name: String,
    pub root_path: String,
    /// Maximum number of concurrent task invocations on this backend.
    /// `None` means unbounded.
    #[serde(default)]
    pub max_concurrency: Option<u32>,
}

/// A task input bound from a `<task>_<rest_alias>` form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: DbId,
    pub rest_alias: String,
    /// Command-line flag emitted before the value, e.g. `-t`.
    #[serde(default)]
    pub flag: String,
    /// Value used when the submitted field is present but empty.
    #[serde(default)]
    pub default: Option<String>,
    /// When set, only `flag` is emitted (and only for a truthy value).
    #[serde(default)]
    pub bool_valued: bool,
    #[serde(default)]
    pub rule: ParameterRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: DbId,
    pub name: String,
    /// Command line template. `$INPUT` is replaced by the input file path.
    pub executable: String,
    pub backend: Backend,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Filename suffix of the file captured as the step's result blob.
    #[serde(default)]
    pub out_glob: Option<String>,
    /// Overrides the global step timeout for this task.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Task {
    /// Look up a parameter by its external key.
    pub fn parameter(&self, rest_alias: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.rest_alias == rest_alias)
    }
}

/// One position in a job's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: DbId,
    pub ordering: u32,
    pub task: Task,
}

/// A named pipeline: an ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: DbId,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Job {
    /// Steps sorted by `ordering`, i.e. in execution order.
    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.ordering);
        steps
    }

    /// Check that step orderings are unique and form `0..n`, that no task
    /// declares the same `rest_alias` twice, and that backend concurrency
    /// limits are positive.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut orderings: Vec<u32> = self.steps.iter().map(|s| s.ordering).collect();
        orderings.sort_unstable();
        for (expected, actual) in orderings.iter().enumerate() {
            if *actual as usize != expected {
                return Err(CoreError::Internal(format!(
                    "Job '{}' step orderings must be a contiguous 0-based sequence, got {orderings:?}",
                    self.name
                )));
            }
        }

        for step in &self.steps {
            let backend = &step.task.backend;
            if backend.max_concurrency == Some(0) {
                return Err(CoreError::Internal(format!(
                    "Backend '{}' max_concurrency must be positive",
                    backend.name
                )));
            }

            let mut aliases: Vec<&str> =
                step.task.parameters.iter().map(|p| p.rest_alias.as_str()).collect();
            aliases.sort_unstable();
            if let Some(dup) = aliases.windows(2).find(|w| w[0] == w[1]) {
                return Err(CoreError::Internal(format!(
                    "Task '{}' declares parameter '{}' more than once",
                    step.task.name, dup[0]
                )));
            }
        }

        Ok(())
    }
}

/// Catalog listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: DbId,
    pub name: String,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn ordered_steps_follow_ordering_not_insertion() {
        let mut j = job("job1", vec![task(1, "task1", &[]), task(2, "task2", &[])]);
        j.steps[0].ordering = 1;
        j.steps[1].ordering = 0;
        let names: Vec<&str> = j.ordered_steps().iter().map(|s| s.task.name.as_str()).collect();
        assert_eq!(names, ["task2", "task1"]);
    }

    #[test]
    fn contiguous_orderings_are_valid() {
        let j = job("job1", vec![task(1, "task1", &["a"]), task(2, "task2", &["b"])]);
        assert!(j.validate().is_ok());
    }

    #[test]
    fn gap_in_orderings_rejected() {
        let mut j = job("job1", vec![task(1, "task1", &[]), task(2, "task2", &[])]);
        j.steps[1].ordering = 2;
        assert!(j.validate().is_err());
    }

    #[test]
    fn duplicate_orderings_rejected() {
        let mut j = job("job1", vec![task(1, "task1", &[]), task(2, "task2", &[])]);
        j.steps[1].ordering = 0;
        assert!(j.validate().is_err());
    }

    #[test]
    fn duplicate_alias_rejected() {
        let j = job("job1", vec![task(1, "task1", &["this", "this"])]);
        assert!(j.validate().is_err());
    }

    #[test]
    fn zero_backend_concurrency_rejected() {
        let mut j = job("job1", vec![task(1, "task1", &[])]);
        j.steps[0].task.backend.max_concurrency = Some(0);
        assert!(j.validate().is_err());

        j.steps[0].task.backend.max_concurrency = Some(1);
        assert!(j.validate().is_ok());
    }

    #[test]
    fn catalog_deserializes_with_defaults() {
        let raw = serde_json::json!({
            "id": 7,
            "name": "job1",
            "steps": [{
                "id": 1,
                "ordering": 0,
                "task": {
                    "id": 3,
                    "name": "task1",
                    "executable": "ls",
                    "backend": {"id": 1, "name": "local", "root_path": "/tmp/"},
                    "parameters": [{"id": 9, "rest_alias": "this"}]
                }
            }]
        });
        let j: Job = serde_json::from_value(raw).expect("deserialize job");
        let p = &j.steps[0].task.parameters[0];
        assert_eq!(p.rule, ParameterRule::Any);
        assert!(!p.bool_valued);
        assert!(j.steps[0].task.backend.max_concurrency.is_none());
    }
}
