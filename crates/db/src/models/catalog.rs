//! Catalog rows and assembly of a resolved [`Job`] graph.

use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::FromRow;

use analytics_core::catalog::{Backend, Job, JobSummary, Parameter, Step, Task};
use analytics_core::parameters::ParameterRule;
use analytics_core::types::DbId;

use crate::error::StoreError;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub name: String,
}

impl From<JobRow> for JobSummary {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// A step joined with its task and the task's backend.
#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub step_id: DbId,
    pub ordering: i32,
    pub task_id: DbId,
    pub task_name: String,
    pub executable: String,
    pub out_glob: Option<String>,
    pub timeout_secs: Option<i64>,
    pub backend_id: DbId,
    pub backend_name: String,
    pub root_path: String,
    pub max_concurrency: Option<i32>,
}

/// A row from the `parameters` table.
#[derive(Debug, Clone, FromRow)]
pub struct ParameterRow {
    pub id: DbId,
    pub task_id: DbId,
    pub rest_alias: String,
    pub flag: String,
    pub default_value: Option<String>,
    pub bool_valued: bool,
    pub rule: Json<ParameterRule>,
}

impl From<ParameterRow> for Parameter {
    fn from(row: ParameterRow) -> Self {
        Self {
            id: row.id,
            rest_alias: row.rest_alias,
            flag: row.flag,
            default: row.default_value,
            bool_valued: row.bool_valued,
            rule: row.rule.0,
        }
    }
}

/// Build a [`Job`] from its row, its joined steps and the parameters of
/// every task the steps reference. `parameters` must already be in
/// declaration order.
pub fn assemble_job(
    job: JobRow,
    steps: Vec<StepRow>,
    parameters: Vec<ParameterRow>,
) -> Result<Job, StoreError> {
    let mut by_task: HashMap<DbId, Vec<Parameter>> = HashMap::new();
    for row in parameters {
        by_task.entry(row.task_id).or_default().push(row.into());
    }

    let steps = steps
        .into_iter()
        .map(|row| {
            let ordering = u32::try_from(row.ordering).map_err(|_| {
                StoreError::Corrupt(format!("Step {} has negative ordering", row.step_id))
            })?;
            let max_concurrency = row
                .max_concurrency
                .map(|n| u32::try_from(n).unwrap_or(0))
                .filter(|n| *n > 0);
            Ok(Step {
                id: row.step_id,
                ordering,
                task: Task {
                    id: row.task_id,
                    name: row.task_name,
                    executable: row.executable,
                    backend: Backend {
                        id: row.backend_id,
                        name: row.backend_name,
                        root_path: row.root_path,
                        max_concurrency,
                    },
                    parameters: by_task.get(&row.task_id).cloned().unwrap_or_default(),
                    out_glob: row.out_glob,
                    timeout_secs: row.timeout_secs.and_then(|s| u64::try_from(s).ok()),
                },
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    let job = Job {
        id: job.id,
        name: job.name,
        steps,
    };
    job.validate()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(job)
}
