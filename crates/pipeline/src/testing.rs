//! Fixtures shared by the unit tests in this crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use analytics_core::blob::BlobRef;
use analytics_core::catalog::{Backend, Job, Step, Task};
use analytics_core::parameters::BoundParameters;
use analytics_core::scheduling::DEFAULT_PRIORITY;
use analytics_core::submission::NewSubmission;
use analytics_db::MemoryStore;

use crate::runner::{BackendRunner, StepOutcome, StepRequest};

pub const INPUT_BLOB: &str = "submissions/fixture/input.txt";

pub fn backend(root: &Path, max_concurrency: Option<u32>) -> Backend {
    Backend {
        id: 1,
        name: "local".into(),
        root_path: root.to_string_lossy().into_owned(),
        max_concurrency,
    }
}

pub fn task(id: i64, name: &str, executable: &str, backend: &Backend) -> Task {
    Task {
        id,
        name: name.into(),
        executable: executable.into(),
        backend: backend.clone(),
        parameters: vec![],
        out_glob: None,
        timeout_secs: None,
    }
}

/// `job1` with `task1..task3` in order.
pub fn three_step_job(backend: &Backend) -> Job {
    Job {
        id: 1,
        name: "job1".into(),
        steps: (0..3)
            .map(|i| Step {
                id: i + 1,
                ordering: i as u32,
                task: task(i + 1, &format!("task{}", i + 1), "true", backend),
            })
            .collect(),
    }
}

pub fn memory_store() -> Arc<MemoryStore> {
    store_with(vec![three_step_job(&backend(Path::new("/tmp/"), None))])
}

pub fn store_with(jobs: Vec<Job>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(jobs).expect("valid catalog"))
}

pub fn new_submission() -> NewSubmission {
    NewSubmission {
        id: Uuid::new_v4(),
        job_id: 1,
        job_name: "job1".into(),
        submission_name: "test".into(),
        email: "a@b.com".into(),
        input_data: BlobRef::new(INPUT_BLOB),
        parameters: BoundParameters::default(),
        requester: "anonymous".into(),
        priority: DEFAULT_PRIORITY,
    }
}

/// Returns a fixed outcome per task name (success by default) and records
/// every call.
#[derive(Default)]
pub struct ScriptedRunner {
    outcomes: HashMap<String, StepOutcome>,
    delay: Duration,
    pub calls: Mutex<Vec<StepRequest>>,
    active: Mutex<(usize, usize)>,
}

impl ScriptedRunner {
    pub fn with(mut self, task: &str, outcome: StepOutcome) -> Self {
        self.outcomes.insert(task.into(), outcome);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn called_tasks(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.task.name.clone())
            .collect()
    }

    /// Highest number of overlapping `execute` calls seen.
    pub fn max_concurrent(&self) -> usize {
        self.active.lock().unwrap().1
    }
}

#[async_trait]
impl BackendRunner for ScriptedRunner {
    async fn execute(&self, request: StepRequest) -> StepOutcome {
        {
            let mut active = self.active.lock().unwrap();
            active.0 += 1;
            active.1 = active.1.max(active.0);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self
            .outcomes
            .get(&request.task.name)
            .cloned()
            .unwrap_or_else(|| StepOutcome::Success {
                message: format!("{} ok", request.task.name),
                result_data: Some(BlobRef::new(format!(
                    "results/{}/{}/{}.out",
                    request.submission_id, request.step, request.task.name
                ))),
            });
        self.calls.lock().unwrap().push(request);
        self.active.lock().unwrap().0 -= 1;
        outcome
    }
}
