//! Priority admission queue with per-requester fairness and a hard limit.
//!
//! Admission is two-phase so that a rejected submission never reaches
//! storage: [`AdmissionQueue::reserve`] applies the hard limit and the hog
//! rule and holds a slot, then [`Reservation::enqueue`] places the stored
//! submission in the queue. Dropping a [`Reservation`] releases its slot.
//!
//! Depth counts queued, reserved and running submissions. Dequeue order is
//! lowest priority value first, then earliest admission.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Notify;

use analytics_core::error::CoreError;
use analytics_core::scheduling::{QueueConfig, Requester};
use analytics_core::types::SubmissionId;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A submission waiting for (or handed to) a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSubmission {
    pub submission_id: SubmissionId,
    pub requester: String,
    pub priority: i32,
}

/// How a submission was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub priority: i32,
    /// Whether the hog rule pushed it into the lowest tier.
    pub demoted: bool,
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: usize,
    pub hard_limit: usize,
    pub hog_threshold: usize,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct Entry {
    priority: i32,
    seq: u64,
    item: QueuedSubmission,
}

// `BinaryHeap` is a max-heap; invert so the lowest (priority, seq) pops first.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Entry>,
    /// Queued plus reserved submissions per requester.
    waiting_by_requester: HashMap<String, usize>,
    reserved: usize,
    running: usize,
    next_seq: u64,
    closed: bool,
}

impl State {
    fn depth(&self) -> usize {
        self.heap.len() + self.reserved + self.running
    }

    fn release_waiting(&mut self, requester: &str) {
        if let Some(count) = self.waiting_by_requester.get_mut(requester) {
            *count -= 1;
            if *count == 0 {
                self.waiting_by_requester.remove(requester);
            }
        }
    }

    fn push(&mut self, item: QueuedSubmission) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            priority: item.priority,
            seq,
            item,
        });
    }
}

struct Inner {
    config: QueueConfig,
    state: Mutex<State>,
    notify: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// AdmissionQueue
// ---------------------------------------------------------------------------

/// Cheaply cloneable handle to a shared admission queue.
#[derive(Clone)]
pub struct AdmissionQueue {
    inner: Arc<Inner>,
}

impl AdmissionQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Hold a slot for `requester`, or reject with [`CoreError::QueueFull`].
    ///
    /// The hard limit is checked before the hog rule, so a full queue rejects
    /// even a requester who would otherwise only be demoted.
    pub fn reserve(&self, requester: &Requester) -> Result<Reservation, CoreError> {
        let config = &self.inner.config;
        let mut state = self.inner.lock();

        if state.closed {
            return Err(CoreError::Internal(
                "Admission queue is closed to new submissions".into(),
            ));
        }

        let depth = state.depth();
        if depth + 1 > config.hard_limit {
            return Err(CoreError::QueueFull {
                depth,
                limit: config.hard_limit,
            });
        }

        let waiting = state
            .waiting_by_requester
            .get(&requester.id)
            .copied()
            .unwrap_or(0);
        let demoted = waiting > config.hog_threshold;
        let priority = if demoted {
            config.lowest_priority
        } else {
            config.priority_for(requester.class)
        };

        state.reserved += 1;
        *state
            .waiting_by_requester
            .entry(requester.id.clone())
            .or_default() += 1;

        Ok(Reservation {
            queue: self.clone(),
            requester: requester.id.clone(),
            admission: Admission { priority, demoted },
            armed: true,
        })
    }

    /// Reserve and enqueue in one step.
    pub fn enqueue(
        &self,
        submission_id: SubmissionId,
        requester: &Requester,
    ) -> Result<Admission, CoreError> {
        Ok(self.reserve(requester)?.enqueue(submission_id))
    }

    /// Put back a submission that was admitted by a previous process.
    ///
    /// Skips the hard limit and the hog rule; the submission already passed
    /// both when it was first admitted.
    pub fn readmit(&self, submission_id: SubmissionId, requester: &str, priority: i32) {
        let mut state = self.inner.lock();
        *state
            .waiting_by_requester
            .entry(requester.to_string())
            .or_default() += 1;
        state.push(QueuedSubmission {
            submission_id,
            requester: requester.to_string(),
            priority,
        });
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Wait for the next submission.
    ///
    /// Returns `None` once the queue is closed and empty. The returned
    /// [`RunningSlot`] counts toward depth until dropped.
    pub async fn dequeue(&self) -> Option<(QueuedSubmission, RunningSlot)> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.lock();
                if let Some(entry) = state.heap.pop() {
                    state.release_waiting(&entry.item.requester);
                    state.running += 1;
                    return Some((
                        entry.item,
                        RunningSlot {
                            queue: self.clone(),
                        },
                    ));
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stop admitting. Already-queued submissions still dequeue.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.lock();
        QueueStatus {
            queued: state.heap.len(),
            running: state.running,
            hard_limit: self.inner.config.hard_limit,
            hog_threshold: self.inner.config.hog_threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// A held admission slot. Releases the slot on drop unless enqueued.
pub struct Reservation {
    queue: AdmissionQueue,
    requester: String,
    admission: Admission,
    armed: bool,
}

impl Reservation {
    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Place the stored submission in the queue under this reservation.
    pub fn enqueue(mut self, submission_id: SubmissionId) -> Admission {
        self.armed = false;
        let mut state = self.queue.inner.lock();
        state.reserved -= 1;
        state.push(QueuedSubmission {
            submission_id,
            requester: std::mem::take(&mut self.requester),
            priority: self.admission.priority,
        });
        drop(state);
        self.queue.inner.notify.notify_one();
        self.admission
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.queue.inner.lock();
            state.reserved -= 1;
            state.release_waiting(&self.requester);
        }
    }
}

/// Marks a dequeued submission as running until dropped.
pub struct RunningSlot {
    queue: AdmissionQueue,
}

impl Drop for RunningSlot {
    fn drop(&mut self) {
        let mut state = self.queue.inner.lock();
        state.running -= 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
