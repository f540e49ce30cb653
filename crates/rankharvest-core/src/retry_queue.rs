//! Process-wide FIFO of keyword attempts plus the permanent-failure set.
//!
//! Every session pops from the same queue, so keywords are partitioned across
//! worksheets by whoever asks first. Each operation takes the lock once;
//! `pop` followed by `retry_or_fail` is two independent atomic steps, so a
//! task can leave the queue and come back later but is never duplicated.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::KeywordTask;

/// Bounded-retry policy: a keyword gets at most `max_attempts` tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn can_retry(&self, task: &KeywordTask) -> bool {
        task.attempt < self.max_attempts
    }
}

/// What happened to a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Pushed back to the tail with this attempt number.
    Requeued(u32),
    /// Moved to the permanent-failure set.
    Abandoned,
}

/// Snapshot of the queue counters.
///
/// `queued + in_flight + failed + succeeded` equals the number of distinct
/// tasks ever pushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queued: usize,
    pub in_flight: usize,
    pub failed: usize,
    pub succeeded: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.queued + self.in_flight + self.failed + self.succeeded
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<KeywordTask>,
    failed: Vec<KeywordTask>,
    in_flight: usize,
    succeeded: usize,
}

impl QueueState {
    // A keyword listed under two groups is two tasks, failed independently.
    fn has_failed(&self, task: &KeywordTask) -> bool {
        self.failed
            .iter()
            .any(|f| f.keyword == task.keyword && f.group == task.group)
    }
}

/// Shared handle to the retry queue. Clones refer to the same queue.
#[derive(Debug, Clone, Default)]
pub struct RetryQueue {
    state: Arc<Mutex<QueueState>>,
    policy: RetryPolicy,
}

impl RetryQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            policy,
        }
    }

    /// Build a queue preloaded with `tasks`, in order.
    pub fn with_tasks(policy: RetryPolicy, tasks: impl IntoIterator<Item = KeywordTask>) -> Self {
        let queue = Self::new(policy);
        for task in tasks {
            queue.push(task);
        }
        queue
    }

    // A panic while holding the lock cannot leave the state half-updated
    // (every mutation is a single push/pop/counter bump), so poisoning is
    // safe to ignore.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove and return the head task, or `None` when the queue is drained.
    ///
    /// The task counts as in flight until it is passed to
    /// [`complete`](Self::complete) or [`retry_or_fail`](Self::retry_or_fail).
    pub fn pop(&self) -> Option<KeywordTask> {
        let mut state = self.lock();
        let task = state.pending.pop_front()?;
        state.in_flight += 1;
        Some(task)
    }

    /// Append a task to the tail.
    ///
    /// Returns `false` (and leaves the queue unchanged) if the same keyword
    /// and group are already in the failure set.
    pub fn push(&self, task: KeywordTask) -> bool {
        let mut state = self.lock();
        if state.has_failed(&task) {
            tracing::warn!(keyword = %task.keyword, group = %task.group, "Refusing to requeue a permanently failed keyword");
            return false;
        }
        state.pending.push_back(task);
        true
    }

    /// Record a keyword as permanently unrecoverable. Recording the same
    /// keyword and group twice has no effect.
    pub fn fail(&self, task: &KeywordTask) {
        let mut state = self.lock();
        if !state.has_failed(task) {
            state.failed.push(task.clone());
        }
    }

    /// Mark an in-flight task as done.
    pub fn complete(&self, task: &KeywordTask) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.succeeded += 1;
        tracing::debug!(keyword = %task.keyword, attempt = task.attempt, "Keyword done");
    }

    /// Apply the retry policy to an in-flight task that just failed.
    ///
    /// The decision depends only on the task's own attempt count; every
    /// abandoned task gets its own entry in the failure set.
    pub fn retry_or_fail(&self, task: KeywordTask) -> RetryDecision {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        if self.policy.can_retry(&task) {
            let next = task.next_attempt();
            let attempt = next.attempt;
            state.pending.push_back(next);
            RetryDecision::Requeued(attempt)
        } else {
            state.failed.push(task);
            RetryDecision::Abandoned
        }
    }

    /// Permanently failed tasks, in the order they were abandoned.
    pub fn failed(&self) -> Vec<KeywordTask> {
        self.lock().failed.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            queued: state.pending.len(),
            in_flight: state.in_flight,
            failed: state.failed.len(),
            succeeded: state.succeeded,
        }
    }
}
