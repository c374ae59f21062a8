//! Work queue shared by the workers of one job
//!
//! This module handles:
//! - The task type moved between workers (seed page or resource)
//! - FIFO hand-out of pending tasks to idle workers
//! - Completion tracking, so workers know when no more work can appear

use crate::crawler::parser::DiscoveredResource;
use crate::jobs::JobId;
use crate::state::ResourceKind;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use url::Url;

/// What a task fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// The job's seed page; its body is scanned for resources
    SeedPage,

    /// A resource to save under the given kind directory
    Resource(ResourceKind),
}

/// A unit of work for a worker
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    pub url: Url,

    /// Fetch attempts made so far
    pub attempts: u32,

    pub job_id: JobId,
}

impl Task {
    pub fn seed(job_id: JobId, url: Url) -> Self {
        Self {
            kind: TaskKind::SeedPage,
            url,
            attempts: 0,
            job_id,
        }
    }

    pub fn resource(job_id: JobId, resource: DiscoveredResource) -> Self {
        Self {
            kind: TaskKind::Resource(resource.kind),
            url: resource.url,
            attempts: 0,
            job_id,
        }
    }
}

/// FIFO task queue that knows when a job has run dry
///
/// A task is "in flight" from the moment a worker takes it until the worker
/// reports completion. Follow-up tasks are enqueued in the same critical
/// section that retires their parent, so the queue can never look empty and
/// idle while a follow-up is still on its way in. Once it is both empty and
/// idle, it closes and every waiting worker gets `None`.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    in_flight: usize,
    closed: bool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Adds a task; ignored once the queue has closed
    pub fn push(&self, task: Task) {
        {
            let mut state = self.state.lock();
            if state.closed {
                tracing::warn!("Dropping task for {} pushed after queue closed", task.url);
                return;
            }
            state.tasks.push_back(task);
        }
        self.notify.notify_waiters();
    }

    /// Waits for the next task
    ///
    /// # Returns
    ///
    /// * `Some(Task)` - A task the caller must later retire with [`TaskQueue::complete`]
    /// * `None` - No task is pending or in flight; the job has run dry
    pub async fn next(&self) -> Option<Task> {
        loop {
            // Register interest before looking, so a wakeup between the
            // check and the await is not lost
            let notified = self.notify.notified();

            {
                let mut state = self.state.lock();
                if let Some(task) = state.tasks.pop_front() {
                    state.in_flight += 1;
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
                if state.in_flight == 0 {
                    state.closed = true;
                    drop(state);
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Retires an in-flight task, enqueueing the tasks it produced
    pub fn complete(&self, follow_ups: Vec<Task>) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.tasks.extend(follow_ups);
            if state.tasks.is_empty() && state.in_flight == 0 {
                state.closed = true;
            }
        }
        self.notify.notify_waiters();
    }

    /// Number of tasks waiting to be taken
    pub fn pending(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
