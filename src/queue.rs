//! # Job Queue
//!
//! Priority-ordered holding area for pending jobs. Higher numeric priority
//! dequeues first; ties break by insertion order, so ordering is stable.
//!
//! The queue never mutates job status; lifecycle transitions belong to the
//! worker. All mutations are serialized behind an interior mutex because
//! submission and the scheduling tick race.

use crate::model::{Job, JobId, JobType};
use parking_lot::Mutex;

struct QueueEntry {
    job: Job,
}

struct QueueState {
    /// Kept sorted: highest priority first, insertion order within a priority.
    entries: Vec<QueueEntry>,
}

/// Thread-safe priority queue of pending jobs.
pub struct JobQueue {
    inner: Mutex<QueueState>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueState {
                entries: Vec::new(),
            }),
        }
    }

    /// Insert a job at its priority position.
    pub fn enqueue(&self, job: Job) {
        let mut state = self.inner.lock();
        let entry = QueueEntry { job };
        // Binary search keeps the vector ordered without a full re-sort.
        // Earlier entries at the same priority have lower sequence numbers,
        // so inserting after them preserves FIFO within a priority.
        let position = state
            .entries
            .partition_point(|e| e.job.priority >= entry.job.priority);
        state.entries.insert(position, entry);
    }

    /// Remove and return the highest-priority job.
    pub fn dequeue(&self) -> Option<Job> {
        let mut state = self.inner.lock();
        if state.entries.is_empty() {
            None
        } else {
            Some(state.entries.remove(0).job)
        }
    }

    /// Remove and return the highest-priority job matching `eligible`,
    /// leaving every other entry in place. Used by the worker to skip jobs
    /// whose target resource is busy.
    pub fn dequeue_matching<F>(&self, eligible: F) -> Option<Job>
    where
        F: Fn(&Job) -> bool,
    {
        let mut state = self.inner.lock();
        let index = state.entries.iter().position(|e| eligible(&e.job))?;
        Some(state.entries.remove(index).job)
    }

    /// Remove a specific job without dispatching it. Returns the job when it
    /// was still queued.
    pub fn remove(&self, job_id: JobId) -> Option<Job> {
        let mut state = self.inner.lock();
        let index = state.entries.iter().position(|e| e.job.id == job_id)?;
        Some(state.entries.remove(index).job)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.inner.lock().entries.iter().any(|e| e.job.id == job_id)
    }

    /// Snapshot of pending jobs of the given type, in dequeue order.
    pub fn jobs_by_type(&self, job_type: JobType) -> Vec<Job> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.job.job_type == job_type)
            .map(|e| e.job.clone())
            .collect()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobRequest, Platform, SubmissionPayload};

    fn job(priority: i32, job_type: JobType) -> Job {
        let payload = SubmissionPayload {
            bundle_id: "com.example.app".to_string(),
            version_name: "1.0.0".to_string(),
            build_number: 1,
            artifact_path: None,
            track: None,
            rollout_fraction: None,
            metadata: None,
        };
        Job::new(JobRequest::new(job_type, Platform::Ios, payload).with_priority(priority))
    }

    #[test]
    fn test_higher_priority_dequeues_first() {
        let queue = JobQueue::new();
        let low = job(1, JobType::Submit);
        let high = job(10, JobType::Submit);
        queue.enqueue(low.clone());
        queue.enqueue(high.clone());

        assert_eq!(queue.dequeue().unwrap().id, high.id);
        assert_eq!(queue.dequeue().unwrap().id, low.id);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let queue = JobQueue::new();
        let first = job(5, JobType::Submit);
        let second = job(5, JobType::Submit);
        let third = job(5, JobType::Submit);
        queue.enqueue(first.clone());
        queue.enqueue(second.clone());
        queue.enqueue(third.clone());

        assert_eq!(queue.dequeue().unwrap().id, first.id);
        assert_eq!(queue.dequeue().unwrap().id, second.id);
        assert_eq!(queue.dequeue().unwrap().id, third.id);
    }

    #[test]
    fn test_remove_pulls_job_without_dispatch() {
        let queue = JobQueue::new();
        let keep = job(0, JobType::Submit);
        let pull = job(0, JobType::Rollback);
        queue.enqueue(keep.clone());
        queue.enqueue(pull.clone());

        let removed = queue.remove(pull.id).unwrap();
        assert_eq!(removed.id, pull.id);
        assert_eq!(queue.len(), 1);
        assert!(!queue.contains(pull.id));
        assert!(queue.contains(keep.id));
    }

    #[test]
    fn test_dequeue_matching_skips_ineligible() {
        let queue = JobQueue::new();
        let blocked = job(10, JobType::Submit);
        let eligible = job(1, JobType::Submit);
        let blocked_bundle = blocked.payload.bundle_id.clone();
        let mut other = eligible.clone();
        other.payload.bundle_id = "com.example.other".to_string();
        queue.enqueue(blocked.clone());
        queue.enqueue(other.clone());

        let picked = queue
            .dequeue_matching(|j| j.payload.bundle_id != blocked_bundle)
            .unwrap();
        assert_eq!(picked.id, other.id);
        // The higher-priority blocked job is still queued.
        assert!(queue.contains(blocked.id));
    }

    #[test]
    fn test_jobs_by_type() {
        let queue = JobQueue::new();
        queue.enqueue(job(0, JobType::Submit));
        queue.enqueue(job(0, JobType::Rollback));
        queue.enqueue(job(3, JobType::Submit));

        let submits = queue.jobs_by_type(JobType::Submit);
        assert_eq!(submits.len(), 2);
        // Dequeue order within the snapshot: priority 3 before priority 0.
        assert_eq!(submits[0].priority, 3);
    }
}
