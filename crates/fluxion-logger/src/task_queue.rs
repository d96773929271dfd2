// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Time-ordered job queue driving the logger's periodic work.
//!
//! The queue only decides *when* an action is due. Callers pull actions with
//! [`TaskQueue::next`] and execute them themselves, so a failing action can
//! never leave the queue in an inconsistent state.
//!
//! Jobs are kept sorted by due time. A job inserted with the same due time
//! as existing ones is placed after them, so equal-time jobs fire in
//! insertion order.

use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Smallest accepted repeat interval. A zero interval would spin.
const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Due offset used when `now + delay` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + delay`, saturating to a far-future instant instead of overflowing.
fn deadline(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Once,
    Every(Duration),
}

#[derive(Debug)]
struct Job<A> {
    due_at: Instant,
    action: A,
    cadence: Cadence,
}

#[derive(Debug)]
pub struct TaskQueue<A> {
    jobs: Vec<Job<A>>,
}

impl<A: Clone> TaskQueue<A> {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Run `action` once, `delay` from now.
    pub fn once(&mut self, action: A, delay: Duration) {
        self.insert(deadline(Instant::now(), delay), action, Cadence::Once);
    }

    /// Run `action` once after a signed millisecond delay; negative delays fire immediately.
    pub fn once_after_millis(&mut self, action: A, delay_ms: i64) {
        self.once(action, crate::time::delay_from_millis(delay_ms));
    }

    /// Run `action` once at an absolute instant.
    pub fn once_at(&mut self, action: A, due_at: Instant) {
        self.insert(due_at, action, Cadence::Once);
    }

    /// Run `action` every `interval`, first at `now + interval`.
    ///
    /// Occurrences are anchored to due times: the n-th run is due at
    /// `start + n * interval` no matter how long earlier runs took.
    pub fn repeat(&mut self, action: A, interval: Duration) {
        let interval = interval.max(MIN_REPEAT_INTERVAL);
        self.insert(
            deadline(Instant::now(), interval),
            action,
            Cadence::Every(interval),
        );
    }

    /// Wait for the earliest job and hand out its action.
    ///
    /// Returns `None` once the queue is empty. The job is removed only after
    /// its sleep has finished, so dropping this future leaves the queue
    /// untouched and releases the pending timer.
    pub async fn next(&mut self) -> Option<A> {
        let due_at = self.jobs.first()?.due_at;
        sleep_until(due_at).await;

        let job = self.jobs.remove(0);
        if let Cadence::Every(interval) = job.cadence {
            // Re-enqueue before yielding so the next occurrence exists even
            // if the caller's action fails.
            self.insert(
                deadline(job.due_at, interval),
                job.action.clone(),
                job.cadence,
            );
        }
        Some(job.action)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Due times of all pending jobs, earliest first.
    pub fn due_times(&self) -> Vec<Instant> {
        self.jobs.iter().map(|job| job.due_at).collect()
    }

    fn insert(&mut self, due_at: Instant, action: A, cadence: Cadence) {
        let idx = self.jobs.partition_point(|job| job.due_at <= due_at);
        self.jobs.insert(
            idx,
            Job {
                due_at,
                action,
                cadence,
            },
        );
    }
}

impl<A: Clone> Default for TaskQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_sorted<A: Clone>(queue: &TaskQueue<A>) {
        let due = queue.due_times();
        assert!(
            due.windows(2).all(|w| w[0] <= w[1]),
            "queue must stay sorted by due time"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_fire_in_due_order() {
        let mut queue = TaskQueue::new();
        queue.once("late", Duration::from_secs(30));
        queue.once("early", Duration::from_secs(5));
        queue.once("middle", Duration::from_secs(10));

        assert_eq!(queue.next().await, Some("early"));
        assert_eq!(queue.next().await, Some("middle"));
        assert_eq!(queue.next().await, Some("late"));
        assert_eq!(queue.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_due_times_fire_in_insertion_order() {
        let mut queue = TaskQueue::new();
        let at = Instant::now() + Duration::from_secs(10);
        queue.once_at("first", at);
        queue.once_at("second", at);
        queue.once("before", Duration::from_secs(1));
        queue.once_at("third", at);

        assert_eq!(queue.next().await, Some("before"));
        assert_eq!(queue.next().await, Some("first"));
        assert_eq!(queue.next().await, Some("second"));
        assert_eq!(queue.next().await, Some("third"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_stays_sorted_under_mixed_inserts() {
        let mut queue = TaskQueue::new();
        let mut rng = StdRng::seed_from_u64(0x2545_f491);
        for i in 0..200_u64 {
            let delay = Duration::from_millis(rng.gen_range(0..5_000));
            if i % 3 == 0 {
                queue.repeat(i, delay);
            } else {
                queue.once(i, delay);
            }
            assert_sorted(&queue);
        }

        for _ in 0..300 {
            queue.next().await;
            assert_sorted(&queue);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_is_anchored_to_due_times() {
        let mut queue = TaskQueue::new();
        let start = Instant::now();
        let interval = Duration::from_secs(60);
        queue.repeat("tick", interval);

        for n in 1..=3_u32 {
            assert_eq!(queue.next().await, Some("tick"));
            assert_eq!(Instant::now() - start, interval * n);
            // Simulate an action that takes a while to run
            tokio::time::sleep(Duration::from_secs(25)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_action_fires_next_occurrence_immediately() {
        let mut queue = TaskQueue::new();
        let start = Instant::now();
        queue.repeat("slow", Duration::from_secs(10));

        queue.next().await;
        tokio::time::sleep(Duration::from_secs(25)).await;
        queue.next().await;

        // Second occurrence was due at T+20 but the action ran until T+35
        assert_eq!(Instant::now() - start, Duration::from_secs(35));
        assert_eq!(queue.due_times(), vec![start + Duration::from_secs(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_delay_fires_immediately() {
        let mut queue = TaskQueue::new();
        let start = Instant::now();
        queue.once_after_millis("now", -5_000);

        assert_eq!(queue.next().await, Some("now"));
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_next_keeps_job() {
        let mut queue = TaskQueue::new();
        queue.once("job", Duration::from_secs(60));

        let pending = tokio::time::timeout(Duration::from_secs(1), queue.next()).await;
        assert!(pending.is_err());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.next().await, Some("job"));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_survives_between_consumers() {
        let mut queue = TaskQueue::new();
        queue.repeat(1, Duration::from_secs(5));
        queue.once(2, Duration::from_secs(7));

        assert_eq!(queue.next().await, Some(1));
        assert_eq!(queue.next().await, Some(2));
        assert_eq!(queue.next().await, Some(1));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delays_saturate_instead_of_overflowing() {
        let mut queue = TaskQueue::new();
        let start = Instant::now();
        queue.repeat("far", Duration::from_secs(u64::MAX / 2));
        queue.once("never", Duration::MAX);
        queue.once("soon", Duration::from_secs(1));

        assert_eq!(queue.len(), 3);
        assert_sorted(&queue);
        assert_eq!(queue.due_times()[1], start + FAR_FUTURE);
        assert_eq!(queue.next().await, Some("soon"));
    }
}
