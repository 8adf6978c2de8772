//! comparison job lifecycle and state machine
//!
//!

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use strum_macros::{Display, EnumString};

use crate::aggregator::ResultAggregator;
use crate::answer::SimilarityMatch;
use crate::scheduler::CancelFlag;

/// Job states. Running is the only state in which the scheduler is active,
/// Completed, Cancelled and Failed are terminal. A terminal job is never
/// restarted, a new request builds a fresh job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum JobState {
    Idle,
    Running,
    Cancelled,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Cancelled | JobState::Completed | JobState::Failed
        )
    }
} // end of impl JobState

/// One cancellable run of the chunk scheduler bound to one target and one
/// score range. Owned by the session that started it, shared with the worker
/// thread driving the scheduler.
///
/// The aggregator stays queryable in every state, a Failed job keeps the
/// partial results folded before the fault.
pub struct ComparisonJob {
    id: u64,
    state: Mutex<JobState>,
    /// notified when the worker parks the job in a terminal state
    terminal_cv: Condvar,
    cancel: CancelFlag,
    aggregator: ResultAggregator,
    /// candidates processed so far, updated from progress events
    processed: AtomicUsize,
    /// candidate set size, fixed at start
    total: usize,
    started_at: DateTime<Utc>,
}

impl ComparisonJob {
    pub fn new(id: u64, total: usize) -> Self {
        ComparisonJob {
            id,
            state: Mutex::new(JobState::Idle),
            terminal_cv: Condvar::new(),
            cancel: CancelFlag::new(),
            aggregator: ResultAggregator::new(),
            processed: AtomicUsize::new(0),
            total,
            started_at: Utc::now(),
        }
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }

    pub fn get_state(&self) -> JobState {
        *self.state.lock()
    }

    pub fn get_started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// candidates processed so far
    pub fn get_processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// size of the candidate set
    pub fn get_total(&self) -> usize {
        self.total
    }

    /// requests cooperative cancellation. The scheduler observes the flag at
    /// the next chunk boundary, wait_terminal blocks until it did.
    pub fn cancel(&self) {
        log::info!("cancellation requested for job {}", self.id);
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Idle to Running, called by the session just before spawning the worker
    pub(crate) fn set_running(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(*state, JobState::Idle);
        *state = JobState::Running;
        log::debug!("job {} running, {} candidates", self.id, self.total);
    }

    /// parks the job in a terminal state and wakes every waiter.
    /// Called exactly once, by the worker, when the scheduler run ended.
    pub(crate) fn finish(&self, terminal: JobState) {
        debug_assert!(terminal.is_terminal());
        let mut state = self.state.lock();
        *state = terminal;
        self.terminal_cv.notify_all();
        log::info!(
            "job {} ended in state {}, processed {} of {}",
            self.id,
            terminal,
            self.get_processed(),
            self.total
        );
    }

    /// blocks until the worker parked the job in a terminal state
    pub fn wait_terminal(&self) -> JobState {
        let mut state = self.state.lock();
        while !state.is_terminal() {
            self.terminal_cv.wait(&mut state);
        }
        *state
    }

    pub(crate) fn record_progress(&self, processed: usize) {
        self.processed.store(processed, Ordering::SeqCst);
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    /// page of the ranked results folded so far, see ResultAggregator::page
    pub fn page(&self, page_index: usize, page_size: usize) -> Vec<SimilarityMatch> {
        self.aggregator.page(page_index, page_size)
    }

    /// number of results folded so far
    pub fn total_results(&self) -> usize {
        self.aggregator.total()
    }
} // end of impl ComparisonJob

//=========================================================================

// end of mod tests
