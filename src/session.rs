//! session owning the sequence store and at most one active comparison job
//!
//!

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use cpu_time::ProcessTime;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use crate::error::CompareError;
use crate::events::JobEvent;
use crate::job::{ComparisonJob, JobState};
use crate::scheduler::{CancelFlag, ChunkScheduler, RunOutcome};
use crate::similarity::{PositionalScorer, SimilarityScorer};
use crate::store::{Sequence, SequenceStore};
use crate::utils::parameters::{ComparisonRequest, JobParams};

// how long a blocked event send waits before rechecking the cancel flag
const EVENT_SEND_TIMEOUT: Duration = Duration::from_millis(50);

/// Owns the working sequence store, a worker pool with a single task slot and
/// the currently active job. Starting a new comparison supersedes the
/// previous one : the old scheduler observes its cancellation and terminates
/// before the new worker is spawned, so one scheduler at most is computing at
/// any time for the session.
///
/// The store is read only while a job runs. Replacing it wholesale cancels
/// the running job first, in flight workers keep the snapshot they started
/// with.
pub struct CompareSession {
    store: RwLock<Arc<SequenceStore>>,
    active: Mutex<Option<Arc<ComparisonJob>>>,
    pool: rayon::ThreadPool,
    params: JobParams,
    job_counter: AtomicU64,
}

impl CompareSession {
    pub fn new(store: SequenceStore, params: JobParams) -> anyhow::Result<Self> {
        // one task slot, a session never runs two schedulers concurrently
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build()?;
        log::info!(
            "session created, {} sequences, chunk size {}",
            store.len(),
            params.get_chunk_size()
        );
        Ok(CompareSession {
            store: RwLock::new(Arc::new(store)),
            active: Mutex::new(None),
            pool,
            params,
            job_counter: AtomicU64::new(0),
        })
    } // end of new

    /// current store snapshot
    pub fn get_store(&self) -> Arc<SequenceStore> {
        self.store.read().clone()
    }

    pub fn get_params(&self) -> &JobParams {
        &self.params
    }

    /// the job last started, possibly terminal
    pub fn active_job(&self) -> Option<Arc<ComparisonJob>> {
        self.active.lock().clone()
    }

    /// requests cancellation of the active job if it is still running
    pub fn cancel_active(&self) {
        if let Some(job) = self.active.lock().as_ref() {
            if !job.get_state().is_terminal() {
                job.cancel();
            }
        }
    }

    /// Replaces the whole working set. A running job is cancelled and awaited
    /// first so no scheduler ever reads a store swapped under it.
    pub fn replace_store(&self, new_store: SequenceStore) {
        let mut active = self.active.lock();
        if let Some(prev) = active.take() {
            if !prev.get_state().is_terminal() {
                log::info!("store replacement cancels running job {}", prev.get_id());
                prev.cancel();
                prev.wait_terminal();
            }
        }
        log::info!("store replaced, {} sequences", new_store.len());
        *self.store.write() = Arc::new(new_store);
    } // end of replace_store

    /// Starts a comparison with the production positional scorer.
    /// See start_with_scorer.
    pub fn start(
        &self,
        request: &ComparisonRequest,
    ) -> Result<(Arc<ComparisonJob>, Receiver<JobEvent>), CompareError> {
        self.start_with_scorer(request, PositionalScorer)
    }

    /// Validates the request, supersedes any previous job and spawns a worker
    /// driving the chunk scheduler. Returns the job handle and the bounded
    /// event channel to read until a terminal event.
    ///
    /// Dropping the receiver is safe : the worker keeps folding results into
    /// the job aggregator and undelivered events are discarded.
    pub fn start_with_scorer<S>(
        &self,
        request: &ComparisonRequest,
        scorer: S,
    ) -> Result<(Arc<ComparisonJob>, Receiver<JobEvent>), CompareError>
    where
        S: SimilarityScorer + Send + 'static,
    {
        // both rejections are synchronous, before the previous job is touched
        request.range.validate()?;
        let store = self.get_store();
        let target = store
            .get(&request.target_name)
            .cloned()
            .ok_or_else(|| CompareError::InvalidTarget(request.target_name.clone()))?;
        // candidate set : store snapshot in insertion order, target excluded
        let candidates: Vec<Arc<Sequence>> = store
            .iter()
            .filter(|s| s.get_name() != request.target_name)
            .cloned()
            .collect();
        //
        let mut active = self.active.lock();
        if let Some(prev) = active.take() {
            if !prev.get_state().is_terminal() {
                log::info!("new request supersedes job {}", prev.get_id());
                prev.cancel();
                prev.wait_terminal();
            }
        }
        //
        let id = self.job_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let job = Arc::new(ComparisonJob::new(id, candidates.len()));
        let (sender, receiver) =
            crossbeam_channel::bounded::<JobEvent>(self.params.get_channel_capacity());
        log::info!(
            "job {} starting at {}, target '{}', {} candidates, range [{}, {}]",
            id,
            job.get_started_at().to_rfc3339(),
            request.target_name,
            candidates.len(),
            request.range.get_min(),
            request.range.get_max()
        );
        //
        job.set_running();
        let scheduler = ChunkScheduler::new(scorer, self.params.get_chunk_size(), request.range);
        let worker_job = job.clone();
        self.pool.spawn(move || {
            run_worker(scheduler, target, candidates, worker_job, sender);
        });
        //
        *active = Some(job.clone());
        Ok((job, receiver))
    } // end of start_with_scorer
} // end of impl CompareSession

// Worker body : drives the scheduler, folds chunk payloads into the job
// aggregator before forwarding events, then parks the job in the terminal
// state matching the run outcome.
fn run_worker<S: SimilarityScorer>(
    scheduler: ChunkScheduler<S>,
    target: Arc<Sequence>,
    candidates: Vec<Arc<Sequence>>,
    job: Arc<ComparisonJob>,
    sender: Sender<JobEvent>,
) {
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    //
    let fold_job = job.clone();
    let cancel_for_send = job.clone();
    let mut sink = |event: JobEvent| {
        match &event {
            JobEvent::Chunk { data } => fold_job.aggregator().fold(data.clone()),
            JobEvent::Progress { processed, .. } => fold_job.record_progress(*processed),
            _ => {}
        }
        send_event(&sender, cancel_for_send.cancel_flag(), event);
    };
    let outcome = scheduler.run(&target, &candidates, job.cancel_flag(), &mut sink);
    //
    let terminal = match outcome {
        RunOutcome::Completed { .. } => JobState::Completed,
        RunOutcome::Cancelled => JobState::Cancelled,
        RunOutcome::Failed(_) => JobState::Failed,
    };
    job.finish(terminal);
    log::info!(
        "worker for job {} ended, system time(s) : {}, cpu time(s) : {}",
        job.get_id(),
        start_t.elapsed().unwrap_or_default().as_secs(),
        cpu_start.elapsed().as_secs()
    );
} // end of run_worker

// Bounded send with backpressure. A full channel blocks the worker (that is
// the cooperative pacing with a slow consumer), but a cancelled job must not
// stay stuck on a consumer that stopped reading : once the flag is up pending
// events are dropped, the aggregator already holds the folded data.
fn send_event(sender: &Sender<JobEvent>, cancel: &CancelFlag, event: JobEvent) {
    let mut pending = event;
    loop {
        match sender.send_timeout(pending, EVENT_SEND_TIMEOUT) {
            Ok(()) => return,
            // receiver dropped, nobody listens anymore
            Err(SendTimeoutError::Disconnected(_)) => return,
            Err(SendTimeoutError::Timeout(back)) => {
                if cancel.is_cancelled() {
                    log::debug!("dropping event for cancelled job, consumer is stalled");
                    return;
                }
                pending = back;
            }
        }
    }
} // end of send_event

//=========================================================================

#[cfg(test)]
mod tests {

    use super::*;
    use crate::error::EngineError;
    use crate::similarity::positional_similarity;
    use crate::utils::parameters::ScoreRange;

    fn demo_store() -> SequenceStore {
        let mut store = SequenceStore::new();
        store.insert(Sequence::new("X".to_string(), b"AAAA".to_vec()));
        store.insert(Sequence::new("Y".to_string(), b"AAAT".to_vec()));
        store.insert(Sequence::new("Z".to_string(), b"TTTT".to_vec()));
        store
    }

    fn wide_store(nb: usize) -> SequenceStore {
        let mut store = SequenceStore::new();
        store.insert(Sequence::new("target".to_string(), b"ACGTACGT".to_vec()));
        for i in 0..nb {
            store.insert(Sequence::new(
                format!("Hap_{:04}", i),
                b"ACGTACGA".to_vec(),
            ));
        }
        store
    }

    fn drain(receiver: Receiver<JobEvent>) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = receiver.recv() {
            let terminal = ev.is_terminal();
            events.push(ev);
            if terminal {
                break;
            }
        }
        events
    }

    #[test]
    fn full_range_comparison_ranks_all_candidates() {
        let session = CompareSession::new(demo_store(), JobParams::default()).unwrap();
        let request = ComparisonRequest::new("X".to_string(), ScoreRange::full());
        let (job, receiver) = session.start(&request).unwrap();
        let events = drain(receiver);
        //
        assert_eq!(events.last(), Some(&JobEvent::Done));
        assert_eq!(job.wait_terminal(), JobState::Completed);
        let ranked: Vec<(String, f32)> = job
            .aggregator()
            .snapshot()
            .into_iter()
            .map(|m| (m.name, m.score))
            .collect();
        assert_eq!(ranked, vec![("Y".to_string(), 75.), ("Z".to_string(), 0.)]);
        assert_eq!(job.get_processed(), 2);
        assert_eq!(job.get_total(), 2);
    }

    #[test]
    fn narrow_range_can_filter_everything_out() {
        let session = CompareSession::new(demo_store(), JobParams::default()).unwrap();
        let request = ComparisonRequest::new("X".to_string(), ScoreRange::new(80., 100.));
        let (job, receiver) = session.start(&request).unwrap();
        drain(receiver);
        //
        assert_eq!(job.wait_terminal(), JobState::Completed);
        // Y scores 75, below the range
        assert_eq!(job.total_results(), 0);
        assert!(job.page(0, 100).is_empty());
    }

    #[test]
    fn unknown_target_is_rejected_synchronously() {
        let session = CompareSession::new(demo_store(), JobParams::default()).unwrap();
        let request = ComparisonRequest::new("W".to_string(), ScoreRange::full());
        let res = session.start(&request);
        assert!(matches!(res, Err(CompareError::InvalidTarget(name)) if name == "W"));
        assert!(session.active_job().is_none());
    }

    #[test]
    fn inverted_range_is_rejected_synchronously() {
        let session = CompareSession::new(demo_store(), JobParams::default()).unwrap();
        let request = ComparisonRequest::new("X".to_string(), ScoreRange::new(90., 10.));
        let res = session.start(&request);
        assert!(matches!(res, Err(CompareError::InvalidRange { .. })));
    }

    #[test]
    fn cancelled_job_emits_nothing_after_cancelled_and_freezes_totals() {
        // small channel, unread receiver : the worker cannot run to completion
        let session = CompareSession::new(wide_store(500), JobParams::new(10, 4)).unwrap();
        let request = ComparisonRequest::new("target".to_string(), ScoreRange::full());
        let (job, receiver) = session.start(&request).unwrap();
        //
        job.cancel();
        assert_eq!(job.wait_terminal(), JobState::Cancelled);
        let events = drain(receiver);
        //
        if let Some(pos) = events.iter().position(|e| *e == JobEvent::Cancelled) {
            assert_eq!(pos, events.len() - 1);
        }
        assert!(!events.iter().any(|e| matches!(e, JobEvent::Done)));
        let total_after_cancel = job.total_results();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(job.total_results(), total_after_cancel);
    }

    #[test]
    fn new_request_supersedes_running_job() {
        // capacity far below the event count and an unread receiver keep the
        // first job from completing on its own
        let session = CompareSession::new(wide_store(500), JobParams::new(10, 4)).unwrap();
        let first = ComparisonRequest::new("target".to_string(), ScoreRange::full());
        let (job1, _receiver1) = session.start(&first).unwrap();
        //
        let second = ComparisonRequest::new("Hap_0000".to_string(), ScoreRange::full());
        let (job2, receiver2) = session.start(&second).unwrap();
        // start returned : the first scheduler has terminated
        assert_eq!(job1.get_state(), JobState::Cancelled);
        //
        let events = drain(receiver2);
        assert_eq!(events.last(), Some(&JobEvent::Done));
        assert_eq!(job2.wait_terminal(), JobState::Completed);
        assert_eq!(job2.get_total(), 500);
    }

    #[test]
    fn store_replacement_cancels_running_job() {
        let session = CompareSession::new(wide_store(500), JobParams::new(10, 4)).unwrap();
        let request = ComparisonRequest::new("target".to_string(), ScoreRange::full());
        let (job, _receiver) = session.start(&request).unwrap();
        //
        session.replace_store(demo_store());
        assert!(job.get_state().is_terminal());
        assert_eq!(session.get_store().len(), 3);
        // the new store serves new requests
        let request = ComparisonRequest::new("X".to_string(), ScoreRange::full());
        let (job2, receiver2) = session.start(&request).unwrap();
        drain(receiver2);
        assert_eq!(job2.wait_terminal(), JobState::Completed);
    }

    #[test]
    fn scorer_fault_fails_job_but_keeps_partial_results() {
        struct FailingScorer;
        impl SimilarityScorer for FailingScorer {
            fn score(&self, t: &Sequence, c: &Sequence) -> Result<f32, EngineError> {
                if c.get_name() == "Hap_0015" {
                    Err(EngineError::CorruptSequence(c.get_name().to_string()))
                } else {
                    Ok(positional_similarity(t.get_bases(), c.get_bases()))
                }
            }
        }
        let session = CompareSession::new(wide_store(30), JobParams::new(10, 64)).unwrap();
        let request = ComparisonRequest::new("target".to_string(), ScoreRange::full());
        let (job, receiver) = session
            .start_with_scorer(&request, FailingScorer)
            .unwrap();
        let events = drain(receiver);
        //
        assert!(matches!(events.last(), Some(JobEvent::Error { .. })));
        assert_eq!(job.wait_terminal(), JobState::Failed);
        // the first chunk was folded before the fault in the second one
        assert_eq!(job.total_results(), 10);
    }

    #[test]
    fn pages_of_a_completed_job_reconstruct_the_ranked_list() {
        let session = CompareSession::new(wide_store(95), JobParams::default()).unwrap();
        let request = ComparisonRequest::new("target".to_string(), ScoreRange::full());
        let (job, receiver) = session.start(&request).unwrap();
        drain(receiver);
        assert_eq!(job.wait_terminal(), JobState::Completed);
        //
        assert_eq!(job.total_results(), 95);
        let mut concatenated = Vec::new();
        let mut page_index = 0;
        loop {
            let page = job.page(page_index, 20);
            if page.is_empty() {
                break;
            }
            concatenated.extend(page);
            page_index += 1;
        }
        assert_eq!(concatenated, job.aggregator().snapshot());
    }
} // end of mod tests
