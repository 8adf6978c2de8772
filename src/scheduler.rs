//! drives similarity computation across the candidate set, chunk by chunk
//!
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use cpu_time::ProcessTime;

use crate::answer::SimilarityMatch;
use crate::error::EngineError;
use crate::events::JobEvent;
use crate::similarity::SimilarityScorer;
use crate::store::Sequence;
use crate::utils::parameters::ScoreRange;

/// cooperative cancellation token shared between a job handle and its worker.
/// The scheduler polls it at the top of every chunk, cancellation is never
/// preemptive mid chunk.
#[derive(Default)]
pub struct CancelFlag {
    flag: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag {
            flag: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
} // end of impl CancelFlag

/// how a scheduler run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed { processed: usize },
    Cancelled,
    Failed(EngineError),
}

/// Partitions the candidate set into contiguous chunks in store order, scores
/// every chunk member against the target and emits chunk and progress events
/// into the sink. The thread yields between chunks so chunk boundaries are
/// the only suspension points, which bounds cancellation latency to one chunk
/// of scoring.
///
/// Scores outside the range are filtered here and never transmitted, the
/// progress counter still counts every candidate seen.
pub struct ChunkScheduler<S: SimilarityScorer> {
    scorer: S,
    chunk_size: usize,
    range: ScoreRange,
}

impl<S: SimilarityScorer> ChunkScheduler<S> {
    pub fn new(scorer: S, chunk_size: usize, range: ScoreRange) -> Self {
        assert!(chunk_size > 0, "chunk_size must be at least 1");
        ChunkScheduler {
            scorer,
            chunk_size,
            range,
        }
    }

    /// runs the comparison to the end, to cancellation or to the first scorer
    /// fault. Exactly one terminal event (done, cancelled or error) is emitted
    /// last, no chunk or progress event follows it.
    pub fn run<F>(
        &self,
        target: &Sequence,
        candidates: &[std::sync::Arc<Sequence>],
        cancel: &CancelFlag,
        sink: &mut F,
    ) -> RunOutcome
    where
        F: FnMut(JobEvent),
    {
        //
        let total = candidates.len();
        let start_t = SystemTime::now();
        let cpu_start = ProcessTime::now();
        log::info!(
            "scheduler run, target '{}', {} candidates, chunk size {}",
            target.get_name(),
            total,
            self.chunk_size
        );
        //
        let mut processed: usize = 0;
        for chunk in candidates.chunks(self.chunk_size) {
            // cancellation is checked once per chunk, before any scoring
            if cancel.is_cancelled() {
                log::info!(
                    "scheduler observed cancellation, processed {} of {}",
                    processed,
                    total
                );
                sink(JobEvent::Cancelled);
                return RunOutcome::Cancelled;
            }
            //
            let mut data = Vec::<SimilarityMatch>::with_capacity(chunk.len());
            for candidate in chunk {
                match self.scorer.score(target, candidate) {
                    Ok(score) => {
                        if self.range.contains(score) {
                            data.push(SimilarityMatch::new(candidate.get_name().to_string(), score));
                        }
                    }
                    Err(e) => {
                        log::error!("scorer failed on candidate '{}' : {}", candidate.get_name(), e);
                        sink(JobEvent::Error {
                            message: e.to_string(),
                        });
                        return RunOutcome::Failed(e);
                    }
                }
            }
            processed += chunk.len();
            log::debug!(
                "chunk scored, kept {} of {}, processed {} of {}",
                data.len(),
                chunk.len(),
                processed,
                total
            );
            sink(JobEvent::Chunk { data });
            sink(JobEvent::Progress { processed, total });
            // let the host service other work between chunks
            std::thread::yield_now();
        } // end of chunk loop
        //
        sink(JobEvent::Done);
        log::info!(
            "scheduler done, {} candidates, system time(s) : {}, cpu time(s) : {}",
            total,
            start_t.elapsed().unwrap_or_default().as_secs(),
            cpu_start.elapsed().as_secs()
        );
        RunOutcome::Completed { processed }
    } // end of run
} // end of impl ChunkScheduler

//=========================================================================

// end of mod tests
