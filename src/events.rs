//! typed event schema emitted by a running comparison job
//!

use serde::{Deserialize, Serialize};

use crate::answer::SimilarityMatch;

/// Events streamed from the scheduler to the session transport, in emission
/// order. A terminal event (Done, Cancelled or Error) is always last, nothing
/// follows it for a given job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobEvent {
    /// processed counts every candidate seen so far, filtered or not
    Progress { processed: usize, total: usize },
    /// one chunk worth of range-filtered scores
    Chunk { data: Vec<SimilarityMatch> },
    /// normal completion
    Done,
    /// cooperative cancellation was observed, no more data follows
    Cancelled,
    /// unrecoverable engine fault, partial results stay readable
    Error { message: String },
}

impl JobEvent {
    /// true for Done, Cancelled and Error
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Done | JobEvent::Cancelled | JobEvent::Error { .. }
        )
    }
} // end of impl JobEvent

//=========================================================================

// end of mod tests
