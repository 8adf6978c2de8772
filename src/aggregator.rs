//! folds chunk results into the global ranked list and serves pages of it
//!
//!

use parking_lot::RwLock;

use crate::answer::SimilarityMatch;

/// Accumulates chunk outputs into a monotonically growing ranked list
/// (score descending, ties by name ascending) and exposes it as fixed size
/// pages.
///
/// Exactly one scheduler writes into an aggregator, page and total queries
/// may run concurrently from other threads. Readers always observe the list
/// either before or after a given fold, never a partial merge.
pub struct ResultAggregator {
    ranked: RwLock<Vec<SimilarityMatch>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        ResultAggregator {
            ranked: RwLock::new(Vec::new()),
        }
    }

    /// merges one chunk of scores into the ranked list.
    /// Folding chunk by chunk or everything as one chunk yields the same
    /// final list.
    pub fn fold(&self, mut chunk: Vec<SimilarityMatch>) {
        if chunk.is_empty() {
            return;
        }
        chunk.sort_by(|a, b| a.ranking(b));
        let mut ranked = self.ranked.write();
        let merged = merge_ranked(&ranked, &chunk);
        *ranked = merged;
        log::debug!("aggregator folded chunk, total is now {}", ranked.len());
    } // end of fold

    /// entries [i*n, (i+1)*n) of the current ranked list.
    /// While the job is still running later calls may return more, that is
    /// expected.
    pub fn page(&self, page_index: usize, page_size: usize) -> Vec<SimilarityMatch> {
        let ranked = self.ranked.read();
        let start = page_index.saturating_mul(page_size).min(ranked.len());
        let end = start.saturating_add(page_size).min(ranked.len());
        ranked[start..end].to_vec()
    }

    /// number of results folded so far
    pub fn total(&self) -> usize {
        self.ranked.read().len()
    }

    /// the whole ranked list at this instant
    pub fn snapshot(&self) -> Vec<SimilarityMatch> {
        self.ranked.read().clone()
    }
} // end of impl ResultAggregator

impl Default for ResultAggregator {
    fn default() -> Self {
        ResultAggregator::new()
    }
}

// merge of two ranked slices, stable for the ranking order
fn merge_ranked(a: &[SimilarityMatch], b: &[SimilarityMatch]) -> Vec<SimilarityMatch> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].ranking(&b[j]) != std::cmp::Ordering::Greater {
            merged.push(a[i].clone());
            i += 1;
        } else {
            merged.push(b[j].clone());
            j += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
} // end of merge_ranked

//=========================================================================

// end of mod tests
