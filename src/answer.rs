//! contains answers to comparison requests
//!
//!

use std::cmp::Ordering;
use std::io::Write;

use serde::{Deserialize, Serialize};

/// A scored candidate. Produced once per (target, candidate) pair by the
/// scheduler, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// candidate sequence name
    pub name: String,
    /// positional similarity in [0,100]
    pub score: f32,
}

impl SimilarityMatch {
    pub fn new(name: String, score: f32) -> Self {
        SimilarityMatch { name, score }
    }

    /// ranking order of the result list : score descending, ties broken by
    /// name ascending. Scores are finite so total_cmp gives a total order.
    pub fn ranking(&self, other: &SimilarityMatch) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.name.cmp(&other.name))
    }
} // end of impl SimilarityMatch

/// dumps ranked matches as csv (header name,score).
/// Returns the number of records written.
pub fn dump_csv<W: Write>(matches: &[SimilarityMatch], out: W) -> csv::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    for m in matches {
        writer.serialize(m)?;
    }
    writer.flush()?;
    log::debug!("dumped {} matches in csv", matches.len());
    Ok(matches.len())
} // end of dump_csv

//=========================================================================

// end of mod tests
