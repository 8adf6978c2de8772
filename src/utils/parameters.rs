//! structures related to comparison parameters and requests
//!

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::to_writer;

use crate::error::CompareError;

/// An inclusive similarity range [min, max] used to filter scores.
/// min <= max is checked before a job starts.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    min: f32,
    max: f32,
}

impl ScoreRange {
    pub fn new(min: f32, max: f32) -> Self {
        ScoreRange { min, max }
    }

    /// the whole score scale, filters nothing out
    pub fn full() -> Self {
        ScoreRange { min: 0., max: 100. }
    }

    pub fn get_min(&self) -> f32 {
        self.min
    }

    pub fn get_max(&self) -> f32 {
        self.max
    }

    /// rejects a range with min > max
    pub fn validate(&self) -> Result<(), CompareError> {
        if self.min > self.max {
            return Err(CompareError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// inclusive at both ends
    pub fn contains(&self, score: f32) -> bool {
        score >= self.min && score <= self.max
    }
} // end of impl ScoreRange

impl Default for ScoreRange {
    fn default() -> Self {
        ScoreRange::full()
    }
}

//======================================================================================

/// Gathers parameters driving a comparison run : chunking granularity and
/// event channel sizing. Json serialized so a run can be reproduced with the
/// same parameters.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct JobParams {
    /// number of candidates scored per chunk
    chunk_size: usize,
    /// capacity of the bounded event channel between worker and consumer
    channel_capacity: usize,
}

impl JobParams {
    pub fn new(chunk_size: usize, channel_capacity: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be at least 1");
        JobParams {
            chunk_size,
            channel_capacity,
        }
    }

    /// chunk size used to partition the candidate set
    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// event channel capacity
    pub fn get_channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn dump_json(&self, dirpath: &Path) -> Result<(), String> {
        //
        let filepath = dirpath.join("jobparams.json");
        //
        log::info!("dumping JobParams in json file : {:?}", filepath);
        //
        let fileres = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&filepath);
        if fileres.is_err() {
            log::error!(
                "JobParams dump : dump could not open file {:?}",
                filepath.as_os_str()
            );
            return Err("JobParams dump failed".to_string());
        }
        //
        let mut writer = BufWriter::new(fileres.unwrap());
        to_writer(&mut writer, &self).map_err(|e| e.to_string())?;
        //
        Ok(())
    } // end of dump_json

    /// reload from a json dump, to rerun a comparison with the same chunking
    pub fn reload_json(dirpath: &Path) -> Result<Self, String> {
        //
        let filepath = dirpath.join("jobparams.json");
        let fileres = OpenOptions::new().read(true).open(&filepath);
        if fileres.is_err() {
            log::error!(
                "JobParams reload_json : reload could not open file {:?}",
                filepath.as_os_str()
            );
            return Err("JobParams reload_json could not open file".to_string());
        }
        //
        let reader = BufReader::new(fileres.unwrap());
        let params: Self = serde_json::from_reader(reader).map_err(|e| e.to_string())?;
        //
        log::info!(
            "JobParams reload, chunk_size : {}, channel_capacity : {}",
            params.chunk_size,
            params.channel_capacity
        );
        //
        Ok(params)
    } // end of reload_json
} // end of impl JobParams

impl Default for JobParams {
    fn default() -> Self {
        // chunk of 100 keeps cancellation latency around one chunk of scoring
        JobParams {
            chunk_size: 100,
            channel_capacity: 64,
        }
    }
}

//======================================================================================

/// A comparison request as carried by the session transport : the target to
/// compare against and the score range to keep. The candidate set is the
/// session store snapshot at start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub target_name: String,
    #[serde(default)]
    pub range: ScoreRange,
}

impl ComparisonRequest {
    pub fn new(target_name: String, range: ScoreRange) -> Self {
        ComparisonRequest { target_name, range }
    }
} // end of impl ComparisonRequest

//=========================================================================

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn range_validation() {
        assert!(ScoreRange::new(0., 100.).validate().is_ok());
        assert!(ScoreRange::new(80., 80.).validate().is_ok());
        let res = ScoreRange::new(90., 80.).validate();
        assert!(matches!(
            res,
            Err(CompareError::InvalidRange { min: _, max: _ })
        ));
    }

    #[test]
    fn range_is_inclusive() {
        let range = ScoreRange::new(80., 100.);
        assert!(range.contains(80.));
        assert!(range.contains(100.));
        assert!(!range.contains(79.99));
    }

    #[test]
    fn params_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let params = JobParams::new(250, 16);
        params.dump_json(dir.path()).unwrap();
        let reloaded = JobParams::reload_json(dir.path()).unwrap();
        assert_eq!(reloaded.get_chunk_size(), 250);
        assert_eq!(reloaded.get_channel_capacity(), 16);
    }
} // end of mod tests
