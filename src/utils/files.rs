//! This file contains fasta file loading into a sequence store
//!

use std::path::Path;

use anyhow::{anyhow, Context};

use crate::store::{Sequence, SequenceStore};

/// a structure to filter sequences we treat
pub struct FilterParams {
    /// minimum sequence size
    pub min_seq_size: usize,
} // end of struct FilterParams

impl FilterParams {
    pub fn new(min_seq_size: usize) -> Self {
        FilterParams { min_seq_size }
    } // end of new

    /// returns true if we filter (garbage the sequence)
    pub fn filter(&self, seq: &[u8]) -> bool {
        seq.len() < self.min_seq_size
    }
} // end of FilterParams

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams { min_seq_size: 0 }
    }
}

/// opens and parses a fasta file with needletail, building the sequence
/// store. Record ids become sequence names, bases are kept as read.
/// Records shorter than the filter threshold are dropped.
pub fn load_fasta_file(path: &Path, filter_params: &FilterParams) -> anyhow::Result<SequenceStore> {
    //
    log::info!("loading fasta file {:?}", path);
    let mut store = SequenceStore::new();
    let mut nb_filtered = 0;
    //
    let mut reader = needletail::parse_fastx_file(path)
        .with_context(|| format!("could not open fasta file {:?}", path))?;
    while let Some(record) = reader.next() {
        let seqrec = record.with_context(|| format!("bad record in file {:?}", path))?;
        let name = String::from_utf8(seqrec.id().to_vec())
            .map_err(|_| anyhow!("record id is not utf8 in file {:?}", path))?;
        let bases = seqrec.seq().to_vec();
        if filter_params.filter(&bases) {
            nb_filtered += 1;
            log::trace!("filtered out sequence '{}', len {}", name, bases.len());
            continue;
        }
        store.insert(Sequence::new(name, bases));
    }
    //
    log::info!(
        "loaded {} sequences, filtered out {}",
        store.len(),
        nb_filtered
    );
    if store.is_empty() {
        log::warn!("fasta file {:?} yielded an empty store", path);
    }
    //
    Ok(store)
} // end of load_fasta_file

//=========================================================================

#[cfg(test)]
mod tests {

    use super::*;
    use std::io::Write;

    fn write_fasta(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".fasta")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_records_with_wrapped_lines() {
        let file = write_fasta(">Hap_1\nACGT\nACGT\n>Hap_2\nTTTT\n");
        let store = load_fasta_file(file.path(), &FilterParams::default()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("Hap_1").unwrap().get_bases(), b"ACGTACGT");
        assert_eq!(store.get("Hap_2").unwrap().get_bases(), b"TTTT");
    }

    #[test]
    fn min_size_filter_drops_short_records() {
        let file = write_fasta(">long\nACGTACGT\n>short\nAC\n");
        let store = load_fasta_file(file.path(), &FilterParams::new(4)).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("long"));
        assert!(!store.contains("short"));
    }
} // end of mod tests
