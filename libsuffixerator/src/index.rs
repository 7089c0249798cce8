use crate::{
    encseq::EncodedSequence,
    error::SfxError,
    metadata::IndexMetadata,
    options::IndexKind,
    tables::{
        read_bwt_table, read_lcp_table, read_suffix_table, BucketTable, BCKTAB_SUFFIX,
        BWTTAB_SUFFIX, SUFTAB_SUFFIX,
    },
    types::{FromUsize, Int},
    util::index_file,
    verify::{order_violations, OrderViolation},
};
use anyhow::{bail, Result};
use log::info;
use std::{mem, path::Path, time::Instant};

// --------------------------------------------------
/// An enhanced suffix array loaded back from disk. Tables that were not
/// written are `None`.
#[derive(Debug)]
pub struct EsaIndex<T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    pub metadata: IndexMetadata,
    pub suftab: Option<Vec<T>>,
    pub lcptab: Option<Vec<usize>>,
    pub bwttab: Option<Vec<u8>>,
    pub bcktab: Option<BucketTable>,
}

impl<T> EsaIndex<T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    pub fn read(index_name: &Path) -> Result<Self> {
        let metadata = IndexMetadata::read(index_name)?;
        if metadata.kind != IndexKind::Esa {
            bail!(SfxError::Configuration(format!(
                "\"{}\" is not an enhanced suffix array",
                index_name.display()
            )));
        }
        if metadata.suffix_width != mem::size_of::<T>() {
            bail!(SfxError::Configuration(format!(
                "\"{}\" stores {}-byte suffixes, expected {}",
                index_name.display(),
                metadata.suffix_width,
                mem::size_of::<T>()
            )));
        }

        let tables = metadata.tables;
        let suftab = tables
            .suftab
            .then(|| read_suffix_table(&index_file(index_name, SUFTAB_SUFFIX)))
            .transpose()?;
        let lcptab = tables
            .lcptab
            .then(|| read_lcp_table(index_name))
            .transpose()?;
        let bwttab = tables
            .bwttab
            .then(|| read_bwt_table(&index_file(index_name, BWTTAB_SUFFIX)))
            .transpose()?;
        let bcktab = tables
            .bcktab
            .then(|| BucketTable::read(&index_file(index_name, BCKTAB_SUFFIX)))
            .transpose()?;

        for (name, len) in [
            ("suffix", suftab.as_ref().map(|t| t.len())),
            ("LCP", lcptab.as_ref().map(|t| t.len())),
            ("BWT", bwttab.as_ref().map(|t| t.len())),
        ] {
            if let Some(len) = len.filter(|&len| len != metadata.num_suffixes) {
                bail!(SfxError::InternalConsistency(format!(
                    "{name} table of \"{}\" holds {len} entries, expected {}",
                    index_name.display(),
                    metadata.num_suffixes
                )));
            }
        }

        Ok(EsaIndex {
            metadata,
            suftab,
            lcptab,
            bwttab,
            bcktab,
        })
    }

    /// Position of the suffix at `rank`
    pub fn suffix(&self, rank: usize) -> Option<usize> {
        self.suftab
            .as_ref()
            .and_then(|suftab| suftab.get(rank))
            .map(|s| s.to_usize())
    }
}

// --------------------------------------------------
/// Reload the suffix table of an index and report every adjacent pair
/// that is out of order over `encseq`
pub fn check_suffix_table<S>(index_name: &Path, encseq: &S) -> Result<Vec<OrderViolation>>
where
    S: EncodedSequence + ?Sized,
{
    let metadata = IndexMetadata::read(index_name)?;
    if !metadata.tables.suftab {
        bail!(SfxError::Configuration(format!(
            "\"{}\" has no suffix table",
            index_name.display()
        )));
    }
    if metadata.total_length != encseq.total_length() {
        bail!(SfxError::Configuration(format!(
            "\"{}\" indexes {} symbols, the sequence has {}",
            index_name.display(),
            metadata.total_length,
            encseq.total_length()
        )));
    }

    match metadata.suffix_width {
        4 => check::<u32, S>(index_name, encseq),
        8 => check::<u64, S>(index_name, encseq),
        width => bail!(SfxError::Configuration(format!(
            "unsupported suffix width {width}"
        ))),
    }
}

fn check<T, S>(index_name: &Path, encseq: &S) -> Result<Vec<OrderViolation>>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    S: EncodedSequence + ?Sized,
{
    let now = Instant::now();
    let index: EsaIndex<T> = EsaIndex::read(index_name)?;
    let suftab = index.suftab.unwrap_or_default();
    let violations = order_violations(
        encseq,
        index.metadata.readmode,
        &suftab,
        index.metadata.max_depth.unwrap_or(0),
    );
    info!(
        "Checked {} suffixes in {:?}, found {} problem{}",
        suftab.len(),
        now.elapsed(),
        violations.len(),
        if violations.len() == 1 { "" } else { "s" }
    );
    Ok(violations)
}

// --------------------------------------------------
#[cfg(test)]
mod test {
    use super::{check_suffix_table, EsaIndex};
    use crate::{
        encseq::{Alphabet, EncSeq},
        error::SfxError,
        options::{IndexKind, IndexOptions, SideTables},
        suffixerator::run_suffixerator,
        tables::SUFTAB_SUFFIX,
        util::{index_file, vec_to_slice_u8},
        verify::OrderViolation,
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        //                                           0123456789
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTNNACGT"]);
        let mut options = IndexOptions::new(&index_name);
        options.tables = SideTables {
            suftab: true,
            lcptab: true,
            ..Default::default()
        };
        run_suffixerator(&options, &encseq)?;

        let index: EsaIndex<u32> = EsaIndex::read(&index_name)?;
        assert_eq!(index.suffix(1), Some(6));
        assert_eq!(index.suffix(11), None);
        assert_eq!(index.lcptab.as_deref(), Some(&[0, 4, 0, 3, 0, 2, 0, 1, 0, 0, 0][..]));
        assert!(index.bwttab.is_none());
        assert!(index.bcktab.is_none());

        // Wrong width
        let res = EsaIndex::<u64>::read(&index_name);
        assert!(matches!(
            res.unwrap_err().downcast_ref::<SfxError>(),
            Some(SfxError::Configuration(_))
        ));
        Ok(())
    }

    #[test]
    fn test_read_packed_as_esa() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTACGT"]);
        let mut options = IndexOptions::new(&index_name);
        options.kind = IndexKind::Packed;
        run_suffixerator(&options, &encseq)?;
        assert!(EsaIndex::<u32>::read(&index_name).is_err());
        Ok(())
    }

    #[test]
    fn test_check_suffix_table() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        //                                           012345
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["TTTAGC"]);
        let mut options = IndexOptions::new(&index_name);
        options.tables.suftab = true;
        run_suffixerator(&options, &encseq)?;
        assert!(check_suffix_table(&index_name, &encseq)?.is_empty());

        // Swap the first two suffixes
        let corrupt: Vec<u32> = vec![5, 3, 4, 2, 1, 0, 6];
        fs::write(index_file(&index_name, SUFTAB_SUFFIX), vec_to_slice_u8(&corrupt))?;
        let violations = check_suffix_table(&index_name, &encseq)?;
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            OrderViolation::Unordered {
                rank: 1,
                pos1: 5,
                pos2: 3,
                ..
            }
        ));

        // A different sequence
        let other = EncSeq::from_sequences(Alphabet::Dna, &["ACGT"]);
        assert!(check_suffix_table(&index_name, &other).is_err());
        Ok(())
    }
}
