use crate::{
    encseq::EncodedSequence,
    error::{IoContext, SfxError},
    metadata::IndexMetadata,
    options::{IndexKind, IndexOptions, MaxDepth, PrefixLength, SideTables},
    packed_index::{PackedIndex, PackedIndexBuilder},
    progress::SfxProgress,
    suffix_iterator::{SuffixIterator, SuffixIteratorArgs},
    tables::{
        BwtWriter, LcpTableWriter, SuffixTableWriter, BCKTAB_SUFFIX, BWTTAB_SUFFIX,
        LARGE_LCP_SUFFIX, LCPTAB_SUFFIX, SUFTAB_SUFFIX,
    },
    types::{FromUsize, Int, OUTFILE_VERSION},
    util::{check_prefix_length, index_file, recommended_prefix_length},
};
use anyhow::{bail, Context, Result};
use format_num::NumberFormat;
use log::{debug, info, warn};
use std::{
    fs, mem,
    path::{Path, PathBuf},
};

// Suffix table written in bucket order when only the sorted side tables
// were requested
const STREAM_SUFFIX: &str = "suf.tmp";

// --------------------------------------------------
/// Prefix length and maximal sort depth settled for one construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDepths {
    pub prefix_length: usize,
    pub max_depth: Option<usize>,
}

// --------------------------------------------------
// Files created by a construction. Unless committed, they are removed
// when the guard goes out of scope.
#[derive(Debug, Default)]
struct OutputFiles {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl OutputFiles {
    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for OutputFiles {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in self.paths.iter().filter(|p| p.exists()) {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed incomplete \"{}\"", path.display()),
                Err(e) => warn!("Cannot remove \"{}\": {e}", path.display()),
            }
        }
    }
}

// --------------------------------------------------
/// Build the index described by `options` over `encseq`.
///
/// Every requested table is written under `options.index_name`; the
/// metadata file comes last and only after everything else succeeded.
pub fn run_suffixerator<S>(options: &IndexOptions, encseq: &S) -> Result<IndexMetadata>
where
    S: EncodedSequence + ?Sized,
{
    options.validate()?;
    if options.readmode.is_complement() && !encseq.is_dna() {
        bail!(SfxError::Configuration(format!(
            "readmode {} needs a DNA sequence",
            options.readmode
        )));
    }
    if encseq.total_length() == 0 {
        bail!(SfxError::Configuration(
            "cannot index an empty sequence".to_string()
        ));
    }

    // An enhanced suffix array without tables is only described
    let depths = if options.kind == IndexKind::Esa && !options.tables.any() {
        None
    } else {
        Some(derive_depths(options, encseq)?)
    };

    remove_stale_metadata(&options.index_name)?;

    let mut progress = SfxProgress::new(options.show_progress);
    progress.start("preparing construction");
    let res = if encseq.total_length() < u32::MAX as usize {
        build::<u32, S>(options, encseq, depths, &mut progress)
    } else {
        build::<u64, S>(options, encseq, depths, &mut progress)
    };
    progress.stop();
    res
}

// --------------------------------------------------
fn build<T, S>(
    options: &IndexOptions,
    encseq: &S,
    depths: Option<SortDepths>,
    progress: &mut SfxProgress,
) -> Result<IndexMetadata>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    S: EncodedSequence + ?Sized,
{
    match (options.kind, depths) {
        (_, None) => {
            info!("No tables requested, writing the metadata only");
            progress.tick("writing metadata");
            let meta = base_metadata(options, encseq);
            meta.write(&options.index_name).context("writing metadata")?;
            Ok(meta)
        }
        (IndexKind::Esa, Some(depths)) => build_esa::<T, S>(options, encseq, depths, progress),
        (IndexKind::Packed, Some(depths)) => {
            build_packed::<T, S>(options, encseq, depths, progress)
        }
    }
}

// --------------------------------------------------
/// Resolve an automatic prefix length and the maximal sort depth
pub fn derive_depths<S>(options: &IndexOptions, encseq: &S) -> Result<SortDepths>
where
    S: EncodedSequence + ?Sized,
{
    let num_of_chars = encseq.num_of_chars();
    let total_length = encseq.total_length();
    let store_special_codes = options.strategy.store_special_codes;

    let prefix_length = match options.prefix_length {
        PrefixLength::Automatic => {
            let prefix_length =
                recommended_prefix_length(num_of_chars, total_length, store_special_codes);
            info!("Using automatic prefix length {prefix_length}");
            prefix_length
        }
        PrefixLength::Fixed(prefix_length) => {
            check_prefix_length(
                prefix_length,
                num_of_chars,
                total_length,
                store_special_codes,
            )?;
            prefix_length
        }
    };

    let max_depth = match options.strategy.max_depth {
        None => None,
        Some(MaxDepth::Automatic) => Some(prefix_length),
        Some(MaxDepth::Fixed(depth)) if depth < prefix_length => {
            info!("Raising maximal depth {depth} to the prefix length {prefix_length}");
            Some(prefix_length)
        }
        Some(MaxDepth::Fixed(depth)) => Some(depth),
    };

    Ok(SortDepths {
        prefix_length,
        max_depth,
    })
}

// --------------------------------------------------
fn iterator_args(options: &IndexOptions, depths: SortDepths) -> SuffixIteratorArgs {
    SuffixIteratorArgs {
        readmode: options.readmode,
        prefix_length: depths.prefix_length,
        max_depth: depths.max_depth,
        maximum_space: options.maximum_space,
        num_parts: options.num_parts,
        strategy: options.strategy.clone(),
    }
}

// --------------------------------------------------
// Metadata fields that do not depend on how the suffixes were sorted
fn base_metadata<S>(options: &IndexOptions, encseq: &S) -> IndexMetadata
where
    S: EncodedSequence + ?Sized,
{
    IndexMetadata {
        version: OUTFILE_VERSION,
        kind: options.kind,
        readmode: options.readmode,
        total_length: encseq.total_length(),
        num_of_sequences: encseq.num_of_sequences(),
        num_of_chars: encseq.num_of_chars(),
        sequence_names: (0..encseq.num_of_sequences())
            .map(|seqnum| encseq.sequence_name(seqnum))
            .collect(),
        suffix_width: 0,
        num_suffixes: encseq.total_length() + 1,
        prefix_length: 0,
        max_depth: None,
        longest: None,
        lcp: None,
        tables: SideTables::default(),
    }
}

// --------------------------------------------------
// A metadata file left by an earlier run must not vouch for the files
// this run is about to replace
fn remove_stale_metadata(index_name: &Path) -> Result<()> {
    let path = IndexMetadata::path(index_name);
    if path.exists() {
        fs::remove_file(&path).with_path(path.display())?;
        debug!("Removed previous \"{}\"", path.display());
    }
    Ok(())
}

// --------------------------------------------------
fn build_esa<T, S>(
    options: &IndexOptions,
    encseq: &S,
    depths: SortDepths,
    progress: &mut SfxProgress,
) -> Result<IndexMetadata>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    S: EncodedSequence + ?Sized,
{
    let index_name = options.index_name.as_path();
    let tables = options.tables;
    let base = base_metadata(options, encseq);
    let stream = options.strategy.stream_suftab;
    let mut outputs = OutputFiles::default();

    let suftab_path = (tables.suftab || stream).then(|| {
        outputs.track(index_file(
            index_name,
            if tables.suftab {
                SUFTAB_SUFFIX
            } else {
                STREAM_SUFFIX
            },
        ))
    });
    let mut suftab_writer = suftab_path
        .as_deref()
        .map(SuffixTableWriter::<T>::create)
        .transpose()?;

    let lcp_writer = if tables.lcptab {
        outputs.track(index_file(index_name, LCPTAB_SUFFIX));
        outputs.track(index_file(index_name, LARGE_LCP_SUFFIX));
        Some(LcpTableWriter::create(index_name)?)
    } else {
        None
    };

    let mut bwt_writer = if tables.bwttab {
        let path = outputs.track(index_file(index_name, BWTTAB_SUFFIX));
        Some(BwtWriter::create(&path)?)
    } else {
        None
    };

    progress.tick("counting buckets");
    let mut sfi: SuffixIterator<T, S> =
        SuffixIterator::new(encseq, iterator_args(options, depths), lcp_writer)
            .context("counting buckets")?;

    progress.tick(if stream {
        "distributing suffixes"
    } else {
        "sorting suffixes"
    });
    progress.start_bar(sfi.parts().len() as u64, "parts")?;
    while let Some(part) = sfi.next_part().context("sorting suffixes")? {
        if let Some(writer) = suftab_writer.as_mut() {
            writer
                .write_part(part.suffixes)
                .context("writing suffix table")?;
        }
        if !stream {
            if let Some(writer) = bwt_writer.as_mut() {
                writer
                    .write_part(encseq, options.readmode, part.suffixes)
                    .context("writing BWT table")?;
            }
        }
        progress.inc_bar(1);
    }
    progress.finish_bar();

    if let Some(writer) = suftab_writer {
        writer.finish().context("writing suffix table")?;
    }

    if let (true, Some(path)) = (stream, &suftab_path) {
        progress.tick("sorting streamed suffix table");
        sfi.post_sort_from_stream(path, bwt_writer.as_mut())
            .context("sorting streamed suffix table")?;
        if !tables.suftab {
            fs::remove_file(path).with_path(path.display())?;
        }
    }

    let num_suffixes = encseq.total_length() + 1;
    if let Some(writer) = bwt_writer {
        let num_written = writer.finish().context("writing BWT table")?;
        if num_written != num_suffixes {
            bail!(SfxError::InternalConsistency(format!(
                "BWT table holds {num_written} symbols, expected {num_suffixes}"
            )));
        }
    }

    if tables.bcktab {
        progress.tick("writing bucket table");
        let path = outputs.track(index_file(index_name, BCKTAB_SUFFIX));
        sfi.bucket_table()
            .write(&path)
            .context("writing bucket table")?;
    }

    let Some(longest) = sfi.longest() else {
        bail!(SfxError::InternalConsistency(
            "construction ended without placing the suffix at position 0".to_string()
        ));
    };
    let num_fmt = NumberFormat::new();
    info!(
        "Sorted {} suffixes, the longest at rank {}",
        num_fmt.format(",.0", num_suffixes as f64),
        num_fmt.format(",.0", longest as f64),
    );
    debug!("{:?}", sfi.sort_stats());

    let meta = IndexMetadata {
        suffix_width: mem::size_of::<T>(),
        prefix_length: depths.prefix_length,
        max_depth: depths.max_depth,
        longest: Some(longest),
        lcp: sfi.lcp_stats(),
        tables,
        ..base
    };

    progress.tick("writing metadata");
    let path = meta.write(index_name).context("writing metadata")?;
    outputs.commit();
    info!("Wrote index metadata to \"{}\"", path.display());
    Ok(meta)
}

// --------------------------------------------------
fn build_packed<T, S>(
    options: &IndexOptions,
    encseq: &S,
    depths: SortDepths,
    progress: &mut SfxProgress,
) -> Result<IndexMetadata>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    S: EncodedSequence + ?Sized,
{
    let index_name = options.index_name.as_path();
    let mut builder = PackedIndexBuilder::new(encseq, options.readmode, options.packed)?;
    let mut outputs = OutputFiles::default();

    progress.tick("counting buckets");
    let mut sfi: SuffixIterator<T, S> =
        SuffixIterator::new(encseq, iterator_args(options, depths), None)
            .context("counting buckets")?;

    progress.tick("sorting suffixes into the packed index");
    progress.start_bar(sfi.parts().len() as u64, "parts")?;
    while let Some(part) = sfi.next_part().context("sorting suffixes")? {
        builder
            .add_part(part.suffixes, part.first_rank)
            .context("building packed index")?;
        progress.inc_bar(1);
    }
    progress.finish_bar();
    let index = builder.finish().context("building packed index")?;

    progress.tick("writing packed index");
    outputs.track(PackedIndex::path(index_name));
    index.write(index_name).context("writing packed index")?;

    if options.tables.bcktab {
        let path = outputs.track(index_file(index_name, BCKTAB_SUFFIX));
        sfi.bucket_table()
            .write(&path)
            .context("writing bucket table")?;
    }

    let meta = IndexMetadata {
        suffix_width: mem::size_of::<T>(),
        prefix_length: depths.prefix_length,
        longest: Some(index.longest),
        tables: SideTables {
            bcktab: options.tables.bcktab,
            ..Default::default()
        },
        ..base_metadata(options, encseq)
    };

    progress.tick("writing metadata");
    meta.write(index_name).context("writing metadata")?;
    outputs.commit();
    Ok(meta)
}

// --------------------------------------------------
#[cfg(test)]
mod test {
    use super::{derive_depths, run_suffixerator, SortDepths};
    use crate::{
        encseq::{Alphabet, EncSeq},
        error::SfxError,
        metadata::IndexMetadata,
        options::{IndexKind, IndexOptions, MaxDepth, PrefixLength, SideTables},
        packed_index::PackedIndex,
        tables::{read_bwt_table, read_lcp_table, read_suffix_table, BucketTable},
        types::{LcpStats, Readmode, UNDEF_BWT_CHAR, WILDCARD},
        util::index_file,
        verify::find_order_violation,
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::{fs, path::Path};
    use tempfile::TempDir;

    const ALL_TABLES: SideTables = SideTables {
        suftab: true,
        lcptab: true,
        bwttab: true,
        bcktab: true,
    };

    fn error_kind(err: &anyhow::Error) -> Option<&SfxError> {
        err.downcast_ref::<SfxError>()
    }

    fn file_names(dir: &Path) -> Result<Vec<String>> {
        let mut names = vec![];
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    #[test]
    fn test_esa_all_tables() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        //                                           0123456789
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTNNACGT"]);
        let mut options = IndexOptions::new(&index_name);
        options.tables = ALL_TABLES;
        options.prefix_length = PrefixLength::Fixed(2);

        let meta = run_suffixerator(&options, &encseq)?;
        assert_eq!(meta.kind, IndexKind::Esa);
        assert_eq!(meta.suffix_width, 4);
        assert_eq!(meta.num_suffixes, 11);
        assert_eq!(meta.prefix_length, 2);
        assert_eq!(meta.longest, Some(0));
        assert_eq!(
            meta.lcp,
            Some(LcpStats {
                num_values: 11,
                num_large_values: 0,
                max_branch_depth: 4,
            })
        );
        assert_eq!(IndexMetadata::read(&index_name)?, meta);

        assert_eq!(
            file_names(dir.path())?,
            ["idx.bck", "idx.bwt", "idx.lcp", "idx.llv", "idx.prj", "idx.suf"]
        );

        let suftab: Vec<u32> = read_suffix_table(&index_file(&index_name, "suf"))?;
        assert_eq!(suftab, [0, 6, 1, 7, 2, 8, 3, 9, 4, 5, 10]);
        assert_eq!(read_lcp_table(&index_name)?, [0, 4, 0, 3, 0, 2, 0, 1, 0, 0, 0]);
        assert_eq!(
            read_bwt_table(&index_file(&index_name, "bwt"))?,
            [UNDEF_BWT_CHAR, WILDCARD, 0, 0, 1, 1, 2, 2, 3, WILDCARD, 3]
        );

        let bck = BucketTable::read(&index_file(&index_name, "bck"))?;
        assert_eq!(bck.prefix_length, 2);
        assert_eq!(bck.left_borders().last(), Some(&11));
        Ok(())
    }

    #[test]
    fn test_stream_matches_in_memory() -> Result<()> {
        let dir = TempDir::new()?;
        let encseq = EncSeq::from_sequences(
            Alphabet::Dna,
            &["GATTACAGATTACANNTTAGGCA", "ACGTACGTAC", "TTTTTTTTGA"],
        );

        let in_memory = dir.path().join("mem");
        let mut options = IndexOptions::new(&in_memory);
        options.tables = ALL_TABLES;
        let expected = run_suffixerator(&options, &encseq)?;

        let streamed = dir.path().join("stream");
        options.index_name = streamed.clone();
        options.num_parts = Some(3);
        options.strategy.stream_suftab = true;
        let meta = run_suffixerator(&options, &encseq)?;
        assert_eq!(meta.longest, expected.longest);
        assert_eq!(meta.lcp, expected.lcp);

        let suftab: Vec<u32> = read_suffix_table(&index_file(&streamed, "suf"))?;
        let wanted: Vec<u32> = read_suffix_table(&index_file(&in_memory, "suf"))?;
        assert_eq!(suftab, wanted);
        assert_eq!(read_lcp_table(&streamed)?, read_lcp_table(&in_memory)?);
        assert_eq!(
            read_bwt_table(&index_file(&streamed, "bwt"))?,
            read_bwt_table(&index_file(&in_memory, "bwt"))?
        );

        // Without a requested suffix table the streamed copy is dropped
        let lcp_only = dir.path().join("lcp");
        options.index_name = lcp_only.clone();
        options.tables = SideTables {
            lcptab: true,
            ..Default::default()
        };
        run_suffixerator(&options, &encseq)?;
        assert!(!index_file(&lcp_only, "suf").exists());
        assert!(!index_file(&lcp_only, "suf.tmp").exists());
        assert_eq!(read_lcp_table(&lcp_only)?, read_lcp_table(&in_memory)?);
        Ok(())
    }

    #[test]
    fn test_readmodes_and_parts() -> Result<()> {
        let dir = TempDir::new()?;
        let encseq = EncSeq::from_sequences(
            Alphabet::Dna,
            &["ACGTNNACGTTAGCATTAGGACCA", "GATTACA", "CCCCGGGGN"],
        );

        for readmode in [
            Readmode::Forward,
            Readmode::Reverse,
            Readmode::Complement,
            Readmode::ReverseComplement,
        ] {
            let single = dir.path().join(format!("single-{readmode}"));
            let mut options = IndexOptions::new(&single);
            options.readmode = readmode;
            options.tables.suftab = true;
            run_suffixerator(&options, &encseq)?;
            let expected: Vec<u32> = read_suffix_table(&index_file(&single, "suf"))?;
            assert_eq!(expected.len(), 43);
            assert_eq!(
                find_order_violation(&encseq, readmode, &expected, 0, false, false),
                None
            );

            let parts = dir.path().join(format!("parts-{readmode}"));
            options.index_name = parts.clone();
            options.num_parts = Some(4);
            run_suffixerator(&options, &encseq)?;
            let suftab: Vec<u32> = read_suffix_table(&index_file(&parts, "suf"))?;
            assert_eq!(suftab, expected);
        }
        Ok(())
    }

    #[test]
    fn test_no_tables() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGT", "TTGA"]);
        let meta = run_suffixerator(&IndexOptions::new(&index_name), &encseq)?;
        assert_eq!(meta.prefix_length, 0);
        assert_eq!(meta.longest, None);
        assert_eq!(meta.sequence_names, ["1", "2"]);
        assert_eq!(file_names(dir.path())?, ["idx.prj"]);
        Ok(())
    }

    #[test]
    fn test_packed() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        //                                           0123456789
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTNNACGT"]);
        let mut options = IndexOptions::new(&index_name);
        options.kind = IndexKind::Packed;
        options.tables.bcktab = true;
        options.num_parts = Some(2);

        let meta = run_suffixerator(&options, &encseq)?;
        assert_eq!(meta.kind, IndexKind::Packed);
        assert_eq!(meta.longest, Some(0));
        assert_eq!(meta.lcp, None);
        assert_eq!(file_names(dir.path())?, ["idx.bck", "idx.pbi", "idx.prj"]);

        let index = PackedIndex::read(&index_name)?;
        assert_eq!(index.len(), 11);
        assert_eq!(index.count(&[0, 1, 2, 3]), 0..2);
        assert_eq!(index.locate(0)?, 0);
        assert_eq!(index.locate(1)?, 6);
        assert!(index.count(&[3, 3]).is_empty());
        Ok(())
    }

    #[test]
    fn test_packed_rejects_reverse() -> Result<()> {
        let dir = TempDir::new()?;
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTACGT"]);
        let mut options = IndexOptions::new(dir.path().join("idx"));
        options.kind = IndexKind::Packed;
        options.readmode = Readmode::ReverseComplement;
        let res = run_suffixerator(&options, &encseq);
        assert!(res.is_err());
        assert!(matches!(
            error_kind(&res.unwrap_err()),
            Some(SfxError::Configuration(_))
        ));
        assert!(file_names(dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_resource_limit_cleans_up() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTACGT"]);
        fs::write(index_file(&index_name, "prj"), "{}")?;

        let mut options = IndexOptions::new(&index_name);
        options.tables = ALL_TABLES;
        options.maximum_space = 2;
        let res = run_suffixerator(&options, &encseq);
        assert!(res.is_err());
        let err = res.unwrap_err();
        assert!(matches!(error_kind(&err), Some(SfxError::ResourceLimit(_))));
        assert!(err.to_string().contains("counting buckets"));

        // Neither partial tables nor the stale metadata survive
        assert!(file_names(dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_configuration_errors() -> Result<()> {
        let dir = TempDir::new()?;
        let dna = EncSeq::from_sequences(Alphabet::Dna, &["ACGTACGT"]);
        let mut options = IndexOptions::new(dir.path().join("idx"));
        options.tables.suftab = true;
        options.prefix_length = PrefixLength::Fixed(20);
        let res = run_suffixerator(&options, &dna);
        assert!(matches!(
            error_kind(&res.unwrap_err()),
            Some(SfxError::Configuration(_))
        ));

        let protein = EncSeq::from_sequences(Alphabet::Protein, &["MKVLAAGIVE"]);
        options.prefix_length = PrefixLength::Automatic;
        options.readmode = Readmode::Complement;
        let res = run_suffixerator(&options, &protein);
        assert!(matches!(
            error_kind(&res.unwrap_err()),
            Some(SfxError::Configuration(_))
        ));
        assert!(file_names(dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_bad_prefix_length_keeps_index() -> Result<()> {
        let dir = TempDir::new()?;
        let index_name = dir.path().join("idx");
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTNNACGT"]);
        let mut options = IndexOptions::new(&index_name);
        options.tables = ALL_TABLES;
        options.prefix_length = PrefixLength::Fixed(2);
        let meta = run_suffixerator(&options, &encseq)?;
        let files = file_names(dir.path())?;

        options.prefix_length = PrefixLength::Fixed(20);
        let res = run_suffixerator(&options, &encseq);
        assert!(matches!(
            error_kind(&res.unwrap_err()),
            Some(SfxError::Configuration(_))
        ));
        assert_eq!(file_names(dir.path())?, files);
        assert_eq!(IndexMetadata::read(&index_name)?, meta);

        options.kind = IndexKind::Packed;
        options.tables = SideTables::default();
        assert!(run_suffixerator(&options, &encseq).is_err());
        assert_eq!(file_names(dir.path())?, files);
        Ok(())
    }

    #[test]
    fn test_derive_depths() -> Result<()> {
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGT".repeat(64)]);
        let mut options = IndexOptions::new("unused");
        assert_eq!(
            derive_depths(&options, &encseq)?,
            SortDepths {
                prefix_length: 3,
                max_depth: None
            }
        );

        options.prefix_length = PrefixLength::Fixed(2);
        options.strategy.max_depth = Some(MaxDepth::Automatic);
        assert_eq!(derive_depths(&options, &encseq)?.max_depth, Some(2));

        options.strategy.max_depth = Some(MaxDepth::Fixed(1));
        assert_eq!(derive_depths(&options, &encseq)?.max_depth, Some(2));

        options.strategy.max_depth = Some(MaxDepth::Fixed(7));
        assert_eq!(derive_depths(&options, &encseq)?.max_depth, Some(7));
        Ok(())
    }
}
