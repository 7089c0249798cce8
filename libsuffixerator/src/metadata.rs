use crate::{
    error::{IoContext, SfxError},
    options::{IndexKind, SideTables},
    types::{LcpStats, Readmode, OUTFILE_VERSION},
    util::index_file,
};
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

// --------------------------------------------------
pub const PROJECT_SUFFIX: &str = "prj";

// --------------------------------------------------
/// Everything needed to interpret the files of an index. Written once,
/// after every other output is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub version: u8,
    pub kind: IndexKind,
    pub readmode: Readmode,
    pub total_length: usize,
    pub num_of_sequences: usize,
    pub num_of_chars: usize,
    pub sequence_names: Vec<String>,

    /// Bytes per stored suffix position
    pub suffix_width: usize,
    pub num_suffixes: usize,
    pub prefix_length: usize,
    pub max_depth: Option<usize>,

    /// Rank of the suffix starting at position 0
    pub longest: Option<usize>,
    pub lcp: Option<LcpStats>,
    pub tables: SideTables,
}

impl IndexMetadata {
    pub fn path(index_name: &Path) -> PathBuf {
        index_file(index_name, PROJECT_SUFFIX)
    }

    // --------------------------------------------------
    /// Write atomically: a reader sees either no metadata or all of it
    pub fn write(&self, index_name: &Path) -> Result<PathBuf> {
        let path = Self::path(index_name);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(dir).with_path(dir.display())?;
        {
            let mut out = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut out, self)?;
            out.write_all(b"\n")
                .and_then(|_| out.flush())
                .with_path(tmp.path().display())?;
        }
        tmp.persist(&path)
            .map_err(|e| anyhow!(SfxError::io(path.display(), e.error)))?;
        Ok(path)
    }

    // --------------------------------------------------
    pub fn read(index_name: &Path) -> Result<Self> {
        let path = Self::path(index_name);
        let contents = fs::read_to_string(&path).with_path(path.display())?;
        let meta: IndexMetadata = serde_json::from_str(&contents).map_err(|e| {
            SfxError::io(
                path.display(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        if meta.version != OUTFILE_VERSION {
            bail!(
                "{}: unsupported version {}, expected {OUTFILE_VERSION}",
                path.display(),
                meta.version
            );
        }
        Ok(meta)
    }
}

// --------------------------------------------------
#[cfg(test)]
mod test {
    use super::IndexMetadata;
    use crate::{
        error::SfxError,
        options::{IndexKind, SideTables},
        types::{LcpStats, Readmode, OUTFILE_VERSION},
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn metadata() -> IndexMetadata {
        IndexMetadata {
            version: OUTFILE_VERSION,
            kind: IndexKind::Esa,
            readmode: Readmode::ReverseComplement,
            total_length: 17,
            num_of_sequences: 2,
            num_of_chars: 4,
            sequence_names: vec!["ABC".to_string(), "DEF".to_string()],
            suffix_width: 4,
            num_suffixes: 18,
            prefix_length: 2,
            max_depth: Some(5),
            longest: Some(3),
            lcp: Some(LcpStats {
                num_values: 18,
                num_large_values: 0,
                max_branch_depth: 8,
            }),
            tables: SideTables {
                suftab: true,
                lcptab: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let index = dir.path().join("idx");
        let meta = metadata();
        let path = meta.write(&index)?;
        assert_eq!(path, dir.path().join("idx.prj"));

        let loaded = IndexMetadata::read(&index)?;
        assert_eq!(loaded.prefix_length, 2);
        assert_eq!(loaded.readmode, Readmode::ReverseComplement);
        assert_eq!(loaded.longest, Some(3));
        assert_eq!(loaded, meta);

        // No temporary files left behind
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_read_missing() {
        let dir = TempDir::new().expect("tempdir");
        let res = IndexMetadata::read(&dir.path().join("nothing"));
        assert!(res.is_err());
        assert!(matches!(
            res.unwrap_err().downcast_ref::<SfxError>(),
            Some(SfxError::Io { .. })
        ));
    }

    #[test]
    fn test_bad_version() -> Result<()> {
        let dir = TempDir::new()?;
        let index = dir.path().join("idx");
        let meta = IndexMetadata {
            version: OUTFILE_VERSION + 1,
            ..metadata()
        };
        meta.write(&index)?;
        let res = IndexMetadata::read(&index);
        assert!(res.is_err());
        assert!(res.unwrap_err().to_string().contains("unsupported version"));
        Ok(())
    }
}
