use crate::{error::SfxError, types::Readmode};
use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// --------------------------------------------------
pub const MAX_INSERTION_SORT_DEFAULT: usize = 10;
pub const MAX_MERGE_SORT_DEFAULT: usize = 1000;
pub const MAX_COUNTING_SORT_DEFAULT: usize = 4000;

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Enhanced suffix array with optional side tables
    Esa,

    /// Packed BWT index
    Packed,
}

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixLength {
    Automatic,
    Fixed(usize),
}

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxDepth {
    Automatic,
    Fixed(usize),
}

// --------------------------------------------------
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideTables {
    pub suftab: bool,
    pub lcptab: bool,
    pub bwttab: bool,
    pub bcktab: bool,
}

impl SideTables {
    pub fn any(&self) -> bool {
        self.suftab || self.lcptab || self.bwttab || self.bcktab
    }
}

// --------------------------------------------------
/// Bucket widths at which each sorting algorithm takes over, plus
/// switches that change how buckets are sorted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortStrategy {
    pub max_insertion_sort: usize,
    pub max_merge_sort: usize,
    pub max_counting_sort: usize,
    pub max_depth: Option<MaxDepth>,
    pub store_special_codes: bool,
    pub stream_suftab: bool,
    pub check_sorted: bool,
}

impl Default for SortStrategy {
    fn default() -> Self {
        SortStrategy {
            max_insertion_sort: MAX_INSERTION_SORT_DEFAULT,
            max_merge_sort: MAX_MERGE_SORT_DEFAULT,
            max_counting_sort: MAX_COUNTING_SORT_DEFAULT,
            max_depth: None,
            store_special_codes: false,
            stream_suftab: false,
            check_sorted: false,
        }
    }
}

impl SortStrategy {
    /// Set the three algorithm bounds from exactly three positive,
    /// non-decreasing values
    pub fn with_bounds(mut self, bounds: &[usize]) -> Result<Self> {
        let [insertion, merge, counting] = bounds else {
            bail!(SfxError::Configuration(format!(
                "algorithm bounds need exactly 3 values, got {}",
                bounds.len()
            )));
        };
        self.max_insertion_sort = *insertion;
        self.max_merge_sort = *merge;
        self.max_counting_sort = *counting;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_insertion_sort == 0
            || self.max_merge_sort == 0
            || self.max_counting_sort == 0
        {
            bail!(SfxError::Configuration(
                "algorithm bounds must be positive".to_string()
            ));
        }
        if self.max_insertion_sort > self.max_merge_sort {
            bail!(SfxError::Configuration(format!(
                "insertion sort bound {} exceeds merge sort bound {}",
                self.max_insertion_sort, self.max_merge_sort
            )));
        }
        if self.max_merge_sort > self.max_counting_sort {
            bail!(SfxError::Configuration(format!(
                "merge sort bound {} exceeds counting sort bound {}",
                self.max_merge_sort, self.max_counting_sort
            )));
        }
        Ok(())
    }
}

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedIndexParams {
    pub block_size: usize,
    pub bucket_blocks: usize,
    pub locate_interval: usize,
}

impl Default for PackedIndexParams {
    fn default() -> Self {
        PackedIndexParams {
            block_size: 8,
            bucket_blocks: 8,
            locate_interval: 32,
        }
    }
}

// --------------------------------------------------
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Output files are named `<index_name>.<ext>`
    pub index_name: PathBuf,
    pub kind: IndexKind,
    pub readmode: Readmode,
    pub prefix_length: PrefixLength,

    /// Memory ceiling in bytes, 0 for unbounded
    pub maximum_space: usize,
    pub num_parts: Option<usize>,
    pub tables: SideTables,
    pub strategy: SortStrategy,
    pub packed: PackedIndexParams,
    pub show_progress: bool,
}

impl IndexOptions {
    pub fn new(index_name: impl Into<PathBuf>) -> Self {
        IndexOptions {
            index_name: index_name.into(),
            kind: IndexKind::Esa,
            readmode: Readmode::Forward,
            prefix_length: PrefixLength::Automatic,
            maximum_space: 0,
            num_parts: None,
            tables: SideTables::default(),
            strategy: SortStrategy::default(),
            packed: PackedIndexParams::default(),
            show_progress: false,
        }
    }

    /// Reject contradictory options before any file is touched
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;

        if self.num_parts.is_some() && self.maximum_space > 0 {
            bail!(SfxError::Configuration(
                "the number of parts and the memory limit exclude each other"
                    .to_string()
            ));
        }

        if self.num_parts == Some(0) {
            bail!(SfxError::Configuration(
                "the number of parts must be positive".to_string()
            ));
        }

        if self.prefix_length == PrefixLength::Fixed(0) {
            bail!(SfxError::Configuration(
                "the prefix length must be positive".to_string()
            ));
        }

        match self.kind {
            IndexKind::Esa => {
                if !self.tables.any() && self.readmode != Readmode::Forward {
                    bail!(SfxError::Configuration(format!(
                        "readmode {} only makes sense in combination with at \
                        least one of the suffix, LCP, BWT or bucket tables",
                        self.readmode
                    )));
                }
            }
            IndexKind::Packed => {
                if self.readmode.is_reverse() {
                    bail!(SfxError::Configuration(format!(
                        "readmode {} is not supported for a packed index",
                        self.readmode
                    )));
                }
                if self.tables.suftab || self.tables.lcptab || self.tables.bwttab {
                    bail!(SfxError::Configuration(
                        "a packed index only writes the bucket table".to_string()
                    ));
                }
                if self.strategy.max_depth.is_some() {
                    bail!(SfxError::Configuration(
                        "a packed index needs completely sorted suffixes, \
                        drop the maximal depth"
                            .to_string()
                    ));
                }
                if self.strategy.stream_suftab {
                    bail!(SfxError::Configuration(
                        "a packed index cannot stream the suffix table".to_string()
                    ));
                }
                if self.packed.block_size == 0
                    || self.packed.bucket_blocks == 0
                    || self.packed.locate_interval == 0
                {
                    bail!(SfxError::Configuration(
                        "packed index parameters must be positive".to_string()
                    ));
                }
            }
        }

        Ok(())
    }
}

// --------------------------------------------------
/// Parse a memory limit such as "512", "200MB" or "2GB" into bytes
pub fn parse_memlimit(value: &str) -> Result<usize> {
    let memlimit_re = Regex::new(r"^([0-9]+)(MB|GB)?$")?;
    let Some(caps) = memlimit_re.captures(value.trim()) else {
        bail!(SfxError::Configuration(format!(
            "memory limit \"{value}\" must be a positive integer \
            optionally followed by MB or GB"
        )));
    };
    let num: usize = caps[1].parse().map_err(|_| {
        SfxError::Configuration(format!("memory limit \"{value}\" is too large"))
    })?;
    let shift = match caps.get(2).map(|m| m.as_str()) {
        Some("MB") => 20,
        Some("GB") => 30,
        _ => 0,
    };
    num.checked_mul(1 << shift).ok_or_else(|| {
        SfxError::Configuration(format!("memory limit \"{value}\" is too large"))
            .into()
    })
}
