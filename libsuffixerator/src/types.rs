use crate::error::SfxError;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display},
    hash::Hash,
    ops::{Add, Div, Sub},
    str::FromStr,
};

// --------------------------------------------------
pub const OUTFILE_VERSION: u8 = 1;

/// Encoded value of a symbol outside the core alphabet (e.g., `N`)
pub const WILDCARD: u8 = 254;

/// Encoded value placed between consecutive sequences
pub const SEPARATOR: u8 = 255;

/// BWT value recorded for the suffix starting at position 0
pub const UNDEF_BWT_CHAR: u8 = 253;

/// LCP values at or above this are stored in the large-value table
pub const LCP_OVERFLOW: u8 = u8::MAX;

// --------------------------------------------------
#[inline(always)]
pub fn is_special(c: u8) -> bool {
    c >= WILDCARD
}

// --------------------------------------------------
/// Direction/orientation used when reading symbols from the sequence
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readmode {
    #[default]
    Forward,
    Reverse,
    Complement,
    ReverseComplement,
}

impl Readmode {
    pub fn is_reverse(&self) -> bool {
        matches!(self, Readmode::Reverse | Readmode::ReverseComplement)
    }

    pub fn is_complement(&self) -> bool {
        matches!(self, Readmode::Complement | Readmode::ReverseComplement)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Readmode::Forward => "fwd",
            Readmode::Reverse => "rev",
            Readmode::Complement => "cpl",
            Readmode::ReverseComplement => "rcl",
        }
    }
}

impl Display for Readmode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for Readmode {
    type Err = SfxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fwd" | "forward" => Ok(Readmode::Forward),
            "rev" | "reverse" => Ok(Readmode::Reverse),
            "cpl" | "compl" | "complement" => Ok(Readmode::Complement),
            "rcl" | "revcompl" | "reverse-complement" => {
                Ok(Readmode::ReverseComplement)
            }
            _ => Err(SfxError::Configuration(format!(
                "unknown readmode \"{s}\" (use fwd, rev, cpl or rcl)"
            ))),
        }
    }
}

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub cmp: Ordering,
    pub lcp: usize,
}

// --------------------------------------------------
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcpStats {
    pub num_values: usize,
    pub num_large_values: usize,
    pub max_branch_depth: usize,
}

// --------------------------------------------------
/// Number of buckets handed to each bucket sorting algorithm
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    pub insertion_sorts: usize,
    pub merge_sorts: usize,
    pub counting_sorts: usize,
    pub quick_sorts: usize,
    pub position_sorts: usize,
}

impl SortStats {
    pub fn merge(self, other: SortStats) -> SortStats {
        SortStats {
            insertion_sorts: self.insertion_sorts + other.insertion_sorts,
            merge_sorts: self.merge_sorts + other.merge_sorts,
            counting_sorts: self.counting_sorts + other.counting_sorts,
            quick_sorts: self.quick_sorts + other.quick_sorts,
            position_sorts: self.position_sorts + other.position_sorts,
        }
    }
}

// --------------------------------------------------
pub trait Int:
    Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Div<Output = Self>
    + Copy
    + Default
    + Display
    + Ord
    + Hash
    + serde::ser::Serialize
{
    fn to_usize(&self) -> usize;
}

impl Int for u32 {
    fn to_usize(&self) -> usize {
        *self as usize
    }
}

impl Int for u64 {
    fn to_usize(&self) -> usize {
        *self as usize
    }
}

pub trait FromUsize<T> {
    fn from_usize(val: usize) -> T;
}

impl FromUsize<u32> for u32 {
    fn from_usize(val: usize) -> u32 {
        val as u32
    }
}

impl FromUsize<u64> for u64 {
    fn from_usize(val: usize) -> u64 {
        val as u64
    }
}

// --------------------------------------------------
#[cfg(test)]
mod test {
    use super::{is_special, Readmode, SortStats, SEPARATOR, UNDEF_BWT_CHAR, WILDCARD};
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_readmode_from_str() -> Result<()> {
        assert_eq!("fwd".parse::<Readmode>()?, Readmode::Forward);
        assert_eq!("REV".parse::<Readmode>()?, Readmode::Reverse);
        assert_eq!("cpl".parse::<Readmode>()?, Readmode::Complement);
        assert_eq!("rcl".parse::<Readmode>()?, Readmode::ReverseComplement);

        let res = "sideways".parse::<Readmode>();
        assert!(res.is_err());
        assert_eq!(
            res.unwrap_err().to_string(),
            "configuration error: unknown readmode \"sideways\" (use fwd, rev, cpl or rcl)"
        );
        Ok(())
    }

    #[test]
    fn test_readmode_flags() {
        assert!(!Readmode::Forward.is_reverse());
        assert!(Readmode::ReverseComplement.is_reverse());
        assert!(Readmode::ReverseComplement.is_complement());
        assert!(!Readmode::Reverse.is_complement());
        assert_eq!(Readmode::Complement.to_string(), "cpl");
    }

    #[test]
    fn test_is_special() {
        assert!(is_special(WILDCARD));
        assert!(is_special(SEPARATOR));
        assert!(!is_special(UNDEF_BWT_CHAR));
        assert!(!is_special(3));
    }

    #[test]
    fn test_sort_stats_merge() {
        let a = SortStats {
            insertion_sorts: 1,
            merge_sorts: 2,
            ..Default::default()
        };
        let b = SortStats {
            insertion_sorts: 3,
            quick_sorts: 4,
            ..Default::default()
        };
        let c = a.merge(b);
        assert_eq!(c.insertion_sorts, 4);
        assert_eq!(c.merge_sorts, 2);
        assert_eq!(c.quick_sorts, 4);
        assert_eq!(c.counting_sorts, 0);
    }
}
