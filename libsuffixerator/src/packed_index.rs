use crate::{
    encseq::EncodedSequence,
    error::{IoContext, SfxError},
    options::PackedIndexParams,
    tables::bwt_symbol,
    types::{is_special, FromUsize, Int, Readmode, UNDEF_BWT_CHAR},
    util::index_file,
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    ops::Range,
    path::{Path, PathBuf},
};

// --------------------------------------------------
pub const PACKED_INDEX_SUFFIX: &str = "pbi";

// Larger alphabets get smaller blocks
const MAX_BLOCK_SIZE_LARGE_ALPHABET: usize = 3;

// --------------------------------------------------
/// Compressed index over the BWT of an encoded sequence: bit-packed
/// regular symbols, rank samples for backward search and sampled suffix
/// positions for locating matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedIndex {
    pub readmode: Readmode,
    pub num_of_chars: usize,
    pub total_length: usize,
    pub params: PackedIndexParams,

    /// Rank of the suffix starting at position 0
    pub longest: usize,
    bits_per_symbol: u32,
    packed: Vec<u64>,

    /// (rank, symbol) of every special or undefined BWT symbol, by rank
    exceptions: Vec<(u64, u8)>,

    /// Number of suffixes starting with a smaller regular symbol
    first_rank_of: Vec<u64>,

    /// Occurrences of each regular symbol before every sample point
    occ_samples: Vec<u64>,
    sample_interval: usize,

    /// (rank, position) pairs, by rank
    locate_samples: Vec<(u64, u64)>,
}

impl PackedIndex {
    pub fn path(index_name: &Path) -> PathBuf {
        index_file(index_name, PACKED_INDEX_SUFFIX)
    }

    /// Number of suffixes, including the terminal one
    pub fn len(&self) -> usize {
        self.total_length + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline(always)]
    fn symbols_per_word(&self) -> usize {
        64 / self.bits_per_symbol as usize
    }

    #[inline(always)]
    fn packed_get(&self, rank: usize) -> u8 {
        let per_word = self.symbols_per_word();
        let shift = (rank % per_word) * self.bits_per_symbol as usize;
        let mask = (1u64 << self.bits_per_symbol) - 1;
        ((self.packed[rank / per_word] >> shift) & mask) as u8
    }

    // --------------------------------------------------
    /// BWT symbol at `rank`
    pub fn symbol_at(&self, rank: usize) -> Option<u8> {
        if rank >= self.len() {
            return None;
        }
        match self
            .exceptions
            .binary_search_by_key(&(rank as u64), |&(r, _)| r)
        {
            Ok(idx) => Some(self.exceptions[idx].1),
            Err(_) => Some(self.packed_get(rank)),
        }
    }

    // --------------------------------------------------
    /// Occurrences of the regular symbol `c` in the BWT before `rank`
    pub fn rank(&self, c: u8, rank: usize) -> usize {
        let c_idx = c as usize;
        if c_idx >= self.num_of_chars {
            return 0;
        }
        let rank = rank.min(self.len());
        let sample = rank / self.sample_interval;
        let start = sample * self.sample_interval;
        let mut occ = self.occ_samples[sample * self.num_of_chars + c_idx] as usize;
        occ += (start..rank).filter(|&i| self.packed_get(i) == c).count();

        // Exceptions are packed as 0
        if c == 0 {
            let exceptions_before = |r: usize| {
                self.exceptions.partition_point(|&(e, _)| (e as usize) < r)
            };
            occ -= exceptions_before(rank) - exceptions_before(start);
        }
        occ
    }

    // --------------------------------------------------
    /// Ranks of the suffixes starting with `pattern`, by backward search
    pub fn count(&self, pattern: &[u8]) -> Range<usize> {
        let (mut lo, mut hi) = (0, self.len());
        for &c in pattern.iter().rev() {
            if is_special(c) || c as usize >= self.num_of_chars {
                return 0..0;
            }
            let first = self.first_rank_of[c as usize] as usize;
            lo = first + self.rank(c, lo);
            hi = first + self.rank(c, hi);
            if lo >= hi {
                return lo..lo;
            }
        }
        lo..hi
    }

    // --------------------------------------------------
    /// Position of the suffix at `rank`, walking the LF-mapping back to
    /// the nearest sample
    pub fn locate(&self, rank: usize) -> Result<usize> {
        if rank >= self.len() {
            bail!("rank {rank} is out of range for {} suffixes", self.len());
        }
        let mut current = rank;
        let mut steps = 0;
        loop {
            if let Ok(idx) = self
                .locate_samples
                .binary_search_by_key(&(current as u64), |&(r, _)| r)
            {
                return Ok(self.locate_samples[idx].1 as usize + steps);
            }
            match self.symbol_at(current) {
                Some(c) if !is_special(c) && c != UNDEF_BWT_CHAR => {
                    current = self.first_rank_of[c as usize] as usize + self.rank(c, current);
                    steps += 1;
                }
                _ => bail!(SfxError::InternalConsistency(format!(
                    "unsampled rank {current} has no regular BWT symbol"
                ))),
            }
            if steps > self.total_length {
                bail!(SfxError::InternalConsistency(format!(
                    "no sample reached from rank {rank}"
                )));
            }
        }
    }

    // --------------------------------------------------
    pub fn write(&self, index_name: &Path) -> Result<PathBuf> {
        let path = Self::path(index_name);
        let mut out = BufWriter::new(File::create(&path).with_path(path.display())?);
        out.write_all(&bincode::serialize(self)?)
            .and_then(|_| out.flush())
            .with_path(path.display())?;
        Ok(path)
    }

    pub fn read(index_name: &Path) -> Result<Self> {
        let path = Self::path(index_name);
        let buffer = fs::read(&path).with_path(path.display())?;
        let index: PackedIndex = bincode::deserialize(&buffer).map_err(|e| {
            SfxError::io(
                path.display(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            )
        })?;
        Ok(index)
    }
}

// --------------------------------------------------
/// Consumes sorted parts in rank order
#[derive(Debug)]
pub struct PackedIndexBuilder<'a, S: EncodedSequence + ?Sized> {
    encseq: &'a S,
    index: PackedIndex,
    occ: Vec<u64>,
    next_rank: usize,
}

impl<'a, S> PackedIndexBuilder<'a, S>
where
    S: EncodedSequence + ?Sized,
{
    pub fn new(encseq: &'a S, readmode: Readmode, params: PackedIndexParams) -> Result<Self> {
        if readmode.is_reverse() {
            bail!(SfxError::Configuration(format!(
                "readmode {readmode} is not supported for a packed index"
            )));
        }
        let num_of_chars = encseq.num_of_chars();
        let mut params = params;
        if num_of_chars > 10 {
            params.block_size = params.block_size.min(MAX_BLOCK_SIZE_LARGE_ALPHABET);
        }
        let sample_interval = params.block_size * params.bucket_blocks;
        if sample_interval == 0 || params.locate_interval == 0 {
            bail!(SfxError::Configuration(
                "packed index parameters must be positive".to_string()
            ));
        }

        let bits_per_symbol = usize::BITS - (num_of_chars.max(2) - 1).leading_zeros();
        let len = encseq.total_length() + 1;
        let per_word = 64 / bits_per_symbol as usize;
        Ok(PackedIndexBuilder {
            encseq,
            index: PackedIndex {
                readmode,
                num_of_chars,
                total_length: encseq.total_length(),
                params,
                longest: 0,
                bits_per_symbol,
                packed: vec![0; len.div_ceil(per_word)],
                exceptions: vec![],
                first_rank_of: vec![0; num_of_chars],
                occ_samples: Vec::with_capacity((len / sample_interval + 1) * num_of_chars),
                sample_interval,
                locate_samples: vec![],
            },
            occ: vec![0; num_of_chars],
            next_rank: 0,
        })
    }

    // --------------------------------------------------
    pub fn add_part<T>(&mut self, suffixes: &[T], first_rank: usize) -> Result<()>
    where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        if first_rank != self.next_rank {
            bail!(SfxError::InternalConsistency(format!(
                "part starts at rank {first_rank}, expected {}",
                self.next_rank
            )));
        }

        let index = &mut self.index;
        let per_word = 64 / index.bits_per_symbol as usize;
        for (offset, suffix) in suffixes.iter().enumerate() {
            let rank = first_rank + offset;
            let pos = suffix.to_usize();
            if rank % index.sample_interval == 0 {
                index.occ_samples.extend_from_slice(&self.occ);
            }

            let c = bwt_symbol(self.encseq, index.readmode, pos);
            let regular = !is_special(c) && c != UNDEF_BWT_CHAR;
            if regular {
                let shift = (rank % per_word) * index.bits_per_symbol as usize;
                index.packed[rank / per_word] |= (c as u64) << shift;
                self.occ[c as usize] += 1;
            } else {
                index.exceptions.push((rank as u64, c));
            }

            if pos == 0 {
                index.longest = rank;
            }
            if !regular || pos % index.params.locate_interval == 0 {
                index.locate_samples.push((rank as u64, pos as u64));
            }
        }
        self.next_rank += suffixes.len();
        Ok(())
    }

    // --------------------------------------------------
    pub fn finish(mut self) -> Result<PackedIndex> {
        let len = self.index.len();
        if self.next_rank != len {
            bail!(SfxError::InternalConsistency(format!(
                "packed index received {} of {len} suffixes",
                self.next_rank
            )));
        }
        if len % self.index.sample_interval == 0 {
            self.index.occ_samples.extend_from_slice(&self.occ);
        }

        // Every text symbol precedes exactly one suffix
        let mut sum = 0;
        for (c, &count) in self.occ.iter().enumerate() {
            self.index.first_rank_of[c] = sum;
            sum += count;
        }
        Ok(self.index)
    }
}
