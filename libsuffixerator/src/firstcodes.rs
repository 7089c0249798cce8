use crate::{
    encseq::EncodedSequence,
    error::SfxError,
    progress::SfxProgress,
    types::{is_special, Readmode},
};
use anyhow::{bail, Result};
use bitvec::prelude::*;
use format_num::NumberFormat;
use log::{debug, info};
use rayon::prelude::*;
use std::{mem, ops::Range};

// The cache holds 2^(depth + 1) - 1 entries
pub const MAX_CACHE_DEPTH: usize = 32;

// --------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstCodesOptions {
    pub kmer_size: usize,

    /// Depth of the bisection cache over the distinct codes
    pub cache_depth: usize,

    /// Codes collected before a batched lookup
    pub buffer_size: usize,

    /// A position after the first of its sequence is counted only when
    /// at least this many symbols remain in the sequence
    pub min_suffix_len: usize,
}

impl FirstCodesOptions {
    pub fn new(kmer_size: usize) -> Self {
        FirstCodesOptions {
            kmer_size,
            cache_depth: 10,
            buffer_size: 3_000_000,
            min_suffix_len: 45,
        }
    }

    pub fn validate(&self, num_of_chars: usize) -> Result<()> {
        if self.kmer_size == 0 {
            bail!(SfxError::Configuration(
                "k-mer size must be positive".to_string()
            ));
        }
        if num_of_code_values(num_of_chars, self.kmer_size).is_none() {
            bail!(SfxError::Configuration(format!(
                "{}-mers over {num_of_chars} symbols do not fit a 64-bit code",
                self.kmer_size
            )));
        }
        if self.cache_depth > MAX_CACHE_DEPTH {
            bail!(SfxError::Configuration(format!(
                "cache depth {} exceeds the maximum of {MAX_CACHE_DEPTH}",
                self.cache_depth
            )));
        }
        if self.buffer_size == 0 {
            bail!(SfxError::Configuration(
                "code buffer size must be positive".to_string()
            ));
        }
        Ok(())
    }
}

// --------------------------------------------------
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FirstCodesStats {
    pub num_of_sequences: usize,

    /// Sequences too short or with a special symbol in their first k-mer
    pub skipped_sequences: usize,
    pub different_codes: usize,
    pub first_code_hits: usize,
    pub buffer_total: usize,
    pub flush_count: usize,

    /// Search steps summed over every lookup
    pub depth_total: usize,
}

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub code: u64,
    pub index: usize,
}

// --------------------------------------------------
/// Sorted distinct first codes with their counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTable {
    pub codes: Vec<u64>,

    /// Number of sequences starting with each code
    pub seed_counts: Vec<u64>,

    /// Number of qualifying positions with each code, after accumulation
    pub count_occ: Vec<u64>,
    pub cache: Vec<CacheEntry>,
}

// --------------------------------------------------
/// Which codes start a sequence: a bit per possible code when that is
/// smaller, otherwise the sorted array of distinct codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOccurrence {
    Bits(BitVec<u64, Lsb0>),
    Array(CodeTable),
}

// --------------------------------------------------
#[derive(Debug)]
pub struct FirstCodes {
    pub kmer_size: usize,
    pub num_of_chars: usize,
    pub occurrence: CodeOccurrence,
    pub stats: FirstCodesStats,
}

impl FirstCodes {
    pub fn different_codes(&self) -> usize {
        self.stats.different_codes
    }

    /// Does some sequence start with `code`?
    pub fn contains(&self, code: u64) -> bool {
        match &self.occurrence {
            CodeOccurrence::Bits(bits) => {
                bits.get(code as usize).is_some_and(|bit| *bit)
            }
            CodeOccurrence::Array(table) => table.codes.binary_search(&code).is_ok(),
        }
    }

    /// Accumulated count of a first code (array representation only)
    pub fn count(&self, code: u64) -> Option<u64> {
        match &self.occurrence {
            CodeOccurrence::Array(table) => table
                .codes
                .binary_search(&code)
                .ok()
                .map(|i| table.count_occ[i]),
            CodeOccurrence::Bits(_) => None,
        }
    }
}

// --------------------------------------------------
/// Number of distinct codes of length `kmer_size`, if every code
/// fits in a `u64`
pub fn num_of_code_values(num_of_chars: usize, kmer_size: usize) -> Option<u128> {
    let mut value: u128 = 1;
    for _ in 0..kmer_size {
        value = value.checked_mul(num_of_chars as u128)?;
        if value > u64::MAX as u128 + 1 {
            return None;
        }
    }
    Some(value)
}

// --------------------------------------------------
/// Code of a run of regular symbols
pub fn encode_kmer(symbols: &[u8], num_of_chars: usize) -> u64 {
    symbols.iter().fold(0u64, |code, &c| {
        code.wrapping_mul(num_of_chars as u64)
            .wrapping_add(c as u64)
    })
}

// --------------------------------------------------
/// Every position of `range` followed by `kmer_size` regular symbols,
/// with its code
pub fn kmer_codes<'a, S: EncodedSequence + ?Sized>(
    encseq: &'a S,
    range: Range<usize>,
    kmer_size: usize,
) -> impl Iterator<Item = (usize, u64)> + 'a {
    let num_of_chars = encseq.num_of_chars() as u128;
    let modulus = num_of_code_values(encseq.num_of_chars(), kmer_size)
        .unwrap_or(u64::MAX as u128 + 1);
    let mut code: u128 = 0;
    let mut valid = 0;
    range.filter_map(move |pos| {
        let c = encseq.get_encoded_char(pos, Readmode::Forward);
        if is_special(c) {
            code = 0;
            valid = 0;
            return None;
        }
        code = (code * num_of_chars + c as u128) % modulus;
        valid += 1;
        (valid >= kmer_size).then(|| (pos + 1 - kmer_size, code as u64))
    })
}

// --------------------------------------------------
/// Code of the k-mer starting a sequence, if it is all regular
pub fn first_code<S: EncodedSequence + ?Sized>(
    encseq: &S,
    range: Range<usize>,
    kmer_size: usize,
) -> Option<u64> {
    let start = range.start;
    let end = (start + kmer_size).min(range.end);
    kmer_codes(encseq, start..end, kmer_size)
        .next()
        .map(|(_, code)| code)
}

// --------------------------------------------------
/// Find, count and accumulate the first k-mer of every sequence
pub fn first_codes<S: EncodedSequence + ?Sized>(
    encseq: &S,
    options: &FirstCodesOptions,
    progress: &mut SfxProgress,
) -> Result<FirstCodes> {
    let num_of_chars = encseq.num_of_chars();
    options.validate(num_of_chars)?;

    let num_of_sequences = encseq.num_of_sequences();
    let mut stats = FirstCodesStats {
        num_of_sequences,
        ..Default::default()
    };

    // Bytes for one bit per code vs one word per sequence
    let code_values = num_of_code_values(num_of_chars, options.kmer_size)
        .filter(|&v| v <= u64::MAX as u128);
    let bits_size = code_values.map(|v| v.div_ceil(64) * 8);
    let array_size = (num_of_sequences * mem::size_of::<u64>()) as u128;
    let use_array = bits_size.map_or(true, |bits_size| array_size < bits_size);

    progress.tick("collecting first codes");
    let mut occurrence = if use_array {
        info!("Using an array of {array_size} bytes for the first codes");
        let mut codes: Vec<u64> = (0..num_of_sequences)
            .into_par_iter()
            .filter_map(|seqnum| {
                first_code(encseq, encseq.sequence_range(seqnum), options.kmer_size)
            })
            .collect();
        stats.skipped_sequences = num_of_sequences - codes.len();

        progress.tick("sorting first codes");
        codes.par_sort_unstable();
        let table = deduplicate(codes);
        stats.different_codes = table.codes.len();
        CodeOccurrence::Array(table)
    } else {
        let num_bits = code_values.unwrap_or_default() as usize;
        info!(
            "Using a bit table of {} bytes for the first codes",
            bits_size.unwrap_or_default()
        );
        let mut bits: BitVec<u64, Lsb0> = bitvec![u64, Lsb0; 0; num_bits];
        for seqnum in 0..num_of_sequences {
            match first_code(encseq, encseq.sequence_range(seqnum), options.kmer_size) {
                Some(code) => {
                    if !bits.replace(code as usize, true) {
                        stats.different_codes += 1;
                    }
                }
                None => stats.skipped_sequences += 1,
            }
        }
        CodeOccurrence::Bits(bits)
    };

    let num_fmt = NumberFormat::new();
    info!(
        "Found {} different codes in {} sequences",
        num_fmt.format(",.0", stats.different_codes as f64),
        num_fmt.format(",.0", num_of_sequences as f64),
    );

    if let CodeOccurrence::Array(table) = &mut occurrence {
        if !table.codes.is_empty() {
            progress.tick("building the bisection cache");
            table.build_cache(options.cache_depth);

            progress.tick("verifying first code counts");
            verify_counts(encseq, options, table, &mut stats)?;

            progress.tick("accumulating code occurrences");
            accumulate(encseq, options, table, &mut stats);
        }
        debug!("First code statistics: {stats:?}");
    }

    Ok(FirstCodes {
        kmer_size: options.kmer_size,
        num_of_chars,
        occurrence,
        stats,
    })
}

// --------------------------------------------------
// Collapse runs of equal codes into distinct codes with multiplicities
fn deduplicate(sorted: Vec<u64>) -> CodeTable {
    let mut codes: Vec<u64> = Vec::with_capacity(sorted.len());
    let mut seed_counts: Vec<u64> = Vec::with_capacity(sorted.len());
    for code in sorted {
        match (codes.last(), seed_counts.last_mut()) {
            (Some(&last), Some(count)) if last == code => *count += 1,
            _ => {
                codes.push(code);
                seed_counts.push(1);
            }
        }
    }
    codes.shrink_to_fit();
    seed_counts.shrink_to_fit();
    CodeTable {
        count_occ: seed_counts.clone(),
        codes,
        seed_counts,
        cache: vec![],
    }
}

impl CodeTable {
    // --------------------------------------------------
    /// Sample the codes by recursive bisection to `depth`, in code order.
    /// Skipped when the cache would not be smaller than the codes.
    pub fn build_cache(&mut self, depth: usize) {
        self.cache.clear();
        let entries = u32::try_from(depth)
            .ok()
            .and_then(|depth| depth.checked_add(1))
            .and_then(|shift| 1usize.checked_shl(shift));
        let size = match entries {
            Some(entries) if entries - 1 < self.codes.len() => entries - 1,
            _ => return,
        };

        self.cache.reserve(size);
        let mut stack = vec![(0, self.codes.len() - 1, 0, false)];
        while let Some((left, right, level, visited)) = stack.pop() {
            let mid = left + (right - left) / 2;
            if visited || level == depth {
                self.cache.push(CacheEntry {
                    code: self.codes[mid],
                    index: mid,
                });
                if level < depth {
                    stack.push((mid + 1, right, level + 1, false));
                }
            } else {
                stack.push((left, right, level, true));
                stack.push((left, mid - 1, level + 1, false));
            }
        }
    }

    // --------------------------------------------------
    /// Index of `code` among the distinct codes
    pub fn find(&self, code: u64, stats: &mut FirstCodesStats) -> Option<usize> {
        let mut depth = 0;
        let mut left: i64 = 0;
        let mut right: i64 = self.codes.len() as i64 - 1;

        if !self.cache.is_empty() {
            let mut cache_left: i64 = 0;
            let mut cache_right: i64 = self.cache.len() as i64 - 1;
            while cache_left <= cache_right {
                let mid = cache_left + (cache_right - cache_left) / 2;
                let entry = self.cache[mid as usize];
                depth += 1;
                if code < entry.code {
                    cache_right = mid - 1;
                } else if code > entry.code {
                    cache_left = mid + 1;
                } else {
                    stats.depth_total += depth;
                    return Some(entry.index);
                }
            }

            // Only codes strictly between two neighbouring samples remain
            if cache_right >= 0 {
                left = self.cache[cache_right as usize].index as i64 + 1;
            }
            if (cache_left as usize) < self.cache.len() {
                right = self.cache[cache_left as usize].index as i64 - 1;
            }
        }

        while left <= right {
            let mid = left + (right - left) / 2;
            let mid_code = self.codes[mid as usize];
            depth += 1;
            if code < mid_code {
                right = mid - 1;
            } else if code > mid_code {
                left = mid + 1;
            } else {
                stats.depth_total += depth;
                return Some(mid as usize);
            }
        }
        stats.depth_total += depth;
        None
    }
}

// --------------------------------------------------
// Sorted batches of codes resolved against the table in one pass
struct CodeBuffer {
    codes: Vec<u64>,
    capacity: usize,
}

impl CodeBuffer {
    fn new(capacity: usize) -> Self {
        CodeBuffer {
            codes: Vec::with_capacity(capacity.min(1 << 20)),
            capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.codes.len() >= self.capacity
    }

    fn flush<F>(&mut self, table: &CodeTable, stats: &mut FirstCodesStats, mut action: F)
    where
        F: FnMut(Option<usize>),
    {
        self.codes.par_sort_unstable();
        stats.buffer_total += self.codes.len();
        for &code in &self.codes {
            action(table.find(code, stats));
        }
        self.codes.clear();
    }
}

// --------------------------------------------------
// Every first code must be found and drain its count exactly to zero
fn verify_counts<S: EncodedSequence + ?Sized>(
    encseq: &S,
    options: &FirstCodesOptions,
    table: &mut CodeTable,
    stats: &mut FirstCodesStats,
) -> Result<()> {
    let mut buffer = CodeBuffer::new(options.buffer_size);
    let mut working = mem::take(&mut table.count_occ);
    let mut missing = 0;
    let mut drain = |found: Option<usize>| match found {
        Some(idx) if working[idx] > 0 => working[idx] -= 1,
        _ => missing += 1,
    };

    for seqnum in 0..encseq.num_of_sequences() {
        if buffer.is_full() {
            buffer.flush(table, stats, &mut drain);
        }
        if let Some(code) =
            first_code(encseq, encseq.sequence_range(seqnum), options.kmer_size)
        {
            buffer.codes.push(code);
        }
    }
    buffer.flush(table, stats, &mut drain);

    if missing > 0 {
        bail!(SfxError::InternalConsistency(format!(
            "{missing} first codes were not found or counted too often"
        )));
    }
    if let Some(idx) = working.iter().position(|&count| count != 0) {
        bail!(SfxError::InternalConsistency(format!(
            "count of code {} is {} after verification",
            table.codes[idx], working[idx]
        )));
    }

    table.count_occ = working;
    Ok(())
}

// --------------------------------------------------
// Count every qualifying position whose code starts some sequence.
// Codes that start no sequence are not part of the table and are skipped.
fn accumulate<S: EncodedSequence + ?Sized>(
    encseq: &S,
    options: &FirstCodesOptions,
    table: &mut CodeTable,
    stats: &mut FirstCodesStats,
) {
    let mut buffer = CodeBuffer::new(options.buffer_size);
    let mut count_occ = mem::take(&mut table.count_occ);
    let mut hits = 0;
    let mut flushes = 0;
    let mut add = |found: Option<usize>| {
        if let Some(idx) = found {
            count_occ[idx] += 1;
            hits += 1;
        }
    };

    for seqnum in 0..encseq.num_of_sequences() {
        for (_, code) in qualifying_codes(encseq, seqnum, options) {
            if buffer.is_full() {
                buffer.flush(table, stats, &mut add);
                flushes += 1;
            }
            buffer.codes.push(code);
        }
    }
    buffer.flush(table, stats, &mut add);
    flushes += 1;

    stats.first_code_hits += hits;
    stats.flush_count += flushes;
    table.count_occ = count_occ;
}

// --------------------------------------------------
/// Positions of a sequence counted after the first codes are known:
/// the first position, and every later one with enough symbols left
pub fn qualifying_codes<'a, S: EncodedSequence + ?Sized>(
    encseq: &'a S,
    seqnum: usize,
    options: &FirstCodesOptions,
) -> impl Iterator<Item = (usize, u64)> + 'a {
    let range = encseq.sequence_range(seqnum);
    let (start, end) = (range.start, range.end);
    let min_len = options.kmer_size.max(options.min_suffix_len);
    kmer_codes(encseq, range, options.kmer_size)
        .filter(move |&(pos, _)| pos == start || end - pos >= min_len)
}

// --------------------------------------------------
#[cfg(test)]
mod test {
    use super::{
        encode_kmer, first_codes, kmer_codes, num_of_code_values, CodeOccurrence,
        CodeTable, FirstCodes, FirstCodesOptions, FirstCodesStats, MAX_CACHE_DEPTH,
    };
    use crate::{
        encseq::{Alphabet, EncSeq, EncodedSequence},
        error::SfxError,
        progress::SfxProgress,
        util::read_sequence_file,
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn options(kmer_size: usize, min_suffix_len: usize) -> FirstCodesOptions {
        FirstCodesOptions {
            min_suffix_len,
            ..FirstCodesOptions::new(kmer_size)
        }
    }

    fn code_table(first: &FirstCodes) -> &CodeTable {
        match &first.occurrence {
            CodeOccurrence::Array(table) => table,
            CodeOccurrence::Bits(_) => panic!("expected the array representation"),
        }
    }

    #[test]
    fn test_kmer_codes() {
        //                                           0123456789
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTNACGTA"]);
        let codes: Vec<_> = kmer_codes(&encseq, 0..10, 3).collect();
        assert_eq!(
            codes,
            [
                (0, encode_kmer(&[0, 1, 2], 4)),
                (1, encode_kmer(&[1, 2, 3], 4)),
                (5, encode_kmer(&[0, 1, 2], 4)),
                (6, encode_kmer(&[1, 2, 3], 4)),
                (7, encode_kmer(&[2, 3, 0], 4)),
            ]
        );
        assert_eq!(encode_kmer(&[0, 1, 2, 3], 4), 27);
    }

    #[test]
    fn test_num_of_code_values() {
        assert_eq!(num_of_code_values(4, 4), Some(256));
        assert_eq!(num_of_code_values(4, 32), Some(1 << 64));
        assert_eq!(num_of_code_values(4, 33), None);
        assert_eq!(num_of_code_values(20, 15), None);
    }

    #[test]
    fn test_single_sequence() -> Result<()> {
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["ACGTACGT"]);
        let mut progress = SfxProgress::new(false);
        let first = first_codes(&encseq, &options(4, 4), &mut progress)?;

        // One sequence: a word is smaller than 256 bits
        let table = code_table(&first);
        let acgt = encode_kmer(&[0, 1, 2, 3], 4);
        assert_eq!(first.different_codes(), 1);
        assert_eq!(table.codes, [acgt]);
        assert_eq!(table.seed_counts, [1]);

        // ACGT again at position 4
        assert_eq!(first.count(acgt), Some(2));
        assert_eq!(first.stats.first_code_hits, 2);
        assert_eq!(first.count(encode_kmer(&[1, 2, 3, 0], 4)), None);
        Ok(())
    }

    #[test]
    fn test_reads() -> Result<()> {
        // Five reads: 256 bits are smaller than five words
        let encseq = read_sequence_file("../data/inputs/reads.fa", None)?;
        let mut progress = SfxProgress::new(false);
        let first = first_codes(&encseq, &options(4, 4), &mut progress)?;
        assert!(matches!(first.occurrence, CodeOccurrence::Bits(_)));
        assert_eq!(first.different_codes(), 4);
        assert_eq!(first.stats.skipped_sequences, 0);
        assert!(first.contains(encode_kmer(&[0, 1, 2, 3], 4)));
        assert!(first.contains(encode_kmer(&[3, 0, 1, 2], 4)));
        assert!(!first.contains(encode_kmer(&[0, 0, 0, 0], 4)));
        Ok(())
    }

    #[test]
    fn test_counts() -> Result<()> {
        let encseq =
            EncSeq::from_sequences(Alphabet::Dna, &["ACGTACGT", "CGTAACGT", "ACGTTT"]);
        let mut progress = SfxProgress::new(false);
        let first = first_codes(&encseq, &options(4, 4), &mut progress)?;
        let table = code_table(&first);
        let acgt = encode_kmer(&[0, 1, 2, 3], 4);
        let cgta = encode_kmer(&[1, 2, 3, 0], 4);
        assert_eq!(table.codes, [acgt, cgta]);
        assert_eq!(table.seed_counts, [2, 1]);
        assert_eq!(
            table.seed_counts.iter().sum::<u64>(),
            encseq.num_of_sequences() as u64
        );

        // CGTT and GTTT start no sequence and are dropped
        assert_eq!(table.count_occ, [4, 2]);
        assert_eq!(first.stats.first_code_hits, 6);

        // Same input, same table
        let again = first_codes(&encseq, &options(4, 4), &mut progress)?;
        assert_eq!(again.occurrence, first.occurrence);
        Ok(())
    }

    #[test]
    fn test_bit_table() -> Result<()> {
        // 16 two-mer codes fit in one word, less than 8 sequences of a word each
        let seqs = ["AC", "AC", "GT", "TTA", "GA", "AC", "CC", "NA"];
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &seqs);
        let mut progress = SfxProgress::new(false);
        let first = first_codes(&encseq, &options(2, 2), &mut progress)?;
        assert!(matches!(first.occurrence, CodeOccurrence::Bits(_)));
        assert_eq!(first.different_codes(), 5);
        assert_eq!(first.stats.skipped_sequences, 1);
        assert!(first.contains(encode_kmer(&[3, 3], 4)));
        assert!(!first.contains(encode_kmer(&[3, 0], 4)));
        assert_eq!(first.count(encode_kmer(&[0, 1], 4)), None);
        Ok(())
    }

    #[test]
    fn test_widest_kmer_uses_array() -> Result<()> {
        let seq = "ACGT".repeat(9);
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &[seq.as_str(), seq.as_str()]);
        let mut progress = SfxProgress::new(false);
        let first = first_codes(&encseq, &options(32, 32), &mut progress)?;
        let table = code_table(&first);
        assert_eq!(table.codes.len(), 1);
        assert_eq!(table.seed_counts, [2]);

        let res = first_codes(&encseq, &options(33, 33), &mut progress);
        assert!(matches!(
            res.unwrap_err().downcast_ref::<SfxError>(),
            Some(SfxError::Configuration(_))
        ));
        Ok(())
    }

    #[test]
    fn test_cache() -> Result<()> {
        // 500 distinct codes: a cache of depth 3 holds 15 of them
        let seqs: Vec<String> = (0..500u32)
            .map(|i| {
                (0..12)
                    .map(|j| ['A', 'C', 'G', 'T'][((i >> (2 * (11 - j))) & 3) as usize])
                    .collect()
            })
            .collect();
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &seqs);
        assert_eq!(encseq.num_of_sequences(), 500);

        let mut progress = SfxProgress::new(false);
        let first = first_codes(
            &encseq,
            &FirstCodesOptions {
                cache_depth: 3,
                buffer_size: 7,
                ..options(12, 12)
            },
            &mut progress,
        )?;
        let table = code_table(&first);
        assert_eq!(table.codes.len(), 500);
        assert_eq!(table.cache.len(), 15);
        assert!(table.cache.windows(2).all(|w| w[0].code < w[1].code));
        assert!(table.cache.iter().all(|e| table.codes[e.index] == e.code));
        assert!(first.stats.flush_count > 1);

        let mut stats = FirstCodesStats::default();
        for (i, &code) in table.codes.iter().enumerate() {
            assert_eq!(table.find(code, &mut stats), Some(i));
        }
        assert_eq!(table.find(1000, &mut stats), None);
        assert!(stats.depth_total > 0);
        Ok(())
    }

    #[test]
    fn test_cache_depth_limit() -> Result<()> {
        let encseq = EncSeq::from_sequences(
            Alphabet::Dna,
            &["ACGTACGTACGTACGTACGTAC", "GATTACAGATTACAGATTACA", "TTGACCATTGACCATTGACCA"],
        );
        let mut progress = SfxProgress::new(false);
        let res = first_codes(
            &encseq,
            &FirstCodesOptions {
                cache_depth: 64,
                ..options(20, 20)
            },
            &mut progress,
        );
        assert!(matches!(
            res.unwrap_err().downcast_ref::<SfxError>(),
            Some(SfxError::Configuration(_))
        ));

        // The deepest allowed cache is skipped for a small table
        let first = first_codes(
            &encseq,
            &FirstCodesOptions {
                cache_depth: MAX_CACHE_DEPTH,
                ..options(20, 20)
            },
            &mut progress,
        )?;
        let table = code_table(&first);
        assert_eq!(table.codes.len(), 3);
        assert!(table.cache.is_empty());

        let mut table = table.clone();
        table.build_cache(200);
        assert!(table.cache.is_empty());
        table.build_cache(usize::MAX);
        assert!(table.cache.is_empty());
        Ok(())
    }
}
