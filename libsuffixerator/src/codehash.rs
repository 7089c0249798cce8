use crate::{
    encseq::EncodedSequence,
    error::SfxError,
    firstcodes::{first_code, qualifying_codes, FirstCodesOptions},
    progress::SfxProgress,
};
use anyhow::{bail, Result};
use format_num::NumberFormat;
use log::info;

// Fibonacci hashing multiplier, 2^64 / golden ratio
const HASH_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

// --------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Slot {
    code: u64,
    count: u64,

    /// Range of the code after `partial_sums`; `next` is one past the
    /// last index still free
    start: u64,
    next: u64,
    used: bool,
}

// --------------------------------------------------
/// Open-addressing table counting occurrences of 64-bit codes
#[derive(Debug, Clone)]
pub struct CodeHashTable {
    slots: Vec<Slot>,
    shift: u32,
    num_entries: usize,
}

impl CodeHashTable {
    /// A table for about `expected` distinct codes
    pub fn new(expected: usize) -> Self {
        let capacity = (expected.max(1) * 2).next_power_of_two().max(16);
        CodeHashTable {
            slots: vec![Slot::default(); capacity],
            shift: 64 - capacity.trailing_zeros(),
            num_entries: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    #[inline(always)]
    fn home(&self, code: u64) -> usize {
        (code.wrapping_mul(HASH_MULTIPLIER) >> self.shift) as usize
    }

    // Slot holding `code`, or the free slot where it would go
    fn probe(&self, code: u64) -> usize {
        let mask = self.slots.len() - 1;
        let mut idx = self.home(code);
        while self.slots[idx].used && self.slots[idx].code != code {
            idx = (idx + 1) & mask;
        }
        idx
    }

    fn grow(&mut self) {
        let old = std::mem::take(&mut self.slots);
        let capacity = old.len() * 2;
        self.slots = vec![Slot::default(); capacity];
        self.shift = 64 - capacity.trailing_zeros();
        for slot in old.into_iter().filter(|s| s.used) {
            let idx = self.probe(slot.code);
            self.slots[idx] = slot;
        }
    }

    // --------------------------------------------------
    /// Count one more occurrence of `code` if present and report whether
    /// it was. A missing code is added with count 1 when `insert` is set.
    pub fn search(&mut self, code: u64, insert: bool) -> bool {
        let idx = self.probe(code);
        if self.slots[idx].used {
            self.slots[idx].count += 1;
            return true;
        }
        if insert {
            self.slots[idx] = Slot {
                code,
                count: 1,
                start: 0,
                next: 0,
                used: true,
            };
            self.num_entries += 1;
            if self.num_entries * 2 > self.slots.len() {
                self.grow();
            }
        }
        false
    }

    pub fn count(&self, code: u64) -> Option<u64> {
        let slot = self.slots[self.probe(code)];
        slot.used.then_some(slot.count)
    }

    pub fn count_sum(&self) -> u64 {
        self.slots.iter().filter(|s| s.used).map(|s| s.count).sum()
    }

    // --------------------------------------------------
    /// Assign every code a contiguous range of the given total size, in
    /// slot order, and return that total
    pub fn partial_sums(&mut self) -> u64 {
        let mut sum = 0;
        for slot in self.slots.iter_mut().filter(|s| s.used) {
            slot.start = sum;
            sum += slot.count;
            slot.next = sum;
        }
        sum
    }

    /// Claim the next free index of the range of `code`, filling it from
    /// the right; `None` when the code is unknown or its range is full
    pub fn insertion_index(&mut self, code: u64) -> Option<usize> {
        let idx = self.probe(code);
        let slot = &mut self.slots[idx];
        if !slot.used || slot.next == slot.start {
            return None;
        }
        slot.next -= 1;
        Some(slot.next as usize)
    }
}

// --------------------------------------------------
/// Positions grouped by the code of their first k-mer
#[derive(Debug)]
pub struct HashedFirstCodes {
    pub table: CodeHashTable,
    pub different_codes: usize,
    pub suftab: Vec<usize>,
}

impl HashedFirstCodes {
    /// Positions whose k-mer is `code`, which must start some sequence
    pub fn bucket(&self, code: u64) -> Option<&[usize]> {
        let slot = self.table.slots[self.table.probe(code)];
        slot.used.then(|| {
            let start = slot.start as usize;
            &self.suftab[start..start + slot.count as usize]
        })
    }
}

// --------------------------------------------------
/// Insert the first code of every sequence into a hash table, count the
/// qualifying positions carrying those codes, then bucket the positions
pub fn hash_first_codes<S: EncodedSequence + ?Sized>(
    encseq: &S,
    options: &FirstCodesOptions,
    progress: &mut SfxProgress,
) -> Result<HashedFirstCodes> {
    options.validate(encseq.num_of_chars())?;
    let num_of_sequences = encseq.num_of_sequences();
    let mut table = CodeHashTable::new(num_of_sequences);
    let mut different_codes = 0;
    let mut num_first_codes = 0;

    progress.tick("inserting first codes into the hash table");
    for seqnum in 0..num_of_sequences {
        let range = encseq.sequence_range(seqnum);
        if let Some(code) = first_code(encseq, range, options.kmer_size) {
            num_first_codes += 1;
            if !table.search(code, true) {
                different_codes += 1;
            }
        }
    }

    let num_fmt = NumberFormat::new();
    info!(
        "Found {} different codes in {} sequences",
        num_fmt.format(",.0", different_codes as f64),
        num_fmt.format(",.0", num_of_sequences as f64),
    );

    let count_sum = table.count_sum();
    if count_sum != num_first_codes {
        bail!(SfxError::InternalConsistency(format!(
            "hash table counts {count_sum} first codes, expected {num_first_codes}"
        )));
    }

    progress.tick("inserting remaining codes into the hash table");
    for seqnum in 0..num_of_sequences {
        let start = encseq.sequence_range(seqnum).start;
        for (_, code) in qualifying_codes(encseq, seqnum, options).filter(|&(p, _)| p != start)
        {
            table.search(code, false);
        }
    }

    let total = table.partial_sums();
    progress.tick("inserting suffixes into the suffix table");
    let mut suftab = vec![0; total as usize];
    for seqnum in 0..num_of_sequences {
        for (pos, code) in qualifying_codes(encseq, seqnum, options) {
            if let Some(idx) = table.insertion_index(code) {
                suftab[idx] = pos;
            }
        }
    }

    Ok(HashedFirstCodes {
        table,
        different_codes,
        suftab,
    })
}

// --------------------------------------------------
#[cfg(test)]
mod test {
    use super::{hash_first_codes, CodeHashTable};
    use crate::{
        encseq::{Alphabet, EncSeq},
        firstcodes::{encode_kmer, FirstCodesOptions},
        progress::SfxProgress,
        util::read_sequence_file,
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search() {
        let mut table = CodeHashTable::new(2);
        assert!(!table.search(42, false));
        assert!(table.is_empty());
        assert!(!table.search(42, true));
        assert!(table.search(42, true));
        assert!(table.search(42, false));
        assert_eq!(table.count(42), Some(3));
        assert_eq!(table.count(7), None);

        // Growing keeps every count
        for code in 0..100 {
            table.search(code * 1_000_003, true);
        }
        assert_eq!(table.len(), 101);
        assert_eq!(table.count(42), Some(3));
        assert_eq!(table.count_sum(), 103);
    }

    #[test]
    fn test_insertion_index() {
        let mut table = CodeHashTable::new(4);
        table.search(5, true);
        table.search(5, true);
        table.search(9, true);
        assert_eq!(table.partial_sums(), 3);

        let mut seen = vec![];
        for _ in 0..2 {
            seen.push(table.insertion_index(5).expect("room for 5"));
        }
        // Saturated
        assert_eq!(table.insertion_index(5), None);
        seen.push(table.insertion_index(9).expect("room for 9"));
        assert_eq!(table.insertion_index(9), None);
        assert_eq!(table.insertion_index(11), None);

        seen.sort();
        assert_eq!(seen, [0, 1, 2]);
    }

    #[test]
    fn test_hash_first_codes() -> Result<()> {
        let encseq =
            EncSeq::from_sequences(Alphabet::Dna, &["ACGTACGT", "CGTAACGT", "ACGTTT"]);
        let mut progress = SfxProgress::new(false);
        let options = FirstCodesOptions {
            min_suffix_len: 4,
            ..FirstCodesOptions::new(4)
        };
        let hashed = hash_first_codes(&encseq, &options, &mut progress)?;
        assert_eq!(hashed.different_codes, 2);

        let acgt = encode_kmer(&[0, 1, 2, 3], 4);
        let cgta = encode_kmer(&[1, 2, 3, 0], 4);
        assert_eq!(hashed.table.count(acgt), Some(4));
        assert_eq!(hashed.table.count(cgta), Some(2));
        assert_eq!(hashed.suftab.len(), 6);

        // Sequences start at 0, 9 and 18
        let mut positions = hashed.bucket(acgt).expect("ACGT bucket").to_vec();
        positions.sort();
        assert_eq!(positions, [0, 4, 13, 18]);
        let mut positions = hashed.bucket(cgta).expect("CGTA bucket").to_vec();
        positions.sort();
        assert_eq!(positions, [1, 9]);
        assert!(hashed.bucket(encode_kmer(&[3, 3, 3, 3], 4)).is_none());
        Ok(())
    }

    #[test]
    fn test_reads() -> Result<()> {
        let encseq = read_sequence_file("../data/inputs/reads.fa", None)?;
        let mut progress = SfxProgress::new(false);
        let hashed =
            hash_first_codes(&encseq, &FirstCodesOptions::new(4), &mut progress)?;
        assert_eq!(hashed.different_codes, 4);
        assert_eq!(hashed.table.count_sum(), 5);
        Ok(())
    }
}
