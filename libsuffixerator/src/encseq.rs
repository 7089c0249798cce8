use crate::types::{is_special, Readmode, SEPARATOR, WILDCARD};
use serde::{Deserialize, Serialize};
use std::ops::Range;

// --------------------------------------------------
/// Read-only, random-access source of encoded symbols.
///
/// Regular symbols are `0..num_of_chars()`; `WILDCARD` and `SEPARATOR`
/// are special. Positions are in `0..total_length()`, and
/// `char_or_end(total_length())` reports the virtual terminal symbol.
pub trait EncodedSequence: Sync {
    fn total_length(&self) -> usize;

    fn num_of_chars(&self) -> usize;

    fn num_of_sequences(&self) -> usize;

    fn is_dna(&self) -> bool;

    /// Symbol at `pos` (forward coordinates are remapped by `readmode`)
    fn get_encoded_char(&self, pos: usize, readmode: Readmode) -> u8;

    /// Forward coordinates of sequence `seqnum`
    fn sequence_range(&self, seqnum: usize) -> Range<usize>;

    fn show_symbol(&self, c: u8) -> char;

    fn sequence_name(&self, seqnum: usize) -> String {
        (seqnum + 1).to_string()
    }

    #[inline(always)]
    fn char_or_end(&self, pos: usize, readmode: Readmode) -> u8 {
        if pos < self.total_length() {
            self.get_encoded_char(pos, readmode)
        } else {
            SEPARATOR
        }
    }

    #[inline(always)]
    fn is_special_at(&self, pos: usize, readmode: Readmode) -> bool {
        is_special(self.char_or_end(pos, readmode))
    }
}

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alphabet {
    Dna,
    Protein,
}

const PROTEIN_SYMBOLS: &[u8; 20] = b"ACDEFGHIKLMNPQRSTVWY";

impl Alphabet {
    pub fn num_of_chars(&self) -> usize {
        match self {
            Alphabet::Dna => 4,
            Alphabet::Protein => PROTEIN_SYMBOLS.len(),
        }
    }

    #[inline(always)]
    pub fn encode(&self, b: u8) -> u8 {
        match self {
            Alphabet::Dna => match b.to_ascii_uppercase() {
                b'A' => 0,
                b'C' => 1,
                b'G' => 2,
                b'T' | b'U' => 3,
                _ => WILDCARD,
            },
            Alphabet::Protein => {
                let b = b.to_ascii_uppercase();
                PROTEIN_SYMBOLS
                    .iter()
                    .position(|&p| p == b)
                    .map_or(WILDCARD, |i| i as u8)
            }
        }
    }

    pub fn decode(&self, c: u8) -> char {
        match c {
            WILDCARD => match self {
                Alphabet::Dna => 'N',
                Alphabet::Protein => 'X',
            },
            SEPARATOR => '|',
            _ => match self {
                Alphabet::Dna => b"ACGT".get(c as usize).map_or('?', |&b| b as char),
                Alphabet::Protein => {
                    PROTEIN_SYMBOLS.get(c as usize).map_or('?', |&b| b as char)
                }
            },
        }
    }

    /// Guess the alphabet from the first bytes of the input
    pub fn guess(sample: &[u8]) -> Alphabet {
        let num_nucleotides = sample
            .iter()
            .filter(|b| b"ACGTUNacgtun".contains(b))
            .count();
        if sample.is_empty() || num_nucleotides * 10 >= sample.len() * 9 {
            Alphabet::Dna
        } else {
            Alphabet::Protein
        }
    }
}

// --------------------------------------------------
/// In-memory encoded sequence; sequences are joined by `SEPARATOR`
#[derive(Debug, Clone)]
pub struct EncSeq {
    pub alphabet: Alphabet,
    symbols: Vec<u8>,
    sequence_starts: Vec<usize>,
    pub sequence_names: Vec<String>,
}

impl EncSeq {
    pub fn new(alphabet: Alphabet) -> Self {
        EncSeq {
            alphabet,
            symbols: vec![],
            sequence_starts: vec![],
            sequence_names: vec![],
        }
    }

    pub fn add_sequence(&mut self, name: &str, seq: &[u8]) {
        if !self.sequence_starts.is_empty() {
            self.symbols.push(SEPARATOR);
        }
        self.sequence_starts.push(self.symbols.len());
        let alphabet = self.alphabet;
        self.symbols.extend(seq.iter().map(|&b| alphabet.encode(b)));
        self.sequence_names.push(name.to_string());
    }

    pub fn from_sequences<S: AsRef<[u8]>>(alphabet: Alphabet, seqs: &[S]) -> Self {
        let mut encseq = EncSeq::new(alphabet);
        for (i, seq) in seqs.iter().enumerate() {
            encseq.add_sequence(&(i + 1).to_string(), seq.as_ref());
        }
        encseq
    }

    pub fn num_of_wildcards(&self) -> usize {
        self.symbols.iter().filter(|&&c| c == WILDCARD).count()
    }

    /// Decoded symbols of the suffix at `pos`, at most `len` of them
    pub fn show_suffix(&self, pos: usize, len: usize, readmode: Readmode) -> String {
        (pos..self.total_length().min(pos + len))
            .map(|p| self.show_symbol(self.get_encoded_char(p, readmode)))
            .collect()
    }
}

impl EncodedSequence for EncSeq {
    fn total_length(&self) -> usize {
        self.symbols.len()
    }

    fn num_of_chars(&self) -> usize {
        self.alphabet.num_of_chars()
    }

    fn num_of_sequences(&self) -> usize {
        self.sequence_starts.len()
    }

    fn is_dna(&self) -> bool {
        self.alphabet == Alphabet::Dna
    }

    #[inline(always)]
    fn get_encoded_char(&self, pos: usize, readmode: Readmode) -> u8 {
        let c = if readmode.is_reverse() {
            self.symbols[self.symbols.len() - 1 - pos]
        } else {
            self.symbols[pos]
        };
        if readmode.is_complement() && !is_special(c) {
            3 - c
        } else {
            c
        }
    }

    fn sequence_range(&self, seqnum: usize) -> Range<usize> {
        let start = self.sequence_starts[seqnum];
        let end = self
            .sequence_starts
            .get(seqnum + 1)
            .map_or(self.symbols.len(), |next| next - 1);
        start..end
    }

    fn show_symbol(&self, c: u8) -> char {
        self.alphabet.decode(c)
    }

    fn sequence_name(&self, seqnum: usize) -> String {
        self.sequence_names
            .get(seqnum)
            .cloned()
            .unwrap_or_else(|| (seqnum + 1).to_string())
    }
}
