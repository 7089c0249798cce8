//! Memory-bounded construction of enhanced suffix arrays.
//!
//! `suffixerator::run_suffixerator` sorts every suffix of an
//! `EncodedSequence` one part at a time and writes the suffix, LCP, BWT
//! and bucket tables, or a packed BWT index, followed by the metadata
//! file describing them. `firstcodes` and `codehash` count the k-mers
//! that start each sequence, and `verify` checks suffix order.

pub mod codehash;
pub mod encseq;
pub mod error;
pub mod file_access;
pub mod firstcodes;
pub mod index;
pub mod metadata;
pub mod options;
pub mod packed_index;
pub mod progress;
pub mod suffix_iterator;
pub mod suffix_sort;
pub mod suffixerator;
pub mod tables;
pub mod types;
pub mod util;
pub mod verify;
