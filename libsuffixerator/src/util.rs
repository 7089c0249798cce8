use crate::{
    encseq::{Alphabet, EncSeq, EncodedSequence},
    error::{IoContext, SfxError},
    types::{FromUsize, Int},
};
use anyhow::{bail, Result};
use needletail::parse_fastx_file;
use std::{
    path::{Path, PathBuf},
    slice,
};

// --------------------------------------------------
/// Bits reserved for the prefix length when special codes are stored
pub const PREFIX_LEN_BITS: u32 = 4;

// --------------------------------------------------
pub fn vec_to_slice_u8<T>(vec: &[T]) -> &[u8]
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    unsafe { slice::from_raw_parts(vec.as_ptr() as *const _, std::mem::size_of_val(vec)) }
}

// --------------------------------------------------
/// Copy `len` values of `T` out of raw native-endian bytes
pub fn slice_u8_to_vec<T>(buffer: &[u8], len: usize) -> Vec<T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    buffer
        .chunks_exact(std::mem::size_of::<T>())
        .take(len)
        .map(|chunk| unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const T) })
        .collect()
}

// --------------------------------------------------
/// Eight little-endian bytes, the word size of every table header
pub fn usize_to_bytes(value: usize) -> Vec<u8> {
    (value as u64).to_le_bytes().to_vec()
}

// --------------------------------------------------
/// `<index_name>.<suffix>`
pub fn index_file(index_name: &Path, suffix: &str) -> PathBuf {
    let mut name = index_name.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

// --------------------------------------------------
// Largest k such that base^k <= bound
fn max_power_below(base: usize, bound: u128) -> usize {
    if base < 2 {
        return 0;
    }
    let base = base as u128;
    let mut k = 0;
    let mut value: u128 = 1;
    while value.saturating_mul(base) <= bound {
        value *= base;
        k += 1;
    }
    k
}

// --------------------------------------------------
/// Prefix length used when the caller asks for "automatic"
pub fn recommended_prefix_length(
    num_of_chars: usize,
    total_length: usize,
    store_special_codes: bool,
) -> usize {
    let recommended = max_power_below(num_of_chars, total_length as u128 / 4).max(1);
    recommended.min(maximal_prefix_length(
        num_of_chars,
        total_length,
        store_special_codes,
    ))
}

// --------------------------------------------------
/// Longest prefix whose bucket table stays proportional to the input
pub fn maximal_prefix_length(
    num_of_chars: usize,
    total_length: usize,
    store_special_codes: bool,
) -> usize {
    let maximal = max_power_below(num_of_chars, 4 * (total_length as u128 + 1)).max(1);
    if store_special_codes {
        maximal.min((1 << PREFIX_LEN_BITS) - 1)
    } else {
        maximal
    }
}

// --------------------------------------------------
pub fn check_prefix_length(
    prefix_length: usize,
    num_of_chars: usize,
    total_length: usize,
    store_special_codes: bool,
) -> Result<()> {
    let maximal = maximal_prefix_length(num_of_chars, total_length, store_special_codes);
    if prefix_length > maximal {
        bail!(SfxError::Configuration(format!(
            "prefix length {prefix_length} exceeds the maximal prefix length \
            {maximal} for alphabet size {num_of_chars} and length {total_length}"
        )));
    }
    Ok(())
}

// --------------------------------------------------
// Read a FASTA/Q file into an encoded sequence
pub fn read_sequence_file(
    filename: impl AsRef<Path>,
    alphabet: Option<Alphabet>,
) -> Result<EncSeq> {
    let filename = filename.as_ref();
    let mut reader = parse_fastx_file(filename)
        .map_err(|e| SfxError::Configuration(format!("{}: {e}", filename.display())))?;
    let mut encseq: Option<EncSeq> = alphabet.map(EncSeq::new);
    let mut i = 0;
    while let Some(rec) = reader.next() {
        let rec = rec.map_err(|e| {
            SfxError::io(
                filename.display(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            )
        })?;
        let seq = rec.seq();
        let encseq = encseq.get_or_insert_with(|| {
            EncSeq::new(Alphabet::guess(&seq[..seq.len().min(1000)]))
        });
        i += 1;

        // Only take ID value up to first whitespace
        let id = String::from_utf8(rec.id().to_vec())?
            .split_whitespace()
            .next()
            .map_or(i.to_string(), |v| v.to_string());
        encseq.add_sequence(&id, &seq);
    }

    match encseq {
        Some(encseq) if encseq.total_length() > 0 => Ok(encseq),
        _ => bail!(SfxError::Configuration(format!(
            "{}: input contains no sequence data",
            filename.display()
        ))),
    }
}

// --------------------------------------------------
pub fn file_len(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path).with_path(path.display())?.len())
}

// --------------------------------------------------
#[cfg(test)]
mod tests {
    use super::{
        check_prefix_length, index_file, maximal_prefix_length, read_sequence_file,
        recommended_prefix_length, slice_u8_to_vec, usize_to_bytes, vec_to_slice_u8,
    };
    use crate::{
        encseq::{Alphabet, EncodedSequence},
        error::SfxError,
        types::{Readmode, SEPARATOR},
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_read_sequence_file() -> Result<()> {
        let file = "../data/inputs/2.fa";
        let res = read_sequence_file(file, None);
        assert!(res.is_ok());
        let encseq = res.unwrap();
        assert_eq!(encseq.alphabet, Alphabet::Dna);
        assert_eq!(encseq.total_length(), 17);
        assert_eq!(encseq.num_of_sequences(), 2);
        assert_eq!(encseq.sequence_names, ["ABC", "DEF"]);
        assert_eq!(encseq.sequence_range(1), 9..17);
        assert_eq!(encseq.get_encoded_char(8, Readmode::Forward), SEPARATOR);
        assert_eq!(encseq.show_suffix(4, 4, Readmode::Forward), "ACGT");
        Ok(())
    }

    #[test]
    fn test_read_empty_sequence_file() {
        let res = read_sequence_file("../data/inputs/empty.fa", None);
        assert!(res.is_err());
        assert!(matches!(
            res.unwrap_err().downcast_ref::<SfxError>(),
            Some(SfxError::Configuration(_))
        ));
    }

    #[test]
    fn test_prefix_length() -> Result<()> {
        // 8/4 < 4^1, so fall back to 1
        assert_eq!(recommended_prefix_length(4, 8, false), 1);
        assert_eq!(recommended_prefix_length(4, 1_000_000, false), 8);
        assert_eq!(recommended_prefix_length(20, 1_000_000, false), 4);

        // 4^2 <= 4 * 9 < 4^3
        assert_eq!(maximal_prefix_length(4, 8, false), 2);
        assert_eq!(maximal_prefix_length(4, 1 << 40, false), 21);
        assert_eq!(maximal_prefix_length(4, 1 << 40, true), 15);

        assert!(check_prefix_length(2, 4, 8, false).is_ok());
        let res = check_prefix_length(3, 4, 8, false);
        assert!(res.is_err());
        assert_eq!(
            res.unwrap_err().to_string(),
            "configuration error: prefix length 3 exceeds the maximal prefix \
            length 2 for alphabet size 4 and length 8"
        );
        Ok(())
    }

    #[test]
    fn test_index_file() {
        assert_eq!(
            index_file(Path::new("/tmp/idx"), "suf"),
            PathBuf::from("/tmp/idx.suf")
        );
    }

    #[test]
    fn test_byte_helpers() {
        assert_eq!(usize_to_bytes(0), [0; 8]);
        assert_eq!(usize_to_bytes(258), [2, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(usize_to_bytes(1 << 40), [0, 0, 0, 0, 0, 1, 0, 0]);

        let suffixes = [7u32, 0, u32::MAX];
        let bytes = vec_to_slice_u8(&suffixes);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], 7u32.to_ne_bytes());
        let back: Vec<u32> = slice_u8_to_vec(bytes, 3);
        assert_eq!(back, suffixes);

        // A short buffer yields only the whole values it holds
        let back: Vec<u64> = slice_u8_to_vec(&bytes[..10], 2);
        assert_eq!(back.len(), 1);
    }
}
