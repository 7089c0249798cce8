use crate::{
    encseq::EncodedSequence,
    error::{IoContext, SfxError},
    file_access::FileAccess,
    types::{FromUsize, Int, LcpStats, Readmode, LCP_OVERFLOW, UNDEF_BWT_CHAR},
    util::{index_file, usize_to_bytes, vec_to_slice_u8},
};
use anyhow::{bail, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Read, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};

// --------------------------------------------------
pub const SUFTAB_SUFFIX: &str = "suf";
pub const LCPTAB_SUFFIX: &str = "lcp";
pub const LARGE_LCP_SUFFIX: &str = "llv";
pub const BWTTAB_SUFFIX: &str = "bwt";
pub const BCKTAB_SUFFIX: &str = "bck";

// --------------------------------------------------
fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path).with_path(path.display())?))
}

// --------------------------------------------------
/// Appends parts of the suffix table
#[derive(Debug)]
pub struct SuffixTableWriter<T> {
    path: PathBuf,
    out: BufWriter<File>,
    pub num_written: usize,
    _marker: PhantomData<T>,
}

impl<T> SuffixTableWriter<T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    pub fn create(path: &Path) -> Result<Self> {
        Ok(SuffixTableWriter {
            path: path.to_path_buf(),
            out: create(path)?,
            num_written: 0,
            _marker: PhantomData,
        })
    }

    pub fn write_part(&mut self, suffixes: &[T]) -> Result<()> {
        self.out
            .write_all(vec_to_slice_u8(suffixes))
            .with_path(self.path.display())?;
        self.num_written += suffixes.len();
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.out.flush().with_path(self.path.display())?;
        Ok(self.num_written)
    }
}

// --------------------------------------------------
pub fn read_suffix_table<T>(path: &Path) -> Result<Vec<T>>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    let mut file: FileAccess<T> = FileAccess::open(path)?;
    let num_elements = file.num_elements;
    file.get_range(0..num_elements)
}

// --------------------------------------------------
/// One byte per LCP value; values of 255 or more are also recorded as
/// `(rank, value)` pairs in the large-value file
#[derive(Debug)]
pub struct LcpTableWriter {
    lcp_path: PathBuf,
    llv_path: PathBuf,
    lcp_out: BufWriter<File>,
    llv_out: BufWriter<File>,
    stats: LcpStats,
}

impl LcpTableWriter {
    pub fn create(index_name: &Path) -> Result<Self> {
        let lcp_path = index_file(index_name, LCPTAB_SUFFIX);
        let llv_path = index_file(index_name, LARGE_LCP_SUFFIX);
        Ok(LcpTableWriter {
            lcp_out: create(&lcp_path)?,
            llv_out: create(&llv_path)?,
            lcp_path,
            llv_path,
            stats: LcpStats::default(),
        })
    }

    pub fn add(&mut self, value: usize) -> Result<()> {
        let rank = self.stats.num_values;
        if value >= LCP_OVERFLOW as usize {
            self.lcp_out
                .write_all(&[LCP_OVERFLOW])
                .with_path(self.lcp_path.display())?;
            self.llv_out
                .write_all(&usize_to_bytes(rank))
                .and_then(|_| self.llv_out.write_all(&usize_to_bytes(value)))
                .with_path(self.llv_path.display())?;
            self.stats.num_large_values += 1;
        } else {
            self.lcp_out
                .write_all(&[value as u8])
                .with_path(self.lcp_path.display())?;
        }
        self.stats.max_branch_depth = self.stats.max_branch_depth.max(value);
        self.stats.num_values += 1;
        Ok(())
    }

    pub fn stats(&self) -> LcpStats {
        self.stats
    }

    pub fn finish(mut self) -> Result<LcpStats> {
        self.lcp_out.flush().with_path(self.lcp_path.display())?;
        self.llv_out.flush().with_path(self.llv_path.display())?;
        Ok(self.stats)
    }
}

// --------------------------------------------------
pub fn read_lcp_table(index_name: &Path) -> Result<Vec<usize>> {
    let lcp_path = index_file(index_name, LCPTAB_SUFFIX);
    let llv_path = index_file(index_name, LARGE_LCP_SUFFIX);
    let mut lcp: Vec<usize> = fs::read(&lcp_path)
        .with_path(lcp_path.display())?
        .into_iter()
        .map(|v| v as usize)
        .collect();
    let large = fs::read(&llv_path).with_path(llv_path.display())?;
    for pair in large.chunks_exact(16) {
        let mut rank = [0; 8];
        let mut value = [0; 8];
        rank.copy_from_slice(&pair[..8]);
        value.copy_from_slice(&pair[8..]);
        let rank = u64::from_le_bytes(rank) as usize;
        match lcp.get_mut(rank) {
            Some(slot) if *slot == LCP_OVERFLOW as usize => {
                *slot = u64::from_le_bytes(value) as usize
            }
            _ => bail!(SfxError::io(
                llv_path.display(),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("large LCP value at rank {rank} has no placeholder"),
                ),
            )),
        }
    }
    Ok(lcp)
}

// --------------------------------------------------
/// The symbol preceding each suffix under the readmode
#[derive(Debug)]
pub struct BwtWriter {
    path: PathBuf,
    out: BufWriter<File>,
    buffer: Vec<u8>,
    pub num_written: usize,
}

impl BwtWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(BwtWriter {
            path: path.to_path_buf(),
            out: create(path)?,
            buffer: vec![],
            num_written: 0,
        })
    }

    pub fn write_part<S, T>(
        &mut self,
        encseq: &S,
        readmode: Readmode,
        suffixes: &[T],
    ) -> Result<()>
    where
        S: EncodedSequence + ?Sized,
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        self.buffer.clear();
        self.buffer.extend(
            suffixes
                .iter()
                .map(|s| bwt_symbol(encseq, readmode, s.to_usize())),
        );
        self.out
            .write_all(&self.buffer)
            .with_path(self.path.display())?;
        self.num_written += suffixes.len();
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.out.flush().with_path(self.path.display())?;
        Ok(self.num_written)
    }
}

// --------------------------------------------------
#[inline(always)]
pub fn bwt_symbol<S: EncodedSequence + ?Sized>(
    encseq: &S,
    readmode: Readmode,
    pos: usize,
) -> u8 {
    if pos == 0 {
        UNDEF_BWT_CHAR
    } else {
        encseq.get_encoded_char(pos - 1, readmode)
    }
}

// --------------------------------------------------
pub fn read_bwt_table(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path).with_path(path.display())?)
}

// --------------------------------------------------
/// Number of suffixes per prefix code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketTable {
    pub num_of_chars: usize,
    pub prefix_length: usize,
    pub counts: Vec<u64>,
}

impl BucketTable {
    pub fn new(num_of_chars: usize, prefix_length: usize) -> Self {
        let num_of_codes = num_of_chars.pow(prefix_length as u32);
        BucketTable {
            num_of_chars,
            prefix_length,
            counts: vec![0; num_of_codes],
        }
    }

    pub fn num_of_codes(&self) -> usize {
        self.counts.len()
    }

    /// Left border of every bucket followed by the total
    pub fn left_borders(&self) -> Vec<u64> {
        let mut borders = Vec::with_capacity(self.counts.len() + 1);
        let mut sum = 0;
        borders.push(0);
        for count in &self.counts {
            sum += count;
            borders.push(sum);
        }
        borders
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut out = create(path)?;
        let mut bytes = usize_to_bytes(self.num_of_chars);
        bytes.extend(usize_to_bytes(self.prefix_length));
        for border in self.left_borders() {
            bytes.extend(usize_to_bytes(border as usize));
        }
        out.write_all(&bytes)
            .and_then(|_| out.flush())
            .with_path(path.display())?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_path(path.display())?;
        let mut bytes = vec![];
        file.read_to_end(&mut bytes).with_path(path.display())?;
        let words: Vec<u64> = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0; 8];
                buf.copy_from_slice(chunk);
                u64::from_le_bytes(buf)
            })
            .collect();
        let (num_of_chars, prefix_length, borders) = match words.as_slice() {
            [num_of_chars, prefix_length, borders @ ..] if !borders.is_empty() => {
                (*num_of_chars as usize, *prefix_length as usize, borders)
            }
            _ => bail!(SfxError::io(
                path.display(),
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated bucket table",
                ),
            )),
        };
        let Some(counts) = borders
            .windows(2)
            .map(|w| w[1].checked_sub(w[0]))
            .collect::<Option<Vec<_>>>()
        else {
            bail!(SfxError::io(
                path.display(),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "bucket borders are not ascending",
                ),
            ));
        };
        let table = BucketTable {
            num_of_chars,
            prefix_length,
            counts,
        };
        if num_of_chars.checked_pow(prefix_length as u32) != Some(table.counts.len()) {
            bail!(SfxError::io(
                path.display(),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "bucket table size does not match its header",
                ),
            ));
        }
        Ok(table)
    }
}
