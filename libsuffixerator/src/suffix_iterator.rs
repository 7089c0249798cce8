use crate::{
    encseq::EncodedSequence,
    error::{IoContext, SfxError},
    file_access::FileAccess,
    options::SortStrategy,
    suffix_sort::SuffixSorter,
    tables::{BucketTable, BwtWriter, LcpTableWriter},
    types::{is_special, FromUsize, Int, LcpStats, Readmode, SortStats},
    util::vec_to_slice_u8,
    verify::check_sorted_suffixes,
};
use anyhow::{anyhow, bail, Result};
use format_num::NumberFormat;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::{
    io::{BufWriter, Write},
    mem,
    path::Path,
    time::Instant,
};
use tempfile::NamedTempFile;

// Adjacent pairs handed to the LCP workers at once
const LCP_CHUNK: usize = 1 << 16;

// --------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    Initialized,
    Producing,
    Exhausted,
    Failed,
}

// --------------------------------------------------
/// A contiguous range of buckets sorted together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRange {
    pub first_code: usize,
    pub last_code: usize,
    pub first_rank: usize,
    pub len: usize,
}

// --------------------------------------------------
#[derive(Debug)]
pub struct SuffixPart<'a, T> {
    pub suffixes: &'a [T],
    pub first_rank: usize,

    /// Some suffix in the part starts with a special symbol
    pub has_special: bool,
}

// --------------------------------------------------
#[derive(Debug, Clone)]
pub struct SuffixIteratorArgs {
    pub readmode: Readmode,
    pub prefix_length: usize,
    pub max_depth: Option<usize>,
    pub maximum_space: usize,
    pub num_parts: Option<usize>,
    pub strategy: SortStrategy,
}

// --------------------------------------------------
/// Produces the suffixes of a sequence in sorted order, one
/// memory-bounded part at a time
#[derive(Debug)]
pub struct SuffixIterator<'a, T, S>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    S: EncodedSequence + ?Sized,
{
    encseq: &'a S,
    readmode: Readmode,
    prefix_length: usize,
    max_depth: Option<usize>,
    strategy: SortStrategy,
    bucket_table: BucketTable,
    parts: Vec<PartRange>,
    next_part: usize,
    suffix_space: Vec<T>,
    lcp_output: Option<LcpTableWriter>,
    lcp_stats: Option<LcpStats>,
    previous_suffix: Option<T>,
    longest: Option<usize>,
    sort_stats: SortStats,
    stream_pending: bool,
    state: IteratorState,
}

impl<'a, T, S> SuffixIterator<'a, T, S>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    S: EncodedSequence + ?Sized,
{
    pub fn new(
        encseq: &'a S,
        args: SuffixIteratorArgs,
        lcp_output: Option<LcpTableWriter>,
    ) -> Result<Self> {
        if args.prefix_length == 0 {
            bail!(SfxError::Configuration(
                "the prefix length must be positive".to_string()
            ));
        }

        let now = Instant::now();
        let bucket_table = count_buckets(encseq, args.readmode, args.prefix_length);
        let num_fmt = NumberFormat::new();
        info!(
            "Counted {} suffixes into {} buckets in {:?}",
            num_fmt.format(",.0", (encseq.total_length() + 1) as f64),
            num_fmt.format(",.0", bucket_table.num_of_codes() as f64),
            now.elapsed()
        );

        let parts = determine_parts::<T>(&bucket_table, args.num_parts, args.maximum_space)?;
        info!(
            "Split suffixes into {} part{}",
            parts.len(),
            if parts.len() == 1 { "" } else { "s" }
        );

        Ok(SuffixIterator {
            encseq,
            readmode: args.readmode,
            prefix_length: args.prefix_length,
            max_depth: args.max_depth,
            strategy: args.strategy,
            bucket_table,
            parts,
            next_part: 0,
            suffix_space: vec![],
            lcp_output,
            lcp_stats: None,
            previous_suffix: None,
            longest: None,
            sort_stats: SortStats::default(),
            stream_pending: false,
            state: IteratorState::Initialized,
        })
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    pub fn parts(&self) -> &[PartRange] {
        &self.parts
    }

    pub fn bucket_table(&self) -> &BucketTable {
        &self.bucket_table
    }

    pub fn sort_stats(&self) -> SortStats {
        self.sort_stats
    }

    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    /// Available once every part (and the stream pass) is done
    pub fn lcp_stats(&self) -> Option<LcpStats> {
        self.lcp_stats
    }

    /// Rank of the suffix starting at position 0, once iteration is
    /// complete; `None` if construction failed or is unfinished
    pub fn longest(&self) -> Option<usize> {
        (self.state == IteratorState::Exhausted && !self.stream_pending)
            .then_some(self.longest)
            .flatten()
    }

    // --------------------------------------------------
    /// The next sorted part, or `None` when all suffixes were delivered.
    /// With a streamed suffix table the parts are only ordered by bucket.
    pub fn next_part(&mut self) -> Result<Option<SuffixPart<'_, T>>> {
        match self.state {
            IteratorState::Exhausted => return Ok(None),
            IteratorState::Failed => bail!(SfxError::InternalConsistency(
                "the suffix iterator failed earlier".to_string()
            )),
            _ => {}
        }

        if self.next_part == self.parts.len() {
            if let Err(e) = self.finish() {
                self.fail();
                return Err(e);
            }
            return Ok(None);
        }

        self.state = IteratorState::Producing;
        let range = self.parts[self.next_part].clone();
        let has_special = match self.produce_part(&range) {
            Ok(has_special) => has_special,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        self.next_part += 1;

        Ok(Some(SuffixPart {
            suffixes: &self.suffix_space[..range.len],
            first_rank: range.first_rank,
            has_special,
        }))
    }

    // --------------------------------------------------
    fn fail(&mut self) {
        self.state = IteratorState::Failed;
        self.longest = None;
        self.lcp_output = None;
        self.suffix_space = vec![];
    }

    // --------------------------------------------------
    fn finish(&mut self) -> Result<()> {
        self.suffix_space = vec![];
        if self.strategy.stream_suftab {
            self.stream_pending = true;
        } else if let Some(lcp_output) = self.lcp_output.take() {
            self.lcp_stats = Some(lcp_output.finish()?);
        }
        self.state = IteratorState::Exhausted;
        debug!("Sort statistics: {:?}", self.sort_stats);
        Ok(())
    }

    // --------------------------------------------------
    fn produce_part(&mut self, range: &PartRange) -> Result<bool> {
        let now = Instant::now();
        self.fill_part(range);

        let suffixes = &self.suffix_space[..range.len];
        let has_special = suffixes
            .iter()
            .any(|s| self.encseq.is_special_at(s.to_usize(), self.readmode));

        if self.strategy.stream_suftab {
            debug!(
                "Distributed part {} ({} suffixes) in {:?}",
                self.next_part,
                range.len,
                now.elapsed()
            );
            return Ok(has_special);
        }

        let stats = self.sort_part(range);
        self.sort_stats = self.sort_stats.merge(stats);

        let suffixes = &self.suffix_space[..range.len];
        if self.strategy.check_sorted {
            check_sorted_suffixes(
                self.encseq,
                self.readmode,
                suffixes,
                self.max_depth.unwrap_or(0),
                false,
                false,
            );
        }

        if let Some(lcp_output) = self.lcp_output.as_mut() {
            let sorter =
                SuffixSorter::new(self.encseq, self.readmode, &self.strategy, self.max_depth);
            emit_lcp_values(&sorter, self.previous_suffix, suffixes, lcp_output)?;
        }

        if let Some(i) = suffixes.iter().position(|s| s.to_usize() == 0) {
            self.longest = Some(range.first_rank + i);
        }
        self.previous_suffix = suffixes.last().copied();

        debug!(
            "Sorted part {} ({} suffixes) in {:?}",
            self.next_part,
            range.len,
            now.elapsed()
        );
        Ok(has_special)
    }

    // --------------------------------------------------
    // Place every suffix of the part into its bucket, positions ascending
    fn fill_part(&mut self, range: &PartRange) {
        self.suffix_space.clear();
        self.suffix_space.resize(range.len, T::default());

        let mut next: Vec<usize> = Vec::with_capacity(range.last_code - range.first_code);
        let mut sum = 0;
        for &count in &self.bucket_table.counts[range.first_code..range.last_code] {
            next.push(sum);
            sum += count as usize;
        }

        let num_of_chars = self.bucket_table.num_of_chars;
        for pos in 0..=self.encseq.total_length() {
            let code =
                prefix_code(self.encseq, self.readmode, self.prefix_length, num_of_chars, pos);
            if (range.first_code..range.last_code).contains(&code) {
                let slot = &mut next[code - range.first_code];
                self.suffix_space[*slot] = T::from_usize(pos);
                *slot += 1;
            }
        }
    }

    // --------------------------------------------------
    fn sort_part(&mut self, range: &PartRange) -> SortStats {
        let sorter =
            SuffixSorter::new(self.encseq, self.readmode, &self.strategy, self.max_depth);
        let num_of_chars = self.bucket_table.num_of_chars;
        let prefix_length = self.prefix_length;

        let mut buckets = vec![];
        let mut rest: &mut [T] = &mut self.suffix_space[..range.len];
        for code in range.first_code..range.last_code {
            let width = self.bucket_table.counts[code] as usize;
            let (bucket, tail) = mem::take(&mut rest).split_at_mut(width);
            rest = tail;
            if width > 1 {
                buckets.push((bucket, bucket_depth(num_of_chars, prefix_length, code)));
            }
        }

        buckets
            .into_par_iter()
            .map(|(bucket, depth)| sorter.sort(bucket, depth))
            .reduce(SortStats::default, SortStats::merge)
    }

    // --------------------------------------------------
    /// Finish a streamed construction: the suffix table at `suftab_path`
    /// was written in bucket order; re-read it one bucket at a time, sort,
    /// and replace it with the sorted table while emitting LCP and BWT.
    pub fn post_sort_from_stream(
        &mut self,
        suftab_path: &Path,
        mut bwt_output: Option<&mut BwtWriter>,
    ) -> Result<()> {
        if !self.stream_pending {
            bail!("no streamed suffix table is waiting to be sorted");
        }

        let now = Instant::now();
        let res = self.sort_stream(suftab_path, bwt_output.as_deref_mut());
        match res {
            Ok(()) => {
                self.stream_pending = false;
                if let Some(lcp_output) = self.lcp_output.take() {
                    self.lcp_stats = Some(lcp_output.finish()?);
                }
                info!("Sorted the streamed suffix table in {:?}", now.elapsed());
                Ok(())
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    // --------------------------------------------------
    fn sort_stream(
        &mut self,
        suftab_path: &Path,
        mut bwt_output: Option<&mut BwtWriter>,
    ) -> Result<()> {
        let num_suffixes = self.encseq.total_length() + 1;
        let mut input: FileAccess<T> = FileAccess::new(suftab_path, 0, num_suffixes)?;
        let dir = suftab_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(dir).with_path(dir.display())?;
        let mut out = BufWriter::new(tmp.reopen().with_path(tmp.path().display())?);

        let sorter =
            SuffixSorter::new(self.encseq, self.readmode, &self.strategy, self.max_depth);
        let num_of_chars = self.bucket_table.num_of_chars;
        let mut reader = input.iter();
        let mut previous = None;
        let mut rank = 0;
        let mut stats = SortStats::default();

        for (code, &count) in self.bucket_table.counts.iter().enumerate() {
            let width = count as usize;
            if width == 0 {
                continue;
            }

            let mut bucket = reader
                .by_ref()
                .take(width)
                .collect::<Result<Vec<T>>>()?;
            if bucket.len() != width {
                bail!(SfxError::InternalConsistency(format!(
                    "streamed suffix table ended inside bucket {code}"
                )));
            }
            if width > 1 {
                let depth = bucket_depth(num_of_chars, self.prefix_length, code);
                stats = stats.merge(sorter.sort(&mut bucket, depth));
            }

            if let Some(lcp_output) = self.lcp_output.as_mut() {
                emit_lcp_values(&sorter, previous, &bucket, lcp_output)?;
            }
            if let Some(bwt) = bwt_output.as_deref_mut() {
                bwt.write_part(self.encseq, self.readmode, &bucket)?;
            }
            out.write_all(vec_to_slice_u8(&bucket))
                .with_path(tmp.path().display())?;

            if let Some(i) = bucket.iter().position(|s| s.to_usize() == 0) {
                self.longest = Some(rank + i);
            }
            previous = bucket.last().copied();
            rank += width;
        }

        out.flush().with_path(tmp.path().display())?;
        drop(out);
        tmp.persist(suftab_path)
            .map_err(|e| anyhow!(SfxError::io(suftab_path.display(), e.error)))?;
        self.sort_stats = self.sort_stats.merge(stats);
        Ok(())
    }
}

// --------------------------------------------------
/// Code of the first `prefix_length` symbols at `pos`; a prefix that
/// reaches a special symbol is padded with the largest regular symbol
#[inline(always)]
pub fn prefix_code<S: EncodedSequence + ?Sized>(
    encseq: &S,
    readmode: Readmode,
    prefix_length: usize,
    num_of_chars: usize,
    pos: usize,
) -> usize {
    let max_char = num_of_chars - 1;
    let mut code = 0;
    let mut padded = false;
    for j in 0..prefix_length {
        let digit = if padded {
            max_char
        } else {
            let c = encseq.char_or_end(pos + j, readmode);
            if is_special(c) {
                padded = true;
                max_char
            } else {
                c as usize
            }
        };
        code = code * num_of_chars + digit;
    }
    code
}

// --------------------------------------------------
/// Number of leading symbols every suffix in bucket `code` shares:
/// the digits before the first largest symbol, which may be padding
pub fn bucket_depth(num_of_chars: usize, prefix_length: usize, code: usize) -> usize {
    let mut divisor = num_of_chars.pow(prefix_length as u32 - 1);
    let mut depth = 0;
    while divisor > 0 && (code / divisor) % num_of_chars != num_of_chars - 1 {
        depth += 1;
        divisor /= num_of_chars;
    }
    depth
}

// --------------------------------------------------
pub fn count_buckets<S: EncodedSequence + ?Sized>(
    encseq: &S,
    readmode: Readmode,
    prefix_length: usize,
) -> BucketTable {
    let num_of_chars = encseq.num_of_chars();
    let mut table = BucketTable::new(num_of_chars, prefix_length);
    for pos in 0..=encseq.total_length() {
        table.counts[prefix_code(encseq, readmode, prefix_length, num_of_chars, pos)] += 1;
    }
    table
}

// --------------------------------------------------
/// Group consecutive buckets into parts, either a fixed number of them
/// or as many suffixes as fit in the memory ceiling
pub fn determine_parts<T>(
    table: &BucketTable,
    num_parts: Option<usize>,
    maximum_space: usize,
) -> Result<Vec<PartRange>> {
    let elem_size = mem::size_of::<T>();
    let num_suffixes: usize = table.counts.iter().map(|&c| c as usize).sum();
    let mut parts = vec![];
    let mut push = |first_code: usize, last_code: usize, first_rank: usize, len: usize| {
        if len > 0 {
            parts.push(PartRange {
                first_code,
                last_code,
                first_rank,
                len,
            })
        }
    };

    match num_parts {
        Some(num_parts) => {
            // Let the last part soak up the rest
            let per_part = num_suffixes.div_ceil(num_parts.max(1));
            let mut boundary = per_part;
            let (mut first_code, mut first_rank, mut taken) = (0, 0, 0);
            for (code, &count) in table.counts.iter().enumerate() {
                taken += count as usize;
                if taken >= boundary && boundary < num_suffixes {
                    push(first_code, code + 1, first_rank, taken - first_rank);
                    first_code = code + 1;
                    first_rank = taken;
                    while boundary <= taken {
                        boundary += per_part;
                    }
                }
            }
            push(first_code, table.num_of_codes(), first_rank, taken - first_rank);
        }
        None => {
            let budget = if maximum_space == 0 {
                num_suffixes
            } else {
                if maximum_space < elem_size {
                    bail!(SfxError::ResourceLimit(format!(
                        "memory limit of {maximum_space} bytes cannot hold \
                        a single suffix of {elem_size} bytes"
                    )));
                }
                let table_bytes = table.num_of_codes() * mem::size_of::<u64>();
                match maximum_space.checked_sub(table_bytes) {
                    Some(left) if left >= elem_size => left / elem_size,
                    _ => bail!(SfxError::ResourceLimit(format!(
                        "memory limit of {maximum_space} bytes leaves no room \
                        for suffixes after the bucket table of {table_bytes} bytes"
                    ))),
                }
            };

            let (mut first_code, mut first_rank, mut len) = (0, 0, 0);
            for (code, &count) in table.counts.iter().enumerate() {
                let count = count as usize;
                if len > 0 && len + count > budget {
                    push(first_code, code, first_rank, len);
                    first_code = code;
                    first_rank += len;
                    len = 0;
                }
                if count > budget {
                    warn!(
                        "Bucket {code} holds {count} suffixes, more than the \
                        {budget} that fit in the memory limit"
                    );
                }
                len += count;
            }
            push(first_code, table.num_of_codes(), first_rank, len);
        }
    }

    Ok(parts)
}

// --------------------------------------------------
fn emit_lcp_values<S, T>(
    sorter: &SuffixSorter<'_, S>,
    previous: Option<T>,
    suffixes: &[T],
    lcp_output: &mut LcpTableWriter,
) -> Result<()>
where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    let mut previous = previous;
    for chunk in suffixes.chunks(LCP_CHUNK) {
        let values: Vec<usize> = (0..chunk.len())
            .into_par_iter()
            .map(|i| {
                let prev = if i == 0 { previous } else { Some(chunk[i - 1]) };
                prev.map_or(0, |p| sorter.compare(p, chunk[i], 0).lcp)
            })
            .collect();
        for value in values {
            lcp_output.add(value)?;
        }
        previous = chunk.last().copied();
    }
    Ok(())
}
