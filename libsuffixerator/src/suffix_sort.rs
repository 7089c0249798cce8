use crate::{
    encseq::EncodedSequence,
    options::SortStrategy,
    types::{is_special, Comparison, FromUsize, Int, Readmode, SortStats},
    verify::compare_suffixes_from,
};
use rand::Rng;
use std::{cmp::Ordering, mem};

// --------------------------------------------------
/// Sorts buckets of suffixes known to share a common prefix, picking
/// the algorithm by bucket width
#[derive(Debug)]
pub struct SuffixSorter<'a, S: EncodedSequence + ?Sized> {
    encseq: &'a S,
    readmode: Readmode,
    strategy: &'a SortStrategy,
    num_of_chars: usize,

    /// 0 sorts completely
    max_depth: usize,
}

impl<'a, S> SuffixSorter<'a, S>
where
    S: EncodedSequence + ?Sized,
{
    pub fn new(
        encseq: &'a S,
        readmode: Readmode,
        strategy: &'a SortStrategy,
        max_depth: Option<usize>,
    ) -> Self {
        SuffixSorter {
            encseq,
            readmode,
            strategy,
            num_of_chars: encseq.num_of_chars(),
            max_depth: max_depth.unwrap_or(0),
        }
    }

    // --------------------------------------------------
    // Regular symbols map to themselves, every special to num_of_chars
    #[inline(always)]
    fn key(&self, pos: usize, depth: usize) -> usize {
        let c = self.encseq.char_or_end(pos + depth, self.readmode);
        if is_special(c) {
            self.num_of_chars
        } else {
            c as usize
        }
    }

    // --------------------------------------------------
    /// Total order on suffixes: ties left by the depth limit are broken
    /// by position
    #[inline(always)]
    pub fn compare<T>(&self, a: T, b: T, offset: usize) -> Comparison
    where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        let res = compare_suffixes_from(
            self.encseq,
            self.readmode,
            a.to_usize(),
            b.to_usize(),
            offset,
            self.max_depth,
            false,
            false,
        );
        if res.cmp == Ordering::Equal {
            Comparison {
                cmp: a.cmp(&b),
                lcp: res.lcp,
            }
        } else {
            res
        }
    }

    // --------------------------------------------------
    /// Sort `suffixes`, all of which share their first `depth` symbols
    pub fn sort<T>(&self, suffixes: &mut [T], depth: usize) -> SortStats
    where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        let mut stats = SortStats::default();
        let mut stack = vec![(0, suffixes.len(), depth)];

        while let Some((start, end, depth)) = stack.pop() {
            let width = end - start;
            if width < 2 {
                continue;
            }

            let bucket = &mut suffixes[start..end];
            if self.max_depth > 0 && depth >= self.max_depth {
                bucket.sort_unstable();
                stats.position_sorts += 1;
            } else if width <= self.strategy.max_insertion_sort {
                self.insertion_sort(bucket, depth);
                stats.insertion_sorts += 1;
            } else if width <= self.strategy.max_merge_sort {
                let mut sa_w = bucket.to_vec();
                let mut lcp = vec![depth; width];
                let mut lcp_w = vec![depth; width];
                self.merge_sort(&mut sa_w, bucket, width, &mut lcp, &mut lcp_w, depth);
                stats.merge_sorts += 1;
            } else if width <= self.strategy.max_counting_sort {
                self.counting_sort(bucket, start, depth, &mut stack);
                stats.counting_sorts += 1;
            } else {
                self.quick_sort_step(bucket, start, depth, &mut stack);
                stats.quick_sorts += 1;
            }
        }

        stats
    }

    // --------------------------------------------------
    fn insertion_sort<T>(&self, bucket: &mut [T], depth: usize)
    where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        for i in 1..bucket.len() {
            let mut j = i;
            while j > 0
                && self.compare(bucket[j - 1], bucket[j], depth).cmp == Ordering::Greater
            {
                bucket.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    // --------------------------------------------------
    // LCP-aware merge sort; the result lands in `y` with the LCP of each
    // suffix and its predecessor in `lcp`
    fn merge_sort<T>(
        &self,
        x: &mut [T],
        y: &mut [T],
        n: usize,
        lcp: &mut [usize],
        lcp_w: &mut [usize],
        depth: usize,
    ) where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        if n == 1 {
            lcp[0] = depth;
        } else {
            let mid = n / 2;
            self.merge_sort(
                &mut y[..mid],
                &mut x[..mid],
                mid,
                &mut lcp_w[..mid],
                &mut lcp[..mid],
                depth,
            );

            self.merge_sort(
                &mut y[mid..],
                &mut x[mid..],
                n - mid,
                &mut lcp_w[mid..],
                &mut lcp[mid..],
                depth,
            );

            self.merge(x, mid, lcp_w, y, lcp, depth);
        }
    }

    // --------------------------------------------------
    fn merge<T>(
        &self,
        suffixes: &mut [T],
        mid: usize,
        lcp_w: &mut [usize],
        target_sa: &mut [T],
        target_lcp: &mut [usize],
        depth: usize,
    ) where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        let (mut x, mut y) = suffixes.split_at_mut(mid);
        let (mut lcp_x, mut lcp_y) = lcp_w.split_at_mut(mid);
        let mut len_x = x.len();
        let mut len_y = y.len();
        let mut m = depth; // LCP of the last suffix taken and y[idx_y]
        let mut idx_x = 0;
        let mut idx_y = 0;
        let mut idx_target = 0;

        while idx_x < len_x && idx_y < len_y {
            let l_x = lcp_x[idx_x];
            let take_x = match l_x.cmp(&m) {
                Ordering::Greater => {
                    target_sa[idx_target] = x[idx_x];
                    target_lcp[idx_target] = l_x;
                    true
                }
                Ordering::Less => {
                    target_sa[idx_target] = y[idx_y];
                    target_lcp[idx_target] = m;
                    m = l_x;
                    false
                }
                Ordering::Equal => {
                    let res = self.compare(x[idx_x], y[idx_y], m);
                    let take_x = res.cmp == Ordering::Less;
                    target_sa[idx_target] = if take_x { x[idx_x] } else { y[idx_y] };
                    target_lcp[idx_target] = m;
                    m = res.lcp;
                    take_x
                }
            };

            if take_x {
                idx_x += 1;
            } else {
                idx_y += 1;
                mem::swap(&mut x, &mut y);
                mem::swap(&mut len_x, &mut len_y);
                mem::swap(&mut lcp_x, &mut lcp_y);
                mem::swap(&mut idx_x, &mut idx_y);
            }

            idx_target += 1;
        }

        while idx_x < len_x {
            target_sa[idx_target] = x[idx_x];
            target_lcp[idx_target] = lcp_x[idx_x];
            idx_x += 1;
            idx_target += 1;
        }

        if idx_y < len_y {
            target_sa[idx_target] = y[idx_y];
            target_lcp[idx_target] = m;
            idx_y += 1;
            idx_target += 1;

            while idx_y < len_y {
                target_sa[idx_target] = y[idx_y];
                target_lcp[idx_target] = lcp_y[idx_y];
                idx_y += 1;
                idx_target += 1;
            }
        }
    }

    // --------------------------------------------------
    // Distribute by the symbol at `depth`; regular groups are pushed for
    // sorting one symbol deeper, the special group is ordered by position
    fn counting_sort<T>(
        &self,
        bucket: &mut [T],
        offset: usize,
        depth: usize,
        stack: &mut Vec<(usize, usize, usize)>,
    ) where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        let keys: Vec<usize> = bucket
            .iter()
            .map(|s| self.key(s.to_usize(), depth))
            .collect();
        let mut counts = vec![0usize; self.num_of_chars + 1];
        for &key in &keys {
            counts[key] += 1;
        }

        let mut next = Vec::with_capacity(counts.len());
        let mut sum = 0;
        for &count in &counts {
            next.push(sum);
            sum += count;
        }

        let mut sorted = vec![T::default(); bucket.len()];
        for (&suffix, &key) in bucket.iter().zip(&keys) {
            sorted[next[key]] = suffix;
            next[key] += 1;
        }
        bucket.copy_from_slice(&sorted);

        let mut start = 0;
        for (key, &count) in counts.iter().enumerate() {
            if count > 1 {
                if key == self.num_of_chars {
                    bucket[start..start + count].sort_unstable();
                } else {
                    stack.push((offset + start, offset + start + count, depth + 1));
                }
            }
            start += count;
        }
    }

    // --------------------------------------------------
    // One multikey quicksort partitioning step around a random pivot
    fn quick_sort_step<T>(
        &self,
        bucket: &mut [T],
        offset: usize,
        depth: usize,
        stack: &mut Vec<(usize, usize, usize)>,
    ) where
        T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
    {
        let width = bucket.len();
        let rng = &mut rand::thread_rng();
        let mut samples: Vec<usize> = (0..3)
            .map(|_| self.key(bucket[rng.gen_range(0..width)].to_usize(), depth))
            .collect();
        samples.sort_unstable();
        let pivot = samples[1];

        // Dutch flag: [0, lt) < pivot, [lt, i) == pivot, (gt, width) > pivot
        let mut lt = 0;
        let mut i = 0;
        let mut gt = width;
        while i < gt {
            match self.key(bucket[i].to_usize(), depth).cmp(&pivot) {
                Ordering::Less => {
                    bucket.swap(lt, i);
                    lt += 1;
                    i += 1;
                }
                Ordering::Greater => {
                    gt -= 1;
                    bucket.swap(i, gt);
                }
                Ordering::Equal => i += 1,
            }
        }

        stack.push((offset, offset + lt, depth));
        stack.push((offset + gt, offset + width, depth));
        if pivot == self.num_of_chars {
            bucket[lt..gt].sort_unstable();
        } else {
            stack.push((offset + lt, offset + gt, depth + 1));
        }
    }
}

// --------------------------------------------------
#[cfg(test)]
mod test {
    use super::SuffixSorter;
    use crate::{
        encseq::{Alphabet, EncSeq, EncodedSequence},
        options::SortStrategy,
        types::Readmode,
        verify::{check_sorted_suffixes, compare_suffixes},
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::cmp::Ordering;

    fn random_dna(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|_| b"ACGTACGTACGTN"[rng.gen_range(0..13)])
            .collect()
    }

    fn naive_sort(encseq: &EncSeq, readmode: Readmode) -> Vec<u32> {
        let mut suffixes: Vec<u32> = (0..=encseq.total_length() as u32).collect();
        suffixes.sort_by(|&a, &b| {
            match compare_suffixes(encseq, readmode, a as usize, b as usize, 0, false, false)
                .cmp
            {
                Ordering::Equal => a.cmp(&b),
                cmp => cmp,
            }
        });
        suffixes
    }

    #[test]
    fn test_sort_small() {
        //                                           012345
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &["TTTAGC"]);
        let strategy = SortStrategy::default();
        let sorter = SuffixSorter::new(&encseq, Readmode::Forward, &strategy, None);
        let mut suffixes: Vec<u32> = (0..=6).collect();
        let stats = sorter.sort(&mut suffixes, 0);
        assert_eq!(suffixes, [3, 5, 4, 2, 1, 0, 6]);
        assert_eq!(stats.insertion_sorts, 1);
    }

    #[test]
    fn test_each_algorithm() -> Result<()> {
        let seq = random_dna(600, 1);
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &[&seq[..300], &seq[300..]]);
        for readmode in [
            Readmode::Forward,
            Readmode::Reverse,
            Readmode::Complement,
            Readmode::ReverseComplement,
        ] {
            let expected = naive_sort(&encseq, readmode);
            for bounds in [[1, 1, 1], [1, 1, 10_000], [1, 10_000, 10_000], [10_000; 3]]
            {
                let strategy = SortStrategy::default().with_bounds(&bounds)?;
                let sorter = SuffixSorter::new(&encseq, readmode, &strategy, None);
                let mut suffixes: Vec<u32> = (0..=encseq.total_length() as u32).collect();
                sorter.sort(&mut suffixes, 0);
                assert_eq!(suffixes, expected, "{readmode} {bounds:?}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_merge_sort_u64() -> Result<()> {
        let seq = random_dna(200, 7);
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &[&seq]);
        let strategy = SortStrategy::default().with_bounds(&[2, 1000, 1000])?;
        let sorter = SuffixSorter::new(&encseq, Readmode::Forward, &strategy, None);
        let mut suffixes: Vec<u64> = (0..=200).rev().collect();
        let stats = sorter.sort(&mut suffixes, 0);
        assert_eq!(stats.merge_sorts, 1);
        let expected: Vec<u64> = naive_sort(&encseq, Readmode::Forward)
            .into_iter()
            .map(|s| s as u64)
            .collect();
        assert_eq!(suffixes, expected);
        Ok(())
    }

    #[test]
    fn test_long_repeat() {
        // Deep equal-key recursion must not blow the stack
        let seq = vec![b'A'; 5000];
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &[&seq]);
        let strategy = SortStrategy::default();
        let sorter = SuffixSorter::new(&encseq, Readmode::Forward, &strategy, None);
        let mut suffixes: Vec<u32> = (0..=5000).collect();
        sorter.sort(&mut suffixes, 0);
        // Longer runs of A sort first
        let expected: Vec<u32> = (0..=5000).collect();
        assert_eq!(suffixes, expected);
    }

    #[test]
    fn test_max_depth() {
        let seq = random_dna(500, 3);
        let encseq = EncSeq::from_sequences(Alphabet::Dna, &[&seq]);
        let strategy = SortStrategy::default();
        let sorter = SuffixSorter::new(&encseq, Readmode::Forward, &strategy, Some(3));
        let mut suffixes: Vec<u32> = (0..=500).rev().collect();
        sorter.sort(&mut suffixes, 0);
        check_sorted_suffixes(&encseq, Readmode::Forward, &suffixes, 3, false, false);

        // Ties beyond the depth are ordered by position
        for pair in suffixes.windows(2) {
            let res = compare_suffixes(
                &encseq,
                Readmode::Forward,
                pair[0] as usize,
                pair[1] as usize,
                3,
                false,
                false,
            );
            if res.cmp == Ordering::Equal {
                assert!(pair[0] < pair[1]);
            }
        }
    }
}
