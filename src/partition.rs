//! Splitting an index range into contiguous partitions owned by execution contexts.

use crate::context::ExecutionContext;
use crate::error::ConfigError;

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How chunks of a range are assigned to contexts.
///
/// - Block: each context receives one contiguous slice of the range, roughly range.len()/num contexts indices
/// - Cyclic: chunks are dealt to the contexts round robin, chunk k goes to context k % num contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Distribution {
    #[default]
    Block,
    Cyclic,
}

/// A contiguous sub-range `[start, end)` of work indices assigned to one context.
///
/// `start <= end` always holds, a reversed range becomes an empty partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    start: i64,
    end: i64,
    pub owner: ExecutionContext,
}

impl Partition {
    pub fn new(range: Range<i64>, owner: ExecutionContext) -> Partition {
        Partition {
            start: range.start,
            end: range.end.max(range.start),
            owner,
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Saturates at `usize::MAX` where `usize` is narrower than the range.
    pub fn len(&self) -> usize {
        usize::try_from(self.end.abs_diff(self.start)).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn range(&self) -> Range<i64> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexPartitioner {
    distribution: Distribution,
}

impl IndexPartitioner {
    pub fn new(distribution: Distribution) -> IndexPartitioner {
        IndexPartitioner { distribution }
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// Partition `range` over `contexts` in units of `chunk_size` indices.
    ///
    /// With [Distribution::Block] every context gets exactly one (possibly empty) partition,
    /// in context order. With [Distribution::Cyclic] there is one partition per chunk.
    /// An empty range yields no partitions.
    pub fn partition(
        &self,
        range: Range<i64>,
        contexts: &[ExecutionContext],
        chunk_size: usize,
    ) -> Result<Vec<Partition>, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(0));
        }
        if range.end <= range.start || contexts.is_empty() {
            return Ok(Vec::new());
        }
        // offsets from range.start fit in u64 even when the range spans all of i64
        let num_elems = range.end.abs_diff(range.start);
        let chunk = chunk_size as u64;
        let num_chunks = num_elems / chunk + u64::from(num_elems % chunk != 0);
        let chunk_start = |c: u64| -> i64 {
            let offset = c.saturating_mul(chunk).min(num_elems);
            range.start.wrapping_add(offset as i64)
        };

        let parts = match self.distribution {
            Distribution::Block => {
                let num_ctx = contexts.len() as u128;
                let bound = |i: usize| (i as u128 * num_chunks as u128 / num_ctx) as u64;
                contexts
                    .iter()
                    .enumerate()
                    .map(|(i, ctx)| {
                        let first = bound(i);
                        let last = bound(i + 1);
                        Partition::new(chunk_start(first)..chunk_start(last), ctx.clone())
                    })
                    .collect()
            }
            Distribution::Cyclic => (0..num_chunks)
                .map(|c| {
                    let ctx = &contexts[(c % contexts.len() as u64) as usize];
                    Partition::new(chunk_start(c)..chunk_start(c + 1), ctx.clone())
                })
                .collect(),
        };
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn contexts(n: usize) -> Vec<ExecutionContext> {
        (0..n)
            .map(|i| ExecutionContext::new(i, n, format!("pe{i}")))
            .collect()
    }

    fn assert_exact_cover(parts: &[Partition], range: Range<i64>) {
        let mut covered: Vec<i64> = parts.iter().flat_map(|p| p.range()).collect();
        covered.sort();
        let expected: Vec<i64> = range.collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn two_contexts_chunk_one() {
        let ctxs = contexts(2);
        let parts = IndexPartitioner::default()
            .partition(0..10, &ctxs, 1)
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].range(), 0..5);
        assert_eq!(parts[0].owner.ordinal(), 0);
        assert_eq!(parts[1].range(), 5..10);
        assert_eq!(parts[1].owner.ordinal(), 1);
        assert_exact_cover(&parts, 0..10);
    }

    #[test]
    fn empty_and_reversed_ranges() {
        let ctxs = contexts(3);
        for dist in [Distribution::Block, Distribution::Cyclic] {
            let p = IndexPartitioner::new(dist);
            assert!(p.partition(5..5, &ctxs, 2).unwrap().is_empty());
            assert!(p.partition(7..3, &ctxs, 2).unwrap().is_empty());
        }
    }

    #[test]
    fn zero_chunk_size_fails() {
        let ctxs = contexts(2);
        for range in [0..10, 3..3] {
            assert_eq!(
                IndexPartitioner::default().partition(range, &ctxs, 0),
                Err(ConfigError::InvalidChunkSize(0))
            );
        }
    }

    #[test]
    fn fewer_indices_than_contexts() {
        let ctxs = contexts(5);
        let parts = IndexPartitioner::default().partition(0..3, &ctxs, 1).unwrap();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts.iter().filter(|p| p.is_empty()).count(), 2);
        assert_exact_cover(&parts, 0..3);
    }

    #[test]
    fn chunks_are_not_split_across_contexts() {
        let ctxs = contexts(3);
        let parts = IndexPartitioner::default().partition(-4..17, &ctxs, 4).unwrap();
        for p in &parts {
            assert_eq!((p.start() + 4) % 4, 0, "partition {:?} starts mid chunk", p.range());
        }
        assert_exact_cover(&parts, -4..17);

        let parts = IndexPartitioner::new(Distribution::Cyclic)
            .partition(-4..17, &ctxs, 4)
            .unwrap();
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[4].owner.ordinal(), 1);
        assert_eq!(parts[5].range(), 16..17);
        assert_exact_cover(&parts, -4..17);
    }

    #[test]
    fn ranges_spanning_all_of_i64() {
        for n in [2, 3, 7] {
            let ctxs = contexts(n);
            for range in [i64::MIN..i64::MAX, 0..i64::MAX, i64::MIN..0] {
                let parts = IndexPartitioner::default()
                    .partition(range.clone(), &ctxs, 1)
                    .unwrap();
                assert_eq!(parts.len(), n);
                assert_eq!(parts[0].start(), range.start);
                assert_eq!(parts[n - 1].end(), range.end);
                for w in parts.windows(2) {
                    assert_eq!(w[0].end(), w[1].start());
                }
                let total: u128 = parts.iter().map(|p| p.len() as u128).sum();
                assert_eq!(total, range.end.abs_diff(range.start) as u128);
            }
        }

        let parts = IndexPartitioner::new(Distribution::Cyclic)
            .partition(i64::MIN..i64::MAX, &contexts(3), (1u64 << 63) as usize)
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].range(), i64::MIN..0);
        assert_eq!(parts[1].range(), 0..i64::MAX);
    }

    #[test]
    fn reversed_partition_is_empty() {
        let p = Partition::new(5..3, ExecutionContext::new(0, 1, "pe0"));
        assert!(p.is_empty());
        assert_eq!(p.len(), 0);
        assert_eq!(p.range(), 5..5);
    }

    #[test]
    fn random_ranges_are_covered_exactly_once() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let lo = rng.gen_range(-1000i64..1000);
            let len = rng.gen_range(0i64..300);
            let n = rng.gen_range(1usize..12);
            let chunk = rng.gen_range(1usize..20);
            let ctxs = contexts(n);
            for dist in [Distribution::Block, Distribution::Cyclic] {
                let parts = IndexPartitioner::new(dist)
                    .partition(lo..lo + len, &ctxs, chunk)
                    .unwrap();
                assert_exact_cover(&parts, lo..lo + len);
                if dist == Distribution::Block && len > 0 {
                    assert_eq!(parts.len(), n);
                    // contiguous and ordered
                    for w in parts.windows(2) {
                        assert_eq!(w[0].end(), w[1].start());
                    }
                }
            }
        }
    }
}
