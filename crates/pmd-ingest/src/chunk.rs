//! Fixed-size chunking of single-pass sequences
//!
//! Every batched stage (catalog lookups while preparing, writes while
//! executing) walks its input through [`range_chunk`], so one round trip is
//! made per chunk rather than per record. Each chunk is tagged with the
//! absolute index range it covers, which is what progress logging reports.

use std::num::NonZeroUsize;
use std::ops::Range;

/// Split `iter` into chunks of `size` items, tagging each with its index range
///
/// The source is consumed lazily and only once. Every chunk but the last has
/// exactly `size` items; the range of chunk `k` starts at `k * size` and its
/// length equals the number of items actually in the chunk.
pub fn range_chunk<I>(iter: I, size: NonZeroUsize) -> RangeChunks<I::IntoIter>
where
    I: IntoIterator,
{
    RangeChunks {
        inner: iter.into_iter(),
        size: size.get(),
        start: 0,
    }
}

/// Iterator returned by [`range_chunk`]
#[derive(Debug)]
pub struct RangeChunks<I> {
    inner: I,
    size: usize,
    start: usize,
}

impl<I: Iterator> Iterator for RangeChunks<I> {
    type Item = (Range<usize>, Vec<I::Item>);

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<I::Item> = self.inner.by_ref().take(self.size).collect();
        if chunk.is_empty() {
            return None;
        }

        let range = self.start..self.start + chunk.len();
        self.start += self.size;
        Some((range, chunk))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.inner.size_hint();
        (
            lower.div_ceil(self.size),
            upper.map(|u| u.div_ceil(self.size)),
        )
    }
}

/// Render a chunk range as the inclusive `first-last` pair used in progress logs
pub fn display_range(range: &Range<usize>) -> String {
    format!("{}-{}", range.start, range.end.saturating_sub(1))
}
