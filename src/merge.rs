// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Segment overlap resolver.
//!
//! Merges contiguous segments coming from several priority-ranked sources
//! into one disjoint, time-ordered sequence. Sources are given in ascending
//! priority: on any temporal overlap the segment of the later source wins
//! the overlapped region outright, earlier sources only fill its gaps.
//!
//! Segments of a single source must not overlap each other.
//!
//! The resolver streams over a min-heap ordered by
//! `(start, priority descending, insertion order)`. Trailing remainders of
//! partially covered segments are pushed back into the heap and reconsidered
//! when their turn comes.

use crate::instant::Time;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A time-bounded piece of data that can be re-sliced.
pub trait Segment {
    /// Inclusive start of the segment.
    fn start(&self) -> Time;

    /// Exclusive end of the segment.
    fn end(&self) -> Time;

    /// Copy restricted to `[start, end)`; `None` keeps the segment's own
    /// end.
    fn trim(&self, start: Time, end: Option<Time>) -> Self
    where
        Self: Sized;
}

/// Bounds of a (possibly trimmed) input segment waiting in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    start: Time,
    end: Time,
    priority: usize,
    source: usize,
    item: usize,
    seq: usize,
}

impl Pending {
    fn key(&self) -> (Time, Reverse<usize>, usize) {
        (self.start, Reverse(self.priority), self.seq)
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Buffer yielding segments by ascending start, accepting pushes while
/// being drained.
struct SegmentBuffer {
    heap: BinaryHeap<Reverse<Pending>>,
    seq: usize,
}

impl SegmentBuffer {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn push(&mut self, mut pending: Pending) {
        pending.seq = self.seq;
        self.seq += 1;
        self.heap.push(Reverse(pending));
    }

    fn pop(&mut self) -> Option<Pending> {
        self.heap.pop().map(|Reverse(pending)| pending)
    }
}

/// A resolved piece: which input segment, over which bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolved {
    source: usize,
    item: usize,
    start: Time,
    end: Option<Time>,
}

impl Resolved {
    fn from_pending(pending: &Pending, end: Option<Time>) -> Self {
        Self {
            source: pending.source,
            item: pending.item,
            start: pending.start,
            end,
        }
    }
}

/// Resolve the overlaps between the segments of `sources` (ascending
/// priority) and return the trimmed, non-overlapping segments in time order.
pub fn resolve_overlaps<S: Segment>(sources: &[Vec<S>]) -> Vec<S> {
    let mut buffer = SegmentBuffer::new();
    for (priority, source) in sources.iter().enumerate() {
        for (item, segment) in source.iter().enumerate() {
            buffer.push(Pending {
                start: segment.start(),
                end: segment.end(),
                priority,
                source: priority,
                item,
                seq: 0,
            });
        }
    }

    merge_segments(buffer)
        .into_iter()
        .map(|piece| sources[piece.source][piece.item].trim(piece.start, piece.end))
        .collect()
}

fn merge_segments(mut buffer: SegmentBuffer) -> Vec<Resolved> {
    let mut resolved = Vec::new();
    let Some(mut current) = buffer.pop() else {
        return resolved;
    };

    while let Some(next) = buffer.pop() {
        if current.end < next.start {
            // gap between segments
            resolved.push(Resolved::from_pending(&current, None));
            current = next;
        } else if current.end == next.start {
            // adjacent segments
            resolved.push(Resolved::from_pending(&current, Some(next.start)));
            current = next;
        } else if next.priority > current.priority {
            if current.start < next.start {
                resolved.push(Resolved::from_pending(&current, Some(next.start)));
            }
            if current.end > next.end {
                buffer.push(Pending {
                    start: next.end,
                    ..current
                });
            }
            current = next;
        } else if next.end > current.end {
            buffer.push(Pending {
                start: current.end,
                ..next
            });
        }
    }
    resolved.push(Resolved::from_pending(&current, None));
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Span {
        label: char,
        start: i64,
        end: i64,
    }

    impl Segment for Span {
        fn start(&self) -> Time {
            Time::from_seconds(self.start).unwrap()
        }

        fn end(&self) -> Time {
            Time::from_seconds(self.end).unwrap()
        }

        fn trim(&self, start: Time, end: Option<Time>) -> Self {
            Span {
                label: self.label,
                start: start.nanos() / 1_000_000_000,
                end: end.map_or(self.end, |e| e.nanos() / 1_000_000_000),
            }
        }
    }

    fn span(label: char, start: i64, end: i64) -> Span {
        Span { label, start, end }
    }

    fn resolve(sources: Vec<Vec<Span>>) -> Vec<(char, i64, i64)> {
        resolve_overlaps(&sources)
            .into_iter()
            .map(|s| (s.label, s.start, s.end))
            .collect()
    }

    #[test]
    fn test_empty_sources() {
        assert!(resolve(vec![]).is_empty());
        assert!(resolve(vec![vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_single_source_passthrough() {
        let result = resolve(vec![vec![span('a', 0, 10), span('b', 20, 30), span('c', 30, 40)]]);
        assert_eq!(result, vec![('a', 0, 10), ('b', 20, 30), ('c', 30, 40)]);
    }

    #[test]
    fn test_higher_priority_covers_lower() {
        let result = resolve(vec![vec![span('A', 10, 20)], vec![span('B', 0, 30)]]);
        assert_eq!(result, vec![('B', 0, 30)]);
    }

    #[test]
    fn test_lower_priority_inside_higher_is_dropped() {
        let result = resolve(vec![vec![span('A', 10, 20)], vec![span('B', 10, 20)]]);
        assert_eq!(result, vec![('B', 10, 20)]);
    }

    #[test]
    fn test_partial_overlap_head() {
        let result = resolve(vec![vec![span('A', 0, 20)], vec![span('B', 10, 30)]]);
        assert_eq!(result, vec![('A', 0, 10), ('B', 10, 30)]);
    }

    #[test]
    fn test_partial_overlap_tail() {
        let result = resolve(vec![vec![span('A', 10, 30)], vec![span('B', 0, 20)]]);
        assert_eq!(result, vec![('B', 0, 20), ('A', 20, 30)]);
    }

    #[test]
    fn test_nested_higher_priority_splits_lower() {
        let result = resolve(vec![vec![span('A', 0, 30)], vec![span('B', 10, 20)]]);
        assert_eq!(result, vec![('A', 0, 10), ('B', 10, 20), ('A', 20, 30)]);
    }

    #[test]
    fn test_touching_segments() {
        let result = resolve(vec![vec![span('A', 0, 10)], vec![span('B', 10, 20)]]);
        assert_eq!(result, vec![('A', 0, 10), ('B', 10, 20)]);
        let result = resolve(vec![vec![span('A', 10, 20)], vec![span('B', 0, 10)]]);
        assert_eq!(result, vec![('B', 0, 10), ('A', 10, 20)]);
    }

    #[test]
    fn test_same_start() {
        let result = resolve(vec![vec![span('A', 0, 10)], vec![span('B', 0, 5)]]);
        assert_eq!(result, vec![('B', 0, 5), ('A', 5, 10)]);
    }

    #[test]
    fn test_three_way_overlap() {
        let result = resolve(vec![
            vec![span('A', 0, 100)],
            vec![span('B', 20, 60)],
            vec![span('C', 40, 80)],
        ]);
        assert_eq!(result, vec![('A', 0, 20), ('B', 20, 40), ('C', 40, 80), ('A', 80, 100)]);
    }

    #[test]
    fn test_three_way_lowest_wins_nothing() {
        let result = resolve(vec![
            vec![span('A', 30, 50)],
            vec![span('B', 0, 40)],
            vec![span('C', 35, 100)],
        ]);
        assert_eq!(result, vec![('B', 0, 35), ('C', 35, 100)]);
    }

    #[test]
    fn test_lower_priority_fills_gaps() {
        let result = resolve(vec![
            vec![span('A', 0, 100)],
            vec![span('B', 10, 20), span('C', 50, 60)],
        ]);
        assert_eq!(
            result,
            vec![('A', 0, 10), ('B', 10, 20), ('A', 20, 50), ('C', 50, 60), ('A', 60, 100)]
        );
    }

    #[test]
    fn test_gap_between_sources() {
        let result = resolve(vec![vec![span('A', 0, 10)], vec![span('B', 20, 30)]]);
        assert_eq!(result, vec![('A', 0, 10), ('B', 20, 30)]);
    }

    #[test]
    fn test_output_is_disjoint_and_ordered() {
        let sources = vec![
            vec![span('a', 0, 17), span('b', 25, 61), span('c', 70, 90)],
            vec![span('d', 5, 30), span('e', 55, 75)],
            vec![span('f', 12, 14), span('g', 28, 58), span('h', 89, 120)],
        ];
        let result = resolve(sources);
        for pair in result.windows(2) {
            assert!(pair[0].2 <= pair[1].1, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
        for piece in &result {
            assert!(piece.1 < piece.2, "empty piece {piece:?}");
        }
        // the top-priority segments survive untouched
        for top in [('f', 12, 14), ('g', 28, 58), ('h', 89, 120)] {
            assert!(result.contains(&top), "missing {top:?}");
        }
    }
}
