//! Completion event queue.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::interner::StageIdx;

/// A scheduled stage completion.
///
/// Ordered lexicographically by `(time, seq)` so simultaneous completions
/// pop in insertion order.
#[derive(Clone, Copy, Debug)]
pub struct CompletionEvent {
    pub time: f64,
    pub seq: u64,
    pub stage: StageIdx,
}

impl PartialEq for CompletionEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CompletionEvent {}

impl PartialOrd for CompletionEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompletionEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-queue of completion events.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<CompletionEvent>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `stage` to complete at `time`.
    pub fn push(&mut self, stage: StageIdx, time: f64) {
        let event = CompletionEvent {
            time,
            seq: self.next_seq,
            stage,
        };
        self.next_seq += 1;
        self.heap.push(Reverse(event));
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<CompletionEvent> {
        self.heap.pop().map(|Reverse(event)| event)
    }

    pub fn peek(&self) -> Option<&CompletionEvent> {
        self.heap.peek().map(|Reverse(event)| event)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop all events and restart the sequence counter.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}
