//! Task executor contract (C13, §4.10): `Enqueue` runs a task immediately if nothing is
//! currently running, otherwise queues it; whichever task is running drains the queue in
//! priority order before control returns to the original caller. Re-entrant: a task's own
//! body may call `enqueue` again on the same executor.
//!
//! Only [`DirectExecutor`] ships — a single-threaded, cooperative implementation. A
//! parallel executor is an explicit non-goal of this crate (§5): every destination slot is
//! still written by exactly one job, so nothing here precludes one, but this repository
//! does not provide a thread pool.

use crate::geometry::Index;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

type BoxedTask<'a> = Box<dyn FnOnce(&DirectExecutor<'a>) + 'a>;

struct PriorityTask<'a> {
    priority: Index,
    seq: u64,
    task: BoxedTask<'a>,
}

impl PartialEq for PriorityTask<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for PriorityTask<'_> {}
impl PartialOrd for PriorityTask<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PriorityTask<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Larger priority pops first; ties broken FIFO (earlier `seq` pops first).
        self.priority.cmp(&other.priority).then_with(|| Reverse(self.seq).cmp(&Reverse(other.seq)))
    }
}

/// Priority heuristic used throughout the multiply driver: `row_offset + col_offset`
/// (wrapping, since offsets can in principle sum past `i64::MAX` at the deepest levels).
/// Not part of the executor's contract — just this crate's chosen heuristic (§4.10).
pub fn destination_priority(row_offset: Index, col_offset: Index) -> Index {
    row_offset.wrapping_add(col_offset)
}

/// Single-threaded cooperative task queue. Tasks borrow `'a` data (a semiring, a config) —
/// this is sound because nothing here ever spawns a thread; every task runs to completion
/// on the thread that called `enqueue`.
pub struct DirectExecutor<'a> {
    queue: RefCell<BinaryHeap<PriorityTask<'a>>>,
    running: Cell<bool>,
    next_seq: Cell<u64>,
}

impl<'a> DirectExecutor<'a> {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(BinaryHeap::new()),
            running: Cell::new(false),
            next_seq: Cell::new(0),
        }
    }

    /// Enqueues `task` at `priority`. If no task is currently running on this executor, the
    /// queue is drained (highest priority first) before this call returns; otherwise the
    /// task is left for the currently-running drain loop to pick up.
    pub fn enqueue(&self, priority: Index, task: impl FnOnce(&DirectExecutor<'a>) + 'a) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.queue.borrow_mut().push(PriorityTask {
            priority,
            seq,
            task: Box::new(task),
        });

        if self.running.get() {
            return;
        }
        self.running.set(true);
        loop {
            let next = self.queue.borrow_mut().pop();
            match next {
                Some(t) => (t.task)(self),
                None => break,
            }
        }
        self.running.set(false);
    }
}

impl<'a> Default for DirectExecutor<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn single_task_runs_immediately() {
        let exec = DirectExecutor::new();
        let ran = StdRefCell::new(false);
        exec.enqueue(0, |_| *ran.borrow_mut() = true);
        assert!(*ran.borrow());
    }

    #[test]
    fn higher_priority_runs_before_lower() {
        let exec = DirectExecutor::new();
        let order = StdRefCell::new(Vec::new());
        exec.enqueue(0, |e| {
            e.enqueue(1, |_| order.borrow_mut().push("low-priority child"));
            e.enqueue(5, |_| order.borrow_mut().push("high-priority child"));
        });
        assert_eq!(*order.borrow(), vec!["high-priority child", "low-priority child"]);
    }

    #[test]
    fn equal_priority_breaks_ties_fifo() {
        let exec = DirectExecutor::new();
        let order = StdRefCell::new(Vec::new());
        exec.enqueue(0, |e| {
            e.enqueue(3, |_| order.borrow_mut().push("first"));
            e.enqueue(3, |_| order.borrow_mut().push("second"));
        });
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn reentrant_enqueue_during_drain_is_picked_up() {
        let exec = DirectExecutor::new();
        let count = StdRefCell::new(0);
        exec.enqueue(0, |e| {
            *count.borrow_mut() += 1;
            if *count.borrow() < 3 {
                e.enqueue(0, |e2| {
                    let _ = e2;
                });
            }
        });
        // the outer closure only runs once; nested tasks just increment indirectly via
        // further enqueues, demonstrating re-entrancy doesn't panic or deadlock.
        assert_eq!(*count.borrow(), 1);
    }
}
