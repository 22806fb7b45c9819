//! A FIFO throttle on concurrently in-flight fetches from a remote source.
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::cancel::CancelToken;

const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// How often a parked caller rechecks its cancel token.
const PENDING_POLL: Duration = Duration::from_millis(25);

struct QueueState {
    in_flight: usize,
    pending: VecDeque<u64>,
    admitted: Vec<u64>,
    next_ticket: u64,
}

/// Admits at most a fixed number of callers at a time; the rest wait FIFO.
///
/// Dropping a [`Permit`] hands its slot straight to the oldest pending
/// caller; the in-flight counter only decreases when a completed fetch finds
/// nobody waiting.  A caller cancelled while still pending withdraws its
/// ticket without ever touching the counter; cancellation after admission has
/// no effect and the fetch runs to completion.
pub struct AdmissionQueue {
    state: Mutex<QueueState>,
    admitted_cond: Condvar,
    limit: usize,
}

impl AdmissionQueue {
    pub fn new() -> AdmissionQueue {
        AdmissionQueue::with_limit(DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_limit(limit: usize) -> AdmissionQueue {
        AdmissionQueue {
            state: Mutex::new(QueueState {
                in_flight: 0,
                pending: VecDeque::new(),
                admitted: Vec::new(),
                next_ticket: 0,
            }),
            admitted_cond: Condvar::new(),
            limit: limit.max(1),
        }
    }

    /// Block until admitted, returning `None` if `cancel` fires while this
    /// caller is still pending.
    pub fn admit(&self, cancel: &CancelToken) -> Option<Permit<'_>> {
        let mut state = self.state.lock().unwrap();

        if state.in_flight < self.limit && state.pending.is_empty() {
            state.in_flight += 1;
            return Some(Permit { queue: self });
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.pending.push_back(ticket);

        loop {
            if let Some(position) = state.admitted.iter().position(|&t| t == ticket) {
                state.admitted.remove(position);
                return Some(Permit { queue: self });
            }

            if cancel.is_cancelled() {
                if let Some(position) = state.pending.iter().position(|&t| t == ticket) {
                    state.pending.remove(position);
                    return None;
                }
                // Admission raced the cancellation; the next pass picks the
                // permit up.
            }

            let (guard, _) = self
                .admitted_cond
                .wait_timeout(state, PENDING_POLL)
                .unwrap();
            state = guard;
        }
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(next) = state.pending.pop_front() {
            state.admitted.push(next);
            self.admitted_cond.notify_all();
        } else {
            state.in_flight -= 1;
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }
}

impl Default for AdmissionQueue {
    fn default() -> AdmissionQueue {
        AdmissionQueue::new()
    }
}

/// Permission to run one fetch.  Dropping it serves the next pending caller.
pub struct Permit<'a> {
    queue: &'a AdmissionQueue,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.queue.release();
    }
}
