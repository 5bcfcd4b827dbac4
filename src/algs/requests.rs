//! Outstanding-request tracker.
//!
//! Keeps every in-flight receive together with the subdomain it will
//! satisfy, and every in-flight send until the transport confirms delivery.
//! Polling never blocks; only [`RequestTracker::wait_all_sends`] does.

use crate::algs::communicator::{Test, Wait};
use crate::debug_invariants::DebugInvariants;
use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::{Direction, RemoteLink, SubdomainId};

pub struct PendingReceive<R> {
    pub handle: R,
    pub owner: SubdomainId,
    pub direction: Direction,
    pub source: RemoteLink,
    pub tag: i32,
}

pub struct PendingSend<S> {
    pub handle: S,
    pub dest: RemoteLink,
    pub direction: Direction,
}

/// A receive the transport reported complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedReceive {
    pub owner: SubdomainId,
    pub direction: Direction,
    pub source: RemoteLink,
    pub tag: i32,
    pub payload: Option<Vec<u8>>,
}

/// Posted/completed counters, per request kind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub posted_receives: usize,
    pub completed_receives: usize,
    pub posted_sends: usize,
    pub completed_sends: usize,
}

impl RequestStats {
    pub fn balanced(&self) -> bool {
        self.posted_receives == self.completed_receives && self.posted_sends == self.completed_sends
    }
}

pub struct RequestTracker<S, R> {
    recvs: Vec<PendingReceive<R>>,
    sends: Vec<PendingSend<S>>,
    stats: RequestStats,
}

impl<S, R> Default for RequestTracker<S, R> {
    fn default() -> Self {
        Self {
            recvs: Vec::new(),
            sends: Vec::new(),
            stats: RequestStats::default(),
        }
    }
}

impl<S, R> RequestTracker<S, R>
where
    S: Test + Wait,
    R: Test + Wait,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_recv(&mut self, recv: PendingReceive<R>) {
        self.stats.posted_receives += 1;
        self.recvs.push(recv);
    }

    pub fn push_send(&mut self, send: PendingSend<S>) {
        self.stats.posted_sends += 1;
        self.sends.push(send);
    }

    /// Remove and return every receive that has completed, in posting order.
    pub fn poll_recvs(&mut self) -> Vec<CompletedReceive> {
        let mut done = Vec::new();
        let mut still = Vec::with_capacity(self.recvs.len());
        for mut r in self.recvs.drain(..) {
            if r.handle.test() {
                done.push(CompletedReceive {
                    owner: r.owner,
                    direction: r.direction,
                    source: r.source,
                    tag: r.tag,
                    payload: r.handle.wait(),
                });
            } else {
                still.push(r);
            }
        }
        self.recvs = still;
        self.stats.completed_receives += done.len();
        done
    }

    /// Retire completed sends; returns how many completed.
    pub fn poll_sends(&mut self) -> usize {
        let before = self.sends.len();
        self.sends.retain_mut(|s| !s.handle.test());
        let n = before - self.sends.len();
        self.stats.completed_sends += n;
        n
    }

    /// Block until every outstanding send has completed.
    pub fn wait_all_sends(&mut self) {
        let n = self.sends.len();
        for s in self.sends.drain(..) {
            let _ = s.handle.wait();
        }
        self.stats.completed_sends += n;
    }

    pub fn pending_recvs(&self) -> usize {
        self.recvs.len()
    }

    pub fn pending_sends(&self) -> usize {
        self.sends.len()
    }

    pub fn stats(&self) -> RequestStats {
        self.stats
    }
}

impl<S, R> DebugInvariants for RequestTracker<S, R> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "RequestTracker");
    }

    fn validate_invariants(&self) -> Result<(), SweepCommError> {
        let s = &self.stats;
        if s.posted_receives != s.completed_receives + self.recvs.len() {
            return Err(SweepCommError::RequestImbalance {
                kind: "receives",
                posted: s.posted_receives,
                completed: s.completed_receives,
                outstanding: self.recvs.len(),
            });
        }
        if s.posted_sends != s.completed_sends + self.sends.len() {
            return Err(SweepCommError::RequestImbalance {
                kind: "sends",
                posted: s.posted_sends,
                completed: s.completed_sends,
                outstanding: self.sends.len(),
            });
        }
        Ok(())
    }
}
