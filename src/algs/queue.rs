//! Dependency queue: subdomains admitted this cycle and their unmet
//! dependency counts.
//!
//! Entries are keyed by id, so readiness scans and completion lookups never
//! search linearly, and iteration order (ascending id) is deterministic.

use crate::debug_invariants::DebugInvariants;
use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::{Subdomain, SubdomainId};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: SubdomainId,
    pub subdomain: Subdomain,
    pub remaining: usize,
    /// Already returned by a readiness scan.
    pub released: bool,
}

#[derive(Clone, Debug, Default)]
pub struct DependencyQueue {
    entries: BTreeMap<SubdomainId, QueueEntry>,
}

impl DependencyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(
        &mut self,
        id: SubdomainId,
        subdomain: Subdomain,
        remaining: usize,
    ) -> Result<(), SweepCommError> {
        if self.entries.contains_key(&id) {
            return Err(SweepCommError::DuplicateSubdomain(id));
        }
        self.entries.insert(
            id,
            QueueEntry {
                id,
                subdomain,
                remaining,
                released: false,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: SubdomainId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: SubdomainId) -> Option<&QueueEntry> {
        self.entries.get(&id)
    }

    /// One dependency of `id` was satisfied. Returns the new count.
    pub fn decrement(&mut self, id: SubdomainId) -> Result<usize, SweepCommError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(SweepCommError::UnknownSubdomain(id))?;
        if entry.remaining == 0 {
            return Err(SweepCommError::DependencyUnderflow(id));
        }
        entry.remaining -= 1;
        Ok(entry.remaining)
    }

    /// Release every entry at zero that has not been released yet.
    pub fn take_ready(&mut self) -> Vec<SubdomainId> {
        self.entries
            .values_mut()
            .filter(|e| e.remaining == 0 && !e.released)
            .map(|e| {
                e.released = true;
                e.id
            })
            .collect()
    }

    /// `true` when every queued entry has no unmet dependency.
    pub fn all_satisfied(&self) -> bool {
        self.entries.values().all(|e| e.remaining == 0)
    }

    /// Remove a released entry. Removing an entry that was never handed out
    /// would skip its dependencies.
    pub fn dequeue(&mut self, id: SubdomainId) -> Result<QueueEntry, SweepCommError> {
        let entry = self
            .entries
            .get(&id)
            .ok_or(SweepCommError::UnknownSubdomain(id))?;
        if !entry.released {
            return Err(SweepCommError::NotReady {
                id,
                remaining: entry.remaining,
            });
        }
        self.entries
            .remove(&id)
            .ok_or(SweepCommError::UnknownSubdomain(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DebugInvariants for DependencyQueue {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "DependencyQueue");
    }

    fn validate_invariants(&self) -> Result<(), SweepCommError> {
        for (key, e) in &self.entries {
            if *key != e.id {
                return Err(SweepCommError::UnknownSubdomain(e.id));
            }
            if e.released && e.remaining != 0 {
                return Err(SweepCommError::NotReady {
                    id: e.id,
                    remaining: e.remaining,
                });
            }
        }
        Ok(())
    }
}
