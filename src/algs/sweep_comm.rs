//! Wavefront sweep scheduling.
//!
//! A subdomain becomes ready only after every upwind plane, local or remote,
//! has arrived; each subdomain runs exactly once per sweep. Ordering within a
//! rank is discovered dynamically: same-rank upwind neighbours count as
//! dependencies until they complete, at which point they decrement their
//! downwind counters directly.
//!
//! The upwind graph across all ranks must be acyclic. That is a precondition
//! on the partition provider (see [`StaticPartition::validate`]); a cycle
//! shows up here as a sweep that never finishes.
//!
//! [`StaticPartition::validate`]: crate::topology::partition::StaticPartition::validate

use crate::algs::communicator::Communicator;
use crate::algs::parallel_comm::{CommCore, ParallelComm};
use crate::algs::requests::RequestStats;
use crate::config::SweepConfig;
use crate::data::planes::PlaneStore;
use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::{Direction, Neighbor, Subdomain, SubdomainId};
use std::collections::HashSet;

/// Scheduler for one sweep. Create a fresh one per sweep.
pub struct SweepComm<'a, C: Communicator> {
    core: CommCore<'a, C>,
    completed: HashSet<SubdomainId>,
}

impl<'a, C: Communicator> SweepComm<'a, C> {
    pub fn new(comm: &'a C, cfg: &SweepConfig) -> Result<Self, SweepCommError> {
        log::debug!("rank {}: starting sweep", comm.rank());
        Ok(Self {
            core: CommCore::new(comm, cfg)?,
            completed: HashSet::new(),
        })
    }

    pub fn core(&self) -> &CommCore<'a, C> {
        &self.core
    }

    /// Subdomains completed so far in this sweep.
    pub fn completed(&self) -> usize {
        self.completed.len()
    }

    /// Block until all sends drained; call once the sweep is over if the
    /// planes are about to be reused.
    pub fn wait_all_sends(&mut self) {
        self.core.wait_all_sends();
    }
}

impl<C: Communicator> ParallelComm for SweepComm<'_, C> {
    fn add_subdomain(
        &mut self,
        id: SubdomainId,
        subdomain: &Subdomain,
    ) -> Result<(), SweepCommError> {
        if self.completed.contains(&id) || self.core.queue().contains(id) {
            return Err(SweepCommError::DuplicateSubdomain(id));
        }
        let remote = self.core.post_recvs(id, subdomain)?;
        let local = subdomain
            .local_upwind()
            .filter(|(_, up)| !self.completed.contains(up))
            .count();
        self.core
            .queue_mut()
            .enqueue(id, *subdomain, remote + local)?;
        log::trace!(
            "rank {}: sweep admitted sdom {id} ({remote} remote, {local} local deps)",
            self.core.rank()
        );
        Ok(())
    }

    fn work_remaining(&mut self) -> bool {
        self.core.work_remaining()
    }

    fn ready_subdomains(
        &mut self,
        planes: &mut dyn PlaneStore,
    ) -> Result<Vec<SubdomainId>, SweepCommError> {
        self.core.test_receives(planes)?;
        Ok(self.core.ready_list())
    }

    fn mark_complete(
        &mut self,
        id: SubdomainId,
        planes: &mut dyn PlaneStore,
    ) -> Result<(), SweepCommError> {
        // Reject before anything is dequeued or copied into the consumer.
        if let Some(entry) = self.core.find(id) {
            for dir in Direction::ALL {
                if let Neighbor::Local(down) = entry.subdomain.downwind(dir) {
                    if self.completed.contains(&down) {
                        return Err(SweepCommError::DownwindAlreadyComplete {
                            upwind: id,
                            downwind: down,
                        });
                    }
                }
            }
        }
        let entry = self.core.dequeue(id)?;
        self.completed.insert(id);
        for down in self.core.post_sends(id, &entry.subdomain, planes)? {
            if self.core.queue().contains(down) {
                self.core.queue_mut().decrement(down)?;
            }
            // Not admitted yet: it will see `id` as completed when it is.
        }
        if self.core.queue().is_empty() {
            log::debug!(
                "rank {}: sweep finished {} subdomains, {} sends in flight",
                self.core.rank(),
                self.completed.len(),
                self.core.backlog().2
            );
        }
        Ok(())
    }

    fn rank(&self) -> usize {
        self.core.rank()
    }

    fn stats(&self) -> RequestStats {
        self.core.stats()
    }

    fn backlog(&self) -> (usize, usize, usize) {
        self.core.backlog()
    }
}
