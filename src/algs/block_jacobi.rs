//! Block-Jacobi scheduling.
//!
//! Every iteration exchanges the planes of the *previous* iterate, so there
//! is no ordering between subdomains inside an iteration. At the first
//! readiness poll of an iteration the scheduler ships every registered
//! subdomain's current outgoing planes (remote sends and local copies)
//! exactly once; once all remote planes of the iteration have arrived the
//! whole registered set is released in a single call.
//!
//! Sends of iteration `k` match the receives posted for iteration `k` on the
//! neighbour: messages on one `(peer, channel, tag)` address are matched in
//! posting order, so a neighbour that is already an iteration ahead cannot
//! overtake.

use crate::algs::communicator::Communicator;
use crate::algs::parallel_comm::{CommCore, ParallelComm};
use crate::algs::requests::RequestStats;
use crate::config::SweepConfig;
use crate::data::planes::PlaneStore;
use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::{Subdomain, SubdomainId};

pub struct BlockJacobiComm<'a, C: Communicator> {
    core: CommCore<'a, C>,
    /// Subdomains registered for the current iteration, in admission order.
    registered: Vec<(SubdomainId, Subdomain)>,
    posted_sends: bool,
    iteration: u64,
}

impl<'a, C: Communicator> BlockJacobiComm<'a, C> {
    pub fn new(comm: &'a C, cfg: &SweepConfig) -> Result<Self, SweepCommError> {
        Ok(Self {
            core: CommCore::new(comm, cfg)?,
            registered: Vec::new(),
            posted_sends: false,
            iteration: 0,
        })
    }

    pub fn core(&self) -> &CommCore<'a, C> {
        &self.core
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn posted_sends(&self) -> bool {
        self.posted_sends
    }

    pub fn wait_all_sends(&mut self) {
        self.core.wait_all_sends();
    }

    fn post_iteration_sends(&mut self, planes: &mut dyn PlaneStore) -> Result<(), SweepCommError> {
        for (id, subdomain) in &self.registered {
            // Local neighbours read the previous iterate, which is always
            // available: the copy carries no counter update.
            self.core.post_sends(*id, subdomain, planes)?;
        }
        self.posted_sends = true;
        log::debug!(
            "rank {}: jacobi iteration {} posted sends for {} subdomains",
            self.core.rank(),
            self.iteration,
            self.registered.len()
        );
        Ok(())
    }
}

impl<C: Communicator> ParallelComm for BlockJacobiComm<'_, C> {
    fn add_subdomain(
        &mut self,
        id: SubdomainId,
        subdomain: &Subdomain,
    ) -> Result<(), SweepCommError> {
        if self.posted_sends {
            return Err(SweepCommError::IterationInProgress(id));
        }
        if self.core.queue().contains(id) {
            return Err(SweepCommError::DuplicateSubdomain(id));
        }
        let remote = self.core.post_recvs(id, subdomain)?;
        self.core.queue_mut().enqueue(id, *subdomain, remote)?;
        self.registered.push((id, *subdomain));
        Ok(())
    }

    fn work_remaining(&mut self) -> bool {
        self.core.work_remaining()
    }

    fn ready_subdomains(
        &mut self,
        planes: &mut dyn PlaneStore,
    ) -> Result<Vec<SubdomainId>, SweepCommError> {
        if !self.posted_sends && !self.registered.is_empty() {
            self.post_iteration_sends(planes)?;
        }
        self.core.test_receives(planes)?;
        if self.core.queue().all_satisfied() {
            Ok(self.core.ready_list())
        } else {
            Ok(Vec::new())
        }
    }

    fn mark_complete(
        &mut self,
        id: SubdomainId,
        _planes: &mut dyn PlaneStore,
    ) -> Result<(), SweepCommError> {
        self.core.dequeue(id)?;
        if self.core.queue().is_empty() {
            log::debug!(
                "rank {}: jacobi iteration {} complete",
                self.core.rank(),
                self.iteration
            );
            self.registered.clear();
            self.posted_sends = false;
            self.iteration += 1;
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
