//! The driver-facing scheduling interface and the bookkeeping shared by every
//! scheduling policy.
//!
//! A driver loop only ever needs four operations:
//!
//! ```text
//! for id in owned { comm.add_subdomain(id, &sdom)?; }
//! while comm.work_remaining() {
//!     for id in comm.ready_subdomains(&mut planes)? {
//!         kernel(id, &mut planes);
//!         comm.mark_complete(id, &mut planes)?;
//!     }
//! }
//! ```
//!
//! Policies ([`SweepComm`](crate::algs::sweep_comm::SweepComm) and
//! [`BlockJacobiComm`](crate::algs::block_jacobi::BlockJacobiComm)) differ only
//! in how they count dependencies and when they ship planes; both compose a
//! [`CommCore`] for the queue, the outstanding requests and the tag codec.

use crate::algs::communicator::Communicator;
use crate::algs::queue::{DependencyQueue, QueueEntry};
use crate::algs::requests::{PendingReceive, PendingSend, RequestStats, RequestTracker};
use crate::algs::wire::{TagCodec, copy_into_plane, plane_bytes};
use crate::config::SweepConfig;
use crate::data::planes::PlaneStore;
use crate::debug_invariants::DebugInvariants;
use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::{Direction, Neighbor, Subdomain, SubdomainId};

/// Pull-based scheduler driven by a single control thread per rank.
pub trait ParallelComm {
    /// Admit a subdomain for this cycle and post its remote receives.
    fn add_subdomain(&mut self, id: SubdomainId, subdomain: &Subdomain)
    -> Result<(), SweepCommError>;

    /// `false` once every admitted subdomain completed and every send drained.
    fn work_remaining(&mut self) -> bool;

    /// Poll the transport, then release every subdomain whose dependencies
    /// are all satisfied. Each subdomain is released at most once per cycle.
    fn ready_subdomains(
        &mut self,
        planes: &mut dyn PlaneStore,
    ) -> Result<Vec<SubdomainId>, SweepCommError>;

    /// Retire a released subdomain and ship its outgoing planes downwind.
    fn mark_complete(
        &mut self,
        id: SubdomainId,
        planes: &mut dyn PlaneStore,
    ) -> Result<(), SweepCommError>;

    fn rank(&self) -> usize;

    /// Counters of posted and completed requests.
    fn stats(&self) -> RequestStats;

    /// `(queued, pending receives, pending sends)`
    fn backlog(&self) -> (usize, usize, usize);
}

/// Queue, request tracker and tag codec over one transport.
pub struct CommCore<'a, C: Communicator> {
    comm: &'a C,
    codec: TagCodec,
    queue: DependencyQueue,
    requests: RequestTracker<C::SendHandle, C::RecvHandle>,
}

impl<'a, C: Communicator> CommCore<'a, C> {
    pub fn new(comm: &'a C, cfg: &SweepConfig) -> Result<Self, SweepCommError> {
        cfg.validate()?;
        Ok(Self {
            comm,
            codec: TagCodec::new(comm.size(), cfg.max_tag)?,
            queue: DependencyQueue::new(),
            requests: RequestTracker::new(),
        })
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn codec(&self) -> &TagCodec {
        &self.codec
    }

    pub fn queue(&self) -> &DependencyQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut DependencyQueue {
        &mut self.queue
    }

    pub fn find(&self, id: SubdomainId) -> Option<&QueueEntry> {
        self.queue.get(id)
    }

    pub fn stats(&self) -> RequestStats {
        self.requests.stats()
    }

    pub fn backlog(&self) -> (usize, usize, usize) {
        (
            self.queue.len(),
            self.requests.pending_recvs(),
            self.requests.pending_sends(),
        )
    }

    /// Post one receive per remote upwind plane. Returns how many were posted.
    pub fn post_recvs(
        &mut self,
        id: SubdomainId,
        subdomain: &Subdomain,
    ) -> Result<usize, SweepCommError> {
        let mut posted = 0;
        for (dir, source) in subdomain.remote_upwind() {
            let tag = self.codec.encode(source.rank, id)?;
            let handle = self.comm.irecv(source.rank, dir.channel(), tag)?;
            log::trace!(
                "rank {}: irecv sdom {id} {dir} from rank {} (tag {tag})",
                self.rank(),
                source.rank
            );
            self.requests.push_recv(PendingReceive {
                handle,
                owner: id,
                direction: dir,
                source,
                tag,
            });
            posted += 1;
        }
        Ok(posted)
    }

    /// Ship `id`'s outgoing planes to every downwind neighbour.
    ///
    /// Local neighbours get the plane copied straight into their incoming
    /// buffer without touching the transport; their ids are returned so the
    /// policy can decide what that delivery means for their counters.
    pub fn post_sends(
        &mut self,
        id: SubdomainId,
        subdomain: &Subdomain,
        planes: &mut dyn PlaneStore,
    ) -> Result<Vec<SubdomainId>, SweepCommError> {
        let mut local = Vec::new();
        for dir in Direction::ALL {
            match subdomain.downwind(dir) {
                Neighbor::Boundary => {}
                Neighbor::Local(down) => {
                    planes.transfer(id, down, dir)?;
                    log::trace!("rank {}: local {dir} plane {id} -> {down}", self.rank());
                    local.push(down);
                }
                Neighbor::Remote(dest) => {
                    let tag = self.codec.encode(self.rank(), dest.subdomain)?;
                    let bytes = plane_bytes(planes.outgoing(id, dir)?);
                    let handle = self.comm.isend(dest.rank, dir.channel(), tag, bytes)?;
                    log::trace!(
                        "rank {}: isend sdom {id} {dir} to rank {} sdom {} (tag {tag})",
                        self.rank(),
                        dest.rank,
                        dest.subdomain
                    );
                    self.requests.push_send(PendingSend {
                        handle,
                        dest,
                        direction: dir,
                    });
                }
            }
        }
        Ok(local)
    }

    /// Drain completed receives into their owners' incoming planes and
    /// decrement the owners' counters. Never blocks.
    pub fn test_receives(&mut self, planes: &mut dyn PlaneStore) -> Result<usize, SweepCommError> {
        let done = self.requests.poll_recvs();
        let n = done.len();
        for c in done {
            if !self.queue.contains(c.owner) {
                return Err(SweepCommError::OrphanReceive {
                    id: c.owner,
                    direction: c.direction,
                });
            }
            let payload = c.payload.ok_or(SweepCommError::MissingPayload {
                id: c.owner,
                direction: c.direction,
            })?;
            let plane = planes.incoming_mut(c.owner, c.direction)?;
            let expected = std::mem::size_of_val(&*plane);
            copy_into_plane(plane, &payload).map_err(|_| SweepCommError::PlaneSizeMismatch {
                id: c.owner,
                direction: c.direction,
                expected,
                got: payload.len(),
            })?;
            let left = self.queue.decrement(c.owner)?;
            log::trace!(
                "rank {}: received sdom {} {} from rank {} (tag {}, {left} left)",
                self.rank(),
                c.owner,
                c.direction,
                c.source.rank,
                c.tag
            );
        }
        self.debug_check();
        Ok(n)
    }

    /// Retire completed sends. Never blocks.
    pub fn test_sends(&mut self) -> usize {
        self.requests.poll_sends()
    }

    /// Block until every outstanding send has completed. Used at a cycle
    /// boundary so send buffers are never reused while in flight.
    pub fn wait_all_sends(&mut self) {
        if self.requests.pending_sends() > 0 {
            log::debug!(
                "rank {}: waiting on {} outstanding sends",
                self.rank(),
                self.requests.pending_sends()
            );
        }
        self.requests.wait_all_sends();
    }

    /// Release every entry at zero dependencies.
    pub fn ready_list(&mut self) -> Vec<SubdomainId> {
        self.queue.take_ready()
    }

    pub fn dequeue(&mut self, id: SubdomainId) -> Result<QueueEntry, SweepCommError> {
        let entry = self.queue.dequeue(id)?;
        self.debug_check();
        Ok(entry)
    }

    /// Queue non-empty or sends still in flight (polled first).
    pub fn work_remaining(&mut self) -> bool {
        self.test_sends();
        !self.queue.is_empty() || self.requests.pending_sends() > 0
    }

    fn debug_check(&self) {
        self.queue.debug_assert_invariants();
        self.requests.debug_assert_invariants();
    }
}
