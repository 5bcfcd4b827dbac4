#![allow(dead_code)]
use std::cell::Cell;
use std::collections::HashMap;

use sweep_comm::algs::communicator::{Communicator, LocalComm};
use sweep_comm::algs::driver::step;
use sweep_comm::algs::parallel_comm::ParallelComm;
use sweep_comm::data::planes::BoundaryPlanes;
use sweep_comm::sweep_error::SweepCommError;
use sweep_comm::topology::partition::{GlobalSubdomain, PartitionSpace, StaticPartition};
use sweep_comm::topology::subdomain::{Direction, SubdomainId};

pub fn sd(i: u32) -> SubdomainId {
    SubdomainId::new(i)
}

pub fn g(rank: usize, id: u32) -> GlobalSubdomain {
    GlobalSubdomain::new(rank, id)
}

/// `nx * ny` subdomains swept in +x and +y, split into `ranks` column blocks.
///
/// Returns the partition and the owner of every grid cell.
pub fn grid(
    nx: usize,
    ny: usize,
    ranks: usize,
) -> (StaticPartition, HashMap<(usize, usize), GlobalSubdomain>) {
    let cols_per_rank = nx.div_ceil(ranks);
    let mut next_id = vec![0u32; ranks];
    let mut owner = HashMap::new();
    let mut p = StaticPartition::new();
    for i in 0..nx {
        for j in 0..ny {
            let rank = i / cols_per_rank;
            let node = g(rank, next_id[rank]);
            next_id[rank] += 1;
            p.add_subdomain(node);
            owner.insert((i, j), node);
        }
    }
    for i in 0..nx {
        for j in 0..ny {
            if i > 0 {
                p.link(owner[&(i - 1, j)], owner[&(i, j)], Direction::X).unwrap();
            }
            if j > 0 {
                p.link(owner[&(i, j - 1)], owner[&(i, j)], Direction::Y).unwrap();
            }
        }
    }
    (p, owner)
}

/// One-value planes in every direction for each subdomain `rank` owns.
pub fn planes_for(p: &StaticPartition, rank: usize) -> BoundaryPlanes {
    let mut planes = BoundaryPlanes::new();
    for id in p.local_subdomains(rank) {
        planes.insert(id, [1, 1, 1]);
    }
    planes
}

/// Kernel: outgoing = sum of incoming + 1, in every direction.
pub fn accumulate(id: SubdomainId, planes: &mut BoundaryPlanes) {
    let total: f64 = Direction::ALL
        .iter()
        .map(|&d| planes.incoming(id, d).unwrap()[0])
        .sum::<f64>()
        + 1.0;
    for d in Direction::ALL {
        planes.outgoing_mut(id, d).unwrap()[0] = total;
    }
}

/// Expected `accumulate` result on the grid: v(i,j) = v(i-1,j) + v(i,j-1) + 1.
pub fn expected_grid_value(i: usize, j: usize) -> f64 {
    let mut v = vec![vec![0.0f64; j + 1]; i + 1];
    for a in 0..=i {
        for b in 0..=j {
            let left = if a > 0 { v[a - 1][b] } else { 0.0 };
            let below = if b > 0 { v[a][b - 1] } else { 0.0 };
            v[a][b] = left + below + 1.0;
        }
    }
    v[i][j]
}

/// Interleave several ranks on one thread until none has work left.
///
/// Returns the global execution order as `(rank, id)`.
pub fn round_robin<P: ParallelComm>(
    scheds: &mut [P],
    planes: &mut [BoundaryPlanes],
    max_rounds: usize,
) -> Result<Vec<GlobalSubdomain>, SweepCommError> {
    let mut order = Vec::new();
    for _ in 0..max_rounds {
        let mut busy = false;
        for (rank, (sched, pl)) in scheds.iter_mut().zip(planes.iter_mut()).enumerate() {
            if !sched.work_remaining() {
                continue;
            }
            busy = true;
            step(sched, pl, &mut |id, store: &mut BoundaryPlanes| {
                accumulate(id, store);
                order.push(GlobalSubdomain { rank, id });
            })?;
        }
        if !busy {
            return Ok(order);
        }
    }
    panic!("ranks still busy after {max_rounds} rounds");
}

/// Transport wrapper counting every call that reaches the transport.
pub struct CountingComm {
    pub inner: LocalComm,
    pub sends: Cell<usize>,
    pub recvs: Cell<usize>,
}

impl CountingComm {
    pub fn new(inner: LocalComm) -> Self {
        Self {
            inner,
            sends: Cell::new(0),
            recvs: Cell::new(0),
        }
    }
}

impl Communicator for CountingComm {
    type SendHandle = <LocalComm as Communicator>::SendHandle;
    type RecvHandle = <LocalComm as Communicator>::RecvHandle;

    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn isend(
        &self,
        peer: usize,
        channel: usize,
        tag: i32,
        buf: &[u8],
    ) -> Result<Self::SendHandle, SweepCommError> {
        self.sends.set(self.sends.get() + 1);
        self.inner.isend(peer, channel, tag, buf)
    }

    fn irecv(
        &self,
        peer: usize,
        channel: usize,
        tag: i32,
    ) -> Result<Self::RecvHandle, SweepCommError> {
        self.recvs.set(self.recvs.get() + 1);
        self.inner.irecv(peer, channel, tag)
    }
}
