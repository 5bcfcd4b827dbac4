//! Driver loops over a [`ParallelComm`].
//!
//! [`step`] runs the kernel on whatever is ready right now and never waits,
//! so several simulated ranks can be interleaved on one thread.
//! [`run_cycle`] repeats `step` until the scheduler reports no remaining
//! work, optionally giving up when nothing progresses for
//! [`SweepConfig::stall_timeout_ms`].

use crate::algs::block_jacobi::BlockJacobiComm;
use crate::algs::communicator::Communicator;
use crate::algs::parallel_comm::ParallelComm;
use crate::algs::sweep_comm::SweepComm;
use crate::config::SweepConfig;
use crate::data::planes::PlaneStore;
use crate::sweep_error::SweepCommError;
use crate::topology::partition::PartitionSpace;
use crate::topology::subdomain::SubdomainId;
use std::time::Instant;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Kernel invocations.
    pub processed: usize,
    /// `step` calls, including idle ones.
    pub polls: usize,
    /// `step` calls that found nothing ready.
    pub idle_polls: usize,
}

/// Admit every subdomain `rank` owns.
pub fn admit_all<P, T>(comm: &mut P, partition: &T, rank: usize) -> Result<usize, SweepCommError>
where
    P: ParallelComm + ?Sized,
    T: PartitionSpace + ?Sized,
{
    let ids = partition.local_subdomains(rank);
    for &id in &ids {
        let subdomain = partition.subdomain(rank, id)?;
        comm.add_subdomain(id, &subdomain)?;
    }
    Ok(ids.len())
}

/// Run the kernel on every currently ready subdomain. Returns how many ran.
pub fn step<P, S, K>(comm: &mut P, planes: &mut S, kernel: &mut K) -> Result<usize, SweepCommError>
where
    P: ParallelComm + ?Sized,
    S: PlaneStore,
    K: FnMut(SubdomainId, &mut S),
{
    let ready = comm.ready_subdomains(planes)?;
    for &id in &ready {
        kernel(id, planes);
        comm.mark_complete(id, planes)?;
    }
    Ok(ready.len())
}

/// Drive `comm` until no work remains.
pub fn run_cycle<P, S, K>(
    comm: &mut P,
    planes: &mut S,
    mut kernel: K,
    cfg: &SweepConfig,
) -> Result<CycleReport, SweepCommError>
where
    P: ParallelComm + ?Sized,
    S: PlaneStore,
    K: FnMut(SubdomainId, &mut S),
{
    let timeout = cfg.stall_timeout();
    let mut report = CycleReport::default();
    let mut last_progress = Instant::now();
    let mut last_stats = comm.stats();

    while comm.work_remaining() {
        let n = step(comm, planes, &mut kernel)?;
        report.polls += 1;
        report.processed += n;
        let stats = comm.stats();
        if n > 0 || stats != last_stats {
            last_progress = Instant::now();
            last_stats = stats;
            continue;
        }
        report.idle_polls += 1;
        if let Some(limit) = timeout {
            let elapsed = last_progress.elapsed();
            if elapsed > limit {
                let (queued, pending_receives, pending_sends) = comm.backlog();
                log::warn!(
                    "rank {}: no progress for {:?} ({queued} queued, {pending_receives} recv, {pending_sends} send pending)",
                    comm.rank(),
                    elapsed
                );
                return Err(SweepCommError::ProgressStalled {
                    rank: comm.rank(),
                    queued,
                    pending_receives,
                    pending_sends,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }
        std::thread::yield_now();
    }
    Ok(report)
}

/// One full sweep of the subdomains `comm`'s rank owns.
pub fn sweep<C, T, S, K>(
    comm: &C,
    partition: &T,
    planes: &mut S,
    kernel: K,
    cfg: &SweepConfig,
) -> Result<CycleReport, SweepCommError>
where
    C: Communicator,
    T: PartitionSpace + ?Sized,
    S: PlaneStore,
    K: FnMut(SubdomainId, &mut S),
{
    let mut sched = SweepComm::new(comm, cfg)?;
    admit_all(&mut sched, partition, comm.rank())?;
    let report = run_cycle(&mut sched, planes, kernel, cfg)?;
    sched.wait_all_sends();
    Ok(report)
}

/// `iterations` block-Jacobi iterations over the subdomains `comm`'s rank owns.
pub fn block_jacobi<C, T, S, K>(
    comm: &C,
    partition: &T,
    planes: &mut S,
    mut kernel: K,
    iterations: usize,
    cfg: &SweepConfig,
) -> Result<CycleReport, SweepCommError>
where
    C: Communicator,
    T: PartitionSpace + ?Sized,
    S: PlaneStore,
    K: FnMut(SubdomainId, &mut S),
{
    let mut sched = BlockJacobiComm::new(comm, cfg)?;
    let mut total = CycleReport::default();
    for _ in 0..iterations {
        admit_all(&mut sched, partition, comm.rank())?;
        let r = run_cycle(&mut sched, planes, &mut kernel, cfg)?;
        total.processed += r.processed;
        total.polls += r.polls;
        total.idle_polls += r.idle_polls;
    }
    sched.wait_all_sends();
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::data::planes::BoundaryPlanes;
    use crate::topology::partition::{GlobalSubdomain, StaticPartition};
    use crate::topology::subdomain::Direction;

    fn chain(n: u32) -> (StaticPartition, BoundaryPlanes) {
        let mut p = StaticPartition::new();
        let mut planes = BoundaryPlanes::new();
        for i in 0..n {
            p.add_subdomain(GlobalSubdomain::new(0, i));
            planes.insert(SubdomainId::new(i), [1, 0, 0]);
        }
        for i in 1..n {
            p.link(
                GlobalSubdomain::new(0, i - 1),
                GlobalSubdomain::new(0, i),
                Direction::X,
            )
            .unwrap();
        }
        (p, planes)
    }

    #[test]
    fn serial_sweep_runs_in_upwind_order() {
        let (p, mut planes) = chain(4);
        let mut order = Vec::new();
        let report = sweep(
            &NoComm,
            &p,
            &mut planes,
            |id, planes: &mut BoundaryPlanes| {
                let inflow = planes.incoming(id, Direction::X).unwrap()[0];
                planes.outgoing_mut(id, Direction::X).unwrap()[0] = inflow + 1.0;
                order.push(id.get());
            },
            &SweepConfig::default(),
        )
        .unwrap();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(report.processed, 4);
        assert_eq!(report.polls, 4);
        assert_eq!(planes.incoming(SubdomainId::new(3), Direction::X).unwrap(), &[3.0]);
    }

    #[test]
    fn jacobi_propagates_one_hop_per_iteration() {
        let (p, mut planes) = chain(3);
        let report = block_jacobi(
            &NoComm,
            &p,
            &mut planes,
            |id, planes: &mut BoundaryPlanes| {
                let inflow = planes.incoming(id, Direction::X).unwrap()[0];
                planes.outgoing_mut(id, Direction::X).unwrap()[0] = inflow + 1.0;
            },
            2,
            &SweepConfig::default(),
        )
        .unwrap();
        assert_eq!(report.processed, 6);
        // After two iterations the third subdomain has seen one update.
        assert_eq!(planes.incoming(SubdomainId::new(2), Direction::X).unwrap(), &[1.0]);
        assert_eq!(planes.outgoing(SubdomainId::new(2), Direction::X).unwrap(), &[2.0]);
    }
}
