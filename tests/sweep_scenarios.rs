mod util;
use util::*;

use std::collections::HashMap;

use sweep_comm::algs::communicator::LocalComm;
use sweep_comm::algs::driver::{self, admit_all, run_cycle};
use sweep_comm::algs::parallel_comm::ParallelComm;
use sweep_comm::algs::sweep_comm::SweepComm;
use sweep_comm::config::SweepConfig;
use sweep_comm::data::planes::{BoundaryPlanes, PlaneStore};
use sweep_comm::sweep_error::SweepCommError;
use sweep_comm::topology::partition::{PartitionSpace, StaticPartition};
use sweep_comm::topology::subdomain::{Direction, Neighbor, Subdomain};

#[test]
fn upwind_before_downwind_on_one_rank() {
    let world = LocalComm::world(1);
    let comm = CountingComm::new(world[0].clone());
    let a = Subdomain::isolated().with_downwind(Direction::X, Neighbor::Local(sd(1)));
    let b = Subdomain::isolated().with_upwind(Direction::X, Neighbor::Local(sd(0)));
    let mut planes = BoundaryPlanes::new();
    planes.insert(sd(0), [1, 1, 1]);
    planes.insert(sd(1), [1, 1, 1]);

    let mut sweep = SweepComm::new(&comm, &SweepConfig::default()).unwrap();
    sweep.add_subdomain(sd(0), &a).unwrap();
    sweep.add_subdomain(sd(1), &b).unwrap();
    assert_eq!(sweep.core().find(sd(0)).unwrap().remaining, 0);
    assert_eq!(sweep.core().find(sd(1)).unwrap().remaining, 1);

    assert_eq!(sweep.ready_subdomains(&mut planes).unwrap(), vec![sd(0)]);
    assert!(sweep.ready_subdomains(&mut planes).unwrap().is_empty());
    sweep.mark_complete(sd(0), &mut planes).unwrap();
    assert_eq!(sweep.core().find(sd(1)).unwrap().remaining, 0);

    assert_eq!(sweep.ready_subdomains(&mut planes).unwrap(), vec![sd(1)]);
    sweep.mark_complete(sd(1), &mut planes).unwrap();
    assert!(!sweep.work_remaining());

    // Same-rank delivery never touches the transport.
    assert_eq!(comm.sends.get(), 0);
    assert_eq!(comm.recvs.get(), 0);
}

#[test]
fn remote_dependency_gates_readiness() {
    let world = LocalComm::world(2);
    let cfg = SweepConfig::default();
    let mut p = StaticPartition::new();
    p.link(g(0, 0), g(1, 0), Direction::Y).unwrap();

    let mut up = SweepComm::new(&world[0], &cfg).unwrap();
    let mut down = SweepComm::new(&world[1], &cfg).unwrap();
    let mut planes0 = planes_for(&p, 0);
    let mut planes1 = planes_for(&p, 1);
    admit_all(&mut down, &p, 1).unwrap();
    admit_all(&mut up, &p, 0).unwrap();

    assert!(down.ready_subdomains(&mut planes1).unwrap().is_empty());
    assert_eq!(down.backlog(), (1, 1, 0));

    assert_eq!(up.ready_subdomains(&mut planes0).unwrap(), vec![sd(0)]);
    planes0.outgoing_mut(sd(0), Direction::Y).unwrap()[0] = 5.0;
    up.mark_complete(sd(0), &mut planes0).unwrap();

    // The sender may not leave the cycle while its plane is in flight.
    assert!(up.work_remaining());
    assert_eq!(up.backlog(), (0, 0, 1));

    assert_eq!(down.ready_subdomains(&mut planes1).unwrap(), vec![sd(0)]);
    assert_eq!(planes1.incoming(sd(0), Direction::Y).unwrap(), &[5.0]);
    assert!(!up.work_remaining());
    down.mark_complete(sd(0), &mut planes1).unwrap();
    assert!(!down.work_remaining());
}

#[test]
fn distributed_grid_sweep_matches_serial_values() {
    let (nx, ny, ranks) = (6, 4, 3);
    let (p, owner) = grid(nx, ny, ranks);
    p.validate().unwrap();

    let world = LocalComm::world(ranks);
    let cfg = SweepConfig::default();
    let mut scheds: Vec<_> = world
        .iter()
        .map(|c| SweepComm::new(c, &cfg).unwrap())
        .collect();
    let mut planes: Vec<_> = (0..ranks).map(|r| planes_for(&p, r)).collect();
    for (rank, s) in scheds.iter_mut().enumerate() {
        admit_all(s, &p, rank).unwrap();
    }

    let order = round_robin(&mut scheds, &mut planes, 1000).unwrap();
    assert_eq!(order.len(), nx * ny);

    // Every subdomain exactly once, each after all of its upwind neighbours.
    let position: HashMap<_, _> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    assert_eq!(position.len(), nx * ny);
    for i in 0..nx {
        for j in 0..ny {
            let me = position[&owner[&(i, j)]];
            if i > 0 {
                assert!(position[&owner[&(i - 1, j)]] < me);
            }
            if j > 0 {
                assert!(position[&owner[&(i, j - 1)]] < me);
            }
            let node = owner[&(i, j)];
            let got = planes[node.rank].outgoing(node.id, Direction::X).unwrap()[0];
            assert_eq!(got, expected_grid_value(i, j), "cell ({i},{j})");
        }
    }

    for s in &scheds {
        assert!(s.stats().balanced());
    }
    // Only column-block edges cross ranks: (ranks - 1) * ny planes.
    let sent: usize = scheds.iter().map(|s| s.stats().posted_sends).sum();
    let received: usize = scheds.iter().map(|s| s.stats().posted_receives).sum();
    assert_eq!(sent, (ranks - 1) * ny);
    assert_eq!(received, sent);
    assert_eq!(world[0].in_flight(), 0);
}

#[test]
fn protocol_violations_are_reported() {
    let world = LocalComm::world(1);
    let mut planes = BoundaryPlanes::new();
    planes.insert(sd(0), [0, 0, 0]);
    let mut sweep = SweepComm::new(&world[0], &SweepConfig::default()).unwrap();
    assert_eq!(
        sweep.mark_complete(sd(0), &mut planes),
        Err(SweepCommError::UnknownSubdomain(sd(0)))
    );
    sweep.add_subdomain(sd(0), &Subdomain::isolated()).unwrap();
    assert_eq!(
        sweep.add_subdomain(sd(0), &Subdomain::isolated()),
        Err(SweepCommError::DuplicateSubdomain(sd(0)))
    );
}

#[test]
fn tag_space_exhaustion_is_rejected_at_admission() {
    let world = LocalComm::world(2);
    let cfg = SweepConfig {
        max_tag: 7,
        ..Default::default()
    };
    let mut sweep = SweepComm::new(&world[1], &cfg).unwrap();
    let sdom = Subdomain::isolated().with_upwind(Direction::X, Neighbor::remote(0, sd(0)));
    assert!(sweep.add_subdomain(sd(3), &sdom).is_ok());
    assert_eq!(
        sweep.add_subdomain(sd(4), &sdom),
        Err(SweepCommError::TagOutOfRange {
            rank: 0,
            subdomain: sd(4),
            max_tag: 7
        })
    );
}

#[test]
fn missing_upwind_peer_stalls_with_timeout() {
    let world = LocalComm::world(2);
    let cfg = SweepConfig {
        stall_timeout_ms: Some(20),
        ..Default::default()
    };
    let mut p = StaticPartition::new();
    p.link(g(0, 0), g(1, 0), Direction::X).unwrap();
    let mut planes = planes_for(&p, 1);

    // Rank 0 never runs.
    let mut sweep = SweepComm::new(&world[1], &cfg).unwrap();
    admit_all(&mut sweep, &p, 1).unwrap();
    let err = run_cycle(&mut sweep, &mut planes, accumulate, &cfg).unwrap_err();
    match err {
        SweepCommError::ProgressStalled {
            rank,
            queued,
            pending_receives,
            pending_sends,
            elapsed_ms,
        } => {
            assert_eq!((rank, queued, pending_receives, pending_sends), (1, 1, 1, 0));
            assert!(elapsed_ms >= 20);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn stalled_sweep_with_send_in_flight_returns_error() {
    let world = LocalComm::world(2);
    let cfg = SweepConfig {
        stall_timeout_ms: Some(20),
        ..Default::default()
    };
    let mut p = StaticPartition::new();
    p.link(g(0, 0), g(1, 0), Direction::Z).unwrap();
    let mut planes = planes_for(&p, 0);

    // Rank 1 never receives, so rank 0's only send stays outstanding.
    let err = driver::sweep(&world[0], &p, &mut planes, accumulate, &cfg).unwrap_err();
    assert!(matches!(
        err,
        SweepCommError::ProgressStalled {
            rank: 0,
            queued: 0,
            pending_receives: 0,
            pending_sends: 1,
            ..
        }
    ));
    assert_eq!(world[0].in_flight(), 1);
}

#[test]
fn local_subdomains_listed_per_rank() {
    let (p, _) = grid(4, 2, 2);
    assert_eq!(p.local_subdomains(0).len(), 4);
    assert_eq!(p.local_subdomains(1).len(), 4);
    assert_eq!(p.num_ranks(), 2);
}
