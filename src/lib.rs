#![cfg_attr(docsrs, feature(doc_cfg))]
//! # sweep-comm
//!
//! sweep-comm is the dependency-scheduling and communication engine behind a
//! distributed discrete-ordinates transport sweep. The mesh is partitioned into
//! subdomains spread over ranks; each subdomain needs the boundary planes of its
//! upwind neighbours, which may live on the same rank or on a remote one. This
//! crate decides *when* a subdomain may run and moves the planes, overlapping
//! non-blocking communication with computation and never blocking except to
//! drain sends at a cycle boundary.
//!
//! ## Features
//! - A pull-based [`ParallelComm`](algs::parallel_comm::ParallelComm) interface:
//!   `add_subdomain`, `ready_subdomains`, `mark_complete`, `work_remaining`
//! - [`SweepComm`](algs::sweep_comm::SweepComm): wavefront scheduling, each
//!   subdomain exactly once per sweep
//! - [`BlockJacobiComm`](algs::block_jacobi::BlockJacobiComm): previous-iterate
//!   exchange, no intra-iteration ordering
//! - Pluggable transports: serial ([`NoComm`](algs::communicator::NoComm)),
//!   in-process simulated ranks ([`LocalComm`](algs::communicator::LocalComm)),
//!   and MPI (`mpi-support` feature)
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! sweep-comm = "0.1"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! ## Preconditions
//! The upwind dependency graph of a sweep must be acyclic across all ranks.
//! [`StaticPartition::validate`](topology::partition::StaticPartition::validate)
//! checks this up front; [`algs::driver::run_cycle`] can additionally give up
//! after a configurable time without progress.
//!
//! ## Logging
//! Diagnostics go through the `log` facade; install any logger to see them.

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod sweep_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::block_jacobi::BlockJacobiComm;
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm, Test, Wait};
    pub use crate::algs::driver::{CycleReport, run_cycle, step};
    pub use crate::algs::parallel_comm::ParallelComm;
    pub use crate::algs::requests::RequestStats;
    pub use crate::algs::sweep_comm::SweepComm;
    pub use crate::config::SweepConfig;
    pub use crate::data::planes::{BoundaryPlanes, PlaneStore};
    pub use crate::sweep_error::SweepCommError;
    pub use crate::topology::partition::{GlobalSubdomain, PartitionSpace, StaticPartition};
    pub use crate::topology::subdomain::{Direction, Neighbor, Subdomain, SubdomainId};
}
