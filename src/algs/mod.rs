//! Transport, bookkeeping and scheduling policies.

pub mod block_jacobi;
pub mod communicator;
pub mod driver;
pub mod parallel_comm;
pub mod queue;
pub mod requests;
pub mod sweep_comm;
pub mod wire;

pub use block_jacobi::BlockJacobiComm;
pub use parallel_comm::{CommCore, ParallelComm};
pub use sweep_comm::SweepComm;
