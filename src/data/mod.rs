//! Plane buffers owned outside the schedulers.

pub mod planes;
