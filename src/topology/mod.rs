//! Subdomain identities, neighbour classification and partition providers.

pub mod partition;
pub mod subdomain;
