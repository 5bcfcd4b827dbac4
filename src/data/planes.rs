//! Boundary plane storage.
//!
//! Each subdomain owns, per direction, an *incoming* plane (filled from its
//! upwind neighbour before it runs) and an *outgoing* plane (written by the
//! kernel, shipped downwind after it runs). Schedulers borrow a
//! [`PlaneStore`] for the duration of a call; they never keep references
//! into it.

use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::{Direction, NUM_DIRECTIONS, SubdomainId};
use std::collections::HashMap;

/// Access to the planes of the subdomains a rank owns.
pub trait PlaneStore {
    fn outgoing(&self, id: SubdomainId, dir: Direction) -> Result<&[f64], SweepCommError>;
    fn incoming_mut(&mut self, id: SubdomainId, dir: Direction)
    -> Result<&mut [f64], SweepCommError>;

    /// Copy `from`'s outgoing plane into `to`'s incoming plane.
    fn transfer(
        &mut self,
        from: SubdomainId,
        to: SubdomainId,
        dir: Direction,
    ) -> Result<(), SweepCommError> {
        let src = self.outgoing(from, dir)?.to_vec();
        let dst = self.incoming_mut(to, dir)?;
        if dst.len() != src.len() {
            return Err(SweepCommError::PlaneSizeMismatch {
                id: to,
                direction: dir,
                expected: std::mem::size_of_val(dst),
                got: std::mem::size_of_val(src.as_slice()),
            });
        }
        dst.copy_from_slice(&src);
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaneSet {
    pub incoming: [Vec<f64>; NUM_DIRECTIONS],
    pub outgoing: [Vec<f64>; NUM_DIRECTIONS],
}

impl PlaneSet {
    /// Zeroed planes of `lens[d]` values in direction `d`.
    pub fn zeroed(lens: [usize; NUM_DIRECTIONS]) -> Self {
        Self {
            incoming: lens.map(|n| vec![0.0; n]),
            outgoing: lens.map(|n| vec![0.0; n]),
        }
    }
}

/// In-memory [`PlaneStore`].
#[derive(Clone, Debug, Default)]
pub struct BoundaryPlanes {
    sets: HashMap<SubdomainId, PlaneSet>,
}

impl BoundaryPlanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register zeroed planes for `id`, replacing any previous ones.
    pub fn insert(&mut self, id: SubdomainId, lens: [usize; NUM_DIRECTIONS]) {
        self.sets.insert(id, PlaneSet::zeroed(lens));
    }

    pub fn contains(&self, id: SubdomainId) -> bool {
        self.sets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn incoming(&self, id: SubdomainId, dir: Direction) -> Result<&[f64], SweepCommError> {
        self.sets
            .get(&id)
            .map(|s| s.incoming[dir.index()].as_slice())
            .ok_or(SweepCommError::MissingPlane { id, direction: dir })
    }

    pub fn outgoing_mut(
        &mut self,
        id: SubdomainId,
        dir: Direction,
    ) -> Result<&mut [f64], SweepCommError> {
        self.sets
            .get_mut(&id)
            .map(|s| s.outgoing[dir.index()].as_mut_slice())
            .ok_or(SweepCommError::MissingPlane { id, direction: dir })
    }
}

impl PlaneStore for BoundaryPlanes {
    fn outgoing(&self, id: SubdomainId, dir: Direction) -> Result<&[f64], SweepCommError> {
        self.sets
            .get(&id)
            .map(|s| s.outgoing[dir.index()].as_slice())
            .ok_or(SweepCommError::MissingPlane { id, direction: dir })
    }

    fn incoming_mut(
        &mut self,
        id: SubdomainId,
        dir: Direction,
    ) -> Result<&mut [f64], SweepCommError> {
        self.sets
            .get_mut(&id)
            .map(|s| s.incoming[dir.index()].as_mut_slice())
            .ok_or(SweepCommError::MissingPlane { id, direction: dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sd(i: u32) -> SubdomainId {
        SubdomainId::new(i)
    }

    #[test]
    fn transfer_copies_outgoing_to_incoming() {
        let mut planes = BoundaryPlanes::new();
        planes.insert(sd(0), [2, 0, 0]);
        planes.insert(sd(1), [2, 0, 0]);
        planes
            .outgoing_mut(sd(0), Direction::X)
            .unwrap()
            .copy_from_slice(&[3.0, 4.0]);
        planes.transfer(sd(0), sd(1), Direction::X).unwrap();
        assert_eq!(planes.incoming(sd(1), Direction::X).unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn transfer_rejects_size_mismatch_and_missing() {
        let mut planes = BoundaryPlanes::new();
        planes.insert(sd(0), [2, 0, 0]);
        planes.insert(sd(1), [3, 0, 0]);
        assert!(matches!(
            planes.transfer(sd(0), sd(1), Direction::X),
            Err(SweepCommError::PlaneSizeMismatch { expected: 24, got: 16, .. })
        ));
        assert_eq!(
            planes.transfer(sd(0), sd(9), Direction::Y),
            Err(SweepCommError::MissingPlane {
                id: sd(9),
                direction: Direction::Y
            })
        );
    }
}
