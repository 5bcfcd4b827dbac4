//! `SubdomainId`, `Direction` and the neighbour description of a subdomain.
//!
//! A subdomain is the unit of scheduling. For each of the three boundary
//! directions it has at most one upwind neighbour (whose outgoing plane it
//! consumes) and at most one downwind neighbour (which consumes its outgoing
//! plane). Neighbours are classified relative to the rank that owns the
//! subdomain: a boundary condition, a subdomain on the same rank, or a
//! subdomain owned by a remote rank.

use std::fmt;

/// Number of boundary directions (one per spatial axis).
pub const NUM_DIRECTIONS: usize = 3;

/// Opaque identifier of a subdomain, unique within one rank's index space.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct SubdomainId(u32);

impl SubdomainId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        SubdomainId(raw)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for SubdomainId {
    fn from(raw: u32) -> Self {
        SubdomainId(raw)
    }
}

impl fmt::Debug for SubdomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubdomainId").field(&self.0).finish()
    }
}

impl fmt::Display for SubdomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Boundary direction of a plane. Each direction is also a transport channel.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Direction {
    X,
    Y,
    Z,
}

impl Direction {
    pub const ALL: [Direction; NUM_DIRECTIONS] = [Direction::X, Direction::Y, Direction::Z];

    /// Position of this direction in per-direction arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::X => 0,
            Direction::Y => 1,
            Direction::Z => 2,
        }
    }

    /// Transport channel carrying planes of this direction.
    #[inline]
    pub const fn channel(self) -> usize {
        self.index()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::X => "x",
            Direction::Y => "y",
            Direction::Z => "z",
        };
        f.write_str(s)
    }
}

/// A subdomain owned by a remote rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RemoteLink {
    pub rank: usize,
    pub subdomain: SubdomainId,
}

/// Neighbour of a subdomain in one direction, as seen from the owning rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Neighbor {
    /// Physical boundary: the plane comes from a boundary condition.
    #[default]
    Boundary,
    /// Neighbour on the same rank.
    Local(SubdomainId),
    /// Neighbour on another rank.
    Remote(RemoteLink),
}

impl Neighbor {
    pub fn remote(rank: usize, subdomain: SubdomainId) -> Self {
        Neighbor::Remote(RemoteLink { rank, subdomain })
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, Neighbor::Boundary)
    }
}

/// Neighbour relationships of one subdomain.
///
/// This is the external subdomain entity as the scheduler sees it: the
/// scheduler keeps a copy for the lifetime of its queue entry but never owns
/// the planes, which live in a [`PlaneStore`](crate::data::planes::PlaneStore).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Subdomain {
    pub upwind: [Neighbor; NUM_DIRECTIONS],
    pub downwind: [Neighbor; NUM_DIRECTIONS],
}

impl Subdomain {
    /// A subdomain whose every plane is a boundary condition.
    pub fn isolated() -> Self {
        Self::default()
    }

    pub fn with_upwind(mut self, dir: Direction, n: Neighbor) -> Self {
        self.upwind[dir.index()] = n;
        self
    }

    pub fn with_downwind(mut self, dir: Direction, n: Neighbor) -> Self {
        self.downwind[dir.index()] = n;
        self
    }

    pub fn upwind(&self, dir: Direction) -> Neighbor {
        self.upwind[dir.index()]
    }

    pub fn downwind(&self, dir: Direction) -> Neighbor {
        self.downwind[dir.index()]
    }

    /// Directions whose upwind plane arrives from a remote rank.
    pub fn remote_upwind(&self) -> impl Iterator<Item = (Direction, RemoteLink)> + '_ {
        Direction::ALL.into_iter().filter_map(|d| match self.upwind(d) {
            Neighbor::Remote(link) => Some((d, link)),
            _ => None,
        })
    }

    /// Directions whose upwind plane is produced on the same rank.
    pub fn local_upwind(&self) -> impl Iterator<Item = (Direction, SubdomainId)> + '_ {
        Direction::ALL.into_iter().filter_map(|d| match self.upwind(d) {
            Neighbor::Local(id) => Some((d, id)),
            _ => None,
        })
    }
}
