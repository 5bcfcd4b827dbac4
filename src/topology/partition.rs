//! Partition provider: which rank owns which subdomain, and who feeds whom.
//!
//! The scheduler does not decide how the mesh is decomposed. It only asks a
//! [`PartitionSpace`] for the subdomains a rank owns and for each subdomain's
//! neighbours classified relative to that rank.
//!
//! [`StaticPartition`] is a table-driven provider: callers declare subdomains
//! and directed plane links (`upwind -> downwind` in one direction) and the
//! table answers queries for any rank. It can also be validated up front,
//! which is how acyclicity of a sweep is established (the schedulers
//! themselves assume it).

use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::{Direction, NUM_DIRECTIONS, Neighbor, Subdomain, SubdomainId};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Globally unique name of a subdomain: owning rank plus local id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalSubdomain {
    pub rank: usize,
    pub id: SubdomainId,
}

impl GlobalSubdomain {
    pub fn new(rank: usize, id: u32) -> Self {
        Self {
            rank,
            id: SubdomainId::new(id),
        }
    }
}

pub trait PartitionSpace {
    /// Subdomains owned by `rank`, in ascending id order.
    fn local_subdomains(&self, rank: usize) -> Vec<SubdomainId>;

    /// Neighbours of `id` on `rank`, classified relative to `rank`.
    fn subdomain(&self, rank: usize, id: SubdomainId) -> Result<Subdomain, SweepCommError>;
}

#[derive(Copy, Clone, Debug, Default)]
struct Links {
    upwind: [Option<GlobalSubdomain>; NUM_DIRECTIONS],
    downwind: [Option<GlobalSubdomain>; NUM_DIRECTIONS],
}

#[derive(Clone, Debug, Default)]
pub struct StaticPartition {
    nodes: BTreeMap<GlobalSubdomain, Links>,
}

impl StaticPartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a subdomain owned by `rank`. Idempotent.
    pub fn add_subdomain(&mut self, node: GlobalSubdomain) -> &mut Self {
        self.nodes.entry(node).or_default();
        self
    }

    /// Declare that `upwind`'s outgoing `dir` plane feeds `downwind`.
    ///
    /// Both endpoints are declared if needed. Each subdomain has at most one
    /// upwind and one downwind neighbour per direction.
    pub fn link(
        &mut self,
        upwind: GlobalSubdomain,
        downwind: GlobalSubdomain,
        dir: Direction,
    ) -> Result<&mut Self, SweepCommError> {
        let d = dir.index();
        if self.nodes.get(&upwind).is_some_and(|l| l.downwind[d].is_some()) {
            return Err(SweepCommError::DuplicateLink {
                id: upwind.id,
                direction: dir,
                side: "downwind",
            });
        }
        if self.nodes.get(&downwind).is_some_and(|l| l.upwind[d].is_some()) {
            return Err(SweepCommError::DuplicateLink {
                id: downwind.id,
                direction: dir,
                side: "upwind",
            });
        }
        self.nodes.entry(upwind).or_default().downwind[d] = Some(downwind);
        self.nodes.entry(downwind).or_default().upwind[d] = Some(upwind);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of ranks referenced (highest rank + 1).
    pub fn num_ranks(&self) -> usize {
        self.nodes.keys().map(|n| n.rank + 1).max().unwrap_or(0)
    }

    /// Check that the global upwind graph is acyclic (Kahn's algorithm).
    ///
    /// A sweep over a cyclic graph never terminates: no subdomain on the
    /// cycle ever reaches zero dependencies.
    pub fn validate(&self) -> Result<(), SweepCommError> {
        let mut indegree: HashMap<GlobalSubdomain, usize> = HashMap::with_capacity(self.len());
        for (node, links) in &self.nodes {
            indegree.insert(*node, links.upwind.iter().flatten().count());
        }
        let mut ready: VecDeque<GlobalSubdomain> = indegree
            .iter()
            .filter(|&(_, &n)| n == 0)
            .map(|(&node, _)| node)
            .collect();
        let mut visited = 0usize;
        while let Some(node) = ready.pop_front() {
            visited += 1;
            for down in self.nodes[&node].downwind.iter().flatten() {
                let n = indegree.get_mut(down).ok_or(SweepCommError::DanglingLink {
                    rank: node.rank,
                    id: node.id,
                })?;
                *n -= 1;
                if *n == 0 {
                    ready.push_back(*down);
                }
            }
        }
        if visited != self.nodes.len() {
            return Err(SweepCommError::CycleDetected);
        }
        Ok(())
    }

    fn classify(rank: usize, link: Option<GlobalSubdomain>) -> Neighbor {
        match link {
            None => Neighbor::Boundary,
            Some(n) if n.rank == rank => Neighbor::Local(n.id),
            Some(n) => Neighbor::remote(n.rank, n.id),
        }
    }
}

impl PartitionSpace for StaticPartition {
    fn local_subdomains(&self, rank: usize) -> Vec<SubdomainId> {
        self.nodes
            .keys()
            .filter(|n| n.rank == rank)
            .map(|n| n.id)
            .collect()
    }

    fn subdomain(&self, rank: usize, id: SubdomainId) -> Result<Subdomain, SweepCommError> {
        let links = self
            .nodes
            .get(&GlobalSubdomain { rank, id })
            .ok_or(SweepCommError::UnknownSubdomain(id))?;
        Ok(Subdomain {
            upwind: links.upwind.map(|l| Self::classify(rank, l)),
            downwind: links.downwind.map(|l| Self::classify(rank, l)),
        })
    }
}
