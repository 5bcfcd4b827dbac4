//! Message identity and plane byte views.
//!
//! Every plane travels as a single message whose tag encodes the *sending*
//! rank and the *destination* subdomain:
//!
//! ```text
//! tag = rank + size * subdomain
//! ```
//!
//! The encoding is injective for `rank < size`, so a receiver can tell apart
//! any number of simultaneously outstanding planes without a side channel.
//! Planes of different directions never share a channel, so the direction is
//! not part of the tag.

use crate::sweep_error::SweepCommError;
use crate::topology::subdomain::SubdomainId;

pub fn plane_bytes(plane: &[f64]) -> &[u8] {
    bytemuck::cast_slice(plane)
}

pub fn plane_bytes_mut(plane: &mut [f64]) -> &mut [u8] {
    bytemuck::cast_slice_mut(plane)
}

/// Copy a received payload into an incoming plane.
///
/// The payload is a plain `Vec<u8>` with no alignment guarantee, so it is
/// copied through the byte view of the (aligned) destination.
pub fn copy_into_plane(plane: &mut [f64], payload: &[u8]) -> Result<(), String> {
    let dst = plane_bytes_mut(plane);
    expect_exact_len(payload.len(), dst.len())?;
    dst.copy_from_slice(payload);
    Ok(())
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Decoded form of a tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageTag {
    pub rank: usize,
    pub subdomain: SubdomainId,
}

/// Pure `(rank, subdomain) <-> tag` codec for one communicator size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TagCodec {
    size: usize,
    max_tag: i32,
}

impl TagCodec {
    pub fn new(size: usize, max_tag: i32) -> Result<Self, SweepCommError> {
        if size == 0 {
            return Err(SweepCommError::RankOutOfRange { rank: 0, size });
        }
        if max_tag <= 0 {
            return Err(SweepCommError::InvalidConfig(format!(
                "max_tag must be positive, got {max_tag}"
            )));
        }
        Ok(Self { size, max_tag })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_tag(&self) -> i32 {
        self.max_tag
    }

    /// Largest subdomain id that still encodes for every rank.
    pub fn max_subdomain(&self) -> u32 {
        let span = (self.max_tag as u64 + 1) / self.size as u64;
        span.saturating_sub(1).min(u32::MAX as u64) as u32
    }

    pub fn encode(&self, rank: usize, subdomain: SubdomainId) -> Result<i32, SweepCommError> {
        if rank >= self.size {
            return Err(SweepCommError::RankOutOfRange {
                rank,
                size: self.size,
            });
        }
        let tag = rank as u64 + self.size as u64 * subdomain.get() as u64;
        if tag > self.max_tag as u64 {
            return Err(SweepCommError::TagOutOfRange {
                rank,
                subdomain,
                max_tag: self.max_tag,
            });
        }
        Ok(tag as i32)
    }

    pub fn decode(&self, tag: i32) -> Result<MessageTag, SweepCommError> {
        if tag < 0 || tag > self.max_tag {
            return Err(SweepCommError::TagDecode(tag));
        }
        let tag = tag as u64;
        let size = self.size as u64;
        Ok(MessageTag {
            rank: (tag % size) as usize,
            subdomain: SubdomainId::new((tag / size) as u32),
        })
    }
}
