//! Thin façade over in-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices*. A send copies its payload at post
//! time, so the caller may reuse the source plane immediately; the request
//! still counts as outstanding until the transport confirms delivery.
//! Receives hand their payload back on completion instead of writing into a
//! borrowed buffer, which keeps request handles free of lifetimes.
//!
//! Every message is addressed by `(peer, channel, tag)`. Channels are
//! independent lanes (one per boundary direction); messages with the same
//! address are matched in posting order.

use crate::sweep_error::SweepCommError;
use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Non-blocking point-to-point transport.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Test + Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Test + Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(
        &self,
        peer: usize,
        channel: usize,
        tag: i32,
        buf: &[u8],
    ) -> Result<Self::SendHandle, SweepCommError>;

    fn irecv(
        &self,
        peer: usize,
        channel: usize,
        tag: i32,
    ) -> Result<Self::RecvHandle, SweepCommError>;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Block until completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Non-blocking completion check.
pub trait Test {
    /// Returns `true` once the request has completed. After that, `wait`
    /// returns immediately.
    fn test(&mut self) -> bool;
}

/// Serial backend: rank 0 of 1. No peer exists, so any attempt to talk to
/// one is an error.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Test for () {
    fn test(&mut self) -> bool {
        true
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, peer: usize, _ch: usize, _tag: i32, _buf: &[u8]) -> Result<(), SweepCommError> {
        Err(SweepCommError::CommError {
            neighbor: peer,
            message: "serial communicator cannot send".into(),
        })
    }

    fn irecv(&self, peer: usize, _ch: usize, _tag: i32) -> Result<(), SweepCommError> {
        Err(SweepCommError::CommError {
            neighbor: peer,
            message: "serial communicator cannot receive".into(),
        })
    }
}

// --- LocalComm: simulated ranks inside one process ---

type Key = (usize, usize, usize, i32); // (src, dst, channel, tag)

struct Envelope {
    payload: Bytes,
    delivered: Arc<AtomicBool>,
}

type Mailbox = DashMap<Key, VecDeque<Envelope>>;

static MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(DashMap::new()));

/// In-process transport for ranks simulated in one address space.
///
/// Sends complete when the matching receive has taken the message
/// (rendezvous), so outstanding sends are observable exactly as with a
/// synchronous MPI send. All operations are non-blocking except `wait`.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// Rank on the process-wide mailbox. Tests using this share state and
    /// must not run concurrently with overlapping tags.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: MAILBOX.clone(),
        }
    }

    /// `size` ranks sharing a private mailbox.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox: Arc<Mailbox> = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: mailbox.clone(),
            })
            .collect()
    }

    /// Messages posted but not yet received, over all ranks of this mailbox.
    pub fn in_flight(&self) -> usize {
        self.mailbox.iter().map(|q| q.value().len()).sum()
    }

    fn check_peer(&self, peer: usize) -> Result<(), SweepCommError> {
        if peer >= self.size {
            return Err(SweepCommError::RankOutOfRange {
                rank: peer,
                size: self.size,
            });
        }
        Ok(())
    }
}

pub struct LocalSend {
    delivered: Arc<AtomicBool>,
}

impl Test for LocalSend {
    fn test(&mut self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }
}

impl Wait for LocalSend {
    fn wait(mut self) -> Option<Vec<u8>> {
        while !self.test() {
            std::thread::yield_now();
        }
        None
    }
}

pub struct LocalRecv {
    mailbox: Arc<Mailbox>,
    key: Key,
    data: Option<Vec<u8>>,
}

impl Test for LocalRecv {
    fn test(&mut self) -> bool {
        if self.data.is_some() {
            return true;
        }
        let popped = match self.mailbox.get_mut(&self.key) {
            Some(mut queue) => queue.pop_front(),
            None => return false,
        };
        let Some(env) = popped else {
            return false;
        };
        // Drop the address once drained; a concurrent send keeps it alive.
        self.mailbox.remove_if(&self.key, |_, queue| queue.is_empty());
        self.data = Some(env.payload.to_vec());
        env.delivered.store(true, Ordering::Release);
        true
    }
}

impl Wait for LocalRecv {
    fn wait(mut self) -> Option<Vec<u8>> {
        while !self.test() {
            std::thread::yield_now();
        }
        self.data.take()
    }
}

impl Communicator for LocalComm {
    type SendHandle = LocalSend;
    type RecvHandle = LocalRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(
        &self,
        peer: usize,
        channel: usize,
        tag: i32,
        buf: &[u8],
    ) -> Result<LocalSend, SweepCommError> {
        self.check_peer(peer)?;
        let delivered = Arc::new(AtomicBool::new(false));
        self.mailbox
            .entry((self.rank, peer, channel, tag))
            .or_default()
            .push_back(Envelope {
                payload: Bytes::copy_from_slice(buf),
                delivered: delivered.clone(),
            });
        Ok(LocalSend { delivered })
    }

    fn irecv(&self, peer: usize, channel: usize, tag: i32) -> Result<LocalRecv, SweepCommError> {
        self.check_peer(peer)?;
        Ok(LocalRecv {
            mailbox: self.mailbox.clone(),
            key: (peer, self.rank, channel, tag),
            data: None,
        })
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use crate::topology::subdomain::NUM_DIRECTIONS;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use std::rc::Rc;

    /// MPI transport with one duplicated communicator per channel.
    ///
    /// The caller keeps the `mpi::environment::Universe` alive for as long as
    /// this value exists.
    pub struct MpiComm {
        channels: Rc<[SimpleCommunicator; NUM_DIRECTIONS]>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: &SimpleCommunicator) -> Self {
            let channels = [world.duplicate(), world.duplicate(), world.duplicate()];
            Self {
                rank: world.rank() as usize,
                size: world.size() as usize,
                channels: Rc::new(channels),
            }
        }

        fn channel(&self, channel: usize) -> Result<&SimpleCommunicator, SweepCommError> {
            self.channels
                .get(channel)
                .ok_or_else(|| SweepCommError::CommError {
                    neighbor: self.rank,
                    message: format!("no channel {channel}"),
                })
        }
    }

    /// Send request owning a heap copy of the payload until completion.
    pub struct MpiSend {
        req: Option<Request<'static, [u8]>>,
        buf: *mut [u8],
    }

    impl MpiSend {
        fn release(&mut self) {
            if !self.buf.is_null() {
                // SAFETY: `buf` came from `Box::into_raw` in `isend` and the
                // request that borrowed it has completed.
                drop(unsafe { Box::from_raw(self.buf) });
                self.buf = std::ptr::slice_from_raw_parts_mut(std::ptr::null_mut(), 0);
            }
        }
    }

    impl Test for MpiSend {
        fn test(&mut self) -> bool {
            match self.req.take() {
                None => true,
                Some(req) => match req.test() {
                    Ok(_) => {
                        self.release();
                        true
                    }
                    Err(req) => {
                        self.req = Some(req);
                        false
                    }
                },
            }
        }
    }

    impl Wait for MpiSend {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(req) = self.req.take() {
                req.wait();
            }
            self.release();
            None
        }
    }

    /// A send abandoned on an error path still has to complete before its
    /// request and payload can be freed.
    impl Drop for MpiSend {
        fn drop(&mut self) {
            if let Some(req) = self.req.take() {
                req.wait();
            }
            self.release();
        }
    }

    /// Receive request matched by probing `(peer, tag)` on its channel.
    pub struct MpiRecv {
        channels: Rc<[SimpleCommunicator; NUM_DIRECTIONS]>,
        channel: usize,
        peer: i32,
        tag: i32,
        data: Option<Vec<u8>>,
    }

    impl Test for MpiRecv {
        fn test(&mut self) -> bool {
            if self.data.is_some() {
                return true;
            }
            let process = self.channels[self.channel].process_at_rank(self.peer);
            match process.immediate_matched_probe_with_tag(self.tag) {
                Some((msg, _status)) => {
                    let (data, _status) = msg.matched_receive_vec::<u8>();
                    self.data = Some(data);
                    true
                }
                None => false,
            }
        }
    }

    impl Wait for MpiRecv {
        fn wait(mut self) -> Option<Vec<u8>> {
            if self.data.is_none() {
                let process = self.channels[self.channel].process_at_rank(self.peer);
                let (msg, _status) = process.matched_probe_with_tag(self.tag);
                let (data, _status) = msg.matched_receive_vec::<u8>();
                self.data = Some(data);
            }
            self.data.take()
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(
            &self,
            peer: usize,
            channel: usize,
            tag: i32,
            buf: &[u8],
        ) -> Result<MpiSend, SweepCommError> {
            let comm = self.channel(channel)?;
            let raw: *mut [u8] = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: the box is only reclaimed in `MpiSend::release`, after
            // the request using this borrow has completed.
            let payload: &'static [u8] = unsafe { &*raw };
            let req = comm
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, payload, tag);
            Ok(MpiSend {
                req: Some(req),
                buf: raw,
            })
        }

        fn irecv(&self, peer: usize, channel: usize, tag: i32) -> Result<MpiRecv, SweepCommError> {
            self.channel(channel)?;
            Ok(MpiRecv {
                channels: self.channels.clone(),
                channel,
                peer: peer as i32,
                tag,
                data: None,
            })
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
