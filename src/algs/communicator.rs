//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees). Every
//! operation returns at once with a handle; completion is observed by
//! polling it. [`Wait::wait`] spins on `poll` without timeout, so all
//! participating ranks must post matching operations or the caller blocks
//! forever.

use crate::ddd_error::DddError;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// Reusable bidirectional channel to one peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Channel {
    pub peer: usize,
    pub id: u32,
}

/// Result of polling a pending operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommStatus {
    Pending,
    /// Finished; receives carry their payload.
    Done(Option<Vec<u8>>),
    Failed(DddError),
}

/// Anything that can be polled to completion.
pub trait Wait: Sized {
    /// Check for completion without blocking.
    fn poll(&mut self) -> CommStatus;

    /// Busy-wait for completion and return the received data (if any).
    fn wait(mut self) -> Result<Option<Vec<u8>>, DddError> {
        loop {
            match self.poll() {
                CommStatus::Pending => {
                    std::hint::spin_loop();
                    std::thread::yield_now();
                }
                CommStatus::Done(data) => return Ok(data),
                CommStatus::Failed(e) => return Err(e),
            }
        }
    }
}

/// Channel provisioning and non-blocking point-to-point messaging.
pub trait Communicator {
    type Handle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Provision one channel per entry of `peers`, in the same order.
    fn open_channels(&self, peers: &[usize]) -> Result<Vec<Channel>, DddError>;
    fn connect(&self, ch: Channel) -> Self::Handle;
    fn isend(&self, ch: Channel, tag: u16, buf: &[u8]) -> Self::Handle;
    /// Receive exactly `len` bytes; any other length is a protocol error.
    fn irecv(&self, ch: Channel, tag: u16, len: usize) -> Self::Handle;
    fn disconnect(&self, ch: Channel) -> Self::Handle;

    /// Collective maximum over all ranks.
    fn all_reduce_max(&self, value: i64) -> i64;
}

/// Handle of an operation that completed when it was posted.
#[derive(Debug)]
pub struct Immediate(Option<CommStatus>);

impl Wait for Immediate {
    fn poll(&mut self) -> CommStatus {
        self.0.take().unwrap_or(CommStatus::Done(None))
    }
}

fn check_peer(peer: usize, rank: usize, size: usize, op: &'static str) -> Result<(), DddError> {
    if peer >= size {
        Err(DddError::protocol(peer, op, format!("peer out of range (size {size})")))
    } else if peer == rank {
        Err(DddError::protocol(peer, op, "channel to self"))
    } else {
        Ok(())
    }
}

/// Compile-time no-op comm for pure serial runs (a single rank, no peers).
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type Handle = Immediate;

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn open_channels(&self, peers: &[usize]) -> Result<Vec<Channel>, DddError> {
        match peers.first() {
            Some(&p) => Err(DddError::protocol(p, "open_channels", "serial run has no peers")),
            None => Ok(Vec::new()),
        }
    }
    fn connect(&self, ch: Channel) -> Immediate {
        Immediate(Some(CommStatus::Failed(DddError::protocol(
            ch.peer,
            "connect",
            "serial run has no peers",
        ))))
    }
    fn isend(&self, ch: Channel, _tag: u16, _buf: &[u8]) -> Immediate {
        self.connect(ch)
    }
    fn irecv(&self, ch: Channel, _tag: u16, _len: usize) -> Immediate {
        self.connect(ch)
    }
    fn disconnect(&self, _ch: Channel) -> Immediate {
        Immediate(None)
    }
    fn all_reduce_max(&self, value: i64) -> i64 {
        value
    }
}

// --- LocalComm: several ranks inside one process, one thread each ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug, Default)]
struct ReduceState {
    generation: u64,
    arrived: usize,
    acc: i64,
    result: i64,
}

/// Shared state of an in-process "world".
#[derive(Debug)]
pub struct LocalHub {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    reduce: Mutex<ReduceState>,
    reduced: Condvar,
}

impl LocalHub {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(LocalHub {
            size,
            mailbox: DashMap::new(),
            reduce: Mutex::new(ReduceState::default()),
            reduced: Condvar::new(),
        })
    }

    /// One communicator per rank, rank `i` at index `i`.
    pub fn comms(self: &Arc<Self>) -> Vec<LocalComm> {
        (0..self.size)
            .map(|rank| LocalComm {
                rank,
                hub: Arc::clone(self),
                next_channel: AtomicU32::new(0),
            })
            .collect()
    }

    /// Messages posted but not yet received.
    pub fn in_flight(&self) -> usize {
        self.mailbox.iter().map(|q| q.len()).sum()
    }

    fn post(&self, key: Key, data: Bytes) {
        self.mailbox.entry(key).or_default().push_back(data);
    }

    fn take(&self, key: &Key) -> Option<Bytes> {
        self.mailbox.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    hub: Arc<LocalHub>,
    next_channel: AtomicU32,
}

#[derive(Debug)]
pub enum LocalHandle {
    Ready(Immediate),
    Recv {
        hub: Arc<LocalHub>,
        key: Key,
        len: usize,
    },
}

impl LocalHandle {
    fn done() -> Self {
        LocalHandle::Ready(Immediate(None))
    }
    fn failed(e: DddError) -> Self {
        LocalHandle::Ready(Immediate(Some(CommStatus::Failed(e))))
    }
}

impl Wait for LocalHandle {
    fn poll(&mut self) -> CommStatus {
        match self {
            LocalHandle::Ready(imm) => imm.poll(),
            LocalHandle::Recv { hub, key, len } => match hub.take(key) {
                None => CommStatus::Pending,
                Some(bytes) if bytes.len() == *len => CommStatus::Done(Some(bytes.to_vec())),
                Some(bytes) => CommStatus::Failed(DddError::protocol(
                    key.0,
                    "recv",
                    format!("expected {len} bytes, got {}", bytes.len()),
                )),
            },
        }
    }
}

impl Communicator for LocalComm {
    type Handle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.hub.size
    }

    fn open_channels(&self, peers: &[usize]) -> Result<Vec<Channel>, DddError> {
        peers
            .iter()
            .map(|&peer| {
                check_peer(peer, self.rank, self.hub.size, "open_channels")?;
                Ok(Channel {
                    peer,
                    id: self.next_channel.fetch_add(1, Relaxed),
                })
            })
            .collect()
    }

    fn connect(&self, ch: Channel) -> LocalHandle {
        match check_peer(ch.peer, self.rank, self.hub.size, "connect") {
            Ok(()) => LocalHandle::done(),
            Err(e) => LocalHandle::failed(e),
        }
    }

    fn isend(&self, ch: Channel, tag: u16, buf: &[u8]) -> LocalHandle {
        if let Err(e) = check_peer(ch.peer, self.rank, self.hub.size, "send") {
            return LocalHandle::failed(e);
        }
        self.hub
            .post((self.rank, ch.peer, tag), Bytes::copy_from_slice(buf));
        LocalHandle::done()
    }

    fn irecv(&self, ch: Channel, tag: u16, len: usize) -> LocalHandle {
        if let Err(e) = check_peer(ch.peer, self.rank, self.hub.size, "recv") {
            return LocalHandle::failed(e);
        }
        LocalHandle::Recv {
            hub: Arc::clone(&self.hub),
            key: (ch.peer, self.rank, tag),
            len,
        }
    }

    fn disconnect(&self, _ch: Channel) -> LocalHandle {
        LocalHandle::done()
    }

    fn all_reduce_max(&self, value: i64) -> i64 {
        let mut st = self.hub.reduce.lock();
        let generation = st.generation;
        st.acc = if st.arrived == 0 { value } else { st.acc.max(value) };
        st.arrived += 1;
        if st.arrived == self.hub.size {
            st.result = st.acc;
            st.arrived = 0;
            st.generation += 1;
            self.hub.reduced.notify_all();
            return st.result;
        }
        while st.generation == generation {
            self.hub.reduced.wait(&mut st);
        }
        st.result
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, CommunicatorCollectives, Destination, Source};

    pub struct MpiComm {
        pub world: Arc<SimpleCommunicator>,
        pub rank: usize,
        size: usize,
        next_channel: AtomicU32,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                world: Arc::new(world),
                rank,
                size,
                next_channel: AtomicU32::new(0),
            }
        }
    }

    pub enum MpiHandle {
        Ready(Immediate),
        Send {
            req: Option<Request<'static, [u8], StaticScope>>,
            buf: *mut [u8],
        },
        Recv {
            world: Arc<SimpleCommunicator>,
            peer: usize,
            tag: i32,
            len: usize,
        },
    }

    impl Wait for MpiHandle {
        fn poll(&mut self) -> CommStatus {
            match self {
                MpiHandle::Ready(imm) => imm.poll(),
                MpiHandle::Send { req, buf } => {
                    let Some(r) = req.take() else {
                        return CommStatus::Done(None);
                    };
                    match r.test() {
                        Ok(_) => {
                            // SAFETY: produced by Box::leak in isend, request completed
                            drop(unsafe { Box::from_raw(*buf) });
                            CommStatus::Done(None)
                        }
                        Err(r) => {
                            *req = Some(r);
                            CommStatus::Pending
                        }
                    }
                }
                MpiHandle::Recv {
                    world,
                    peer,
                    tag,
                    len,
                } => match world
                    .process_at_rank(*peer as i32)
                    .immediate_matched_probe_with_tag(*tag)
                {
                    None => CommStatus::Pending,
                    Some((msg, _)) => {
                        let (data, _) = msg.matched_receive_vec::<u8>();
                        if data.len() == *len {
                            CommStatus::Done(Some(data))
                        } else {
                            CommStatus::Failed(DddError::protocol(
                                *peer,
                                "recv",
                                format!("expected {len} bytes, got {}", data.len()),
                            ))
                        }
                    }
                },
            }
        }
    }

    impl Communicator for MpiComm {
        type Handle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn open_channels(&self, peers: &[usize]) -> Result<Vec<Channel>, DddError> {
            peers
                .iter()
                .map(|&peer| {
                    check_peer(peer, self.rank, self.size, "open_channels")?;
                    Ok(Channel {
                        peer,
                        id: self.next_channel.fetch_add(1, Relaxed),
                    })
                })
                .collect()
        }

        fn connect(&self, ch: Channel) -> MpiHandle {
            match check_peer(ch.peer, self.rank, self.size, "connect") {
                Ok(()) => MpiHandle::Ready(Immediate(None)),
                Err(e) => MpiHandle::Ready(Immediate(Some(CommStatus::Failed(e)))),
            }
        }

        fn isend(&self, ch: Channel, tag: u16, buf: &[u8]) -> MpiHandle {
            let leaked: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = leaked;
            // SAFETY: the leaked buffer lives until the request completes in poll
            let data: &'static [u8] = unsafe { &*ptr };
            let req = self
                .world
                .process_at_rank(ch.peer as i32)
                .immediate_send_with_tag(StaticScope, data, i32::from(tag));
            MpiHandle::Send {
                req: Some(req),
                buf: ptr,
            }
        }

        fn irecv(&self, ch: Channel, tag: u16, len: usize) -> MpiHandle {
            MpiHandle::Recv {
                world: Arc::clone(&self.world),
                peer: ch.peer,
                tag: i32::from(tag),
                len,
            }
        }

        fn disconnect(&self, _ch: Channel) -> MpiHandle {
            MpiHandle::Ready(Immediate(None))
        }

        fn all_reduce_max(&self, value: i64) -> i64 {
            let mut out = value;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::max());
            out
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};
