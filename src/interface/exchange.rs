//! Move per-object data through a built interface.
//!
//! No item labels are sent: the receiver matches the `k`-th value of a
//! message to its own `k`-th item for that processor, which works because
//! both sides sorted the shared items identically. Each processor posts all
//! receives, gathers and posts all sends, then waits for the receives and
//! fuses the values with a [`Delta`]. All processors holding the interface
//! must call the same operation.

use crate::algs::communicator::{Communicator, Wait};
use crate::coupling::ObjIdx;
use crate::ddd_error::DddError;
use crate::interface::definition::Direction;
use crate::interface::delta::Delta;
use crate::interface::view::{ExchangeScope, InterfaceView};
use std::mem::size_of;

/// First message tag used for interface traffic; interface `i` uses `base + i`.
pub const EXCHANGE_TAG_BASE: u16 = 0x2000;

/// Which way a one-way transfer runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeDir {
    /// From copies in priority set A to copies in set B.
    Forward,
    /// From copies in set B to copies in set A.
    Backward,
}

impl ExchangeDir {
    fn send_dirs(self) -> &'static [Direction] {
        match self {
            ExchangeDir::Forward => &[Direction::AB, Direction::ABA],
            ExchangeDir::Backward => &[Direction::BA, Direction::ABA],
        }
    }

    fn recv_dirs(self) -> &'static [Direction] {
        match self {
            ExchangeDir::Forward => &[Direction::BA, Direction::ABA],
            ExchangeDir::Backward => &[Direction::AB, Direction::ABA],
        }
    }
}

fn tag_of(view: &InterfaceView<'_>) -> u16 {
    EXCHANGE_TAG_BASE.wrapping_add(view.definition().id().get() as u16)
}

fn transfer<V, D, C>(
    view: &InterfaceView<'_>,
    scope: ExchangeScope,
    comm: &C,
    send_dirs: &[Direction],
    recv_dirs: &[Direction],
    values: &mut [V],
) -> Result<(), DddError>
where
    D: Delta<V>,
    C: Communicator,
{
    let id = view.definition().id().get();
    let tag = tag_of(view);
    let sz = size_of::<D::Part>();

    // 1) post all receives
    let mut recvs = Vec::with_capacity(view.n_procs());
    for part in view.partitions() {
        let ch = part.channel().ok_or(DddError::ChannelsNotBound(id))?;
        let objs = part.scoped_objects(scope, recv_dirs);
        if !objs.is_empty() {
            let h = comm.irecv(ch, tag, objs.len() * sz);
            recvs.push((ch.peer, objs, h));
        }
    }

    // 2) gather and post all sends
    let mut sends = Vec::with_capacity(view.n_procs());
    for part in view.partitions() {
        let ch = part.channel().ok_or(DddError::ChannelsNotBound(id))?;
        let objs = part.scoped_objects(scope, send_dirs);
        if objs.is_empty() {
            continue;
        }
        let buf = objs
            .iter()
            .map(|&o| values.get(o).map(D::restrict).ok_or(DddError::UnknownObject(o)))
            .collect::<Result<Vec<_>, _>>()?;
        sends.push(comm.isend(ch, tag, bytemuck::cast_slice(&buf)));
    }

    // 3) wait for receives and fuse in item order
    for (peer, objs, h) in recvs {
        let data = h
            .wait()?
            .ok_or_else(|| DddError::protocol(peer, "recv", "receive completed without payload"))?;
        for (&o, chunk) in objs.iter().zip(data.chunks_exact(sz.max(1))) {
            let part: D::Part = bytemuck::pod_read_unaligned(&chunk[..sz]);
            let local = values.get_mut(o).ok_or(DddError::UnknownObject(o))?;
            D::fuse(local, part);
        }
    }

    // 4) drain sends
    for s in sends {
        s.wait()?;
    }
    Ok(())
}

/// One-way transfer: senders restrict their `AB` (or `BA`) and `ABA` items,
/// receivers fuse into the mirrored ranges.
pub fn oneway<V, D, C>(
    view: &InterfaceView<'_>,
    dir: ExchangeDir,
    scope: ExchangeScope,
    comm: &C,
    values: &mut [V],
) -> Result<(), DddError>
where
    D: Delta<V>,
    C: Communicator,
{
    transfer::<V, D, C>(view, scope, comm, dir.send_dirs(), dir.recv_dirs(), values)
}

/// Two-way transfer over every item of the interface.
///
/// Items are sent in `AB, BA, ABA` order and received in `BA, AB, ABA`
/// order, which is the sender's order seen from the peer.
pub fn exchange<V, D, C>(
    view: &InterfaceView<'_>,
    scope: ExchangeScope,
    comm: &C,
    values: &mut [V],
) -> Result<(), DddError>
where
    D: Delta<V>,
    C: Communicator,
{
    transfer::<V, D, C>(
        view,
        scope,
        comm,
        &[Direction::AB, Direction::BA, Direction::ABA],
        &[Direction::BA, Direction::AB, Direction::ABA],
        values,
    )
}

/// Apply `f` to every local object of the `dirs` ranges, no communication.
///
/// An object shared with several processors is visited once per coupling.
pub fn exec_local<F>(view: &InterfaceView<'_>, dirs: &[Direction], scope: ExchangeScope, mut f: F)
where
    F: FnMut(usize, ObjIdx),
{
    for part in view.partitions() {
        for o in part.scoped_objects(scope, dirs) {
            f(part.proc(), o);
        }
    }
}
