//! Attach one channel per remote processor of a built interface.

use crate::algs::communicator::Communicator;
use crate::algs::scratch::Scratch;
use crate::ddd_error::DddError;
use crate::interface::builder::BuiltInterface;
use crate::interface::pool::NodePool;

/// Request all channels of `built` from `comm` in one batch and store each on
/// its per-processor partition, in list order.
///
/// The processor ids live in a scratch frame that is released on every exit
/// path.
pub fn bind_channels<C: Communicator>(
    built: &BuiltInterface,
    pool: &mut NodePool,
    scratch: &mut Scratch<usize>,
    comm: &C,
) -> Result<(), DddError> {
    if built.is_empty() {
        return Ok(());
    }

    let mut procs = scratch.frame();
    let mut cur = built.first;
    while let Some(h) = cur {
        let head = pool.head(h);
        procs.push(head.proc);
        cur = head.next;
    }

    let channels = comm.open_channels(procs.as_slice())?;
    if channels.len() != procs.len() {
        let peer = procs.as_slice()[0];
        return Err(DddError::protocol(
            peer,
            "open_channels",
            format!("requested {} channels, got {}", procs.len(), channels.len()),
        ));
    }

    let mut cur = built.first;
    for ch in channels {
        let Some(h) = cur else { break };
        let head = pool.head_mut(h);
        debug_assert_eq!(head.proc, ch.peer);
        head.channel = Some(ch);
        cur = head.next;
    }
    log::debug!("bound {} channels on rank {}", procs.len(), comm.rank());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalHub, NoComm};
    use crate::coupling::{CouplingStore, LocalObject};
    use crate::interface::builder::build_interface;
    use crate::interface::definition::InterfaceDef;

    fn store_with_neighbours(procs: &[usize]) -> CouplingStore {
        let mut store = CouplingStore::new();
        for (i, &p) in procs.iter().enumerate() {
            let o = store.add_object(LocalObject {
                gid: i as u64,
                typ: 0,
                prio: 0,
                attr: 0,
            });
            store.add_coupling(o, p, 0, i as u64).unwrap();
        }
        store
    }

    #[test]
    fn channels_follow_partition_order() {
        let comms = LocalHub::new(4).comms();
        let store = store_with_neighbours(&[3, 1, 2]);
        let mut pool = NodePool::new();
        let mut built = BuiltInterface::default();
        let mut scratch = Scratch::new();
        build_interface(&InterfaceDef::standard(), &store, &mut pool, &mut built);
        bind_channels(&built, &mut pool, &mut scratch, &comms[0]).unwrap();

        let mut cur = built.first;
        let mut peers = Vec::new();
        while let Some(h) = cur {
            let ch = pool.head(h).channel.expect("channel bound");
            peers.push(ch.peer);
            cur = pool.head(h).next;
        }
        assert_eq!(peers, vec![1, 2, 3]);
        assert_eq!(scratch.in_use(), 0);
        assert_eq!(scratch.high_water(), 3);
    }

    #[test]
    fn failed_request_releases_scratch() {
        let store = store_with_neighbours(&[1]);
        let mut pool = NodePool::new();
        let mut built = BuiltInterface::default();
        let mut scratch = Scratch::new();
        build_interface(&InterfaceDef::standard(), &store, &mut pool, &mut built);
        let err = bind_channels(&built, &mut pool, &mut scratch, &NoComm).unwrap_err();
        assert!(matches!(err, DddError::Protocol { peer: 1, .. }));
        assert_eq!(scratch.in_use(), 0);
        assert_eq!(scratch.depth(), 0);
    }
}
