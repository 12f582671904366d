#![allow(dead_code)]
use ddd_interface::{
    algs::communicator::{LocalComm, LocalHub},
    coupling::{Attr, CouplingStore, Gid, LocalObject, ObjType, Priority},
};

pub const MASTER: Priority = 1;
pub const BORDER: Priority = 2;
pub const GHOST: Priority = 3;

/// One object and every copy of it across the world.
#[derive(Clone, Debug)]
pub struct Shared {
    pub gid: Gid,
    pub typ: ObjType,
    pub attr: Attr,
    /// (rank, priority) per copy.
    pub copies: Vec<(usize, Priority)>,
}

impl Shared {
    pub fn new(gid: Gid, copies: &[(usize, Priority)]) -> Self {
        Shared {
            gid,
            typ: 0,
            attr: 0,
            copies: copies.to_vec(),
        }
    }

    pub fn typ(mut self, typ: ObjType) -> Self {
        self.typ = typ;
        self
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }
}

/// Coupling store of `rank`: its copies, each coupled to all other copies.
pub fn store_for(rank: usize, world: &[Shared]) -> CouplingStore {
    let mut store = CouplingStore::new();
    for obj in world {
        let Some(&(_, prio)) = obj.copies.iter().find(|(r, _)| *r == rank) else {
            continue;
        };
        let o = store.add_object(LocalObject {
            gid: obj.gid,
            typ: obj.typ,
            prio,
            attr: obj.attr,
        });
        for &(r, p) in &obj.copies {
            if r != rank {
                store.add_coupling(o, r, p, obj.gid).unwrap();
            }
        }
    }
    store
}

/// Run `f` once per rank of an `n`-rank in-process world, one thread each.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&LocalComm) -> R + Sync,
{
    let comms = LocalHub::new(n).comms();
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}
