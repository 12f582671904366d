//! Build the per-processor / per-attribute / per-direction item lists of one
//! interface from a coupling store snapshot.
//!
//! Every processor sorts its selected couplings with the same key:
//!
//! 1. remote processor, ascending
//! 2. direction, ascending (`AB < BA < ABA`)
//! 3. attribute, **descending**
//! 4. global id, ascending
//!
//! Global ids and attributes are identical on every copy of an object, and a
//! coupling classified `AB` on one side is `BA` on the other. Hence the items
//! processor `p` lists as `AB` towards `q` appear in exactly the order `q`
//! lists them as `BA` towards `p`, and messages can be matched by position
//! alone.

use crate::coupling::{Attr, CouplingStore, Gid, ObjIdx};
use crate::interface::definition::{Direction, InterfaceDef};
use crate::interface::pool::{AttrId, HeadId, NodePool};
use std::cmp::Reverse;

/// One selected coupling in the flat array of a built interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IfEntry {
    /// Owning local object.
    pub obj: ObjIdx,
    /// Position in the object's coupling list.
    pub slot: usize,
    pub proc: usize,
    pub dir: Direction,
    pub attr: Attr,
    pub gid: Gid,
}

impl IfEntry {
    /// The ordering key; `obj` only separates entries whose gids collide.
    #[inline]
    pub fn order_key(&self) -> (usize, Direction, Reverse<Attr>, Gid, ObjIdx) {
        (self.proc, self.dir, Reverse(self.attr), self.gid, self.obj)
    }
}

/// Built state of one interface.
///
/// `entries` is the single buffer behind every partition: heads and attribute
/// records only hold ranges into it. `objs[i]` is `entries[i].obj`, kept apart
/// so exchange loops touch a dense array of object indices.
#[derive(Debug, Default)]
pub struct BuiltInterface {
    pub(crate) entries: Vec<IfEntry>,
    pub(crate) objs: Vec<ObjIdx>,
    pub(crate) first: Option<HeadId>,
    pub(crate) n_heads: usize,
    pub(crate) n_attrs: usize,
}

impl BuiltInterface {
    pub fn n_items(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub fn entries(&self) -> &[IfEntry] {
        &self.entries
    }

    pub fn shortcuts(&self) -> &[ObjIdx] {
        &self.objs
    }

    pub fn n_procs(&self) -> usize {
        self.n_heads
    }

    pub fn n_attrs(&self) -> usize {
        self.n_attrs
    }

    /// Return all partition records to `pool` and drop the arrays.
    ///
    /// Safe on an interface that was never built.
    pub fn demolish(&mut self, pool: &mut NodePool) {
        let mut head = self.first.take();
        while let Some(h) = head {
            let mut attr = pool.head(h).first_attr;
            while let Some(a) = attr {
                attr = pool.attr(a).next;
                pool.release_attr(a);
            }
            head = pool.head(h).next;
            pool.release_head(h);
        }
        self.entries = Vec::new();
        self.objs = Vec::new();
        self.n_heads = 0;
        self.n_attrs = 0;
    }
}

/// Collect the couplings that take part in `def`, tagged with their direction.
pub fn select(def: &InterfaceDef, store: &CouplingStore) -> Vec<IfEntry> {
    let mut out = Vec::with_capacity(if def.is_standard() {
        store.n_couplings()
    } else {
        0
    });
    for (obj, header) in store.objects() {
        for (slot, cpl) in store.couplings(obj).iter().enumerate() {
            let dir = if def.is_standard() {
                Direction::ABA
            } else {
                match def.direction(header, cpl) {
                    Some(d) => d,
                    None => continue,
                }
            };
            out.push(IfEntry {
                obj,
                slot,
                proc: cpl.proc,
                dir,
                attr: header.attr,
                gid: header.gid,
            });
        }
    }
    out
}

/// Sort into the cross-processor order documented at module level.
pub fn sort_entries(entries: &mut [IfEntry]) {
    entries.sort_unstable_by_key(IfEntry::order_key);
}

/// Attribute partition of head `h` with value `attr`, appended to the head's
/// list if absent. Returns the record and whether it was newly created.
fn find_or_append_attr(pool: &mut NodePool, h: HeadId, attr: Attr) -> (AttrId, bool) {
    let mut last = None;
    let mut cur = pool.head(h).first_attr;
    while let Some(a) = cur {
        if pool.attr(a).attr == attr {
            return (a, false);
        }
        last = Some(a);
        cur = pool.attr(a).next;
    }
    let a = pool.acquire_attr();
    pool.attr_mut(a).attr = attr;
    match last {
        Some(l) => pool.attr_mut(l).next = Some(a),
        None => pool.head_mut(h).first_attr = Some(a),
    }
    (a, true)
}

/// Sweep sorted entries once and create the head/attribute records.
fn partition(built: &mut BuiltInterface, pool: &mut NodePool) {
    let mut tail: Option<HeadId> = None;
    let mut cur_attr: Option<AttrId> = None;

    for (pos, e) in built.entries.iter().enumerate() {
        let h = match tail {
            Some(h) if pool.head(h).proc == e.proc => h,
            prev => {
                let h = pool.acquire_head();
                pool.head_mut(h).proc = e.proc;
                match prev {
                    Some(p) => pool.head_mut(p).next = Some(h),
                    None => built.first = Some(h),
                }
                built.n_heads += 1;
                tail = Some(h);
                cur_attr = None;
                h
            }
        };

        let a = match cur_attr {
            Some(a) if pool.attr(a).attr == e.attr => a,
            _ => {
                // attributes recur once per direction inside one processor
                let (a, fresh) = find_or_append_attr(pool, h, e.attr);
                if fresh {
                    built.n_attrs += 1;
                }
                cur_attr = Some(a);
                a
            }
        };

        let head = pool.head_mut(h);
        head.n_items += 1;
        head.dirs.record(e.dir, pos);
        let attr = pool.attr_mut(a);
        attr.n_items += 1;
        attr.dirs.record(e.dir, pos);
    }
}

/// (Re)build `built` for `def` from `store`.
///
/// The previous state is demolished first, so an unchanged store yields an
/// identical result.
pub fn build_interface(
    def: &InterfaceDef,
    store: &CouplingStore,
    pool: &mut NodePool,
    built: &mut BuiltInterface,
) {
    built.demolish(pool);

    let mut entries = select(def, store);
    if entries.is_empty() {
        return;
    }
    sort_entries(&mut entries);
    built.objs = entries.iter().map(|e| e.obj).collect();
    built.entries = entries;
    partition(built, pool);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::{LocalObject, Priority};
    use crate::interface::definition::{InterfaceId, TypeMask};

    const MASTER: Priority = 1;
    const BORDER: Priority = 2;

    fn add(store: &mut CouplingStore, gid: Gid, prio: Priority, attr: Attr, cpls: &[(usize, Priority)]) {
        let o = store.add_object(LocalObject {
            gid,
            typ: 0,
            prio,
            attr,
        });
        for &(p, pr) in cpls {
            store.add_coupling(o, p, pr, gid).unwrap();
        }
    }

    fn master_border() -> InterfaceDef {
        InterfaceDef::new(InterfaceId(1), TypeMask::ALL, &[MASTER], &[BORDER])
    }

    #[test]
    fn empty_store_builds_empty_interface() {
        let mut pool = NodePool::new();
        let mut built = BuiltInterface::default();
        build_interface(&master_border(), &CouplingStore::new(), &mut pool, &mut built);
        assert!(built.is_empty());
        assert_eq!(built.n_items(), 0);
        assert!(built.shortcuts().is_empty());
    }

    #[test]
    fn entries_follow_sort_key() {
        let mut store = CouplingStore::new();
        add(&mut store, 30, MASTER, 1, &[(2, BORDER)]);
        add(&mut store, 10, BORDER, 5, &[(1, MASTER)]);
        add(&mut store, 20, MASTER, 5, &[(1, BORDER)]);
        add(&mut store, 5, MASTER, 1, &[(1, BORDER)]);
        add(&mut store, 7, MASTER, 5, &[(1, BORDER)]);

        let mut pool = NodePool::new();
        let mut built = BuiltInterface::default();
        build_interface(&master_border(), &store, &mut pool, &mut built);

        let order: Vec<(usize, Direction, Gid)> =
            built.entries().iter().map(|e| (e.proc, e.dir, e.gid)).collect();
        assert_eq!(
            order,
            vec![
                (1, Direction::AB, 7),
                (1, Direction::AB, 20),
                (1, Direction::AB, 5),
                (1, Direction::BA, 10),
                (2, Direction::AB, 30),
            ]
        );
        let objs: Vec<ObjIdx> = built.entries().iter().map(|e| e.obj).collect();
        assert_eq!(built.shortcuts(), objs.as_slice());
    }

    #[test]
    fn attributes_are_shared_across_directions() {
        let mut store = CouplingStore::new();
        add(&mut store, 1, MASTER, 3, &[(1, BORDER)]);
        add(&mut store, 2, MASTER, 4, &[(1, BORDER)]);
        add(&mut store, 3, BORDER, 3, &[(1, MASTER)]);

        let mut pool = NodePool::new();
        let mut built = BuiltInterface::default();
        build_interface(&master_border(), &store, &mut pool, &mut built);

        assert_eq!(built.n_procs(), 1);
        assert_eq!(built.n_attrs(), 2);
        let h = built.first.unwrap();
        let head = pool.head(h);
        assert_eq!(head.n_items, 3);
        assert_eq!(head.dirs.get(Direction::AB).len, 2);
        assert_eq!(head.dirs.get(Direction::BA).as_std(), 2..3);

        // attribute 4 sorts first (descending), attribute 3 collects both directions
        let a4 = head.first_attr.unwrap();
        let a3 = pool.attr(a4).next.unwrap();
        assert_eq!(pool.attr(a4).attr, 4);
        assert_eq!(pool.attr(a3).attr, 3);
        assert_eq!(pool.attr(a3).n_items, 2);
        assert_eq!(pool.attr(a3).dirs.get(Direction::AB).as_std(), 1..2);
        assert_eq!(pool.attr(a3).dirs.get(Direction::BA).as_std(), 2..3);
        assert!(pool.attr(a3).next.is_none());
    }

    #[test]
    fn standard_interface_takes_everything_undirected() {
        let mut store = CouplingStore::new();
        add(&mut store, 1, 9, 0, &[(1, 8), (2, 7)]);
        add(&mut store, 2, 6, 0, &[(1, 5)]);

        let mut pool = NodePool::new();
        let mut built = BuiltInterface::default();
        build_interface(&InterfaceDef::standard(), &store, &mut pool, &mut built);
        assert_eq!(built.n_items(), 3);
        assert!(built.entries().iter().all(|e| e.dir == Direction::ABA));
        assert_eq!(built.n_procs(), 2);
    }

    #[test]
    fn demolish_returns_all_records() {
        let mut store = CouplingStore::new();
        add(&mut store, 1, MASTER, 1, &[(1, BORDER), (2, BORDER)]);
        add(&mut store, 2, MASTER, 2, &[(1, BORDER)]);

        let mut pool = NodePool::new();
        let mut built = BuiltInterface::default();
        build_interface(&master_border(), &store, &mut pool, &mut built);
        let allocated = pool.allocated();
        built.demolish(&mut pool);
        assert_eq!(pool.free(), allocated);
        assert!(built.is_empty());

        // a second build reuses the freed records
        build_interface(&master_border(), &store, &mut pool, &mut built);
        assert_eq!(pool.allocated(), allocated);
        assert_eq!(pool.free(), (0, 0));
    }
}
