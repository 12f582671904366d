//! Borrowed views over a built interface.

use crate::algs::communicator::Channel;
use crate::coupling::{Attr, ObjIdx};
use crate::ddd_error::DddError;
use crate::debug_invariants::DebugInvariants;
use crate::interface::builder::{BuiltInterface, IfEntry};
use crate::interface::definition::{Direction, InterfaceDef};
use crate::interface::pool::{AttrId, DirRanges, HeadId, NodePool, Range};

/// Which items of a partition an operation covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExchangeScope {
    #[default]
    All,
    /// Only the items whose owning object carries this attribute.
    Attr(Attr),
}

#[derive(Clone, Copy)]
pub struct InterfaceView<'a> {
    pub(crate) def: &'a InterfaceDef,
    pub(crate) built: &'a BuiltInterface,
    pub(crate) pool: &'a NodePool,
}

impl<'a> InterfaceView<'a> {
    pub fn definition(&self) -> &'a InterfaceDef {
        self.def
    }

    pub fn n_items(&self) -> usize {
        self.built.n_items()
    }

    pub fn n_procs(&self) -> usize {
        self.built.n_procs()
    }

    pub fn n_attrs(&self) -> usize {
        self.built.n_attrs()
    }

    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }

    pub fn entries(&self) -> &'a [IfEntry] {
        self.built.entries()
    }

    pub fn shortcuts(&self) -> &'a [ObjIdx] {
        self.built.shortcuts()
    }

    /// Per-processor partitions in ascending processor order.
    pub fn partitions(&self) -> Partitions<'a> {
        Partitions {
            built: self.built,
            pool: self.pool,
            next: self.built.first,
        }
    }

    pub fn partition(&self, proc: usize) -> Option<ProcPartition<'a>> {
        self.partitions().find(|p| p.proc() == proc)
    }

    /// Remote processors, ascending.
    pub fn neighbours(&self) -> Vec<usize> {
        self.partitions().map(|p| p.proc()).collect()
    }
}

pub struct Partitions<'a> {
    built: &'a BuiltInterface,
    pool: &'a NodePool,
    next: Option<HeadId>,
}

impl<'a> Iterator for Partitions<'a> {
    type Item = ProcPartition<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.pool.head(id).next;
        Some(ProcPartition {
            built: self.built,
            pool: self.pool,
            id,
        })
    }
}

/// Items shared with one remote processor.
#[derive(Clone, Copy)]
pub struct ProcPartition<'a> {
    built: &'a BuiltInterface,
    pool: &'a NodePool,
    id: HeadId,
}

impl<'a> ProcPartition<'a> {
    pub fn proc(&self) -> usize {
        self.pool.head(self.id).proc
    }

    pub fn n_items(&self) -> usize {
        self.pool.head(self.id).n_items
    }

    pub fn count(&self, dir: Direction) -> usize {
        self.ranges().get(dir).len
    }

    pub fn ranges(&self) -> DirRanges {
        self.pool.head(self.id).dirs
    }

    pub fn channel(&self) -> Option<Channel> {
        self.pool.head(self.id).channel
    }

    /// All items of this processor, in flat-array order.
    pub fn entries_all(&self) -> &'a [IfEntry] {
        &self.built.entries[self.span().as_std()]
    }

    /// Contiguous range covering every direction of this processor.
    pub fn span(&self) -> Range {
        let dirs = self.ranges();
        let start = Direction::ALL
            .iter()
            .map(|&d| dirs.get(d))
            .filter(|r| r.len > 0)
            .map(|r| r.start)
            .min()
            .unwrap_or(0);
        Range {
            start,
            len: self.n_items(),
        }
    }

    pub fn entries(&self, dir: Direction) -> &'a [IfEntry] {
        &self.built.entries[self.ranges().get(dir).as_std()]
    }

    pub fn objects(&self, dir: Direction) -> &'a [ObjIdx] {
        &self.built.objs[self.ranges().get(dir).as_std()]
    }

    pub fn attrs(&self) -> AttrPartitions<'a> {
        AttrPartitions {
            built: self.built,
            pool: self.pool,
            next: self.pool.head(self.id).first_attr,
        }
    }

    pub fn attr(&self, attr: Attr) -> Option<AttrPartition<'a>> {
        self.attrs().find(|a| a.attr() == attr)
    }

    /// Direction ranges restricted to `scope`; empty if the attribute is absent.
    pub fn scoped_ranges(&self, scope: ExchangeScope) -> DirRanges {
        match scope {
            ExchangeScope::All => self.ranges(),
            ExchangeScope::Attr(a) => self.attr(a).map(|p| p.ranges()).unwrap_or_default(),
        }
    }

    /// Object indices of `dirs` within `scope`, concatenated in the given order.
    pub fn scoped_objects(&self, scope: ExchangeScope, dirs: &[Direction]) -> Vec<ObjIdx> {
        let ranges = self.scoped_ranges(scope);
        dirs.iter()
            .flat_map(|&d| self.built.objs[ranges.get(d).as_std()].iter().copied())
            .collect()
    }
}

pub struct AttrPartitions<'a> {
    built: &'a BuiltInterface,
    pool: &'a NodePool,
    next: Option<AttrId>,
}

impl<'a> Iterator for AttrPartitions<'a> {
    type Item = AttrPartition<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.pool.attr(id).next;
        Some(AttrPartition {
            built: self.built,
            pool: self.pool,
            id,
        })
    }
}

/// Items of one processor whose objects share one attribute value.
#[derive(Clone, Copy)]
pub struct AttrPartition<'a> {
    built: &'a BuiltInterface,
    pool: &'a NodePool,
    id: AttrId,
}

impl<'a> AttrPartition<'a> {
    pub fn attr(&self) -> Attr {
        self.pool.attr(self.id).attr
    }

    pub fn n_items(&self) -> usize {
        self.pool.attr(self.id).n_items
    }

    pub fn count(&self, dir: Direction) -> usize {
        self.ranges().get(dir).len
    }

    pub fn ranges(&self) -> DirRanges {
        self.pool.attr(self.id).dirs
    }

    pub fn entries(&self, dir: Direction) -> &'a [IfEntry] {
        &self.built.entries[self.ranges().get(dir).as_std()]
    }

    pub fn objects(&self, dir: Direction) -> &'a [ObjIdx] {
        &self.built.objs[self.ranges().get(dir).as_std()]
    }
}

fn check_range(r: Range, within: Range, what: &str) -> Result<(), DddError> {
    if r.len > 0 && (r.start < within.start || r.end() > within.end()) {
        return Err(DddError::Invariant(format!(
            "{what} range {:?} escapes {:?}",
            r.as_std(),
            within.as_std()
        )));
    }
    Ok(())
}

impl DebugInvariants for InterfaceView<'_> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "interface view");
    }

    fn validate_invariants(&self) -> Result<(), DddError> {
        let entries = self.entries();
        if self.shortcuts().len() != entries.len() {
            return Err(DddError::Invariant(format!(
                "{} shortcuts for {} items",
                self.shortcuts().len(),
                entries.len()
            )));
        }
        if let Some(i) = entries
            .iter()
            .zip(self.shortcuts())
            .position(|(e, &o)| e.obj != o)
        {
            return Err(DddError::Invariant(format!("shortcut {i} does not match its item")));
        }
        if let Some(w) = entries
            .windows(2)
            .position(|w| w[0].order_key() >= w[1].order_key())
        {
            return Err(DddError::Invariant(format!("items {w} and {} out of order", w + 1)));
        }

        let mut total = 0;
        for part in self.partitions() {
            let dirs = part.ranges();
            if dirs.total() != part.n_items() {
                return Err(DddError::Invariant(format!(
                    "proc {}: direction counts sum to {} of {} items",
                    part.proc(),
                    dirs.total(),
                    part.n_items()
                )));
            }
            let span = part.span();
            if span.end() > entries.len() {
                return Err(DddError::Invariant(format!("proc {} beyond item array", part.proc())));
            }
            for d in Direction::ALL {
                check_range(dirs.get(d), span, "direction")?;
                if part.entries(d).iter().any(|e| e.proc != part.proc() || e.dir != d) {
                    return Err(DddError::Invariant(format!(
                        "proc {} range {d} holds foreign items",
                        part.proc()
                    )));
                }
            }
            let mut attr_total = 0;
            for ap in part.attrs() {
                attr_total += ap.n_items();
                if ap.ranges().total() != ap.n_items() {
                    return Err(DddError::Invariant(format!(
                        "proc {} attr {}: counts do not add up",
                        part.proc(),
                        ap.attr()
                    )));
                }
                for d in Direction::ALL {
                    check_range(ap.ranges().get(d), dirs.get(d), "attribute")?;
                    if ap.entries(d).iter().any(|e| e.attr != ap.attr()) {
                        return Err(DddError::Invariant(format!(
                            "proc {} attr {} range {d} holds foreign items",
                            part.proc(),
                            ap.attr()
                        )));
                    }
                }
            }
            if attr_total != part.n_items() {
                return Err(DddError::Invariant(format!(
                    "proc {}: attributes hold {attr_total} of {} items",
                    part.proc(),
                    part.n_items()
                )));
            }
            total += part.n_items();
        }
        if total != entries.len() {
            return Err(DddError::Invariant(format!(
                "partitions hold {total} of {} items",
                entries.len()
            )));
        }
        Ok(())
    }
}
