//! Recycling arena for partition records.
//!
//! Interfaces are demolished and rebuilt after every change of the distributed
//! object set. Released records go onto a free list and are handed out again
//! (last released, first acquired) instead of being returned to the allocator.

use crate::algs::communicator::Channel;
use crate::coupling::Attr;
use crate::interface::definition::Direction;

/// Handle of a per-processor partition record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeadId(u32);

/// Handle of a per-attribute partition record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttrId(u32);

/// Half-open `start..start + len` range into an interface's flat array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: usize,
    pub len: usize,
}

impl Range {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline]
    pub fn as_std(&self) -> std::ops::Range<usize> {
        self.start..self.end()
    }
}

/// One range per direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DirRanges {
    ab: Range,
    ba: Range,
    aba: Range,
}

impl DirRanges {
    #[inline]
    pub fn get(&self, dir: Direction) -> Range {
        match dir {
            Direction::AB => self.ab,
            Direction::BA => self.ba,
            Direction::ABA => self.aba,
        }
    }

    #[inline]
    fn get_mut(&mut self, dir: Direction) -> &mut Range {
        match dir {
            Direction::AB => &mut self.ab,
            Direction::BA => &mut self.ba,
            Direction::ABA => &mut self.aba,
        }
    }

    /// Count item `pos`; the first position seen per direction becomes its start.
    #[inline]
    pub(crate) fn record(&mut self, dir: Direction, pos: usize) {
        let r = self.get_mut(dir);
        if r.len == 0 {
            r.start = pos;
        }
        r.len += 1;
    }

    pub fn total(&self) -> usize {
        self.ab.len + self.ba.len + self.aba.len
    }
}

/// Per-processor partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadNode {
    pub proc: usize,
    pub n_items: usize,
    pub dirs: DirRanges,
    pub first_attr: Option<AttrId>,
    pub next: Option<HeadId>,
    pub channel: Option<Channel>,
}

/// Per-attribute partition nested in one [`HeadNode`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttrNode {
    pub attr: Attr,
    pub n_items: usize,
    pub dirs: DirRanges,
    pub next: Option<AttrId>,
}

#[derive(Debug, Default)]
pub struct NodePool {
    heads: Vec<HeadNode>,
    attrs: Vec<AttrNode>,
    free_heads: Vec<HeadId>,
    free_attrs: Vec<AttrId>,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed head record, recycled when possible.
    pub fn acquire_head(&mut self) -> HeadId {
        match self.free_heads.pop() {
            Some(h) => {
                self.heads[h.0 as usize] = HeadNode::default();
                h
            }
            None => {
                let h = HeadId(slot_index(self.heads.len()));
                self.heads.push(HeadNode::default());
                h
            }
        }
    }

    /// Zeroed attribute record, recycled when possible.
    pub fn acquire_attr(&mut self) -> AttrId {
        match self.free_attrs.pop() {
            Some(a) => {
                self.attrs[a.0 as usize] = AttrNode::default();
                a
            }
            None => {
                let a = AttrId(slot_index(self.attrs.len()));
                self.attrs.push(AttrNode::default());
                a
            }
        }
    }

    pub fn release_head(&mut self, h: HeadId) {
        debug_assert!(!self.free_heads.contains(&h), "head {h:?} released twice");
        self.free_heads.push(h);
    }

    pub fn release_attr(&mut self, a: AttrId) {
        debug_assert!(!self.free_attrs.contains(&a), "attr {a:?} released twice");
        self.free_attrs.push(a);
    }

    #[inline]
    pub fn head(&self, h: HeadId) -> &HeadNode {
        &self.heads[h.0 as usize]
    }

    #[inline]
    pub fn head_mut(&mut self, h: HeadId) -> &mut HeadNode {
        &mut self.heads[h.0 as usize]
    }

    #[inline]
    pub fn attr(&self, a: AttrId) -> &AttrNode {
        &self.attrs[a.0 as usize]
    }

    #[inline]
    pub fn attr_mut(&mut self, a: AttrId) -> &mut AttrNode {
        &mut self.attrs[a.0 as usize]
    }

    /// Records ever created, `(heads, attrs)`.
    pub fn allocated(&self) -> (usize, usize) {
        (self.heads.len(), self.attrs.len())
    }

    /// Records currently on the free lists, `(heads, attrs)`.
    pub fn free(&self) -> (usize, usize) {
        (self.free_heads.len(), self.free_attrs.len())
    }
}

// Growing past u32::MAX records is treated like any other allocation failure.
fn slot_index(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(i) => i,
        Err(_) => std::alloc::handle_alloc_error(std::alloc::Layout::new::<HeadNode>()),
    }
}
