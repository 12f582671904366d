//! Metadata that identifies the remote copies of a local object.
use crate::ddd_error::DddError;
use hashbrown::HashMap;
use std::collections::BTreeSet;

/// Role of one copy of a replicated object (master, border, ghost, ...).
pub type Priority = u16;
/// Secondary grouping label of an object, e.g. a subdomain id.
pub type Attr = i32;
/// Kind of distributed object; must be below 32 to fit a type mask.
pub type ObjType = u32;
/// Global id, identical on every processor that holds a copy.
pub type Gid = u64;
/// Opaque reference to the object on the remote side.
pub type RemoteRef = u64;
/// Index of a local object inside a [`CouplingStore`].
pub type ObjIdx = usize;

/// Header of a local object copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LocalObject {
    pub gid: Gid,
    pub typ: ObjType,
    pub prio: Priority,
    pub attr: Attr,
}

/// One remote copy of a local object.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Coupling {
    pub proc: usize,
    pub prio: Priority,
    pub remote: RemoteRef,
}

/// Local objects plus their coupling lists.
#[derive(Clone, Debug, Default)]
pub struct CouplingStore {
    objects: Vec<LocalObject>,
    couplings: Vec<Vec<Coupling>>,
    by_gid: HashMap<Gid, ObjIdx>,
}

impl CouplingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local object copy and return its index.
    pub fn add_object(&mut self, obj: LocalObject) -> ObjIdx {
        let idx = self.objects.len();
        self.objects.push(obj);
        self.couplings.push(Vec::new());
        self.by_gid.insert(obj.gid, idx);
        idx
    }

    /// Record that `obj` has a copy on `proc` with priority `prio`.
    ///
    /// A second coupling to the same processor replaces the first one, the way
    /// a directory update would.
    pub fn add_coupling(
        &mut self,
        obj: ObjIdx,
        proc: usize,
        prio: Priority,
        remote: RemoteRef,
    ) -> Result<(), DddError> {
        let list = self
            .couplings
            .get_mut(obj)
            .ok_or(DddError::UnknownObject(obj))?;
        let cpl = Coupling { proc, prio, remote };
        match list.iter_mut().find(|c| c.proc == proc) {
            Some(existing) => *existing = cpl,
            None => list.push(cpl),
        }
        Ok(())
    }

    /// Drop every coupling of `obj` (the object became purely local).
    pub fn clear_couplings(&mut self, obj: ObjIdx) -> Result<(), DddError> {
        self.couplings
            .get_mut(obj)
            .ok_or(DddError::UnknownObject(obj))?
            .clear();
        Ok(())
    }

    pub fn set_prio(&mut self, obj: ObjIdx, prio: Priority) -> Result<(), DddError> {
        self.objects
            .get_mut(obj)
            .ok_or(DddError::UnknownObject(obj))?
            .prio = prio;
        Ok(())
    }

    pub fn set_attr(&mut self, obj: ObjIdx, attr: Attr) -> Result<(), DddError> {
        self.objects
            .get_mut(obj)
            .ok_or(DddError::UnknownObject(obj))?
            .attr = attr;
        Ok(())
    }

    pub fn object(&self, obj: ObjIdx) -> Option<&LocalObject> {
        self.objects.get(obj)
    }

    /// Coupling list of `obj`; empty for unknown indices.
    pub fn couplings(&self, obj: ObjIdx) -> &[Coupling] {
        self.couplings.get(obj).map_or(&[], Vec::as_slice)
    }

    /// Iterate `(index, object)` in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjIdx, &LocalObject)> {
        self.objects.iter().enumerate()
    }

    pub fn find(&self, gid: Gid) -> Option<ObjIdx> {
        self.by_gid.get(&gid).copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total number of couplings over all objects.
    pub fn n_couplings(&self) -> usize {
        self.couplings.iter().map(Vec::len).sum()
    }

    /// Sorted set of processors this process shares at least one object with.
    pub fn neighbour_ranks(&self) -> BTreeSet<usize> {
        self.couplings
            .iter()
            .flat_map(|l| l.iter().map(|c| c.proc))
            .collect()
    }
}
