//! Interface definitions: object-type filter plus the two priority sets.

use crate::coupling::{Coupling, LocalObject, ObjType, Priority};
use crate::ddd_error::DddError;
use std::fmt;

/// Handle of a defined interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct InterfaceId(pub(crate) usize);

impl InterfaceId {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The implicit interface over all object types and all priorities.
pub const STD_INTERFACE: InterfaceId = InterfaceId(0);

/// Bitmask of participating object types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct TypeMask(u32);

impl TypeMask {
    pub const ALL: TypeMask = TypeMask(u32::MAX);

    pub fn of(types: &[ObjType]) -> Result<Self, DddError> {
        types
            .iter()
            .try_fold(TypeMask(0), |mask, &t| mask.with(t))
    }

    pub fn with(self, t: ObjType) -> Result<Self, DddError> {
        if t >= u32::BITS {
            return Err(DddError::InvalidObjectType(t));
        }
        Ok(TypeMask(self.0 | (1 << t)))
    }

    #[inline]
    pub fn contains(self, t: ObjType) -> bool {
        t < u32::BITS && self.0 & (1 << t) != 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Sorted, duplicate-free set of priorities.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct PrioSet(Vec<Priority>);

impl PrioSet {
    pub fn new(prios: &[Priority]) -> Self {
        let mut v = prios.to_vec();
        v.sort_unstable();
        v.dedup();
        PrioSet(v)
    }

    #[inline]
    pub fn contains(&self, p: Priority) -> bool {
        self.0.binary_search(&p).is_ok()
    }

    pub fn as_slice(&self) -> &[Priority] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PrioSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", itertools::join(&self.0, ","))
    }
}

/// Communication direction of one coupling, in sort order.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Direction {
    /// Local copy in A, remote copy in B.
    AB = 1,
    /// Local copy in B, remote copy in A.
    BA = 2,
    /// Both of the above.
    ABA = 3,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::AB, Direction::BA, Direction::ABA];

    /// Direction the same coupling has when seen from the remote processor.
    pub fn mirror(self) -> Direction {
        match self {
            Direction::AB => Direction::BA,
            Direction::BA => Direction::AB,
            Direction::ABA => Direction::ABA,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::AB => "A->B",
            Direction::BA => "B->A",
            Direction::ABA => "A->B->A",
        })
    }
}

/// A registered interface.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct InterfaceDef {
    pub(crate) id: InterfaceId,
    pub(crate) types: TypeMask,
    pub(crate) a: PrioSet,
    pub(crate) b: PrioSet,
    pub(crate) name: Option<String>,
}

impl InterfaceDef {
    pub(crate) fn standard() -> Self {
        InterfaceDef {
            id: STD_INTERFACE,
            types: TypeMask::ALL,
            a: PrioSet::default(),
            b: PrioSet::default(),
            name: Some("standard".to_owned()),
        }
    }

    pub(crate) fn new(id: InterfaceId, types: TypeMask, a: &[Priority], b: &[Priority]) -> Self {
        InterfaceDef {
            id,
            types,
            a: PrioSet::new(a),
            b: PrioSet::new(b),
            name: None,
        }
    }

    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn types(&self) -> TypeMask {
        self.types
    }

    pub fn set_a(&self) -> &PrioSet {
        &self.a
    }

    pub fn set_b(&self) -> &PrioSet {
        &self.b
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_standard(&self) -> bool {
        self.id == STD_INTERFACE
    }

    /// Direction of `cpl` under this definition, `None` if it does not take part.
    pub fn direction(&self, obj: &LocalObject, cpl: &Coupling) -> Option<Direction> {
        if !self.types.contains(obj.typ) {
            return None;
        }
        let ab = self.a.contains(obj.prio) && self.b.contains(cpl.prio);
        let ba = self.b.contains(obj.prio) && self.a.contains(cpl.prio);
        match (ab, ba) {
            (true, true) => Some(Direction::ABA),
            (true, false) => Some(Direction::AB),
            (false, true) => Some(Direction::BA),
            (false, false) => None,
        }
    }
}
