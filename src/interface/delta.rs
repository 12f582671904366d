//! Delta trait: rules for fusing per-object data moved through an interface.

use bytemuck::Pod;

/// *Delta* encapsulates restriction & fusion for a per-object value `V`.
pub trait Delta<V>: Sized {
    /// What travels on the wire for one item.
    type Part: Pod;

    /// Extract the part of `v` that is sent for one coupling.
    fn restrict(v: &V) -> Self::Part;

    /// Merge an incoming part into the local value.
    fn fuse(local: &mut V, incoming: Self::Part);
}

/// Identity delta (copy-overwrites-local).
#[derive(Copy, Clone, Debug)]
pub struct CopyDelta;

impl<V: Pod> Delta<V> for CopyDelta {
    type Part = V;
    #[inline]
    fn restrict(v: &V) -> V {
        *v
    }
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local = incoming;
    }
}

/// Additive delta for summation over all copies.
#[derive(Copy, Clone, Debug)]
pub struct AddDelta;

impl<V> Delta<V> for AddDelta
where
    V: std::ops::AddAssign + Pod,
{
    type Part = V;
    #[inline]
    fn restrict(v: &V) -> V {
        *v
    }
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local += incoming;
    }
}

/// Keeps the larger of local and incoming values.
#[derive(Copy, Clone, Debug)]
pub struct MaxDelta;

impl<V> Delta<V> for MaxDelta
where
    V: PartialOrd + Pod,
{
    type Part = V;
    #[inline]
    fn restrict(v: &V) -> V {
        *v
    }
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        if incoming > *local {
            *local = incoming;
        }
    }
}
