//! DddError: Unified error type for ddd-interface public APIs
//!
//! Capacity errors are reported to the caller, who decides whether they are
//! fatal. Protocol errors are propagated with `?` up to the SPMD driver, which
//! must abort the whole job.

use thiserror::Error;

/// Unified error type for interface management and colouring.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DddError {
    /// `define` was called after all interface slots were handed out.
    #[error("too many interfaces defined (maximum is {max})")]
    TooManyInterfaces { max: usize },
    /// The handle does not name a defined interface.
    #[error("invalid interface handle {0}")]
    InvalidInterface(usize),
    /// A processor has more neighbours than the colouring engine accepts.
    #[error("too many neighbour processors: {found} (maximum is {max})")]
    TooManyNeighbors { found: usize, max: usize },
    /// An object type outside the supported bitmask range.
    #[error("object type {0} does not fit in a type mask")]
    InvalidObjectType(u32),
    /// A local object index that is not in the coupling store.
    #[error("object index {0} not present in coupling store")]
    UnknownObject(usize),
    /// An operation needs channels that have not been bound yet.
    #[error("interface {0} has no bound channels; call build first")]
    ChannelsNotBound(usize),
    /// A channel operation finished with an error status.
    #[error("protocol violation with rank {peer} during {op}: {reason}")]
    Protocol {
        peer: usize,
        op: &'static str,
        reason: String,
    },
    /// A built interface failed an internal consistency check.
    #[error("interface invariant violated: {0}")]
    Invariant(String),
}

impl DddError {
    pub(crate) fn protocol(peer: usize, op: &'static str, reason: impl Into<String>) -> Self {
        DddError::Protocol {
            peer,
            op,
            reason: reason.into(),
        }
    }
}
