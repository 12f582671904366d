//! Coupling module: the per-process table of replicated objects and their
//! remote copies.
//!
//! The interface layer only reads this table. It is normally maintained by a
//! distributed object directory; [`store::CouplingStore`] is a plain in-memory
//! version of it.

pub mod store;

pub use store::{Attr, Coupling, CouplingStore, Gid, LocalObject, ObjIdx, ObjType, Priority, RemoteRef};
