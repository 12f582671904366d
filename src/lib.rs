#![cfg_attr(docsrs, feature(doc_cfg))]
//! # ddd-interface
//!
//! Interface management for distributed dynamic data. Each processor holds
//! local copies of shared objects; a copy knows, through its couplings, which
//! other processors hold copies of the same object and at which priority.
//! An *interface* groups those couplings for a chosen set of object types and
//! a pair of priority sets (A, B), sorted so that two processors enumerate the
//! items they share in the same order. Data can then be exchanged without
//! sending any item identifiers.
//!
//! ## Features
//! - Interface definitions over type masks and priority sets
//! - Deterministic build into flat, per-processor and per-attribute partitions
//! - One-way and two-way exchange through pluggable [`Delta`](interface::Delta) rules
//! - Parallel greedy colouring of the processor graph
//! - Pluggable communication backends (serial, in-process, MPI)
//!
//! ## Determinism
//!
//! Colouring weights come from `SmallRng` seeded by configuration, rank and
//! guess number, so every processor can compute its neighbours' weights and
//! reruns are reproducible.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! ddd-interface = "0.1"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod coupling;
pub mod ddd_error;
pub mod debug_invariants;
pub mod interface;

pub use ddd_error::DddError;
pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::coloring::{Coloring, ColoringConfig, WeightSource};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, LocalHub, NoComm, Wait};
    pub use crate::coupling::{CouplingStore, LocalObject};
    pub use crate::ddd_error::DddError;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::interface::{
        AddDelta, CopyDelta, Delta, Direction, ExchangeDir, ExchangeScope, InterfaceId,
        InterfaceRegistry, RegistryConfig, TypeMask,
    };
}
