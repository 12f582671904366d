//! Communication plumbing and the algorithms that run on it.

pub mod binder;
pub mod coloring;
pub mod communicator;
pub mod scratch;
pub mod wire;

pub use coloring::{ColoringConfig, color_interface, color_processors};
