//! Interfaces: sorted, partitioned lists of the couplings shared with other
//! processors, selected by object type and a pair of priority sets.

pub mod builder;
pub mod definition;
pub mod delta;
pub mod exchange;
pub mod pool;
pub mod registry;
pub mod view;

pub use definition::{Direction, InterfaceDef, InterfaceId, PrioSet, STD_INTERFACE, TypeMask};
pub use delta::{AddDelta, CopyDelta, Delta, MaxDelta};
pub use exchange::{ExchangeDir, exchange, exec_local, oneway};
pub use registry::{InterfaceRegistry, InterfaceStats, RegistryConfig};
pub use view::{AttrPartition, ExchangeScope, InterfaceView, ProcPartition};
