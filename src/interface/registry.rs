//! The set of defined interfaces and their built state.
//!
//! One registry lives per process. Interface 0 is the standard interface over
//! all object types and priorities; it exists from construction on.

use crate::algs::binder::bind_channels;
use crate::algs::communicator::Communicator;
use crate::algs::scratch::Scratch;
use crate::coupling::{CouplingStore, ObjIdx, Priority};
use crate::ddd_error::DddError;
use crate::debug_invariants::DebugInvariants;
use crate::interface::builder::{BuiltInterface, IfEntry, build_interface};
use crate::interface::definition::{Direction, InterfaceDef, InterfaceId, STD_INTERFACE, TypeMask};
use crate::interface::pool::{AttrNode, HeadNode, NodePool};
use crate::interface::view::InterfaceView;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem::size_of;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Upper bound on defined interfaces, the standard interface included.
    pub max_interfaces: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_interfaces: 32 }
    }
}

/// Structural statistics of one built interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceStats {
    pub id: InterfaceId,
    pub name: Option<String>,
    pub n_items: usize,
    pub n_procs: usize,
    pub n_attrs: usize,
    pub n_ab: usize,
    pub n_ba: usize,
    pub n_aba: usize,
    /// Estimated bytes held by the item arrays and partition records.
    pub memory: usize,
}

#[derive(Debug)]
pub struct InterfaceRegistry {
    cfg: RegistryConfig,
    defs: Vec<InterfaceDef>,
    built: Vec<BuiltInterface>,
    pool: NodePool,
    scratch: Scratch<usize>,
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl InterfaceRegistry {
    pub fn new(cfg: RegistryConfig) -> Self {
        let cfg = RegistryConfig {
            max_interfaces: cfg.max_interfaces.max(1),
        };
        InterfaceRegistry {
            defs: vec![InterfaceDef::standard()],
            built: vec![BuiltInterface::default()],
            pool: NodePool::new(),
            scratch: Scratch::new(),
            cfg,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.cfg
    }

    /// Define a new interface over the object types in `types` between
    /// priority sets `a` and `b`. The interface stays empty until built.
    pub fn define(
        &mut self,
        types: TypeMask,
        a: &[Priority],
        b: &[Priority],
    ) -> Result<InterfaceId, DddError> {
        if self.defs.len() >= self.cfg.max_interfaces {
            log::warn!(
                "cannot define interface: all {} slots in use",
                self.cfg.max_interfaces
            );
            return Err(DddError::TooManyInterfaces {
                max: self.cfg.max_interfaces,
            });
        }
        let id = InterfaceId(self.defs.len());
        self.defs.push(InterfaceDef::new(id, types, a, b));
        self.built.push(BuiltInterface::default());
        log::debug!("defined interface {id}");
        Ok(id)
    }

    pub fn set_name(&mut self, id: InterfaceId, name: impl Into<String>) -> Result<(), DddError> {
        self.def_mut(id)?.name = Some(name.into());
        Ok(())
    }

    pub fn definition(&self, id: InterfaceId) -> Result<&InterfaceDef, DddError> {
        self.defs.get(id.0).ok_or(DddError::InvalidInterface(id.0))
    }

    fn def_mut(&mut self, id: InterfaceId) -> Result<&mut InterfaceDef, DddError> {
        self.defs.get_mut(id.0).ok_or(DddError::InvalidInterface(id.0))
    }

    /// Number of defined interfaces, the standard interface included.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = InterfaceId> + use<> {
        (0..self.defs.len()).map(InterfaceId)
    }

    /// Rebuild interface `id` from `store` and bind its channels.
    ///
    /// Not reentrant; the previous state is released first.
    pub fn build<C: Communicator>(
        &mut self,
        id: InterfaceId,
        store: &CouplingStore,
        comm: &C,
    ) -> Result<(), DddError> {
        let def = self.defs.get(id.0).ok_or(DddError::InvalidInterface(id.0))?;
        let built = &mut self.built[id.0];
        build_interface(def, store, &mut self.pool, built);
        bind_channels(built, &mut self.pool, &mut self.scratch, comm)?;
        log::debug!(
            "built interface {id}: {} items, {} procs, {} attrs",
            built.n_items(),
            built.n_procs(),
            built.n_attrs()
        );
        self.interface(id)?.debug_assert_invariants();
        Ok(())
    }

    /// Rebuild every defined interface.
    pub fn build_all<C: Communicator>(
        &mut self,
        store: &CouplingStore,
        comm: &C,
    ) -> Result<(), DddError> {
        for id in self.ids() {
            self.build(id, store, comm)?;
        }
        Ok(())
    }

    /// Release the built state of `id`; a no-op on an empty interface.
    pub fn teardown(&mut self, id: InterfaceId) -> Result<(), DddError> {
        let built = self
            .built
            .get_mut(id.0)
            .ok_or(DddError::InvalidInterface(id.0))?;
        if !built.is_empty() {
            log::debug!("tearing down interface {id}");
        }
        built.demolish(&mut self.pool);
        Ok(())
    }

    pub fn teardown_all(&mut self) {
        for built in &mut self.built {
            built.demolish(&mut self.pool);
        }
    }

    pub fn interface(&self, id: InterfaceId) -> Result<InterfaceView<'_>, DddError> {
        let def = self.definition(id)?;
        Ok(InterfaceView {
            def,
            built: &self.built[id.0],
            pool: &self.pool,
        })
    }

    pub fn standard(&self) -> InterfaceView<'_> {
        InterfaceView {
            def: &self.defs[STD_INTERFACE.0],
            built: &self.built[STD_INTERFACE.0],
            pool: &self.pool,
        }
    }

    /// Remote processors of interface `id`, ascending.
    pub fn neighbours(&self, id: InterfaceId) -> Result<Vec<usize>, DddError> {
        Ok(self.interface(id)?.neighbours())
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub fn stats(&self, id: InterfaceId) -> Result<InterfaceStats, DddError> {
        let view = self.interface(id)?;
        let built = view.built;
        let count = |d: Direction| -> usize { view.partitions().map(|p| p.count(d)).sum() };
        Ok(InterfaceStats {
            id,
            name: view.def.name.clone(),
            n_items: built.n_items(),
            n_procs: built.n_procs(),
            n_attrs: built.n_attrs(),
            n_ab: count(Direction::AB),
            n_ba: count(Direction::BA),
            n_aba: count(Direction::ABA),
            memory: built.entries.capacity() * size_of::<IfEntry>()
                + built.objs.capacity() * size_of::<ObjIdx>()
                + built.n_procs() * size_of::<HeadNode>()
                + built.n_attrs() * size_of::<AttrNode>(),
        })
    }

    pub fn stats_all(&self) -> Vec<InterfaceStats> {
        self.ids().filter_map(|id| self.stats(id).ok()).collect()
    }

    /// Human-readable listing of every interface's partition structure.
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InterfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.ids() {
            let view = self.interface(id).map_err(|_| fmt::Error)?;
            let def = view.def;
            write!(f, "| IF {id}")?;
            if let Some(name) = def.name() {
                write!(f, " \"{name}\"")?;
            }
            if def.is_standard() {
                writeln!(f, " all types, all priorities")?;
            } else {
                writeln!(
                    f,
                    " types={:#x} A={} B={}",
                    def.types().bits(),
                    def.set_a(),
                    def.set_b()
                )?;
            }
            writeln!(
                f,
                "|   {} items, {} procs, {} attrs",
                view.n_items(),
                view.n_procs(),
                view.n_attrs()
            )?;
            for part in view.partitions() {
                writeln!(
                    f,
                    "|   proc {:4}: {:5} items  ab {:5}  ba {:5}  aba {:5}",
                    part.proc(),
                    part.n_items(),
                    part.count(Direction::AB),
                    part.count(Direction::BA),
                    part.count(Direction::ABA)
                )?;
                for ap in part.attrs() {
                    writeln!(
                        f,
                        "|     attr {:6}: {:5} items  ab {:5}  ba {:5}  aba {:5}",
                        ap.attr(),
                        ap.n_items(),
                        ap.count(Direction::AB),
                        ap.count(Direction::BA),
                        ap.count(Direction::ABA)
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalHub, NoComm};
    use crate::coupling::LocalObject;

    #[test]
    fn define_respects_capacity() {
        let mut reg = InterfaceRegistry::new(RegistryConfig { max_interfaces: 3 });
        let a = reg.define(TypeMask::ALL, &[2, 1, 2], &[3]).unwrap();
        let b = reg.define(TypeMask::of(&[1]).unwrap(), &[1], &[1]).unwrap();
        assert_eq!((a.get(), b.get()), (1, 2));
        assert_eq!(reg.definition(a).unwrap().set_a().as_slice(), &[1, 2]);
        assert_eq!(
            reg.define(TypeMask::ALL, &[1], &[2]),
            Err(DddError::TooManyInterfaces { max: 3 })
        );
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn invalid_handle_is_reported() {
        let mut reg = InterfaceRegistry::default();
        let bogus = InterfaceId(9);
        assert!(matches!(reg.teardown(bogus), Err(DddError::InvalidInterface(9))));
        assert!(reg.stats(bogus).is_err());
        assert!(reg.build(bogus, &CouplingStore::new(), &NoComm).is_err());
    }

    #[test]
    fn teardown_of_empty_interface_is_noop() {
        let mut reg = InterfaceRegistry::default();
        reg.teardown(STD_INTERFACE).unwrap();
        reg.teardown(STD_INTERFACE).unwrap();
        assert_eq!(reg.pool().allocated(), (0, 0));
    }

    #[test]
    fn serial_build_of_local_objects_is_empty() {
        let mut store = CouplingStore::new();
        store.add_object(LocalObject {
            gid: 1,
            typ: 0,
            prio: 1,
            attr: 0,
        });
        let mut reg = InterfaceRegistry::default();
        reg.build_all(&store, &NoComm).unwrap();
        assert!(reg.standard().is_empty());
        assert_eq!(reg.stats(STD_INTERFACE).unwrap().memory, 0);
    }

    #[test]
    fn stats_and_dump_report_structure() {
        let comms = LocalHub::new(3).comms();
        let mut store = CouplingStore::new();
        for (gid, attr, proc, remote_prio) in [(1, 4, 1, 2), (2, 4, 2, 2), (3, 5, 2, 1)] {
            let o = store.add_object(LocalObject {
                gid,
                typ: 0,
                prio: 1,
                attr,
            });
            store.add_coupling(o, proc, remote_prio, gid).unwrap();
        }
        let mut reg = InterfaceRegistry::default();
        let id = reg.define(TypeMask::ALL, &[1], &[2]).unwrap();
        reg.set_name(id, "master-border").unwrap();
        reg.build_all(&store, &comms[0]).unwrap();

        let st = reg.stats(id).unwrap();
        assert_eq!((st.n_items, st.n_procs, st.n_attrs), (2, 2, 2));
        assert_eq!((st.n_ab, st.n_ba, st.n_aba), (2, 0, 0));
        assert!(st.memory > 0);
        assert_eq!(reg.stats(STD_INTERFACE).unwrap().n_aba, 3);
        assert_eq!(reg.neighbours(id).unwrap(), vec![1, 2]);
        assert_eq!(reg.stats_all().len(), 2);

        let dump = reg.dump();
        assert!(dump.contains("\"master-border\""));
        assert!(dump.contains("A={1} B={2}"));
        assert!(dump.contains("proc    2"));

        let json = serde_json::to_value(&st).unwrap();
        assert_eq!(json["n_items"], 2);
        assert_eq!(json["name"], "master-border");
    }

    #[test]
    fn config_deserialises_with_defaults() {
        let cfg: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RegistryConfig::default());
        let cfg: RegistryConfig = serde_json::from_str(r#"{"max_interfaces": 4}"#).unwrap();
        assert_eq!(cfg.max_interfaces, 4);
    }
}
