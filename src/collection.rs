//! Checkpoint collection: the driver-facing save/load object.
//!
//! A collection owns a mesh, a set of named fields, and the cycle/time
//! state. [`CheckpointCollection::save`] writes one domain file per rank
//! plus, on the coordinator, the root index; [`CheckpointCollection::load`]
//! reverses that for a given cycle.
//!
//! # State
//!
//! The collection starts `Unloaded`. A successful `load` makes it `Loaded`;
//! a failed one leaves it `Unloaded` with nothing owned. `save` never
//! changes the state, and `set_protocol` only affects later saves and loads.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::algs::communicator::Communicator;
use crate::blueprint::{AttributeNames, BlueprintMapper, MESH_NODES_FIELD, verify};
use crate::document::Node;
use crate::fe::{GridFunction, SpaceFactory};
use crate::io::domain::{load_domain, save_domain};
use crate::io::root::{RootIndex, load_root, save_root};
use crate::io::{FileLayout, Protocol};
use crate::mesh::Mesh;
use crate::mesh_error::CheckpointError;

/// Settings of a [`CheckpointCollection`].
///
/// Every field has a default, so a JSON config only needs the ones it
/// changes:
///
/// ```rust
/// use mesh_checkpoint::collection::CollectionConfig;
/// use mesh_checkpoint::io::Protocol;
/// let cfg = CollectionConfig::from_json(r#"{"name": "heat", "protocol": "bin"}"#).unwrap();
/// assert_eq!(cfg.protocol, Protocol::Binary);
/// assert_eq!(cfg.pad_digits_cycle, 5);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub name: String,
    /// Prepended verbatim to every file name; include a trailing `/` for a
    /// directory.
    pub prefix_path: String,
    pub pad_digits_cycle: usize,
    pub pad_digits_rank: usize,
    pub protocol: Protocol,
    /// Rank that writes and broadcasts the root index.
    pub coordinator: usize,
    pub attribute_names: AttributeNames,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: "checkpoint".into(),
            prefix_path: String::new(),
            pad_digits_cycle: 5,
            pad_digits_rank: 5,
            protocol: Protocol::default(),
            coordinator: 0,
            attribute_names: AttributeNames::default(),
        }
    }
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, CheckpointError> {
        serde_json::from_str(text)
            .map_err(|e| CheckpointError::Schema(format!("invalid collection config: {e}")))
    }

    pub fn layout(&self) -> FileLayout {
        FileLayout {
            prefix_path: self.prefix_path.clone(),
            name: self.name.clone(),
            pad_digits_cycle: self.pad_digits_cycle,
            pad_digits_rank: self.pad_digits_rank,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionState {
    Unloaded,
    Loaded,
}

/// Files written by one [`CheckpointCollection::save`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveSummary {
    pub cycle: u64,
    pub domain_file: PathBuf,
    /// Only set on the coordinator.
    pub root_file: Option<PathBuf>,
}

/// Mesh, fields and state of one rank, with decomposed save/load.
///
/// # Example
/// ```rust
/// # fn try_main() -> Result<(), mesh_checkpoint::mesh_error::CheckpointError> {
/// use mesh_checkpoint::algs::NoComm;
/// use mesh_checkpoint::collection::{CheckpointCollection, CollectionConfig};
/// use mesh_checkpoint::mesh::{Element, ElementShape, Mesh};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut cfg = CollectionConfig::new("demo");
/// cfg.prefix_path = format!("{}/", dir.path().display());
///
/// let seg = Element::new(ElementShape::Segment, vec![0, 1], 1)?;
/// let mesh = Mesh::try_new(1, vec![[0.0; 3], [1.0, 0.0, 0.0]], vec![seg], vec![])?;
///
/// let mut dc = CheckpointCollection::new(cfg.clone(), NoComm);
/// dc.set_mesh(mesh);
/// dc.set_cycle(3);
/// dc.save()?;
///
/// let mut restart = CheckpointCollection::new(cfg, NoComm);
/// restart.load(3)?;
/// assert_eq!(restart.mesh().unwrap().vertex(1)?, [1.0, 0.0, 0.0]);
/// # Ok(())
/// # }
/// # try_main().unwrap();
/// ```
pub struct CheckpointCollection<C: Communicator> {
    config: CollectionConfig,
    comm: C,
    mapper: BlueprintMapper,
    mesh: Option<Mesh>,
    fields: Vec<(String, GridFunction)>,
    cycle: u64,
    time: f64,
    state: CollectionState,
}

impl<C: Communicator> CheckpointCollection<C> {
    pub fn new(config: CollectionConfig, comm: C) -> Self {
        let mapper = BlueprintMapper::new(
            config.attribute_names.clone(),
            Arc::new(crate::fe::StandardCollections),
        );
        Self {
            config,
            comm,
            mapper,
            mesh: None,
            fields: Vec::new(),
            cycle: 0,
            time: 0.0,
            state: CollectionState::Unloaded,
        }
    }

    /// Resolve basis names on load through `factory`.
    pub fn with_space_factory(mut self, factory: Arc<dyn SpaceFactory>) -> Self {
        self.mapper.set_space_factory(factory);
        self
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    pub fn protocol(&self) -> Protocol {
        self.config.protocol
    }

    /// Select the container encoding by name (`"json"` or `"bin"`).
    pub fn set_protocol(&mut self, name: &str) -> Result<(), CheckpointError> {
        self.config.protocol = name.parse()?;
        Ok(())
    }

    pub fn set_prefix_path(&mut self, prefix: impl Into<String>) {
        self.config.prefix_path = prefix.into();
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        self.mesh.as_mut()
    }

    pub fn set_mesh(&mut self, mesh: Mesh) {
        self.mesh = Some(mesh);
    }

    /// Register `field` under `name`, replacing a field of the same name.
    ///
    /// # Errors
    /// `Schema` for names the mesh document reserves (attribute fields and
    /// the mesh node field) and for names that are not valid document keys.
    pub fn register_field(
        &mut self,
        name: impl Into<String>,
        field: GridFunction,
    ) -> Result<(), CheckpointError> {
        let name = name.into();
        if self.is_reserved(&name) {
            return Err(CheckpointError::Schema(format!(
                "field name \"{name}\" is reserved by the mesh document"
            )));
        }
        if name.is_empty() || name.contains('/') || name.starts_with('$') {
            return Err(CheckpointError::Schema(format!(
                "field name \"{name}\" is not a valid document key"
            )));
        }
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name, field)),
        }
        Ok(())
    }

    pub fn deregister_field(&mut self, name: &str) -> Option<GridFunction> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn field(&self, name: &str) -> Option<&GridFunction> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Registered fields in registration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &GridFunction)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    fn is_reserved(&self, name: &str) -> bool {
        name == MESH_NODES_FIELD || self.config.attribute_names.contains(name)
    }

    /// This rank's mesh document for the current cycle.
    pub fn domain_document(&self) -> Result<Node, CheckpointError> {
        let mesh = self
            .mesh
            .as_ref()
            .ok_or_else(|| CheckpointError::Schema("collection has no mesh".into()))?;
        let mut doc = self.mapper.export_mesh(mesh)?;
        for (name, field) in &self.fields {
            doc.set(&format!("fields/{name}"), self.mapper.export_field(field)?);
        }
        doc.set("state/cycle", self.cycle as i64);
        doc.set("state/time", self.time);
        doc.set("state/domain_id", self.comm.rank() as i64);
        Ok(doc)
    }

    /// Write this rank's domain file and, on the coordinator, the root index.
    ///
    /// The document is verified first; a failed verification writes nothing.
    pub fn save(&self) -> Result<SaveSummary, CheckpointError> {
        let (rank, size) = (self.comm.rank(), self.comm.size());
        if self.config.coordinator >= size {
            return Err(CheckpointError::Comm(format!(
                "coordinator {} outside a world of {size} ranks",
                self.config.coordinator
            )));
        }
        let doc = self.domain_document()?;
        verify(&doc).map_err(CheckpointError::Verification)?;

        let layout = self.config.layout();
        let protocol = self.config.protocol;
        let domain_file = save_domain(&layout, self.cycle, rank, &doc, protocol)?;
        let root_file = if rank == self.config.coordinator {
            let index = RootIndex::build(&layout, self.cycle, protocol, size, &doc)?;
            Some(save_root(&layout, self.cycle, &index)?)
        } else {
            None
        };
        log::info!(
            "[collection] rank {rank} saved cycle {} ({protocol}, {} fields)",
            self.cycle,
            self.fields.len()
        );
        Ok(SaveSummary {
            cycle: self.cycle,
            domain_file,
            root_file,
        })
    }

    /// Replace the mesh, fields and state with those saved for `cycle`.
    ///
    /// Everything currently owned is released first. On failure the
    /// collection is left `Unloaded` and empty.
    pub fn load(&mut self, cycle: u64) -> Result<(), CheckpointError> {
        self.release();
        match self.try_load(cycle) {
            Ok(()) => {
                self.state = CollectionState::Loaded;
                Ok(())
            }
            Err(e) => {
                log::warn!("[collection] loading cycle {cycle} failed: {e}");
                self.release();
                Err(e)
            }
        }
    }

    fn try_load(&mut self, cycle: u64) -> Result<(), CheckpointError> {
        let layout = self.config.layout();
        let index = load_root(&layout, cycle, &self.comm, self.config.coordinator)?;
        let rank = self.comm.rank();
        if rank >= index.number_of_files {
            return Err(CheckpointError::Schema(format!(
                "rank {rank} has no domain: cycle {cycle} was saved with {} files",
                index.number_of_files
            )));
        }
        if index.protocol != self.config.protocol {
            log::info!(
                "[collection] cycle {cycle} was saved as {}; switching from {}",
                index.protocol,
                self.config.protocol
            );
            self.config.protocol = index.protocol;
        }

        // resolved by the current prefix so a relocated checkpoint still loads
        let doc = load_domain(&layout, cycle, rank, index.protocol)?;
        verify(&doc).map_err(CheckpointError::Verification)?;
        let mesh = self.mapper.import_mesh(&doc, false)?;

        let nodes_field = doc
            .get("topologies/main/grid_function")
            .and_then(Node::as_text);
        let mut fields = Vec::new();
        if let Some(stored) = doc.get("fields") {
            for (name, field) in stored.children() {
                if self.is_reserved(name) || Some(name) == nodes_field {
                    continue;
                }
                if !field.has_child("basis") {
                    log::warn!("[collection] skipping field \"{name}\" without a basis");
                    continue;
                }
                fields.push((name.to_string(), self.mapper.import_field(field, &mesh, false)?));
            }
        }

        self.time = match doc.get("state/time").and_then(Node::as_array) {
            Some(t) => t.scalar_f64()?,
            None => 0.0,
        };
        self.cycle = cycle;
        self.mesh = Some(mesh);
        self.fields = fields;
        log::info!(
            "[collection] rank {rank} loaded cycle {cycle} ({} fields)",
            self.fields.len()
        );
        Ok(())
    }

    /// Drop the mesh and fields and return to `Unloaded`.
    pub fn release(&mut self) {
        self.mesh = None;
        self.fields.clear();
        self.state = CollectionState::Unloaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::fe::{FiniteElementCollection, FiniteElementSpace, Ordering};
    use crate::mesh::{Element, ElementShape};

    fn segment_mesh() -> Mesh {
        let seg = Element::new(ElementShape::Segment, vec![0, 1], 2).unwrap();
        Mesh::try_new(1, vec![[0.0; 3], [2.0, 0.0, 0.0]], vec![seg], vec![]).unwrap()
    }

    fn collection(dir: &std::path::Path) -> CheckpointCollection<NoComm> {
        let mut cfg = CollectionConfig::new("unit");
        cfg.prefix_path = format!("{}/", dir.display());
        CheckpointCollection::new(cfg, NoComm)
    }

    #[test]
    fn reserved_and_invalid_field_names_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dc = collection(tmp.path());
        let fec = FiniteElementCollection::h1(1, 1).unwrap();
        let gf = GridFunction::new(FiniteElementSpace::new(fec, 2, 1, Ordering::ByNodes).unwrap());
        for bad in ["mesh_attribute", "boundary_attribute", "mesh_nodes", "a/b", "$x", ""] {
            assert!(dc.register_field(bad, gf.clone()).is_err(), "{bad}");
        }
        dc.register_field("u", gf.clone()).unwrap();
        dc.register_field("u", gf).unwrap();
        assert_eq!(dc.fields().count(), 1);
    }

    #[test]
    fn save_without_mesh_fails_and_protocol_names_are_checked() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dc = collection(tmp.path());
        assert!(dc.save().unwrap_err().is_schema());
        assert!(matches!(
            dc.set_protocol("hdf5"),
            Err(CheckpointError::ProtocolMismatch(_))
        ));
        dc.set_protocol("bin").unwrap();
        assert_eq!(dc.protocol(), Protocol::Binary);
    }

    #[test]
    fn failed_load_releases_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dc = collection(tmp.path());
        dc.set_mesh(segment_mesh());
        dc.save().unwrap();
        dc.load(0).unwrap();
        assert_eq!(dc.state(), CollectionState::Loaded);
        assert_eq!(dc.mesh().unwrap().elements()[0].attribute(), 2);

        assert!(dc.load(1).is_err());
        assert_eq!(dc.state(), CollectionState::Unloaded);
        assert!(dc.mesh().is_none());
    }

    #[test]
    fn load_adopts_the_saved_protocol() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dc = collection(tmp.path());
        dc.set_protocol("bin").unwrap();
        dc.set_mesh(segment_mesh());
        dc.set_time(1.5);
        dc.set_cycle(2);
        dc.save().unwrap();

        let mut restart = collection(tmp.path());
        restart.load(2).unwrap();
        assert_eq!(restart.protocol(), Protocol::Binary);
        assert_eq!(restart.time(), 1.5);
        assert_eq!(restart.cycle(), 2);
    }

    #[test]
    fn config_defaults_fill_missing_keys() {
        let cfg = CollectionConfig::from_json(r#"{"coordinator": 2}"#).unwrap();
        assert_eq!(cfg.coordinator, 2);
        assert_eq!(cfg.attribute_names, AttributeNames::default());
        assert!(CollectionConfig::from_json(r#"{"protocol": "hdf5"}"#).is_err());
    }
}
