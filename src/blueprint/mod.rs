//! Mapping between native meshes/fields and mesh documents.
//!
//! A mesh document has the shape
//!
//! ```text
//! coordsets/coords/{type, values/{x,y,z}}
//! topologies/main/{type, coordset, elements/{shape, connectivity}, grid_function?}
//! topologies/boundary/...                      (only with boundary elements)
//! fields/<name>/{association|basis, topology, vdim?, values}
//! state/{cycle, time, domain_id}               (optional)
//! ```
//!
//! Export aliases native storage wherever its layout allows; import aliases
//! document buffers when asked to and when no conversion was needed.

pub mod field;
pub mod index;
pub mod mesh;
pub mod verify;

pub use index::generate_index;
pub use verify::{VerifyReport, verify};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fe::{SpaceFactory, StandardCollections};

pub const COORDSET: &str = "coords";
pub const MAIN_TOPOLOGY: &str = "main";
pub const BOUNDARY_TOPOLOGY: &str = "boundary";
/// Field holding a curved mesh's node positions.
pub const MESH_NODES_FIELD: &str = "mesh_nodes";
pub(crate) const AXES: [&str; 3] = ["x", "y", "z"];

/// Field names under which element attributes are stored.
///
/// The same name is used for presence checks and for reading values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeNames {
    pub mesh: String,
    pub boundary: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            mesh: "mesh_attribute".into(),
            boundary: "boundary_attribute".into(),
        }
    }
}

impl AttributeNames {
    /// `true` if `name` is one of the attribute fields.
    pub fn contains(&self, name: &str) -> bool {
        self.mesh == name || self.boundary == name
    }
}

/// Conversions performed while importing a document.
///
/// Any entry means the result could not alias the document and is owned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionLog {
    entries: Vec<String>,
}

impl ConversionLog {
    pub(crate) fn note(&mut self, what: impl Into<String>) {
        let what = what.into();
        log::debug!("[blueprint] conversion: {what}");
        self.entries.push(what);
    }

    pub(crate) fn extend(&mut self, other: ConversionLog) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Schema and field mapper configured with attribute names and a space
/// factory.
#[derive(Clone)]
pub struct BlueprintMapper {
    attributes: AttributeNames,
    factory: Arc<dyn SpaceFactory>,
}

impl std::fmt::Debug for BlueprintMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueprintMapper")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl Default for BlueprintMapper {
    fn default() -> Self {
        Self::new(AttributeNames::default(), Arc::new(StandardCollections))
    }
}

impl BlueprintMapper {
    pub fn new(attributes: AttributeNames, factory: Arc<dyn SpaceFactory>) -> Self {
        Self {
            attributes,
            factory,
        }
    }

    pub fn attributes(&self) -> &AttributeNames {
        &self.attributes
    }

    pub fn factory(&self) -> &Arc<dyn SpaceFactory> {
        &self.factory
    }

    pub fn set_space_factory(&mut self, factory: Arc<dyn SpaceFactory>) {
        self.factory = factory;
    }
}
