#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-checkpoint
//!
//! mesh-checkpoint saves and restores the state of a decomposed
//! finite-element simulation: an unstructured mesh, the fields defined on
//! it, and the cycle/time counters. Each process writes one domain file per
//! cycle; a coordinator writes a root index that lets any later run locate
//! and decode every domain.
//!
//! ## Layers
//! - [`document`]: a hierarchical tree of named nodes whose leaves are typed
//!   arrays, possibly strided views into buffers owned elsewhere.
//! - [`blueprint`]: mapping between [`mesh::Mesh`]/[`fe::GridFunction`] and
//!   a mesh document, with structural verification and index generation.
//! - [`io`]: the `"json"` and `"bin"` container encodings, file naming, the
//!   per-domain files and the root index.
//! - [`algs`]: the [`Communicator`](algs::Communicator) seam used to
//!   broadcast the root index (serial, in-process threads, MPI).
//! - [`collection`]: the driver-facing save/load object.
//!
//! ## Zero copy
//! Export never copies coordinates or field values: the document holds
//! strided views of the mesh's own storage. Import can alias the
//! document's buffers instead of copying them when layouts allow; views
//! hold weak handles, so a view that outlives its buffer fails with
//! [`CheckpointError::DanglingAlias`](mesh_error::CheckpointError::DanglingAlias)
//! rather than reading freed memory.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-checkpoint = "0.1"
//! # Optional features:
//! # features = ["mpi-support", "check-invariants"]
//! ```

pub mod algs;
pub mod blueprint;
pub mod collection;
pub mod data;
pub mod debug_invariants;
pub mod document;
pub mod fe;
pub mod io;
pub mod mesh;
pub mod mesh_error;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::blueprint::{AttributeNames, BlueprintMapper, VerifyReport, verify};
    pub use crate::collection::{CheckpointCollection, CollectionConfig, CollectionState};
    pub use crate::data::{ArrayData, BufferHandle, DType, SharedBuffer, Slab};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::document::{ArrayView, Node};
    pub use crate::fe::{
        FiniteElementCollection, FiniteElementSpace, GridFunction, Ordering, SpaceFactory,
    };
    pub use crate::io::{FileLayout, Protocol};
    pub use crate::mesh::{Element, ElementShape, Mesh};
    pub use crate::mesh_error::CheckpointError;
}
