//! Native unstructured mesh: the in-memory side of a checkpoint.
//!
//! A [`Mesh`] stores vertex coordinates as packed 3-tuples inside a
//! [`Slab`] (unused dimensions are zero), a list of [`Element`]s of one
//! shape, an optional list of boundary elements one dimension lower, and an
//! optional curved-node [`GridFunction`].
//!
//! # Invariants
//!
//! - The vertex slab holds exactly `3 * num_vertices` values.
//! - Every connectivity index lies in `[0, num_vertices)`.
//! - Every element carries exactly `shape.num_vertices()` indices.
//!
//! These are checked at construction, and again on import in debug builds
//! or with the `check-invariants` feature. They can also be checked manually
//! via [`DebugInvariants::validate_invariants`].
//!
//! Because vertex storage may alias memory owned elsewhere, accessors that
//! touch coordinates are fallible.

pub mod shape;

pub use shape::ElementShape;

use crate::data::slab::Slab;
use crate::debug_invariants::DebugInvariants;
use crate::fe::GridFunction;
use crate::mesh_error::CheckpointError;

/// One cell or boundary face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    shape: ElementShape,
    vertices: Vec<i32>,
    attribute: i32,
}

impl Element {
    /// # Errors
    /// Returns `Schema` if `vertices.len()` does not match the shape.
    pub fn new(
        shape: ElementShape,
        vertices: Vec<i32>,
        attribute: i32,
    ) -> Result<Self, CheckpointError> {
        if vertices.len() != shape.num_vertices() {
            return Err(CheckpointError::Schema(format!(
                "{shape} element needs {} vertices, got {}",
                shape.num_vertices(),
                vertices.len()
            )));
        }
        Ok(Self {
            shape,
            vertices,
            attribute,
        })
    }

    #[inline]
    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    #[inline]
    pub fn vertices(&self) -> &[i32] {
        &self.vertices
    }

    #[inline]
    pub fn attribute(&self) -> i32 {
        self.attribute
    }
}

/// Unstructured mesh with packed 3-tuple vertex storage.
///
/// # Example
/// ```rust
/// # fn try_main() -> Result<(), mesh_checkpoint::mesh_error::CheckpointError> {
/// use mesh_checkpoint::mesh::{Element, ElementShape, Mesh};
/// let tri = Element::new(ElementShape::Triangle, vec![0, 1, 2], 1)?;
/// let mesh = Mesh::try_new(
///     2,
///     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     vec![tri],
///     vec![],
/// )?;
/// assert_eq!(mesh.dimension(), 2);
/// assert_eq!(mesh.vertex(1)?, [1.0, 0.0, 0.0]);
/// # Ok(())
/// # }
/// # try_main().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Mesh {
    space_dim: usize,
    vertices: Slab,
    elements: Vec<Element>,
    boundary: Vec<Element>,
    nodes: Option<Box<GridFunction>>,
}

impl Mesh {
    /// Build a mesh owning its vertex storage.
    ///
    /// Coordinates past `space_dim` are stored as zero.
    pub fn try_new(
        space_dim: usize,
        coords: Vec<[f64; 3]>,
        elements: Vec<Element>,
        boundary: Vec<Element>,
    ) -> Result<Self, CheckpointError> {
        let mut packed = Vec::with_capacity(coords.len() * 3);
        for c in coords {
            for (axis, x) in c.into_iter().enumerate() {
                packed.push(if axis < space_dim { x } else { 0.0 });
            }
        }
        Self::with_vertex_storage(space_dim, Slab::owned(packed), elements, boundary)
    }

    /// Build a mesh over existing packed 3-tuple vertex storage. An external
    /// slab makes the mesh alias that memory.
    pub fn with_vertex_storage(
        space_dim: usize,
        vertices: Slab,
        elements: Vec<Element>,
        boundary: Vec<Element>,
    ) -> Result<Self, CheckpointError> {
        if !(1..=3).contains(&space_dim) {
            return Err(CheckpointError::Schema(format!(
                "space dimension {space_dim} is outside 1..=3"
            )));
        }
        let mesh = Self {
            space_dim,
            vertices,
            elements,
            boundary,
            nodes: None,
        };
        mesh.validate_invariants()?;
        Ok(mesh)
    }

    #[inline]
    pub fn space_dimension(&self) -> usize {
        self.space_dim
    }

    /// Topological dimension: that of the elements, or 0 when there are none.
    pub fn dimension(&self) -> usize {
        self.elements
            .first()
            .map_or(0, |e| e.shape().dimension())
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    #[inline]
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn num_boundary_elements(&self) -> usize {
        self.boundary.len()
    }

    /// Coordinates of vertex `i` (zero past the space dimension).
    pub fn vertex(&self, i: usize) -> Result<[f64; 3], CheckpointError> {
        if i >= self.num_vertices() {
            return Err(CheckpointError::Schema(format!(
                "vertex {i} out of range (mesh has {})",
                self.num_vertices()
            )));
        }
        self.vertices.with(|v| [v[3 * i], v[3 * i + 1], v[3 * i + 2]])
    }

    /// Overwrite vertex `i`. Aliases of the vertex storage observe the write.
    pub fn set_vertex(&mut self, i: usize, coords: [f64; 3]) -> Result<(), CheckpointError> {
        if i >= self.num_vertices() {
            return Err(CheckpointError::Schema(format!(
                "vertex {i} out of range (mesh has {})",
                self.num_vertices()
            )));
        }
        self.vertices
            .with_mut(|v| v[3 * i..3 * i + 3].copy_from_slice(&coords))
    }

    /// Packed 3-tuple vertex storage.
    #[inline]
    pub fn vertex_storage(&self) -> &Slab {
        &self.vertices
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn boundary_elements(&self) -> &[Element] {
        &self.boundary
    }

    /// Shape shared by every element.
    ///
    /// # Errors
    /// `UnsupportedShape` when the mesh is empty or mixes shapes.
    pub fn element_shape(&self) -> Result<ElementShape, CheckpointError> {
        uniform_shape(&self.elements)?
            .ok_or_else(|| CheckpointError::UnsupportedShape("mesh has no elements".into()))
    }

    /// Shape shared by every boundary element; `None` without a boundary.
    pub fn boundary_shape(&self) -> Result<Option<ElementShape>, CheckpointError> {
        uniform_shape(&self.boundary)
    }

    /// Curved-geometry node field, if any.
    pub fn nodes(&self) -> Option<&GridFunction> {
        self.nodes.as_deref()
    }

    pub fn set_nodes(&mut self, nodes: Option<GridFunction>) {
        self.nodes = nodes.map(Box::new);
    }

    /// `true` if vertex storage or the node field aliases foreign memory.
    pub fn is_external(&self) -> bool {
        self.vertices.is_external() || self.nodes.as_ref().is_some_and(|n| n.is_external())
    }

    /// Same mesh with every aliased buffer copied into owned storage.
    pub fn into_owned(self) -> Result<Mesh, CheckpointError> {
        let nodes = match self.nodes {
            Some(n) => Some(Box::new(n.into_owned()?)),
            None => None,
        };
        Ok(Mesh {
            vertices: self.vertices.into_owned()?,
            nodes,
            ..self
        })
    }

    /// Independent copy; writes to either mesh are not seen by the other.
    pub fn deep_copy(&self) -> Result<Mesh, CheckpointError> {
        let nodes = match &self.nodes {
            Some(n) => Some(Box::new(n.deep_copy()?)),
            None => None,
        };
        Ok(Mesh {
            space_dim: self.space_dim,
            vertices: self.vertices.deep_copy()?,
            elements: self.elements.clone(),
            boundary: self.boundary.clone(),
            nodes,
        })
    }
}

fn uniform_shape(elements: &[Element]) -> Result<Option<ElementShape>, CheckpointError> {
    let Some(first) = elements.first() else {
        return Ok(None);
    };
    let shape = first.shape();
    if let Some(other) = elements.iter().find(|e| e.shape() != shape) {
        return Err(CheckpointError::UnsupportedShape(format!(
            "mixed element shapes ({shape} and {})",
            other.shape()
        )));
    }
    Ok(Some(shape))
}

impl DebugInvariants for Mesh {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Mesh invalid");
    }

    fn validate_invariants(&self) -> Result<(), CheckpointError> {
        if self.vertices.len() % 3 != 0 {
            return Err(CheckpointError::Schema(format!(
                "vertex storage holds {} values, not a multiple of 3",
                self.vertices.len()
            )));
        }
        let nv = self.num_vertices();
        for (kind, list) in [("element", &self.elements), ("boundary element", &self.boundary)] {
            for (i, e) in list.iter().enumerate() {
                if e.vertices.len() != e.shape.num_vertices() {
                    return Err(CheckpointError::Schema(format!(
                        "{kind} {i} has {} vertices, {} needs {}",
                        e.vertices.len(),
                        e.shape,
                        e.shape.num_vertices()
                    )));
                }
                if let Some(&v) = e
                    .vertices
                    .iter()
                    .find(|&&v| usize::try_from(v).map_or(true, |v| v >= nv))
                {
                    return Err(CheckpointError::Schema(format!(
                        "{kind} {i} references vertex {v}, mesh has {nv}"
                    )));
                }
            }
        }
        Ok(())
    }
}
