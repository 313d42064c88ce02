//! Finite-element metadata needed to reconstruct fields.
//!
//! Basis evaluation lives outside this crate. What is kept here is the
//! bookkeeping a field needs to be saved and rebuilt: the collection name,
//! the vector dimension, and how values are ordered in memory.

pub mod grid_function;

pub use grid_function::GridFunction;

use std::fmt;
use std::sync::Arc;

use crate::mesh::Mesh;
use crate::mesh_error::CheckpointError;

/// Layout of a vector field's values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ordering {
    /// Blocked by component: `[x0 x1 .. | y0 y1 .. | ..]`.
    #[default]
    ByNodes,
    /// Interleaved by vertex: `[x0 y0 .. x1 y1 ..]`.
    ByVdim,
}

impl Ordering {
    pub const fn name(self) -> &'static str {
        match self {
            Ordering::ByNodes => "byNODES",
            Ordering::ByVdim => "byVDIM",
        }
    }
}

/// Family of a finite-element collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasisFamily {
    /// Continuous nodal elements.
    H1,
    /// Continuous positive (Bernstein) elements.
    H1Positive,
    /// Discontinuous elements with a basis type tag.
    L2 { basis_type: u8 },
    /// Nedelec edge elements.
    Nedelec,
    /// Raviart-Thomas face elements.
    RaviartThomas,
}

/// A named finite-element collection such as `H1_2D_P1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FiniteElementCollection {
    family: BasisFamily,
    dim: usize,
    order: usize,
}

impl FiniteElementCollection {
    pub fn new(family: BasisFamily, dim: usize, order: usize) -> Result<Self, CheckpointError> {
        if !(1..=3).contains(&dim) {
            return Err(CheckpointError::UnsupportedBasis(format!(
                "collection dimension {dim} is outside 1..=3"
            )));
        }
        let min_order = match family {
            BasisFamily::H1 | BasisFamily::H1Positive | BasisFamily::Nedelec => 1,
            BasisFamily::L2 { .. } | BasisFamily::RaviartThomas => 0,
        };
        if order < min_order {
            return Err(CheckpointError::UnsupportedBasis(format!(
                "order {order} is below the minimum {min_order} for {family:?}"
            )));
        }
        Ok(Self { family, dim, order })
    }

    pub fn h1(dim: usize, order: usize) -> Result<Self, CheckpointError> {
        Self::new(BasisFamily::H1, dim, order)
    }

    pub fn l2(dim: usize, order: usize) -> Result<Self, CheckpointError> {
        Self::new(BasisFamily::L2 { basis_type: 0 }, dim, order)
    }

    pub fn family(&self) -> BasisFamily {
        self.family
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Parse a collection name: `H1_<d>D_P<k>`, `H1Pos_<d>D_P<k>`,
    /// `L2_<d>D_P<k>`, `L2_T<b>_<d>D_P<k>`, `ND_<d>D_P<k>`, `RT_<d>D_P<k>`.
    pub fn parse(name: &str) -> Result<Self, CheckpointError> {
        let unsupported = || CheckpointError::UnsupportedBasis(name.to_string());
        let mut parts = name.split('_');
        let family_tag = parts.next().ok_or_else(unsupported)?;
        let mut next = parts.next().ok_or_else(unsupported)?;
        let family = match family_tag {
            "H1" => BasisFamily::H1,
            "H1Pos" => BasisFamily::H1Positive,
            "ND" => BasisFamily::Nedelec,
            "RT" => BasisFamily::RaviartThomas,
            "L2" => {
                let basis_type = match next.strip_prefix('T') {
                    Some(t) => {
                        let bt = t.parse::<u8>().map_err(|_| unsupported())?;
                        next = parts.next().ok_or_else(unsupported)?;
                        bt
                    }
                    None => 0,
                };
                BasisFamily::L2 { basis_type }
            }
            _ => return Err(unsupported()),
        };
        let dim = next
            .strip_suffix('D')
            .and_then(|d| d.parse::<usize>().ok())
            .ok_or_else(unsupported)?;
        let order = parts
            .next()
            .and_then(|p| p.strip_prefix('P'))
            .and_then(|k| k.parse::<usize>().ok())
            .ok_or_else(unsupported)?;
        if parts.next().is_some() {
            return Err(unsupported());
        }
        Self::new(family, dim, order).map_err(|_| unsupported())
    }

    /// Canonical name, inverse of [`FiniteElementCollection::parse`].
    pub fn name(&self) -> String {
        let (dim, order) = (self.dim, self.order);
        match self.family {
            BasisFamily::H1 => format!("H1_{dim}D_P{order}"),
            BasisFamily::H1Positive => format!("H1Pos_{dim}D_P{order}"),
            BasisFamily::L2 { basis_type: 0 } => format!("L2_{dim}D_P{order}"),
            BasisFamily::L2 { basis_type } => format!("L2_T{basis_type}_{dim}D_P{order}"),
            BasisFamily::Nedelec => format!("ND_{dim}D_P{order}"),
            BasisFamily::RaviartThomas => format!("RT_{dim}D_P{order}"),
        }
    }

    /// Scalar dof count on `mesh`, for the collections where it follows from
    /// mesh counts alone (lowest-order H1 and piecewise-constant L2).
    pub fn ndofs_for(&self, mesh: &Mesh) -> Option<usize> {
        match (self.family, self.order) {
            (BasisFamily::H1 | BasisFamily::H1Positive, 1) => Some(mesh.num_vertices()),
            (BasisFamily::L2 { .. }, 0) => Some(mesh.num_elements()),
            _ => None,
        }
    }
}

impl fmt::Display for FiniteElementCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Collection plus vector dimension, dof count and value ordering.
#[derive(Clone, Debug, PartialEq)]
pub struct FiniteElementSpace {
    collection: FiniteElementCollection,
    ndofs: usize,
    vdim: usize,
    ordering: Ordering,
    dof_map: Option<Arc<[usize]>>,
}

impl FiniteElementSpace {
    pub fn new(
        collection: FiniteElementCollection,
        ndofs: usize,
        vdim: usize,
        ordering: Ordering,
    ) -> Result<Self, CheckpointError> {
        if vdim == 0 {
            return Err(CheckpointError::Schema("vdim must be at least 1".into()));
        }
        Ok(Self {
            collection,
            ndofs,
            vdim,
            ordering,
            dof_map: None,
        })
    }

    /// Attach a native dof renumbering: logical dof `i` is stored at slot
    /// `map[i]` of each component.
    pub fn with_dof_map(mut self, map: Vec<usize>) -> Result<Self, CheckpointError> {
        if map.len() != self.ndofs {
            return Err(CheckpointError::Schema(format!(
                "dof map has {} entries for {} dofs",
                map.len(),
                self.ndofs
            )));
        }
        let mut seen = vec![false; self.ndofs];
        for &slot in &map {
            if slot >= self.ndofs || std::mem::replace(&mut seen[slot], true) {
                return Err(CheckpointError::Schema("dof map is not a permutation".into()));
            }
        }
        self.dof_map = Some(map.into());
        Ok(self)
    }

    pub fn collection(&self) -> &FiniteElementCollection {
        &self.collection
    }

    pub fn basis_name(&self) -> String {
        self.collection.name()
    }

    #[inline]
    pub fn ndofs(&self) -> usize {
        self.ndofs
    }

    #[inline]
    pub fn vdim(&self) -> usize {
        self.vdim
    }

    #[inline]
    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// Total number of values (`ndofs * vdim`).
    #[inline]
    pub fn vsize(&self) -> usize {
        self.ndofs * self.vdim
    }

    /// `true` when values follow plain byNODES/byVDIM indexing.
    pub fn has_native_layout(&self) -> bool {
        self.dof_map.is_none()
    }

    /// Storage index of component `comp` of logical dof `dof`.
    #[inline]
    pub fn vdof(&self, dof: usize, comp: usize) -> usize {
        let slot = self.dof_map.as_ref().map_or(dof, |m| m[dof]);
        match self.ordering {
            Ordering::ByNodes => comp * self.ndofs + slot,
            Ordering::ByVdim => slot * self.vdim + comp,
        }
    }
}

/// Builds finite-element spaces from stored basis names.
///
/// Injected into field import so callers can teach the restart layer
/// about collections beyond the standard names.
pub trait SpaceFactory: Send + Sync {
    /// Resolve a basis name to a collection.
    fn collection(&self, basis: &str) -> Result<FiniteElementCollection, CheckpointError>;

    /// Space for a field with `ndofs` dofs per component on `mesh`.
    fn space(
        &self,
        mesh: &Mesh,
        basis: &str,
        ndofs: usize,
        vdim: usize,
        ordering: Ordering,
    ) -> Result<FiniteElementSpace, CheckpointError> {
        let collection = self.collection(basis)?;
        if mesh.num_elements() > 0 && collection.dimension() != mesh.dimension() {
            return Err(CheckpointError::Schema(format!(
                "basis {basis} is {}D but the mesh is {}D",
                collection.dimension(),
                mesh.dimension()
            )));
        }
        if let Some(expected) = collection.ndofs_for(mesh) {
            if expected != ndofs {
                return Err(CheckpointError::Schema(format!(
                    "basis {basis} implies {expected} dofs on this mesh, field has {ndofs}"
                )));
            }
        }
        FiniteElementSpace::new(collection, ndofs, vdim, ordering)
    }
}

/// The standard collection names understood by [`FiniteElementCollection::parse`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardCollections;

impl SpaceFactory for StandardCollections {
    fn collection(&self, basis: &str) -> Result<FiniteElementCollection, CheckpointError> {
        FiniteElementCollection::parse(basis)
    }
}
