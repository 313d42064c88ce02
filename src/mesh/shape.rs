//! Element shapes recognized by the mesh document schema.

use std::fmt;
use std::str::FromStr;

use crate::mesh_error::CheckpointError;

/// Element shapes a single-shape topology can carry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum ElementShape {
    /// 0D vertex.
    Point,
    /// 1D segment/edge.
    Segment,
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
}

impl ElementShape {
    pub const ALL: [ElementShape; 6] = [
        ElementShape::Point,
        ElementShape::Segment,
        ElementShape::Triangle,
        ElementShape::Quadrilateral,
        ElementShape::Tetrahedron,
        ElementShape::Hexahedron,
    ];

    /// Returns the topological dimension of the shape.
    pub const fn dimension(self) -> usize {
        match self {
            ElementShape::Point => 0,
            ElementShape::Segment => 1,
            ElementShape::Triangle | ElementShape::Quadrilateral => 2,
            ElementShape::Tetrahedron | ElementShape::Hexahedron => 3,
        }
    }

    /// Number of vertices per element.
    pub const fn num_vertices(self) -> usize {
        match self {
            ElementShape::Point => 1,
            ElementShape::Segment => 2,
            ElementShape::Triangle => 3,
            ElementShape::Quadrilateral | ElementShape::Tetrahedron => 4,
            ElementShape::Hexahedron => 8,
        }
    }

    /// Shape name in mesh documents.
    pub const fn name(self) -> &'static str {
        match self {
            ElementShape::Point => "point",
            ElementShape::Segment => "line",
            ElementShape::Triangle => "tri",
            ElementShape::Quadrilateral => "quad",
            ElementShape::Tetrahedron => "tet",
            ElementShape::Hexahedron => "hex",
        }
    }

    /// Shape of the faces bounding this shape; `None` for points.
    pub const fn boundary_shape(self) -> Option<ElementShape> {
        match self {
            ElementShape::Point => None,
            ElementShape::Segment => Some(ElementShape::Point),
            ElementShape::Triangle | ElementShape::Quadrilateral => Some(ElementShape::Segment),
            ElementShape::Tetrahedron => Some(ElementShape::Triangle),
            ElementShape::Hexahedron => Some(ElementShape::Quadrilateral),
        }
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementShape {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementShape::ALL
            .into_iter()
            .find(|shape| shape.name() == s)
            .ok_or_else(|| CheckpointError::UnsupportedShape(s.to_string()))
    }
}
