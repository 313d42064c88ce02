//! Schema mapper: [`Mesh`] ⇄ mesh document.

use crate::blueprint::{
    AXES, BOUNDARY_TOPOLOGY, BlueprintMapper, COORDSET, ConversionLog, MAIN_TOPOLOGY,
    MESH_NODES_FIELD,
};
use crate::data::buffer::DType;
use crate::data::slab::Slab;
use crate::debug_invariants::DebugInvariants;
use crate::document::{ArrayView, Node};
use crate::mesh::{Element, ElementShape, Mesh};
use crate::mesh_error::CheckpointError;

const F64: usize = std::mem::size_of::<f64>();
/// Byte stride between consecutive vertices in packed 3-tuple storage.
const VERTEX_STRIDE: usize = 3 * F64;

impl BlueprintMapper {
    /// Describe `mesh` as a mesh document.
    ///
    /// Coordinates are exported as non-owning views into the mesh's vertex
    /// storage, so the document must not outlive the mesh if it is to be
    /// read. Connectivity and attributes are copied.
    ///
    /// # Errors
    /// `UnsupportedShape` when the mesh has no elements or mixes shapes.
    pub fn export_mesh(&self, mesh: &Mesh) -> Result<Node, CheckpointError> {
        let shape = mesh.element_shape()?;
        let boundary_shape = mesh.boundary_shape()?;
        let mut doc = Node::object();

        let coords = doc.fetch_mut(&format!("coordsets/{COORDSET}"));
        coords.set("type", "explicit");
        let storage = mesh.vertex_storage();
        let nv = mesh.num_vertices();
        for (axis, name) in AXES.iter().enumerate().take(mesh.space_dimension()) {
            let view = ArrayView::over(
                storage.handle().alias(),
                nv,
                (storage.offset() + axis) * F64,
                VERTEX_STRIDE,
            )?;
            coords.set(&format!("values/{name}"), view);
        }

        let topo = doc.fetch_mut(&format!("topologies/{MAIN_TOPOLOGY}"));
        write_topology(topo, shape, mesh.elements());
        if mesh.nodes().is_some() {
            topo.set("grid_function", MESH_NODES_FIELD);
        }

        if let Some(nodes) = mesh.nodes() {
            let field = self.export_field(nodes)?;
            doc.set(&format!("fields/{MESH_NODES_FIELD}"), field);
        }
        write_attributes(&mut doc, &self.attributes.mesh, MAIN_TOPOLOGY, mesh.elements());

        if let Some(boundary_shape) = boundary_shape {
            let topo = doc.fetch_mut(&format!("topologies/{BOUNDARY_TOPOLOGY}"));
            write_topology(topo, boundary_shape, mesh.boundary_elements());
            write_attributes(
                &mut doc,
                &self.attributes.boundary,
                BOUNDARY_TOPOLOGY,
                mesh.boundary_elements(),
            );
        }

        log::debug!(
            "[blueprint] exported {shape} mesh: {nv} vertices, {} elements, {} boundary elements",
            mesh.num_elements(),
            mesh.num_boundary_elements()
        );
        Ok(doc)
    }

    /// Rebuild a mesh from a mesh document.
    ///
    /// With `zero_copy` the vertex storage aliases the document's coordinate
    /// buffer when the axes are packed 3-tuples of one `f64` buffer. If any
    /// array had to be converted, the whole mesh is copied into owned
    /// storage instead.
    pub fn import_mesh(&self, doc: &Node, zero_copy: bool) -> Result<Mesh, CheckpointError> {
        Ok(self.import_mesh_logged(doc, zero_copy)?.0)
    }

    pub(crate) fn import_mesh_logged(
        &self,
        doc: &Node,
        zero_copy: bool,
    ) -> Result<(Mesh, ConversionLog), CheckpointError> {
        let coords = doc.fetch(&format!("coordsets/{COORDSET}"))?;
        let topo = doc.fetch(&format!("topologies/{MAIN_TOPOLOGY}"))?;
        let mut conversions = ConversionLog::default();

        let axes = coordinate_axes(coords)?;
        let nv = axes[0].count();
        if axes.iter().any(|a| a.count() != nv) {
            return Err(CheckpointError::Schema(
                "coordinate axes have different lengths".into(),
            ));
        }

        let shape: ElementShape = topo.text("elements/shape")?.parse()?;
        let conn = read_indices(
            topo.array("elements/connectivity")?,
            "topologies/main/elements/connectivity",
            &mut conversions,
        )?;
        let mesh_attrs = self.read_attributes(doc, &self.attributes.mesh, &mut conversions)?;

        let mut boundary_parts = None;
        if let Some(btopo) = doc.get(&format!("topologies/{BOUNDARY_TOPOLOGY}")) {
            let bshape: ElementShape = btopo.text("elements/shape")?.parse()?;
            let bconn = read_indices(
                btopo.array("elements/connectivity")?,
                "topologies/boundary/elements/connectivity",
                &mut conversions,
            )?;
            let battrs = self.read_attributes(doc, &self.attributes.boundary, &mut conversions)?;
            boundary_parts = Some((bshape, bconn, battrs));
        }

        let elements = build_elements(shape, &conn, mesh_attrs.as_deref(), "element")?;
        let boundary = match boundary_parts {
            Some((bshape, bconn, battrs)) => {
                build_elements(bshape, &bconn, battrs.as_deref(), "boundary element")?
            }
            None => Vec::new(),
        };

        let aliased = if zero_copy {
            let slab = packed_vertex_slab(&axes, nv);
            if slab.is_none() {
                conversions.note("coordinates are not packed 3-tuples of one float64 buffer");
            }
            slab
        } else {
            None
        };
        let vertices = match aliased {
            Some(slab) => slab,
            None => gather_vertices(&axes, nv, &mut conversions)?,
        };

        let mut mesh = Mesh::with_vertex_storage(axes.len(), vertices, elements, boundary)?;

        if let Some(gf_name) = topo.get("grid_function") {
            let gf_name = gf_name.as_text().ok_or_else(|| {
                CheckpointError::Schema("topologies/main/grid_function is not a text value".into())
            })?;
            let field = doc.fetch(&format!("fields/{gf_name}"))?;
            let (nodes, field_conversions) = self.import_field_logged(field, &mesh, zero_copy)?;
            conversions.extend(field_conversions);
            mesh.set_nodes(Some(nodes));
        }

        if zero_copy && !conversions.is_empty() {
            log::warn!(
                "[blueprint] zero copy not possible, copying mesh: {}",
                conversions.entries().join("; ")
            );
            mesh = mesh.deep_copy()?;
        }
        mesh.debug_assert_invariants();
        log::debug!(
            "[blueprint] imported {shape} mesh: {nv} vertices, {} elements, {} boundary elements",
            mesh.num_elements(),
            mesh.num_boundary_elements()
        );
        Ok((mesh, conversions))
    }

    fn read_attributes(
        &self,
        doc: &Node,
        name: &str,
        conversions: &mut ConversionLog,
    ) -> Result<Option<Vec<i32>>, CheckpointError> {
        let path = format!("fields/{name}/values");
        match doc.get(&format!("fields/{name}")) {
            Some(_) => Ok(Some(read_indices(doc.array(&path)?, &path, conversions)?)),
            None => Ok(None),
        }
    }
}

fn write_topology(topo: &mut Node, shape: ElementShape, elements: &[Element]) {
    topo.set("type", "unstructured");
    topo.set("coordset", COORDSET);
    topo.set("elements/shape", shape.name());
    let conn: Vec<i32> = elements
        .iter()
        .flat_map(|e| e.vertices().iter().copied())
        .collect();
    topo.set("elements/connectivity", conn);
}

fn write_attributes(doc: &mut Node, name: &str, topology: &str, elements: &[Element]) {
    let field = doc.fetch_mut(&format!("fields/{name}"));
    field.set("association", "element");
    field.set("topology", topology);
    let values: Vec<i32> = elements.iter().map(Element::attribute).collect();
    field.set("values", values);
}

/// Axis views in `x, y, z` order; `x` is required and no axis may be skipped.
fn coordinate_axes(coords: &Node) -> Result<Vec<&ArrayView>, CheckpointError> {
    let values = coords.fetch("values")?;
    let mut axes = Vec::with_capacity(3);
    for (k, name) in AXES.into_iter().enumerate() {
        match values.child_named(name) {
            Some(node) => {
                if axes.len() < k {
                    return Err(CheckpointError::Schema(format!(
                        "coordinate axis {name} present without the axes before it"
                    )));
                }
                axes.push(node.as_array().ok_or_else(|| {
                    CheckpointError::Schema(format!("coordinate axis {name} is not an array"))
                })?);
            }
            None if axes.is_empty() => {
                return Err(CheckpointError::missing_path("coordsets/coords/values/x"));
            }
            None => {}
        }
    }
    Ok(axes)
}

/// Integer array as native `i32`, noting a conversion unless it already is
/// compact `i32`.
fn read_indices(
    view: &ArrayView,
    path: &str,
    conversions: &mut ConversionLog,
) -> Result<Vec<i32>, CheckpointError> {
    if view.dtype() != DType::Int32 || !view.is_compact() {
        conversions.note(format!(
            "{path} ({}, stride {}) converted to compact int32",
            view.dtype().name(),
            view.stride()
        ));
    }
    view.to_i32_vec()
}

fn build_elements(
    shape: ElementShape,
    conn: &[i32],
    attributes: Option<&[i32]>,
    kind: &str,
) -> Result<Vec<Element>, CheckpointError> {
    let npe = shape.num_vertices();
    if conn.len() % npe != 0 {
        return Err(CheckpointError::Schema(format!(
            "{kind} connectivity length {} is not a multiple of {npe} ({shape})",
            conn.len()
        )));
    }
    let count = conn.len() / npe;
    if let Some(attrs) = attributes {
        if attrs.len() != count {
            return Err(CheckpointError::Schema(format!(
                "{} {kind} attributes for {count} {kind}s",
                attrs.len()
            )));
        }
    }
    conn.chunks_exact(npe)
        .enumerate()
        .map(|(i, verts)| {
            let attribute = attributes.map_or(1, |a| a[i]);
            Element::new(shape, verts.to_vec(), attribute)
        })
        .collect()
}

/// Alias of the coordinate buffer when the axes are packed 3-tuples:
/// one `f64` buffer, 24-byte stride, axis `k` at offset `base + 8k`, and
/// unused trailing coordinates equal to zero.
fn packed_vertex_slab(axes: &[&ArrayView], nv: usize) -> Option<Slab> {
    let x = axes[0];
    let base = x.first_index();
    let packed = axes.iter().enumerate().all(|(axis, v)| {
        v.dtype() == DType::Float64
            && v.stride() == VERTEX_STRIDE
            && v.handle().same_buffer(x.handle())
            && v.first_index() == base + axis
    });
    if !packed {
        return None;
    }
    let slab = Slab::from_handle(x.handle().alias(), base, 3 * nv).ok()?;
    let used = axes.len();
    let zero_padded = slab
        .with(|v| {
            v.chunks_exact(3)
                .all(|c| c[used..].iter().all(|&z| z == 0.0))
        })
        .ok()?;
    zero_padded.then_some(slab)
}

fn gather_vertices(
    axes: &[&ArrayView],
    nv: usize,
    conversions: &mut ConversionLog,
) -> Result<Slab, CheckpointError> {
    let mut packed = vec![0.0; 3 * nv];
    for (axis, view) in axes.iter().enumerate() {
        if view.dtype() != DType::Float64 {
            conversions.note(format!(
                "coordinate axis {} ({}) converted to float64",
                AXES[axis],
                view.dtype().name()
            ));
        }
        for (i, x) in view.to_f64_vec()?.into_iter().enumerate() {
            packed[3 * i + axis] = x;
        }
    }
    Ok(Slab::owned(packed))
}
