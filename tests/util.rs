#![allow(dead_code)]
use mesh_checkpoint::{
    collection::CollectionConfig,
    fe::{FiniteElementCollection, FiniteElementSpace, GridFunction, Ordering},
    mesh::{Element, ElementShape, Mesh},
};

fn elems(shape: ElementShape, conn: &[&[i32]], first_attr: i32) -> Vec<Element> {
    conn.iter()
        .enumerate()
        .map(|(i, v)| Element::new(shape, v.to_vec(), first_attr + i as i32).unwrap())
        .collect()
}

/// Small mesh of `shape` elements with distinct attributes, plus boundary
/// elements wherever the shape has a boundary shape.
pub fn mesh_of(shape: ElementShape) -> Mesh {
    use ElementShape::*;
    match shape {
        Point => Mesh::try_new(
            1,
            vec![[0.0; 3], [0.5, 0.0, 0.0], [2.0, 0.0, 0.0]],
            elems(Point, &[&[0], &[1], &[2]], 1),
            vec![],
        ),
        Segment => Mesh::try_new(
            1,
            vec![[0.0; 3], [1.0, 0.0, 0.0], [3.0, 0.0, 0.0]],
            elems(Segment, &[&[0, 1], &[1, 2]], 1),
            elems(Point, &[&[0], &[2]], 5),
        ),
        Triangle => Mesh::try_new(
            2,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            elems(Triangle, &[&[0, 1, 2], &[0, 2, 3]], 2),
            elems(Segment, &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]], 7),
        ),
        Quadrilateral => Mesh::try_new(
            2,
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
                [2.0, 1.5, 0.0],
            ],
            elems(Quadrilateral, &[&[0, 1, 4, 3], &[1, 2, 5, 4]], 1),
            elems(Segment, &[&[0, 1], &[1, 2], &[2, 5]], 3),
        ),
        Tetrahedron => Mesh::try_new(
            3,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            elems(Tetrahedron, &[&[0, 1, 2, 3]], 4),
            elems(Triangle, &[&[0, 2, 1], &[0, 1, 3], &[0, 3, 2], &[1, 2, 3]], 1),
        ),
        Hexahedron => Mesh::try_new(
            3,
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            elems(Hexahedron, &[&[0, 1, 2, 3, 4, 5, 6, 7]], 9),
            elems(Quadrilateral, &[&[0, 3, 2, 1], &[4, 5, 6, 7]], 2),
        ),
    }
    .unwrap()
}

/// Triangle mesh with vertices shifted by `rank`, as a rank's local domain.
pub fn rank_mesh(rank: usize) -> Mesh {
    let mut mesh = mesh_of(ElementShape::Triangle);
    for i in 0..mesh.num_vertices() {
        let [x, y, z] = mesh.vertex(i).unwrap();
        mesh.set_vertex(i, [x + rank as f64, y, z]).unwrap();
    }
    mesh
}

/// H1 P1 field on `mesh` with value `100 * comp + dof + offset`.
pub fn h1_field(mesh: &Mesh, vdim: usize, ordering: Ordering, offset: f64) -> GridFunction {
    let fec = FiniteElementCollection::h1(mesh.dimension(), 1).unwrap();
    let space = FiniteElementSpace::new(fec, mesh.num_vertices(), vdim, ordering).unwrap();
    let mut gf = GridFunction::new(space);
    for comp in 0..vdim {
        for dof in 0..mesh.num_vertices() {
            gf.set(dof, comp, 100.0 * comp as f64 + dof as f64 + offset).unwrap();
        }
    }
    gf
}

/// Piecewise-constant field: one value per element.
pub fn l2_field(mesh: &Mesh) -> GridFunction {
    let fec = FiniteElementCollection::l2(mesh.dimension(), 0).unwrap();
    let space = FiniteElementSpace::new(fec, mesh.num_elements(), 1, Ordering::ByNodes).unwrap();
    let values = (0..mesh.num_elements()).map(|e| 0.5 * e as f64).collect();
    GridFunction::from_values(space, values).unwrap()
}

pub fn config_in(dir: &std::path::Path, name: &str) -> CollectionConfig {
    let mut cfg = CollectionConfig::new(name);
    cfg.prefix_path = format!("{}/", dir.display());
    cfg
}

/// Geometry, connectivity and attributes are equal.
pub fn assert_same_mesh(got: &Mesh, want: &Mesh) {
    assert_eq!(got.space_dimension(), want.space_dimension());
    assert_eq!(got.num_vertices(), want.num_vertices());
    for i in 0..want.num_vertices() {
        assert_eq!(got.vertex(i).unwrap(), want.vertex(i).unwrap(), "vertex {i}");
    }
    assert_eq!(got.elements(), want.elements());
    assert_eq!(got.boundary_elements(), want.boundary_elements());
}

/// Same basis, layout-independent values.
pub fn assert_same_field(got: &GridFunction, want: &GridFunction) {
    assert_eq!(got.space().basis_name(), want.space().basis_name());
    assert_eq!(got.vdim(), want.vdim());
    assert_eq!(got.space().ndofs(), want.space().ndofs());
    for comp in 0..want.vdim() {
        assert_eq!(got.component(comp).unwrap(), want.component(comp).unwrap());
    }
}
