mod util;

use mesh_checkpoint::blueprint::{BlueprintMapper, verify};
use mesh_checkpoint::document::Node;
use mesh_checkpoint::fe::{FiniteElementCollection, FiniteElementSpace, GridFunction, Ordering};
use mesh_checkpoint::io::Protocol;
use mesh_checkpoint::mesh::ElementShape;
use proptest::prelude::*;
use util::{assert_same_field, h1_field, l2_field, mesh_of};

fn ordering() -> impl Strategy<Value = Ordering> {
    prop_oneof![Just(Ordering::ByNodes), Just(Ordering::ByVdim)]
}

fn protocol() -> impl Strategy<Value = Protocol> {
    prop_oneof![Just(Protocol::Json), Just(Protocol::Binary)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn vector_fields_survive_any_layout(
        vdim in 1usize..=3,
        ordering in ordering(),
        protocol in protocol(),
        values in prop::collection::vec(-1.0e6f64..1.0e6, 12),
    ) {
        let mapper = BlueprintMapper::default();
        let mesh = mesh_of(ElementShape::Triangle);
        let fec = FiniteElementCollection::h1(2, 1).unwrap();
        let space = FiniteElementSpace::new(fec, 4, vdim, ordering).unwrap();
        let gf = GridFunction::from_values(space, values[..4 * vdim].to_vec()).unwrap();

        let mut doc = mapper.export_mesh(&mesh).unwrap();
        doc.set("fields/u", mapper.export_field(&gf).unwrap());
        prop_assert!(verify(&doc).is_ok());

        let loaded = protocol.decode(&protocol.encode(&doc).unwrap()).unwrap();
        let back = mapper
            .import_field(loaded.fetch("fields/u").unwrap(), &mesh, false)
            .unwrap();
        if vdim > 1 {
            prop_assert_eq!(back.space().ordering(), ordering);
        }
        for comp in 0..vdim {
            prop_assert_eq!(back.component(comp).unwrap(), gf.component(comp).unwrap());
        }
    }
}

#[test]
fn field_layout_is_recorded_in_the_document() {
    let mapper = BlueprintMapper::default();
    let mesh = mesh_of(ElementShape::Quadrilateral);

    let scalar = mapper.export_field(&h1_field(&mesh, 1, Ordering::ByNodes, 0.0)).unwrap();
    assert!(scalar.fetch("values").unwrap().is_array());
    assert_eq!(scalar.text("basis").unwrap(), "H1_2D_P1");
    assert_eq!(scalar.scalar_i64("vdim").unwrap(), 1);

    let vector = mapper.export_field(&h1_field(&mesh, 2, Ordering::ByVdim, 0.0)).unwrap();
    let v1 = vector.array("values/v1").unwrap();
    assert_eq!((v1.count(), v1.offset(), v1.stride()), (6, 8, 16));
    assert!(v1.is_external());
}

#[test]
fn element_fields_round_trip_through_files() {
    let mapper = BlueprintMapper::default();
    let mesh = mesh_of(ElementShape::Hexahedron);
    let gf = l2_field(&mesh);
    let mut doc = mapper.export_mesh(&mesh).unwrap();
    doc.set("fields/pressure", mapper.export_field(&gf).unwrap());

    let loaded = Protocol::Json.decode(&Protocol::Json.encode(&doc).unwrap()).unwrap();
    let back = mapper
        .import_field(loaded.fetch("fields/pressure").unwrap(), &mesh, false)
        .unwrap();
    assert_same_field(&back, &gf);
    assert_eq!(back.space().basis_name(), "L2_3D_P0");
}

#[test]
fn renumbered_spaces_export_logical_order() {
    let mapper = BlueprintMapper::default();
    let mesh = mesh_of(ElementShape::Triangle);
    let fec = FiniteElementCollection::h1(2, 1).unwrap();
    let space = FiniteElementSpace::new(fec, 4, 2, Ordering::ByNodes)
        .unwrap()
        .with_dof_map(vec![3, 2, 1, 0])
        .unwrap();
    let mut gf = GridFunction::new(space);
    for dof in 0..4 {
        gf.set(dof, 0, dof as f64).unwrap();
        gf.set(dof, 1, 10.0 + dof as f64).unwrap();
    }

    let exported = mapper.export_field(&gf).unwrap();
    assert!(!exported.has_external());
    assert_eq!(
        exported.array("values/v0").unwrap().to_f64_vec().unwrap(),
        vec![0.0, 1.0, 2.0, 3.0]
    );
    let back = mapper.import_field(&exported, &mesh, false).unwrap();
    assert_eq!(back.component(1).unwrap(), vec![10.0, 11.0, 12.0, 13.0]);
}

/// Deterministic spread of finite doubles: scrambled bit patterns plus
/// values in `[0, 1000)` with full 53-bit mantissas.
fn scrambled_doubles(n: u64) -> Vec<f64> {
    (0..n)
        .flat_map(|i| {
            let bits = (i + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let unit = (bits >> 11) as f64 / (1u64 << 53) as f64;
            [f64::from_bits(bits), 1000.0 * unit]
        })
        .filter(|x| x.is_finite())
        .collect()
}

#[test]
fn json_preserves_every_float_bit() {
    let values = scrambled_doubles(10_000);
    assert!(values.len() > 15_000);
    let mut doc = Node::object();
    doc.set("fields/u/values", values.clone());

    let loaded = Protocol::Json.decode(&Protocol::Json.encode(&doc).unwrap()).unwrap();
    let back = loaded.array("fields/u/values").unwrap().to_f64_vec().unwrap();
    assert_eq!(back.len(), values.len());
    for (got, want) in back.iter().zip(&values) {
        assert_eq!(got.to_bits(), want.to_bits(), "{want:e} came back as {got:e}");
    }
}
