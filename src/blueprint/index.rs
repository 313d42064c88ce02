//! Structural summary of a mesh document, stored in the root index.

use crate::document::Node;
use crate::mesh_error::CheckpointError;

/// Summarize `doc` for a root index covering `num_domains` domains.
///
/// Every entry records the `path` of the summarized node inside a domain
/// document, so readers can locate it without loading a domain first.
pub fn generate_index(doc: &Node, num_domains: usize) -> Result<Node, CheckpointError> {
    let mut index = Node::object();

    for (name, cs) in doc.fetch("coordsets")?.children() {
        let entry = index.fetch_mut(&format!("coordsets/{name}"));
        entry.set("type", cs.text("type")?);
        entry.set("coord_system/type", "cartesian");
        for (axis, _) in cs.fetch("values")?.children() {
            entry.fetch_mut(&format!("coord_system/axes/{axis}"));
        }
        entry.set("path", format!("coordsets/{name}"));
    }

    for (name, topo) in doc.fetch("topologies")?.children() {
        let entry = index.fetch_mut(&format!("topologies/{name}"));
        entry.set("type", topo.text("type")?);
        entry.set("coordset", topo.text("coordset")?);
        entry.set("path", format!("topologies/{name}"));
        if let Some(gf) = topo.get("grid_function").and_then(Node::as_text) {
            entry.set("grid_function", gf);
        }
    }

    if let Some(fields) = doc.get("fields") {
        for (name, field) in fields.children() {
            let values = field.fetch("values")?;
            let components = if values.is_array() {
                1
            } else {
                values.number_of_children()
            };
            let entry = index.fetch_mut(&format!("fields/{name}"));
            entry.set("number_of_components", components as i64);
            entry.set("topology", field.text("topology")?);
            if let Some(basis) = field.get("basis").and_then(Node::as_text) {
                entry.set("basis", basis);
            }
            if let Some(assoc) = field.get("association").and_then(Node::as_text) {
                entry.set("association", assoc);
            }
            entry.set("path", format!("fields/{name}"));
        }
    }

    index.set("state/number_of_domains", num_domains as i64);
    if let Some(cycle) = doc.get("state/cycle") {
        index.set("state/cycle", cycle.to_owned_tree()?);
    }
    if let Some(time) = doc.get("state/time") {
        index.set("state/time", time.to_owned_tree()?);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::BlueprintMapper;
    use crate::mesh::{Element, ElementShape, Mesh};

    #[test]
    fn index_lists_every_section_with_paths() {
        let tet = Element::new(ElementShape::Tetrahedron, vec![0, 1, 2, 3], 1).unwrap();
        let mesh = Mesh::try_new(
            3,
            vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
            vec![tet],
            vec![],
        )
        .unwrap();
        let mut doc = BlueprintMapper::default().export_mesh(&mesh).unwrap();
        doc.set("state/cycle", 4i64);

        let index = generate_index(&doc, 3).unwrap();
        assert_eq!(index.text("coordsets/coords/path").unwrap(), "coordsets/coords");
        assert_eq!(
            index.fetch("coordsets/coords/coord_system/axes").unwrap().number_of_children(),
            3
        );
        assert_eq!(index.text("topologies/main/coordset").unwrap(), "coords");
        assert_eq!(
            index.text("fields/mesh_attribute/association").unwrap(),
            "element"
        );
        assert_eq!(index.scalar_i64("fields/mesh_attribute/number_of_components").unwrap(), 1);
        assert_eq!(index.scalar_i64("state/number_of_domains").unwrap(), 3);
        assert_eq!(index.scalar_i64("state/cycle").unwrap(), 4);
    }
}
