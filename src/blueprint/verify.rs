//! Structural verification of mesh documents.
//!
//! Verification runs before a document is persisted and before one is
//! imported. It collects every problem it finds rather than stopping at the
//! first, so a failed save reports the whole picture.

use std::collections::HashMap;
use std::fmt;

use crate::blueprint::AXES;
use crate::document::{ArrayView, Node};
use crate::mesh::ElementShape;

/// Diagnostics from a failed verification, one line per problem.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    errors: Vec<String>,
}

impl VerifyReport {
    fn push(&mut self, path: &str, msg: impl fmt::Display) {
        self.errors.push(format!("{path}: {msg}"));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {e}")?;
        }
        Ok(())
    }
}

struct TopologyInfo {
    coordset: String,
    elements: usize,
    dimension: usize,
}

/// Check `doc` against the mesh document schema.
pub fn verify(doc: &Node) -> Result<(), VerifyReport> {
    let mut report = VerifyReport::default();
    let coordsets = verify_coordsets(doc, &mut report);
    let topologies = verify_topologies(doc, &coordsets, &mut report);
    verify_fields(doc, &coordsets, &topologies, &mut report);
    verify_state(doc, &mut report);
    if report.is_empty() {
        Ok(())
    } else {
        Err(report)
    }
}

fn required_object<'a>(doc: &'a Node, path: &str, report: &mut VerifyReport) -> Option<&'a Node> {
    match doc.get(path) {
        Some(n) if n.is_object() && n.number_of_children() > 0 => Some(n),
        Some(_) => {
            report.push(path, "must be a non-empty object");
            None
        }
        None => {
            report.push(path, "missing");
            None
        }
    }
}

fn expect_text(node: &Node, name: &str, path: &str, report: &mut VerifyReport) -> Option<String> {
    match node.child_named(name).map(Node::as_text) {
        Some(Some(s)) => Some(s.to_string()),
        Some(None) => {
            report.push(&format!("{path}/{name}"), "must be text");
            None
        }
        None => {
            report.push(&format!("{path}/{name}"), "missing");
            None
        }
    }
}

/// Vertex count per coordset.
fn verify_coordsets(doc: &Node, report: &mut VerifyReport) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    let Some(coordsets) = required_object(doc, "coordsets", report) else {
        return counts;
    };
    for (name, cs) in coordsets.children() {
        let path = format!("coordsets/{name}");
        if let Some(kind) = expect_text(cs, "type", &path, report) {
            if kind != "explicit" {
                report.push(&format!("{path}/type"), format!("unsupported type \"{kind}\""));
            }
        }
        let Some(values) = required_object(doc, &format!("{path}/values"), report) else {
            continue;
        };
        let names: Vec<&str> = values.children().map(|(n, _)| n).collect();
        if names.is_empty() || names.len() > 3 || names[..] != AXES[..names.len()] {
            report.push(
                &format!("{path}/values"),
                format!("axes {names:?} are not a prefix of x, y, z"),
            );
            continue;
        }
        let mut lengths = Vec::with_capacity(names.len());
        for (axis, v) in values.children() {
            match v.as_array() {
                Some(a) => lengths.push(a.count()),
                None => report.push(&format!("{path}/values/{axis}"), "must be an array"),
            }
        }
        if lengths.len() != names.len() {
            continue;
        }
        let n = lengths[0];
        if lengths.iter().any(|&m| m != n) {
            report.push(&format!("{path}/values"), "axes have different lengths");
            continue;
        }
        counts.insert(name.to_string(), n);
    }
    counts
}

fn verify_topologies(
    doc: &Node,
    coordsets: &HashMap<String, usize>,
    report: &mut VerifyReport,
) -> HashMap<String, TopologyInfo> {
    let mut infos = HashMap::new();
    let Some(topologies) = required_object(doc, "topologies", report) else {
        return infos;
    };
    for (name, topo) in topologies.children() {
        let path = format!("topologies/{name}");
        if let Some(kind) = expect_text(topo, "type", &path, report) {
            if kind != "unstructured" {
                report.push(&format!("{path}/type"), format!("unsupported type \"{kind}\""));
            }
        }
        let coordset = expect_text(topo, "coordset", &path, report);
        let nverts = match &coordset {
            Some(cs) => match coordsets.get(cs) {
                Some(&n) => Some(n),
                None => {
                    // a coordset that exists but failed its own checks is already reported
                    if !doc.has_path(&format!("coordsets/{cs}")) {
                        report.push(&format!("{path}/coordset"), format!("unknown coordset \"{cs}\""));
                    }
                    None
                }
            },
            None => None,
        };
        if let Some(gf) = topo.child_named("grid_function") {
            match gf.as_text() {
                Some(field) if doc.has_path(&format!("fields/{field}")) => {}
                Some(field) => report.push(
                    &format!("{path}/grid_function"),
                    format!("unknown field \"{field}\""),
                ),
                None => report.push(&format!("{path}/grid_function"), "must be text"),
            }
        }

        let epath = format!("{path}/elements");
        let Some(elements) = topo.child_named("elements") else {
            report.push(&epath, "missing");
            continue;
        };
        let shape = match expect_text(elements, "shape", &epath, report) {
            Some(s) => match s.parse::<ElementShape>() {
                Ok(shape) => shape,
                Err(_) => {
                    report.push(&format!("{epath}/shape"), format!("unknown shape \"{s}\""));
                    continue;
                }
            },
            None => continue,
        };
        let cpath = format!("{epath}/connectivity");
        let Some(conn) = elements.child_named("connectivity").and_then(Node::as_array) else {
            report.push(&cpath, "missing or not an array");
            continue;
        };
        let indices = match conn.to_i64_vec() {
            Ok(v) => v,
            Err(e) => {
                report.push(&cpath, e);
                continue;
            }
        };
        let npe = shape.num_vertices();
        if indices.len() % npe != 0 {
            report.push(
                &cpath,
                format!("length {} is not a multiple of {npe} ({shape})", indices.len()),
            );
            continue;
        }
        if let Some(n) = nverts {
            if let Some((i, v)) = indices
                .iter()
                .enumerate()
                .find(|&(_, &v)| v < 0 || v as usize >= n)
            {
                report.push(&cpath, format!("index {v} at {i} outside [0, {n})"));
            }
        }
        infos.insert(
            name.to_string(),
            TopologyInfo {
                coordset: coordset.unwrap_or_default(),
                elements: indices.len() / npe,
                dimension: shape.dimension(),
            },
        );
    }
    if let (Some(main), Some(boundary)) = (infos.get("main"), infos.get("boundary")) {
        if boundary.elements > 0 && boundary.dimension + 1 != main.dimension {
            report.push(
                "topologies/boundary",
                format!(
                    "dimension {} does not bound a {}D main topology",
                    boundary.dimension, main.dimension
                ),
            );
        }
    }
    infos
}

fn verify_fields(
    doc: &Node,
    coordsets: &HashMap<String, usize>,
    topologies: &HashMap<String, TopologyInfo>,
    report: &mut VerifyReport,
) {
    let Some(fields) = doc.get("fields") else {
        return;
    };
    for (name, field) in fields.children() {
        let path = format!("fields/{name}");
        let topology = expect_text(field, "topology", &path, report);
        let info = topology.as_ref().and_then(|t| {
            let info = topologies.get(t);
            if info.is_none() && !doc.has_path(&format!("topologies/{t}")) {
                report.push(&format!("{path}/topology"), format!("unknown topology \"{t}\""));
            }
            info
        });

        let association = field.child_named("association").and_then(Node::as_text);
        let has_basis = field.child_named("basis").and_then(Node::as_text).is_some();
        if association.is_none() && !has_basis {
            report.push(&path, "needs an association or a basis");
        }

        let vpath = format!("{path}/values");
        let components: Vec<&ArrayView> = match field.child_named("values") {
            Some(Node::Array(view)) => vec![view],
            Some(obj @ Node::Object(_)) if obj.number_of_children() > 0 => {
                let views: Vec<_> = obj.children().filter_map(|(_, c)| c.as_array()).collect();
                if views.len() != obj.number_of_children() {
                    report.push(&vpath, "every component must be an array");
                    continue;
                }
                views
            }
            _ => {
                report.push(&vpath, "missing, or neither an array nor a set of components");
                continue;
            }
        };
        let count = components[0].count();
        if components.iter().any(|c| c.count() != count) {
            report.push(&vpath, "components have different lengths");
            continue;
        }
        if let Some(vdim) = field.child_named("vdim") {
            match vdim.as_array().map(ArrayView::scalar_i64) {
                Some(Ok(v)) if v == components.len() as i64 => {}
                Some(Ok(v)) => report.push(
                    &format!("{path}/vdim"),
                    format!("{v} disagrees with {} components", components.len()),
                ),
                _ => report.push(&format!("{path}/vdim"), "must be an integer scalar"),
            }
        }

        let (Some(association), Some(info)) = (association, info) else {
            continue;
        };
        let expected = match association {
            "element" => Some(info.elements),
            "vertex" => coordsets.get(&info.coordset).copied(),
            other => {
                report.push(
                    &format!("{path}/association"),
                    format!("unsupported association \"{other}\""),
                );
                None
            }
        };
        if let Some(expected) = expected {
            if count != expected {
                report.push(&vpath, format!("{count} values for {expected} {association}s"));
            }
        }
    }
}

fn verify_state(doc: &Node, report: &mut VerifyReport) {
    let Some(state) = doc.get("state") else {
        return;
    };
    for key in ["cycle", "domain_id"] {
        if let Some(n) = state.child_named(key) {
            if n.as_array().map(ArrayView::scalar_i64).is_none_or(|r| r.is_err()) {
                report.push(&format!("state/{key}"), "must be an integer scalar");
            }
        }
    }
    if let Some(n) = state.child_named("time") {
        if n.as_array().map(ArrayView::scalar_f64).is_none_or(|r| r.is_err()) {
            report.push("state/time", "must be a numeric scalar");
        }
    }
}
