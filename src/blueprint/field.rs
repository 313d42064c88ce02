//! Field mapper: [`GridFunction`] ⇄ field document.
//!
//! Vector values are written as components `v0..v{vdim-1}`, each a view
//! into the one shared value buffer:
//!
//! | ordering  | component `d` offset   | stride      |
//! |-----------|------------------------|-------------|
//! | byNODES   | `d * ndofs * 8` bytes  | 8 bytes     |
//! | byVDIM    | `d * 8` bytes          | `vdim * 8`  |

use crate::blueprint::{BlueprintMapper, ConversionLog, MAIN_TOPOLOGY};
use crate::data::buffer::{BufferHandle, DType, SharedBuffer};
use crate::data::slab::Slab;
use crate::document::{ArrayView, Node};
use crate::fe::{GridFunction, Ordering};
use crate::mesh::Mesh;
use crate::mesh_error::CheckpointError;

const F64: usize = std::mem::size_of::<f64>();

impl BlueprintMapper {
    /// Describe `field` as a field document on the main topology.
    ///
    /// Values alias the field's storage when its layout is byNODES or
    /// byVDIM. A space with a dof renumbering is materialized into an owned
    /// blocked buffer instead.
    pub fn export_field(&self, field: &GridFunction) -> Result<Node, CheckpointError> {
        let space = field.space();
        let (ndofs, vdim) = (space.ndofs(), space.vdim());

        let mut n = Node::object();
        n.set("basis", space.basis_name());
        n.set("topology", MAIN_TOPOLOGY);
        n.set("vdim", vdim as i64);

        if !space.has_native_layout() {
            log::debug!(
                "[blueprint] {} field has a dof renumbering; exporting a blocked copy",
                space.basis_name()
            );
            let blocked = field.values().with(|v| {
                (0..vdim)
                    .flat_map(|c| (0..ndofs).map(move |d| (d, c)))
                    .map(|(d, c)| v[space.vdof(d, c)])
                    .collect::<Vec<f64>>()
            })?;
            if vdim == 1 {
                n.set("values", blocked);
            } else {
                let buffer = SharedBuffer::new(blocked);
                for c in 0..vdim {
                    let view =
                        ArrayView::over(BufferHandle::Owned(buffer.clone()), ndofs, c * ndofs * F64, F64)?;
                    n.set(&format!("values/v{c}"), view);
                }
            }
            return Ok(n);
        }

        let values = field.values();
        let base = values.offset();
        if vdim == 1 {
            n.set(
                "values",
                ArrayView::over(values.handle().alias(), ndofs, base * F64, F64)?,
            );
        } else {
            let (entry_stride, comp_stride) = match space.ordering() {
                Ordering::ByNodes => (1, ndofs),
                Ordering::ByVdim => (vdim, 1),
            };
            for c in 0..vdim {
                let view = ArrayView::over(
                    values.handle().alias(),
                    ndofs,
                    (base + c * comp_stride) * F64,
                    entry_stride * F64,
                )?;
                n.set(&format!("values/v{c}"), view);
            }
        }
        Ok(n)
    }

    /// Rebuild a field on `mesh` from a field document.
    ///
    /// With `zero_copy` the field aliases the document's value buffer when
    /// its layout is flat, blocked or interleaved `f64`. Any conversion makes
    /// the field own its values.
    pub fn import_field(
        &self,
        field: &Node,
        mesh: &Mesh,
        zero_copy: bool,
    ) -> Result<GridFunction, CheckpointError> {
        let (gf, conversions) = self.import_field_logged(field, mesh, zero_copy)?;
        if zero_copy && !conversions.is_empty() {
            log::warn!("[blueprint] zero copy not possible: {}", conversions.entries().join("; "));
        }
        Ok(gf)
    }

    pub(crate) fn import_field_logged(
        &self,
        field: &Node,
        mesh: &Mesh,
        zero_copy: bool,
    ) -> Result<(GridFunction, ConversionLog), CheckpointError> {
        let basis = field.text("basis")?;
        let values = field.fetch("values")?;
        let mut conversions = ConversionLog::default();

        let (slab, vdim, ordering) = match values {
            Node::Array(view) => (flat_values(view, zero_copy, &mut conversions)?, 1, Ordering::ByNodes),
            Node::Object(_) => composite_values(values, zero_copy, &mut conversions)?,
            Node::Text(_) => {
                return Err(CheckpointError::Schema(
                    "field values must be an array or a set of components".into(),
                ));
            }
        };

        if let Some(recorded) = field.get("vdim") {
            let recorded = recorded
                .as_array()
                .ok_or_else(|| CheckpointError::Schema("field vdim is not an integer".into()))?
                .scalar_i64()?;
            if recorded != vdim as i64 {
                return Err(CheckpointError::Schema(format!(
                    "field records vdim {recorded} but carries {vdim} components"
                )));
            }
        }

        let ndofs = slab.len() / vdim;
        let space = self.factory.space(mesh, basis, ndofs, vdim, ordering)?;
        let gf = GridFunction::from_slab(space, slab)?;
        log::debug!(
            "[blueprint] imported {basis} field: {ndofs} dofs x {vdim} ({})",
            ordering.name()
        );
        Ok((gf, conversions))
    }
}

fn flat_values(
    view: &ArrayView,
    zero_copy: bool,
    conversions: &mut ConversionLog,
) -> Result<Slab, CheckpointError> {
    if view.dtype() != DType::Float64 || !view.is_compact() {
        conversions.note(format!(
            "field values ({}, stride {}) copied into compact float64",
            view.dtype().name(),
            view.stride()
        ));
        return Ok(Slab::owned(view.to_f64_vec()?));
    }
    if zero_copy {
        if let Ok(slab) = Slab::from_handle(view.handle().alias(), view.first_index(), view.count()) {
            return Ok(slab);
        }
    }
    Ok(Slab::owned(view.to_f64_vec()?))
}

fn composite_values(
    values: &Node,
    zero_copy: bool,
    conversions: &mut ConversionLog,
) -> Result<(Slab, usize, Ordering), CheckpointError> {
    let views = values
        .children()
        .map(|(name, child)| {
            child.as_array().ok_or_else(|| {
                CheckpointError::Schema(format!("field component \"{name}\" is not an array"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let Some(first) = views.first() else {
        return Err(CheckpointError::Schema("field values have no components".into()));
    };
    let vdim = views.len();
    let ndofs = first.count();
    if views.iter().any(|v| v.count() != ndofs) {
        return Err(CheckpointError::Schema(
            "field components have different lengths".into(),
        ));
    }

    if let Some((ordering, slab)) = native_layout(&views, ndofs) {
        let slab = if zero_copy { slab } else { slab.deep_copy()? };
        return Ok((slab, vdim, ordering));
    }

    conversions.note(format!(
        "{vdim} field components are neither blocked nor interleaved float64; copied into a blocked buffer"
    ));
    let mut blocked = Vec::with_capacity(ndofs * vdim);
    for view in &views {
        blocked.extend(view.to_f64_vec()?);
    }
    Ok((Slab::owned(blocked), vdim, Ordering::ByNodes))
}

/// Slab covering every component when they are `f64` views of one buffer
/// laid out byNODES (adjacent compact blocks) or byVDIM (interleaved).
fn native_layout(views: &[&ArrayView], ndofs: usize) -> Option<(Ordering, Slab)> {
    let first = views[0];
    let vdim = views.len();
    if views
        .iter()
        .any(|v| v.dtype() != DType::Float64 || !v.handle().same_buffer(first.handle()))
    {
        return None;
    }
    let base = first.first_index();
    let blocked = views
        .iter()
        .enumerate()
        .all(|(c, v)| v.is_compact() && v.first_index() == base + c * ndofs);
    let interleaved = views
        .iter()
        .enumerate()
        .all(|(c, v)| v.step() == vdim && v.first_index() == base + c);
    let ordering = if blocked {
        Ordering::ByNodes
    } else if interleaved {
        Ordering::ByVdim
    } else {
        return None;
    };
    let slab = Slab::from_handle(first.handle().alias(), base, ndofs * vdim).ok()?;
    Some((ordering, slab))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::{FiniteElementCollection, FiniteElementSpace};
    use crate::mesh::{Element, ElementShape};

    fn segment_mesh(nv: usize) -> Mesh {
        let coords = (0..nv).map(|i| [i as f64, 0.0, 0.0]).collect();
        let elements = (0..nv as i32 - 1)
            .map(|i| Element::new(ElementShape::Segment, vec![i, i + 1], 1).unwrap())
            .collect();
        Mesh::try_new(1, coords, elements, vec![]).unwrap()
    }

    fn field(ndofs: usize, vdim: usize, ordering: Ordering) -> GridFunction {
        let fec = FiniteElementCollection::h1(1, 1).unwrap();
        let space = FiniteElementSpace::new(fec, ndofs, vdim, ordering).unwrap();
        let values = (0..ndofs * vdim).map(|i| i as f64).collect();
        GridFunction::from_values(space, values).unwrap()
    }

    #[test]
    fn interleaved_components_alias_with_vdim_stride() {
        let mapper = BlueprintMapper::default();
        let gf = field(3, 2, Ordering::ByVdim);
        let doc = mapper.export_field(&gf).unwrap();
        let v1 = doc.array("values/v1").unwrap();
        assert!(v1.is_external());
        assert_eq!((v1.offset(), v1.stride()), (8, 16));
        assert_eq!(v1.to_f64_vec().unwrap(), vec![1.0, 3.0, 5.0]);
        assert_eq!(doc.text("basis").unwrap(), "H1_1D_P1");
    }

    #[test]
    fn import_detects_both_orderings_and_aliases() {
        let mapper = BlueprintMapper::default();
        let mesh = segment_mesh(3);
        for ordering in [Ordering::ByNodes, Ordering::ByVdim] {
            let gf = field(3, 2, ordering);
            let doc = mapper.export_field(&gf).unwrap();
            let (back, conversions) = mapper.import_field_logged(&doc, &mesh, true).unwrap();
            assert!(conversions.is_empty());
            assert_eq!(back.space().ordering(), ordering);
            assert!(back.is_external());
            assert_eq!(back.to_vec().unwrap(), gf.to_vec().unwrap());
        }
    }

    #[test]
    fn irregular_components_are_converted_to_blocked() {
        let mapper = BlueprintMapper::default();
        let mut doc = Node::object();
        doc.set("basis", "H1_1D_P1");
        doc.set("topology", "main");
        doc.set("values/v0", vec![0.0, 1.0, 2.0]);
        doc.set("values/v1", vec![10i32, 11, 12]);
        let (gf, conversions) = mapper
            .import_field_logged(&doc, &segment_mesh(3), true)
            .unwrap();
        assert!(!conversions.is_empty());
        assert!(!gf.is_external());
        assert_eq!(gf.space().ordering(), Ordering::ByNodes);
        assert_eq!(gf.component(1).unwrap(), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn recorded_vdim_must_match_components() {
        let mapper = BlueprintMapper::default();
        let mut doc = mapper.export_field(&field(3, 2, Ordering::ByNodes)).unwrap();
        doc.set("vdim", 3i64);
        let err = mapper.import_field(&doc, &segment_mesh(3), false).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn dof_count_must_match_the_mesh() {
        let mapper = BlueprintMapper::default();
        let doc = mapper.export_field(&field(4, 1, Ordering::ByNodes)).unwrap();
        assert!(mapper.import_field(&doc, &segment_mesh(3), false).is_err());
    }

    #[test]
    fn unknown_basis_is_unsupported() {
        let mapper = BlueprintMapper::default();
        let mut doc = mapper.export_field(&field(3, 1, Ordering::ByNodes)).unwrap();
        doc.set("basis", "Q7_1D_P1");
        let err = mapper.import_field(&doc, &segment_mesh(3), false).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn renumbered_space_exports_an_owned_blocked_copy() {
        let mapper = BlueprintMapper::default();
        let fec = FiniteElementCollection::h1(1, 1).unwrap();
        let space = FiniteElementSpace::new(fec, 3, 2, Ordering::ByNodes)
            .unwrap()
            .with_dof_map(vec![2, 1, 0])
            .unwrap();
        let gf = GridFunction::from_values(space, vec![0., 1., 2., 10., 11., 12.]).unwrap();
        let doc = mapper.export_field(&gf).unwrap();
        assert!(!doc.has_external());
        assert_eq!(doc.array("values/v0").unwrap().to_f64_vec().unwrap(), vec![2., 1., 0.]);
        assert_eq!(doc.array("values/v1").unwrap().to_f64_vec().unwrap(), vec![12., 11., 10.]);
    }
}
