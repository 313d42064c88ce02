//! Field values attached to a finite-element space.

use crate::data::slab::Slab;
use crate::fe::FiniteElementSpace;
use crate::mesh_error::CheckpointError;

/// Values of a (possibly vector) field, laid out as the space's
/// [`Ordering`](crate::fe::Ordering) dictates.
#[derive(Clone, Debug)]
pub struct GridFunction {
    space: FiniteElementSpace,
    values: Slab,
}

impl GridFunction {
    /// Zero-initialized field on `space`.
    pub fn new(space: FiniteElementSpace) -> Self {
        let values = Slab::owned(vec![0.0; space.vsize()]);
        Self { space, values }
    }

    pub fn from_values(space: FiniteElementSpace, values: Vec<f64>) -> Result<Self, CheckpointError> {
        Self::from_slab(space, Slab::owned(values))
    }

    /// Field over existing storage; an external slab makes the field alias it.
    pub fn from_slab(space: FiniteElementSpace, values: Slab) -> Result<Self, CheckpointError> {
        if values.len() != space.vsize() {
            return Err(CheckpointError::Schema(format!(
                "{} space with {} dofs x vdim {} needs {} values, got {}",
                space.basis_name(),
                space.ndofs(),
                space.vdim(),
                space.vsize(),
                values.len()
            )));
        }
        Ok(Self { space, values })
    }

    #[inline]
    pub fn space(&self) -> &FiniteElementSpace {
        &self.space
    }

    #[inline]
    pub fn values(&self) -> &Slab {
        &self.values
    }

    #[inline]
    pub fn vdim(&self) -> usize {
        self.space.vdim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Component `comp` of logical dof `dof`.
    pub fn get(&self, dof: usize, comp: usize) -> Result<f64, CheckpointError> {
        self.check(dof, comp)?;
        self.values.get(self.space.vdof(dof, comp))
    }

    /// Write component `comp` of logical dof `dof`; aliases see the write.
    pub fn set(&mut self, dof: usize, comp: usize, value: f64) -> Result<(), CheckpointError> {
        self.check(dof, comp)?;
        let k = self.space.vdof(dof, comp);
        self.values.with_mut(|v| v[k] = value)
    }

    fn check(&self, dof: usize, comp: usize) -> Result<(), CheckpointError> {
        if dof >= self.space.ndofs() || comp >= self.space.vdim() {
            return Err(CheckpointError::Schema(format!(
                "dof ({dof}, {comp}) outside {} x {}",
                self.space.ndofs(),
                self.space.vdim()
            )));
        }
        Ok(())
    }

    /// Raw values in storage order.
    pub fn to_vec(&self) -> Result<Vec<f64>, CheckpointError> {
        self.values.to_vec()
    }

    /// Values of component `comp` in logical dof order.
    pub fn component(&self, comp: usize) -> Result<Vec<f64>, CheckpointError> {
        if comp >= self.space.vdim() {
            return Err(CheckpointError::Schema(format!(
                "component {comp} outside vdim {}",
                self.space.vdim()
            )));
        }
        self.values.with(|v| {
            (0..self.space.ndofs())
                .map(|dof| v[self.space.vdof(dof, comp)])
                .collect()
        })
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.values.is_external()
    }

    pub fn into_owned(self) -> Result<GridFunction, CheckpointError> {
        Ok(GridFunction {
            values: self.values.into_owned()?,
            space: self.space,
        })
    }

    pub fn deep_copy(&self) -> Result<GridFunction, CheckpointError> {
        Ok(GridFunction {
            space: self.space.clone(),
            values: self.values.deep_copy()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fe::{FiniteElementCollection, Ordering};

    fn space(ndofs: usize, vdim: usize, ordering: Ordering) -> FiniteElementSpace {
        let fec = FiniteElementCollection::h1(2, 1).unwrap();
        FiniteElementSpace::new(fec, ndofs, vdim, ordering).unwrap()
    }

    #[test]
    fn components_follow_the_ordering() {
        let by_vdim =
            GridFunction::from_values(space(3, 2, Ordering::ByVdim), vec![0., 10., 1., 11., 2., 12.])
                .unwrap();
        let by_nodes =
            GridFunction::from_values(space(3, 2, Ordering::ByNodes), vec![0., 1., 2., 10., 11., 12.])
                .unwrap();
        for gf in [&by_vdim, &by_nodes] {
            assert_eq!(gf.component(0).unwrap(), vec![0., 1., 2.]);
            assert_eq!(gf.component(1).unwrap(), vec![10., 11., 12.]);
            assert_eq!(gf.get(2, 1).unwrap(), 12.);
        }
        assert!(by_vdim.get(3, 0).is_err());
    }

    #[test]
    fn length_must_match_the_space() {
        let err = GridFunction::from_values(space(3, 2, Ordering::ByNodes), vec![0.; 5]).unwrap_err();
        assert!(err.is_schema());
        assert_eq!(GridFunction::new(space(4, 3, Ordering::ByVdim)).len(), 12);
    }

    #[test]
    fn alias_writes_are_shared() {
        let mut gf = GridFunction::from_values(space(2, 1, Ordering::ByNodes), vec![1., 2.]).unwrap();
        let alias = GridFunction::from_slab(gf.space().clone(), gf.values().alias()).unwrap();
        gf.set(1, 0, 5.).unwrap();
        assert_eq!(alias.get(1, 0).unwrap(), 5.);
        assert!(alias.is_external() && !gf.is_external());
    }
}
