//! Relations between the irreducible and the full k-points of a regular mesh under space-group
//! operations.

use std::fmt;

use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::auxiliary::lattice::Lattice;
use crate::errors::UnfoldError;
use crate::symmetry::space_group::SpaceGroupOperation;

#[cfg(test)]
#[path = "kpoint_symmetry_tests.rs"]
mod kpoint_symmetry_tests;

// ==================
// Struct definitions
// ==================

/// Structure recording how a k-point of the full mesh is generated from the irreducible set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KPointImage {
    /// The index of the generating irreducible k-point.
    pub irreducible_index: usize,

    /// The index of the generating operation in [`KPointSymmetry::operations`].
    pub operation_index: usize,
}

/// Structure containing the space-group operations of a crystal together with the star of every
/// irreducible k-point on the full mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KPointSymmetry {
    /// The space-group operations. The identity is always the first operation.
    operations: Vec<SpaceGroupOperation>,

    /// The Cartesian k-points of the full mesh.
    full_kpts: Vec<Vector3<f64>>,

    /// For every k-point of the full mesh, the irreducible k-point and the operation generating
    /// it.
    images: Vec<KPointImage>,
}

impl KPointSymmetry {
    /// Constructs the star structure of a set of irreducible k-points on a full mesh.
    ///
    /// Every full-mesh k-point is attributed to the first irreducible k-point and, for that
    /// k-point, the first operation mapping onto it. The identity is prepended to the operations
    /// if absent.
    ///
    /// # Arguments
    ///
    /// * `lattice` - The lattice of the crystal.
    /// * `operations` - The space-group operations.
    /// * `irreducible_kpts` - The Cartesian irreducible k-points.
    /// * `full_kpts` - The Cartesian k-points of the full mesh.
    /// * `thresh` - Threshold on scaled k-point coordinates for identifying k-points.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if some full-mesh k-point cannot be reached from the
    /// irreducible set, or if some operation is not an isometry of the lattice.
    pub fn new(
        lattice: &Lattice,
        operations: &[SpaceGroupOperation],
        irreducible_kpts: &[Vector3<f64>],
        full_kpts: &[Vector3<f64>],
        thresh: f64,
    ) -> Result<Self, UnfoldError> {
        let operations = with_identity_first(operations);
        let images_of_irr = irreducible_kpts
            .iter()
            .map(|kpt| {
                operations
                    .iter()
                    .map(|op| op.transform_kpt(lattice, kpt))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let images = full_kpts
            .iter()
            .map(|kpt| {
                images_of_irr
                    .iter()
                    .enumerate()
                    .find_map(|(irreducible_index, op_images)| {
                        op_images
                            .iter()
                            .position(|image| lattice.kpts_equivalent(image, kpt, thresh))
                            .map(|operation_index| KPointImage {
                                irreducible_index,
                                operation_index,
                            })
                    })
                    .ok_or_else(|| {
                        UnfoldError::Domain(format!(
                            "k-point ({}) is not reachable from the irreducible k-points",
                            kpt.iter().map(|x| format!("{x:+.6}")).join(", ")
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "{} full-mesh k-point(s) generated from {} irreducible k-point(s) by {} operation(s).",
            full_kpts.len(),
            irreducible_kpts.len(),
            operations.len()
        );
        Ok(KPointSymmetry {
            operations,
            full_kpts: full_kpts.to_vec(),
            images,
        })
    }

    /// Reduces a full mesh of k-points to an irreducible set.
    ///
    /// The k-points are scanned in order; each k-point not yet covered by the star of an earlier
    /// one becomes irreducible.
    ///
    /// # Returns
    ///
    /// The star structure and the indices of the irreducible k-points within `full_kpts`.
    pub fn reduce(
        lattice: &Lattice,
        operations: &[SpaceGroupOperation],
        full_kpts: &[Vector3<f64>],
        thresh: f64,
    ) -> Result<(Self, Vec<usize>), UnfoldError> {
        let operations = with_identity_first(operations);
        let mut covered = vec![false; full_kpts.len()];
        let mut irreducible_indices = Vec::new();
        for (i, kpt) in full_kpts.iter().enumerate() {
            if covered[i] {
                continue;
            }
            irreducible_indices.push(i);
            for op in operations.iter() {
                let image = op.transform_kpt(lattice, kpt)?;
                full_kpts
                    .iter()
                    .positions(|other| lattice.kpts_equivalent(&image, other, thresh))
                    .for_each(|j| covered[j] = true);
            }
        }
        let irreducible_kpts = irreducible_indices
            .iter()
            .map(|i| full_kpts[*i])
            .collect_vec();
        let kpoint_symmetry =
            KPointSymmetry::new(lattice, &operations, &irreducible_kpts, full_kpts, thresh)?;
        Ok((kpoint_symmetry, irreducible_indices))
    }

    /// The space-group operations, starting with the identity.
    pub fn operations(&self) -> &[SpaceGroupOperation] {
        &self.operations
    }

    /// The Cartesian k-points of the full mesh.
    pub fn full_kpts(&self) -> &[Vector3<f64>] {
        &self.full_kpts
    }

    /// For every full-mesh k-point, the irreducible k-point and operation generating it.
    pub fn images(&self) -> &[KPointImage] {
        &self.images
    }

    /// Checks that the stars are consistent with the stored operations and full-mesh k-points.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Dimension`] if the first operation is not the identity, if the
    /// number of images differs from the number of full-mesh k-points, or if an image refers to
    /// an operation that is not stored.
    pub fn validate(&self) -> Result<(), UnfoldError> {
        if !self.operations.first().is_some_and(|op| op.is_identity()) {
            return Err(UnfoldError::Dimension(
                "the first space-group operation is not the identity".to_string(),
            ));
        }
        if self.images.len() != self.full_kpts.len() {
            return Err(UnfoldError::Dimension(format!(
                "{} k-point images given for {} full-mesh k-points",
                self.images.len(),
                self.full_kpts.len()
            )));
        }
        if let Some((k, image)) = self
            .images
            .iter()
            .enumerate()
            .find(|(_, image)| image.operation_index >= self.operations.len())
        {
            return Err(UnfoldError::Dimension(format!(
                "full-mesh k-point {k} is generated by operation {} but only {} are stored",
                image.operation_index,
                self.operations.len()
            )));
        }
        Ok(())
    }

    /// The number of irreducible k-points referenced by this structure.
    pub fn n_irreducible(&self) -> usize {
        self.images
            .iter()
            .map(|image| image.irreducible_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// The indices of the full-mesh k-points in the star of an irreducible k-point.
    pub fn star(&self, irreducible_index: usize) -> Vec<usize> {
        self.images
            .iter()
            .positions(|image| image.irreducible_index == irreducible_index)
            .collect()
    }
}

impl fmt::Display for KPointSymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Space-group operations: {}", self.operations.len())?;
        for (i, op) in self.operations.iter().enumerate() {
            writeln!(f, "  {i:>3}: {op}")?;
        }
        writeln!(
            f,
            "Irreducible k-points: {} (full mesh: {})",
            self.n_irreducible(),
            self.full_kpts.len()
        )?;
        for irr in 0..self.n_irreducible() {
            writeln!(
                f,
                "  {irr:>3}: star {{{}}}",
                self.star(irr).iter().map(|i| i.to_string()).join(", ")
            )?;
        }
        Ok(())
    }
}

// =========
// Functions
// =========

/// Returns a copy of `operations` whose first element is the identity.
fn with_identity_first(operations: &[SpaceGroupOperation]) -> Vec<SpaceGroupOperation> {
    let mut ordered = vec![SpaceGroupOperation::identity()];
    ordered.extend(operations.iter().filter(|op| !op.is_identity()).cloned());
    ordered
}
