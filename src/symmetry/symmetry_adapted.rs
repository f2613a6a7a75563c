//! Reconstruction of orbitals from symmetry-adapted linear combinations and
//! symmetry-block-diagonal coefficients.

use std::fmt;

use duplicate::duplicate_item;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{s, Array1, Array2, ArrayView2, Ix1, LinalgScalar};
use ndarray_einsum_beta::einsum;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::errors::UnfoldError;
use crate::symmetry::irrep_table::IrrepTable;

#[cfg(test)]
#[path = "symmetry_adapted_tests.rs"]
mod symmetry_adapted_tests;

// ==================
// Struct definitions
// ==================

// --------------------
// SymmetryAdaptedBasis
// --------------------

/// Structure containing the symmetry-adapted linear combinations (SALCs) of a basis, grouped by
/// irrep in canonical order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetryAdaptedBasis<T> {
    /// The name of the point group.
    point_group: String,

    /// The SALC matrix of every irrep present, of shape (basis functions, irrep dimension), in
    /// canonical irrep order.
    salcs: IndexMap<String, Array2<T>>,
}

impl<T: LinalgScalar> SymmetryAdaptedBasis<T> {
    /// Constructs and validates a symmetry-adapted basis.
    ///
    /// # Arguments
    ///
    /// * `point_group` - The name of the point group, one of $`\mathcal{D}_{2h}`$ and its
    ///   subgroups.
    /// * `salcs` - The SALC matrix of every irrep present, in any order. Irreps absent from the
    ///   map have dimension zero.
    /// * `nao` - The number of basis functions.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the point group or some irrep label is unknown, and
    /// with [`UnfoldError::Dimension`] if some SALC matrix does not have `nao` rows or the irrep
    /// dimensions do not sum to `nao`.
    pub fn new(
        point_group: &str,
        salcs: IndexMap<String, Array2<T>>,
        nao: usize,
    ) -> Result<Self, UnfoldError> {
        let table = IrrepTable::get(point_group)?;
        if let Some(unknown) = salcs.keys().find(|irrep| table.irrep_index(irrep).is_none()) {
            return Err(UnfoldError::Domain(format!(
                "irrep `{unknown}` does not belong to {}",
                table.point_group
            )));
        }
        if let Some((irrep, salc)) = salcs.iter().find(|(_, salc)| salc.nrows() != nao) {
            return Err(UnfoldError::Dimension(format!(
                "the SALCs of {irrep} span {} basis functions instead of {nao}",
                salc.nrows()
            )));
        }
        let total_dim = salcs.values().map(|salc| salc.ncols()).sum::<usize>();
        if total_dim != nao {
            return Err(UnfoldError::Dimension(format!(
                "the irrep dimensions sum to {total_dim} instead of the basis dimension {nao}"
            )));
        }
        let salcs = salcs
            .into_iter()
            .sorted_by_key(|(irrep, _)| table.irrep_index(irrep))
            .collect::<IndexMap<_, _>>();
        Ok(SymmetryAdaptedBasis {
            point_group: table.point_group.to_string(),
            salcs,
        })
    }

    /// The irrep table of the point group.
    pub fn table(&self) -> Result<&'static IrrepTable, UnfoldError> {
        IrrepTable::get(&self.point_group)
    }

    /// The SALC matrices in canonical irrep order.
    pub fn salcs(&self) -> &IndexMap<String, Array2<T>> {
        &self.salcs
    }

    /// The number of basis functions.
    pub fn nao(&self) -> usize {
        self.salcs.values().map(|salc| salc.ncols()).sum()
    }

    /// The dimension of an irrep, zero if absent.
    pub fn irrep_dim(&self, irrep: &str) -> usize {
        self.salcs.get(irrep).map(|salc| salc.ncols()).unwrap_or(0)
    }
}

// ----------------------
// IrrepBlockCoefficients
// ----------------------

/// Structure containing square orbital-coefficient blocks, one per irrep, expressed in the SALCs
/// of that irrep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IrrepBlockCoefficients<T> {
    /// The coefficient block of every irrep present in the basis, in canonical irrep order.
    blocks: IndexMap<String, Array2<T>>,
}

impl<T: LinalgScalar> IrrepBlockCoefficients<T> {
    /// Constructs and validates coefficient blocks against a symmetry-adapted basis.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Dimension`] if the blocks do not match the irreps and irrep
    /// dimensions of `basis` or are not square.
    pub fn new(
        basis: &SymmetryAdaptedBasis<T>,
        mut blocks: IndexMap<String, Array2<T>>,
    ) -> Result<Self, UnfoldError> {
        let ordered = basis
            .salcs
            .iter()
            .map(|(irrep, salc)| {
                let nd = salc.ncols();
                let block = blocks.swap_remove(irrep).ok_or_else(|| {
                    UnfoldError::Dimension(format!("no coefficient block given for {irrep}"))
                })?;
                if block.shape() != [nd, nd] {
                    return Err(UnfoldError::Dimension(format!(
                        "the coefficient block of {irrep} has shape {:?} instead of [{nd}, {nd}]",
                        block.shape()
                    )));
                }
                Ok((irrep.clone(), block))
            })
            .collect::<Result<IndexMap<_, _>, _>>()?;
        if let Some(extra) = blocks.keys().next() {
            return Err(UnfoldError::Dimension(format!(
                "coefficient block given for {extra}, which is absent from the basis"
            )));
        }
        Ok(IrrepBlockCoefficients { blocks: ordered })
    }

    /// Constructs coefficient blocks from a flat sequence of numbers.
    ///
    /// The sequence holds the blocks in external (Molpro) irrep order, each block stored row by
    /// row; irreps of dimension zero occupy no space.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Dimension`] if the length of `data` differs from the sum of the
    /// squared irrep dimensions.
    pub fn from_flattened(basis: &SymmetryAdaptedBasis<T>, data: &[T]) -> Result<Self, UnfoldError> {
        let table = basis.table()?;
        let molpro_irreps = table
            .molpro_order()
            .into_iter()
            .map(|i| table.irreps[i])
            .collect_vec();
        let expected = molpro_irreps
            .iter()
            .map(|irrep| basis.irrep_dim(irrep).pow(2))
            .sum::<usize>();
        if data.len() != expected {
            return Err(UnfoldError::Dimension(format!(
                "{} coefficients given for irrep blocks holding {expected}",
                data.len()
            )));
        }
        let mut offset = 0;
        let mut blocks = IndexMap::new();
        for irrep in molpro_irreps {
            let nd = basis.irrep_dim(irrep);
            if nd == 0 {
                continue;
            }
            let block = Array2::from_shape_vec((nd, nd), data[offset..offset + nd * nd].to_vec())
                .map_err(|err| UnfoldError::Dimension(err.to_string()))?;
            offset += nd * nd;
            blocks.insert(irrep.to_string(), block);
        }
        Self::new(basis, blocks)
    }

    /// The coefficient blocks in canonical irrep order.
    pub fn blocks(&self) -> &IndexMap<String, Array2<T>> {
        &self.blocks
    }
}

impl<T> fmt::Display for IrrepBlockCoefficients<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.blocks
                .iter()
                .map(|(irrep, block)| format!("{irrep}: {}", block.nrows()))
                .join(", ")
        )
    }
}

// =========
// Functions
// =========

/// Assembles the full orbital coefficients
/// $`\mathbf{C} = [\mathbf{X}_1\mathbf{B}_1 | \mathbf{X}_2\mathbf{B}_2 | \ldots]`$ in canonical
/// irrep order.
///
/// # Returns
///
/// The coefficient matrix and the irrep label of every orbital.
pub fn assemble_orbitals<T: LinalgScalar>(
    basis: &SymmetryAdaptedBasis<T>,
    coefficients: &IrrepBlockCoefficients<T>,
) -> (Array2<T>, Vec<String>) {
    let nao = basis.nao();
    let mut cmat = Array2::<T>::zeros((nao, nao));
    let mut labels = Vec::with_capacity(nao);
    let mut offset = 0;
    for ((irrep, salc), block) in basis.salcs.iter().zip(coefficients.blocks.values()) {
        let nd = salc.ncols();
        cmat.slice_mut(s![.., offset..offset + nd])
            .assign(&salc.dot(block));
        labels.extend(std::iter::repeat(irrep.clone()).take(nd));
        offset += nd;
    }
    (cmat, labels)
}

/// Computes the self-overlaps $`\mathrm{diag}(\mathbf{C}^{\dagger}\mathbf{S}\mathbf{C})`$ of a set
/// of orbitals.
#[duplicate_item(
    [
        dtype_ [ f64 ]
        self_overlaps_ [ self_overlaps ]
        conj_ [ |c: f64| c ]
    ]
    [
        dtype_ [ Complex<f64> ]
        self_overlaps_ [ self_overlaps_complex ]
        conj_ [ |c: Complex<f64>| c.conj() ]
    ]
)]
pub fn self_overlaps_(
    cmat: &ArrayView2<dtype_>,
    smat: &ArrayView2<dtype_>,
) -> Result<Array1<dtype_>, UnfoldError> {
    let cmat_conj = cmat.mapv(conj_);
    einsum("ji,jk,ki->i", &[&cmat_conj.view(), &smat.view(), &cmat.view()])
        .map_err(|err| UnfoldError::Dimension(err.to_string()))?
        .into_dimensionality::<Ix1>()
        .map_err(|err| UnfoldError::Dimension(err.to_string()))
}
