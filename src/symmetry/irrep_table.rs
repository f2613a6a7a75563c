//! Irreducible-representation tables of $`\mathcal{D}_{2h}`$ and its subgroups.

use phf::phf_map;

use crate::errors::UnfoldError;

/// Structure containing the irreducible representations of an Abelian point group in canonical
/// order, together with their 1-based ids in the external (Molpro) numbering.
#[derive(Debug, PartialEq, Eq)]
pub struct IrrepTable {
    /// The name of the point group.
    pub point_group: &'static str,

    /// The irrep labels in canonical order.
    pub irreps: &'static [&'static str],

    /// The 1-based external id of each irrep, in canonical order.
    pub molpro_ids: &'static [usize],
}

static IRREP_TABLES: phf::Map<&'static str, IrrepTable> = phf_map! {
    "d2h" => IrrepTable {
        point_group: "D2h",
        irreps: &["Ag", "B1g", "B2g", "B3g", "Au", "B1u", "B2u", "B3u"],
        molpro_ids: &[1, 4, 6, 7, 8, 5, 3, 2],
    },
    "c2v" => IrrepTable {
        point_group: "C2v",
        irreps: &["A1", "A2", "B1", "B2"],
        molpro_ids: &[1, 4, 2, 3],
    },
    "c2h" => IrrepTable {
        point_group: "C2h",
        irreps: &["Ag", "Bg", "Au", "Bu"],
        molpro_ids: &[1, 4, 2, 3],
    },
    "d2" => IrrepTable {
        point_group: "D2",
        irreps: &["A", "B1", "B2", "B3"],
        molpro_ids: &[1, 4, 3, 2],
    },
    "cs" => IrrepTable {
        point_group: "Cs",
        irreps: &["A'", "A\""],
        molpro_ids: &[1, 2],
    },
    "ci" => IrrepTable {
        point_group: "Ci",
        irreps: &["Ag", "Au"],
        molpro_ids: &[1, 2],
    },
    "c2" => IrrepTable {
        point_group: "C2",
        irreps: &["A", "B"],
        molpro_ids: &[1, 2],
    },
    "c1" => IrrepTable {
        point_group: "C1",
        irreps: &["A"],
        molpro_ids: &[1],
    },
};

impl IrrepTable {
    /// Retrieves the table of a point group by its name, ignoring case.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Domain`] if the point group is not $`\mathcal{D}_{2h}`$ or one
    /// of its subgroups.
    pub fn get(point_group: &str) -> Result<&'static IrrepTable, UnfoldError> {
        IRREP_TABLES
            .get(point_group.to_lowercase().as_str())
            .ok_or_else(|| {
                UnfoldError::Domain(format!(
                    "point group `{point_group}` is not D2h or one of its subgroups"
                ))
            })
    }

    /// The number of irreps.
    pub fn n_irreps(&self) -> usize {
        self.irreps.len()
    }

    /// The canonical position of an irrep.
    pub fn irrep_index(&self, irrep: &str) -> Option<usize> {
        self.irreps.iter().position(|label| *label == irrep)
    }

    /// The canonical positions of the irreps sorted by their external ids.
    pub fn molpro_order(&self) -> Vec<usize> {
        let mut order = (0..self.irreps.len()).collect::<Vec<_>>();
        order.sort_by_key(|i| self.molpro_ids[*i]);
        order
    }
}
