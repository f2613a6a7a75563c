//! Atomic-orbital basis functions and their layout in primitive cells and supercells.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::slice::Iter;

use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::angmom::ANGMOM_LABELS;
use crate::auxiliary::atom::Atom;
use crate::errors::UnfoldError;

#[cfg(test)]
#[path = "ao_tests.rs"]
mod ao_tests;

// -------------------
// Shell order structs
// -------------------

// ~~~~~~~~~
// PureOrder
// ~~~~~~~~~

/// Structure to contain information about the ordering of pure (real solid harmonic) Gaussians of
/// a certain rank.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<i32>", into = "Vec<i32>")]
pub struct PureOrder {
    /// A sequence of $`m_l`$ values giving the ordering of the pure Gaussians.
    mls: Vec<i32>,

    /// The rank of the pure Gaussians.
    pub lpure: u32,
}

impl PureOrder {
    /// Constructs a new [`PureOrder`] structure from its constituting $`m_l`$ values.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Dimension`] if the $`m_l`$ values do not form a complete set
    /// $`\{-l, \ldots, l\}`$ without repetition.
    pub fn new(mls: &[i32]) -> Result<Self, UnfoldError> {
        let lpure = mls
            .iter()
            .map(|m| m.unsigned_abs())
            .max()
            .ok_or_else(|| UnfoldError::Dimension("no m values given for a pure shell".to_string()))?;
        let pure_order = PureOrder {
            mls: mls.to_vec(),
            lpure,
        };
        if pure_order.verify() {
            Ok(pure_order)
        } else {
            Err(UnfoldError::Dimension(format!(
                "m values {mls:?} do not form a complete pure shell of rank {lpure}"
            )))
        }
    }

    /// Constructs a new [`PureOrder`] structure for a specified rank with increasing-$`m`$ order.
    #[must_use]
    pub fn increasingm(lpure: u32) -> Self {
        let lpure_i32 = i32::try_from(lpure).unwrap_or(i32::MAX);
        PureOrder {
            mls: (-lpure_i32..=lpure_i32).collect_vec(),
            lpure,
        }
    }

    /// Constructs a new [`PureOrder`] structure for a specified rank with the ordering used by
    /// most periodic Gaussian codes: $`(x, y, z)`$, *i.e.* $`m = (1, -1, 0)`$, for $`l = 1`$ and
    /// increasing-$`m`$ order otherwise.
    #[must_use]
    pub fn xyz_p(lpure: u32) -> Self {
        if lpure == 1 {
            PureOrder {
                mls: vec![1, -1, 0],
                lpure,
            }
        } else {
            Self::increasingm(lpure)
        }
    }

    /// Verifies if this [`PureOrder`] struct is valid.
    #[must_use]
    pub fn verify(&self) -> bool {
        let mls_set = self.mls.iter().collect::<HashSet<_>>();
        let lpure = self.lpure;
        self.mls.len() == self.ncomps()
            && mls_set.len() == self.ncomps()
            && mls_set.iter().all(|m| m.unsigned_abs() <= lpure)
    }

    /// Iterates over the constituent $`m_l`$ values.
    pub fn iter(&'_ self) -> Iter<'_, i32> {
        self.mls.iter()
    }

    /// Returns the number of pure components in the shell.
    pub fn ncomps(&self) -> usize {
        2 * self.lpure as usize + 1
    }

    /// Returns the position of each $`m_l`$ value of this shell in increasing-$`m`$ order.
    pub(crate) fn increasingm_positions(&self) -> Vec<usize> {
        let l = i64::from(self.lpure);
        self.mls
            .iter()
            .map(|m| usize::try_from(i64::from(*m) + l).unwrap_or(0))
            .collect()
    }
}

impl TryFrom<Vec<i32>> for PureOrder {
    type Error = UnfoldError;

    fn try_from(mls: Vec<i32>) -> Result<Self, Self::Error> {
        PureOrder::new(&mls)
    }
}

impl From<PureOrder> for Vec<i32> {
    fn from(pure_order: PureOrder) -> Self {
        pure_order.mls
    }
}

// ~~~~~~~~~
// CartOrder
// ~~~~~~~~~

/// Structure to contain information about the ordering of Cartesian Gaussians of a certain rank.
///
/// All Cartesian components of a shell are assumed to share the radial normalisation of the
/// shell, so that they transform as the bare monomials $`x^{l_x} y^{l_y} z^{l_z}`$.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<(u32, u32, u32)>", into = "Vec<(u32, u32, u32)>")]
pub struct CartOrder {
    /// A sequence of $`(l_x, l_y, l_z)`$ tuples giving the ordering of the Cartesian Gaussians.
    pub cart_tuples: Vec<(u32, u32, u32)>,

    /// The rank of the Cartesian Gaussians.
    pub lcart: u32,
}

impl CartOrder {
    /// Constructs a new [`CartOrder`] structure from its constituting tuples, each of which contains
    /// the $`x`$, $`y`$, and $`z`$ exponents for one Cartesian term.
    ///
    /// # Errors
    ///
    /// Errors with [`UnfoldError::Dimension`] if the Cartesian tuples are invalid (*e.g.* missing
    /// components or containing inconsistent components).
    pub fn new(cart_tuples: &[(u32, u32, u32)]) -> Result<Self, UnfoldError> {
        let first_tuple = cart_tuples.first().ok_or_else(|| {
            UnfoldError::Dimension("no Cartesian tuples given for a Cartesian shell".to_string())
        })?;
        let lcart = first_tuple.0 + first_tuple.1 + first_tuple.2;
        let cart_order = CartOrder {
            cart_tuples: cart_tuples.to_vec(),
            lcart,
        };
        if cart_order.verify() {
            Ok(cart_order)
        } else {
            Err(UnfoldError::Dimension(format!(
                "Cartesian tuples {cart_tuples:?} do not form a complete Cartesian shell of rank {lcart}"
            )))
        }
    }

    /// Constructs a new [`CartOrder`] structure for a specified rank with lexicographic order.
    #[must_use]
    pub fn lex(lcart: u32) -> Self {
        let mut cart_tuples =
            Vec::with_capacity(((lcart + 1) * (lcart + 2)).div_euclid(2) as usize);
        for lx in (0..=lcart).rev() {
            for ly in (0..=(lcart - lx)).rev() {
                cart_tuples.push((lx, ly, lcart - lx - ly));
            }
        }
        CartOrder { cart_tuples, lcart }
    }

    /// Verifies if this [`CartOrder`] struct is valid.
    #[must_use]
    pub fn verify(&self) -> bool {
        let cart_tuples_set = self.cart_tuples.iter().collect::<HashSet<_>>();
        let lcart = self.lcart;
        self.cart_tuples.len() == self.ncomps()
            && cart_tuples_set.len() == self.ncomps()
            && cart_tuples_set
                .iter()
                .all(|(lx, ly, lz)| lx + ly + lz == lcart)
    }

    /// Iterates over the constituent tuples.
    pub fn iter(&'_ self) -> Iter<'_, (u32, u32, u32)> {
        self.cart_tuples.iter()
    }

    /// Returns the number of Cartesian components in the shell.
    pub fn ncomps(&self) -> usize {
        let lcart = self.lcart as usize;
        ((lcart + 1) * (lcart + 2)).div_euclid(2)
    }
}

impl TryFrom<Vec<(u32, u32, u32)>> for CartOrder {
    type Error = UnfoldError;

    fn try_from(cart_tuples: Vec<(u32, u32, u32)>) -> Result<Self, Self::Error> {
        CartOrder::new(&cart_tuples)
    }
}

impl From<CartOrder> for Vec<(u32, u32, u32)> {
    fn from(cart_order: CartOrder) -> Self {
        cart_order.cart_tuples
    }
}

/// Translates a Cartesian exponent tuple to a human-understandable string.
///
/// # Arguments
///
/// * `cart_tuple` - A tuple of $`(l_x, l_y, l_z)`$ specifying the exponents of the Cartesian
///   components of the Cartesian Gaussian.
/// * `flat` - A flag indicating if the string representation is flat (*e.g.* `xxyz`) or compact
///   (*e.g.* `x^2yz`).
pub(crate) fn cart_tuple_to_str(cart_tuple: &(u32, u32, u32), flat: bool) -> String {
    if cart_tuple.0 + cart_tuple.1 + cart_tuple.2 == 0u32 {
        "1".to_string()
    } else {
        let cart_array = [cart_tuple.0, cart_tuple.1, cart_tuple.2];
        let carts = ["x", "y", "z"];
        cart_array
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                if flat {
                    carts[i].repeat(l as usize)
                } else {
                    match l.cmp(&1) {
                        Ordering::Greater => format!("{}^{l}", carts[i]),
                        Ordering::Equal => carts[i].to_string(),
                        Ordering::Less => String::new(),
                    }
                }
            })
            .collect::<String>()
    }
}

// ----------
// ShellOrder
// ----------

/// Enumerated type to indicate the type of the angular functions in a shell and how they are
/// ordered.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ShellOrder {
    /// The angular functions are real solid harmonics in the order given by the associated
    /// [`PureOrder`].
    Pure(PureOrder),

    /// The angular functions are Cartesian functions in the order given by the associated
    /// [`CartOrder`].
    Cart(CartOrder),
}

impl fmt::Display for ShellOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellOrder::Pure(pure_order) => write!(
                f,
                "Pure ({})",
                pure_order.iter().map(|m| m.to_string()).join(", ")
            ),
            ShellOrder::Cart(cart_order) => write!(
                f,
                "Cart ({})",
                cart_order
                    .iter()
                    .map(|cart_tuple| cart_tuple_to_str(cart_tuple, true))
                    .join(", ")
            ),
        }
    }
}

// ----------
// BasisShell
// ----------

/// Structure representing a shell in an atomic-orbital basis set.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(from = "ShellOrder", into = "ShellOrder")]
pub struct BasisShell {
    /// The rank of the shell: its angular momentum for a pure shell, or the sum of the exponents
    /// of the Cartesian coordinates for a Cartesian shell.
    pub l: u32,

    /// The type of the angular functions in this shell and how they are ordered.
    pub shell_order: ShellOrder,
}

impl BasisShell {
    /// Constructs a new [`BasisShell`] whose rank is deduced from its shell order.
    pub fn new(shell_order: ShellOrder) -> Self {
        let l = match &shell_order {
            ShellOrder::Pure(pure_order) => pure_order.lpure,
            ShellOrder::Cart(cart_order) => cart_order.lcart,
        };
        BasisShell { l, shell_order }
    }

    /// The number of basis functions in this shell.
    pub fn n_funcs(&self) -> usize {
        let lsize = self.l as usize;
        match self.shell_order {
            ShellOrder::Pure(_) => 2 * lsize + 1,
            ShellOrder::Cart(_) => ((lsize + 1) * (lsize + 2)).div_euclid(2),
        }
    }

    /// The alphabetical label of the angular momentum of this shell.
    pub fn label(&self) -> String {
        ANGMOM_LABELS
            .get(self.l as usize)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("L={}", self.l))
    }
}

impl From<ShellOrder> for BasisShell {
    fn from(shell_order: ShellOrder) -> Self {
        BasisShell::new(shell_order)
    }
}

impl From<BasisShell> for ShellOrder {
    fn from(basis_shell: BasisShell) -> Self {
        basis_shell.shell_order
    }
}

// ---------
// BasisAtom
// ---------

/// Structure containing the ordered sequence of the shells for an atom.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BasisAtom {
    /// An atom in the basis set.
    pub atom: Atom,

    /// The ordered shells associated with this atom.
    pub basis_shells: Vec<BasisShell>,
}

impl BasisAtom {
    /// Constructs a new [`BasisAtom`].
    ///
    /// # Arguments
    ///
    /// * `atom` - An atom.
    /// * `bss` - A sequence of [`BasisShell`]s containing the basis functions localised on this
    ///   atom.
    pub fn new(atom: Atom, bss: &[BasisShell]) -> Self {
        BasisAtom {
            atom,
            basis_shells: bss.to_vec(),
        }
    }

    /// The number of basis functions localised on this atom.
    pub fn n_funcs(&self) -> usize {
        self.basis_shells.iter().map(BasisShell::n_funcs).sum()
    }

    /// The ordered tuples of 0-based indices indicating the starting (inclusive) and ending
    /// (exclusive) positions of the shells on this atom.
    fn shell_boundary_indices(&self) -> Vec<(usize, usize)> {
        self.basis_shells
            .iter()
            .scan(0, |acc, basis_shell| {
                let start_index = *acc;
                *acc += basis_shell.n_funcs();
                Some((start_index, *acc))
            })
            .collect::<Vec<_>>()
    }
}

// -----------------
// BasisAngularOrder
// -----------------

/// Structure containing the angular momentum information of an atomic-orbital basis set, together
/// with the atoms on which the basis functions are centred.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisAngularOrder {
    /// An ordered sequence of [`BasisAtom`] in the order the atoms are defined in the cell.
    basis_atoms: Vec<BasisAtom>,
}

impl BasisAngularOrder {
    /// Constructs a new [`BasisAngularOrder`] structure from the constituting [`BasisAtom`]s.
    pub fn new(batms: &[BasisAtom]) -> Self {
        BasisAngularOrder {
            basis_atoms: batms.to_vec(),
        }
    }

    /// The constituent [`BasisAtom`]s.
    pub fn basis_atoms(&self) -> &[BasisAtom] {
        &self.basis_atoms
    }

    /// The number of atoms in the basis.
    pub fn n_atoms(&self) -> usize {
        self.basis_atoms.len()
    }

    /// The number of basis functions in this basis.
    pub fn n_funcs(&self) -> usize {
        self.basis_atoms.iter().map(BasisAtom::n_funcs).sum()
    }

    /// The ordered tuples of 0-based function indices indicating the starting (inclusive) and
    /// ending (exclusive) function positions of the atoms in this basis.
    pub fn atom_boundary_indices(&self) -> Vec<(usize, usize)> {
        self.basis_atoms
            .iter()
            .scan(0, |acc, basis_atom| {
                let start_index = *acc;
                *acc += basis_atom.n_funcs();
                Some((start_index, *acc))
            })
            .collect::<Vec<_>>()
    }

    /// The ordered tuples of 0-based function indices indicating the starting (inclusive) and
    /// ending (exclusive) positions of the shells in this basis.
    pub fn shell_boundary_indices(&self) -> Vec<(usize, usize)> {
        let atom_boundary_indices = self.atom_boundary_indices();
        self.basis_atoms
            .iter()
            .zip(atom_boundary_indices)
            .flat_map(|(basis_atom, (atom_start, _))| {
                basis_atom
                    .shell_boundary_indices()
                    .into_iter()
                    .map(move |(shell_start, shell_end)| {
                        (shell_start + atom_start, shell_end + atom_start)
                    })
            })
            .collect::<Vec<_>>()
    }

    /// An iterator over the constituent [`BasisShell`]s in this basis.
    pub fn basis_shells(&self) -> impl Iterator<Item = &BasisShell> + '_ {
        self.basis_atoms
            .iter()
            .flat_map(|basis_atom| basis_atom.basis_shells.iter())
    }

    /// Returns, for every basis function, the index of the atom on which it is centred.
    pub fn function_atom_indices(&self) -> Vec<usize> {
        self.basis_atoms
            .iter()
            .enumerate()
            .flat_map(|(atom_i, basis_atom)| std::iter::repeat(atom_i).take(basis_atom.n_funcs()))
            .collect()
    }

    /// Tiles this basis over a set of lattice translations to give the basis of a supercell.
    ///
    /// The tiling is translation-major: all functions of the image cell at the first translation,
    /// then all functions of the image cell at the second translation, and so on.
    ///
    /// # Arguments
    ///
    /// * `translations` - Cartesian lattice translations of the image cells.
    pub fn tile(&self, translations: &[Vector3<f64>]) -> BasisAngularOrder {
        let basis_atoms = translations
            .iter()
            .flat_map(|t| {
                self.basis_atoms.iter().map(move |basis_atom| BasisAtom {
                    atom: basis_atom.atom.translated(t),
                    basis_shells: basis_atom.basis_shells.clone(),
                })
            })
            .collect();
        BasisAngularOrder { basis_atoms }
    }
}

impl fmt::Display for BasisAngularOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shell_width = self
            .basis_shells()
            .map(|shl| shl.shell_order.to_string().chars().count())
            .max()
            .unwrap_or(10)
            .max(10);
        writeln!(f, "{}", "┈".repeat(shell_width + 24))?;
        writeln!(f, " {:>5}  {:<6} {:>5}  {:<shell_width$}", "Atom", "Label", "Shell", "Functions")?;
        writeln!(f, "{}", "┈".repeat(shell_width + 24))?;
        for (atom_i, basis_atom) in self.basis_atoms.iter().enumerate() {
            for (shell_i, basis_shell) in basis_atom.basis_shells.iter().enumerate() {
                if shell_i == 0 {
                    writeln!(
                        f,
                        " {:>5}  {:<6} {:>5}  {:<shell_width$}",
                        atom_i,
                        basis_atom.atom.label,
                        basis_shell.label(),
                        basis_shell.shell_order.to_string()
                    )?;
                } else {
                    writeln!(
                        f,
                        " {:>5}  {:<6} {:>5}  {:<shell_width$}",
                        "",
                        "",
                        basis_shell.label(),
                        basis_shell.shell_order.to_string()
                    )?;
                }
            }
        }
        writeln!(f, "{}", "┈".repeat(shell_width + 24))?;
        Ok(())
    }
}
