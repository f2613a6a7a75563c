//! Two-centre tight-binding models of simple crystals for testing.

use itertools::Itertools;
use nalgebra::{Point3, Vector3};
use ndarray::{Array1, Array2};
use ndarray_linalg::{Eigh, UPLO};
use num_complex::Complex;
use num_traits::ToPrimitive;

use crate::auxiliary::atom::Atom;
use crate::auxiliary::lattice::{KMesh, Lattice};
use crate::basis::ao::{BasisAngularOrder, BasisAtom, BasisShell, CartOrder, PureOrder, ShellOrder};
use crate::nonortho::CanonicalOrthogonalisable;
use crate::target::mean_field::{KPointOrbitals, PeriodicMeanField};
use crate::target::SpinConstraint;
use crate::unfolding::to_supercell_from_translations;

/// The angular character of a model basis function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Orbital {
    S,
    P(usize),
}

/// Slater–Koster two-centre parameters with an exponential distance decay.
#[derive(Clone, Copy, Debug)]
struct SlaterKoster {
    ss_sigma: f64,
    sp_sigma: f64,
    pp_sigma: f64,
    pp_pi: f64,
    r0: f64,
    decay: f64,
}

impl SlaterKoster {
    fn element(&self, fa: Orbital, fb: Orbital, disp: &Vector3<f64>) -> f64 {
        let r = disp.norm();
        let l = disp / r;
        let scale = (-(r - self.r0) / self.decay).exp();
        let value = match (fa, fb) {
            (Orbital::S, Orbital::S) => self.ss_sigma,
            (Orbital::S, Orbital::P(i)) => l[i] * self.sp_sigma,
            (Orbital::P(i), Orbital::S) => -l[i] * self.sp_sigma,
            (Orbital::P(i), Orbital::P(j)) => {
                let delta = if i == j { self.pp_pi } else { 0.0 };
                l[i] * l[j] * (self.pp_sigma - self.pp_pi) + delta
            }
        };
        value * scale
    }
}

/// A periodic tight-binding model with a non-orthogonal basis of s and Cartesian p functions.
pub(crate) struct TightBindingModel {
    pub(crate) lattice: Lattice,
    pub(crate) bao: BasisAngularOrder,
    functions: Vec<(usize, Orbital)>,
    onsite: Vec<f64>,
    hopping: SlaterKoster,
    overlap: SlaterKoster,
    cutoff: f64,
    tmax: i64,
}

impl TightBindingModel {
    /// A tetragonal cell of side 3 and height 3 holding an atom `A` with s and p functions at the
    /// origin and an atom `B` with an s function at the centre of the vertical edge.
    pub(crate) fn cubic_sp() -> Self {
        let lattice =
            Lattice::new([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]).expect("lattice");
        let s_shell = BasisShell::new(ShellOrder::Pure(PureOrder::increasingm(0)));
        let p_shell = BasisShell::new(ShellOrder::Cart(CartOrder::lex(1)));
        let atom_a = Atom::new("A", Point3::new(0.0, 0.0, 0.0));
        let atom_b = Atom::new("B", Point3::new(0.0, 0.0, 1.5));
        let bao = BasisAngularOrder::new(&[
            BasisAtom::new(atom_a, &[s_shell.clone(), p_shell]),
            BasisAtom::new(atom_b, &[s_shell]),
        ]);
        let functions = vec![
            (0, Orbital::S),
            (0, Orbital::P(0)),
            (0, Orbital::P(1)),
            (0, Orbital::P(2)),
            (1, Orbital::S),
        ];
        TightBindingModel {
            lattice,
            bao,
            functions,
            onsite: vec![-8.0, 4.0, 4.0, 4.0, -5.0],
            hopping: SlaterKoster {
                ss_sigma: -0.8,
                sp_sigma: 0.6,
                pp_sigma: 0.9,
                pp_pi: -0.25,
                r0: 1.5,
                decay: 1.5,
            },
            overlap: SlaterKoster {
                ss_sigma: 0.06,
                sp_sigma: 0.05,
                pp_sigma: 0.06,
                pp_pi: -0.02,
                r0: 1.5,
                decay: 1.5,
            },
            cutoff: 3.1,
            tmax: 2,
        }
    }

    /// A chain of `H` atoms with one s function each, spaced by 2 along $`x`$ and isolated along
    /// $`y`$ and $`z`$.
    pub(crate) fn chain_s() -> Self {
        let lattice =
            Lattice::new([[2.0, 0.0, 0.0], [0.0, 8.0, 0.0], [0.0, 0.0, 8.0]]).expect("lattice");
        let s_shell = BasisShell::new(ShellOrder::Pure(PureOrder::increasingm(0)));
        let bao = BasisAngularOrder::new(&[BasisAtom::new(
            Atom::new("H", Point3::origin()),
            &[s_shell],
        )]);
        TightBindingModel {
            lattice,
            bao,
            functions: vec![(0, Orbital::S)],
            onsite: vec![-1.0],
            hopping: SlaterKoster {
                ss_sigma: -0.5,
                sp_sigma: 0.0,
                pp_sigma: 0.0,
                pp_pi: 0.0,
                r0: 2.0,
                decay: 1.0,
            },
            overlap: SlaterKoster {
                ss_sigma: 0.1,
                sp_sigma: 0.0,
                pp_sigma: 0.0,
                pp_pi: 0.0,
                r0: 2.0,
                decay: 1.0,
            },
            cutoff: 2.1,
            tmax: 2,
        }
    }

    pub(crate) fn nao(&self) -> usize {
        self.functions.len()
    }

    /// The integer lattice translations over which the two-centre sums run.
    fn translations(&self) -> Vec<[i64; 3]> {
        let range = -self.tmax..=self.tmax;
        range
            .clone()
            .cartesian_product(range.clone())
            .cartesian_product(range)
            .map(|((t0, t1), t2)| [t0, t1, t2])
            .collect()
    }

    /// The Hamiltonian and overlap blocks between the reference cell and the cell at the integer
    /// translation `t`.
    pub(crate) fn real_space_blocks(&self, t: [i64; 3]) -> (Array2<f64>, Array2<f64>) {
        let tvec = self.lattice.to_cartesian(&Vector3::new(
            t[0].to_f64().unwrap_or(0.0),
            t[1].to_f64().unwrap_or(0.0),
            t[2].to_f64().unwrap_or(0.0),
        ));
        let positions = self
            .bao
            .basis_atoms()
            .iter()
            .map(|batm| batm.atom.coordinates.coords)
            .collect_vec();
        let nao = self.nao();
        let mut hmat = Array2::<f64>::zeros((nao, nao));
        let mut smat = Array2::<f64>::zeros((nao, nao));
        for (i, (a, fa)) in self.functions.iter().enumerate() {
            for (j, (b, fb)) in self.functions.iter().enumerate() {
                let disp = positions[*b] + tvec - positions[*a];
                let r = disp.norm();
                if r < 1e-8 {
                    if i == j {
                        hmat[(i, j)] = self.onsite[i];
                        smat[(i, j)] = 1.0;
                    }
                } else if r <= self.cutoff {
                    hmat[(i, j)] = self.hopping.element(*fa, *fb, &disp);
                    smat[(i, j)] = self.overlap.element(*fa, *fb, &disp);
                }
            }
        }
        (hmat, smat)
    }

    /// The Bloch-summed Hamiltonian and overlap matrices at a Cartesian k-point.
    pub(crate) fn kpoint_matrices(
        &self,
        kpt: &Vector3<f64>,
    ) -> (Array2<Complex<f64>>, Array2<Complex<f64>>) {
        let nao = self.nao();
        let mut hk = Array2::<Complex<f64>>::zeros((nao, nao));
        let mut sk = Array2::<Complex<f64>>::zeros((nao, nao));
        for t in self.translations() {
            let (hmat, smat) = self.real_space_blocks(t);
            let tvec = self.lattice.to_cartesian(&Vector3::new(
                t[0].to_f64().unwrap_or(0.0),
                t[1].to_f64().unwrap_or(0.0),
                t[2].to_f64().unwrap_or(0.0),
            ));
            let phase = Complex::new(0.0, kpt.dot(&tvec)).exp();
            hk = hk + hmat.mapv(|h| phase * h);
            sk = sk + smat.mapv(|s| phase * s);
        }
        (hk, sk)
    }

    /// Solves the model at a k-point, occupying the lowest `nocc` orbitals with `occ` electrons
    /// each.
    pub(crate) fn solve_kpt(
        &self,
        kpt: &Vector3<f64>,
        nocc: usize,
        occ: f64,
    ) -> (KPointOrbitals, Array2<Complex<f64>>) {
        let (hk, sk) = self.kpoint_matrices(kpt);
        let (energies, cmat) = solve_generalised(&hk, &sk);
        let occupations = Array1::from_shape_fn(energies.len(), |i| if i < nocc { occ } else { 0.0 });
        let orbs = KPointOrbitals::builder()
            .coefficients(cmat)
            .energies(energies)
            .occupations(occupations)
            .build()
            .expect("k-point orbitals");
        (orbs, sk)
    }

    /// Solves the model on every k-point of a Γ-centred mesh.
    ///
    /// # Arguments
    ///
    /// * `noccs` - The number of occupied orbitals per k-point in every spin channel.
    pub(crate) fn periodic_mean_field(
        &self,
        mesh: &KMesh,
        spin_constraint: SpinConstraint,
        noccs: &[usize],
    ) -> PeriodicMeanField {
        let kpts = self.lattice.make_kpts(mesh, true);
        let occ = match spin_constraint {
            SpinConstraint::Restricted => 2.0,
            SpinConstraint::Unrestricted => 1.0,
        };
        let overlaps = kpts
            .iter()
            .map(|kpt| self.kpoint_matrices(kpt).1)
            .collect_vec();
        let orbitals = noccs
            .iter()
            .map(|nocc| {
                kpts.iter()
                    .map(|kpt| self.solve_kpt(kpt, *nocc, occ).0)
                    .collect_vec()
            })
            .collect_vec();
        PeriodicMeanField::builder()
            .lattice(self.lattice.clone())
            .bao(self.bao.clone())
            .spin_constraint(spin_constraint)
            .kpts(kpts)
            .overlaps(overlaps)
            .orbitals(orbitals)
            .build()
            .expect("periodic mean field")
    }

    /// Builds the Hamiltonian and overlap matrices of the supercell of a mesh directly from the
    /// real-space blocks folded onto the supercell translations.
    pub(crate) fn supercell_matrices(&self, mesh: &KMesh) -> (Array2<f64>, Array2<f64>) {
        let nao = self.nao();
        let mut hblocks = vec![Array2::<f64>::zeros((nao, nao)); mesh.nk()];
        let mut sblocks = vec![Array2::<f64>::zeros((nao, nao)); mesh.nk()];
        for t in self.translations() {
            let (hmat, smat) = self.real_space_blocks(t);
            let idx = mesh.translation_index(t);
            hblocks[idx] = &hblocks[idx] + &hmat;
            sblocks[idx] = &sblocks[idx] + &smat;
        }
        (
            to_supercell_from_translations(mesh, &hblocks).expect("supercell Hamiltonian"),
            to_supercell_from_translations(mesh, &sblocks).expect("supercell overlap"),
        )
    }

    /// Solves the supercell of a mesh directly.
    pub(crate) fn solve_supercell(&self, mesh: &KMesh) -> (Array1<f64>, Array2<Complex<f64>>) {
        let (hsc, ssc) = self.supercell_matrices(mesh);
        solve_generalised(
            &hsc.mapv(|h| Complex::new(h, 0.0)),
            &ssc.mapv(|s| Complex::new(s, 0.0)),
        )
    }
}

/// Solves $`\mathbf{H}\mathbf{C} = \mathbf{S}\mathbf{C}\mathbf{E}`$ through canonical
/// orthogonalisation.
pub(crate) fn solve_generalised(
    hmat: &Array2<Complex<f64>>,
    smat: &Array2<Complex<f64>>,
) -> (Array1<f64>, Array2<Complex<f64>>) {
    let co = smat
        .view()
        .calc_canonical_orthogonal_matrix(1e-10, 1e-10)
        .expect("canonical orthogonalisation");
    let xmat = co.xmat();
    let hprime = xmat.t().mapv(|x| x.conj()).dot(hmat).dot(&xmat);
    let (energies, ymat) = hprime.eigh(UPLO::Lower).expect("diagonalisation");
    (energies, xmat.dot(&ymat))
}
