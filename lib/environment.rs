//! Fixed points of the left and right transfer operators of the infinite
//! chain.
//!
//! The left transfer operator maps a χ×χ matrix σ across one full unit cell:
//! σ is contracted with the B→A weights, A and its conjugate, the A→B
//! weights, and B and its conjugate, yielding a new matrix on the next B→A
//! bond. Its dominant eigenvector is the left environment density matrix of
//! the chain; the right transfer operator is the mirror image. Both are
//! completely positive maps, so the dominant eigenmatrix is positive
//! semi-definite up to a global phase and numerical noise, which is removed
//! by trace normalization and symmetrization before the matrix is handed to
//! the gauge fixer.

use ndarray as nd;
use num_complex::Complex64 as C64;
use thiserror::Error;
use crate::{
    cell::{ UnitCell, conj, weight_mat },
    linalg::{ LinalgError, LinalgResult, LinearOp, dominant_eig },
    ncon::{ CTensor, NconError, ncon_ord },
};

#[derive(Debug, Error)]
pub enum EnvError {
    /// Returned when the eigensolver fails on a transfer operator.
    #[error("transfer operator solve failed: {0}")]
    Solver(#[from] LinalgError),

    /// Returned when a derived-environment contraction fails.
    #[error("contraction error: {0}")]
    Contraction(#[from] NconError),
}
pub type EnvResult<T> = Result<T, EnvError>;

/// Convergence tolerance passed to the eigensolver.
pub const EIG_TOL: f64 = 1e-10;
/// Iteration cap for the eigensolver.
pub const EIG_MAXITER: usize = 10_000;

/// The left transfer operator of one unit cell, acting on flattened χ×χ
/// matrices over the B→A bond.
pub struct LeftTransfer<'a> {
    cell: &'a UnitCell,
}

impl<'a> LeftTransfer<'a> {
    pub fn new(cell: &'a UnitCell) -> Self { Self { cell } }

    fn chi(&self) -> usize { self.cell.chi_ba() }
}

impl LinearOp for LeftTransfer<'_> {
    fn dim(&self) -> usize { self.chi().pow(2) }

    fn apply(&self, v: &nd::Array1<C64>) -> LinalgResult<nd::Array1<C64>> {
        let chi = self.chi();
        let sigma: CTensor
            = v.clone().into_shape((chi, chi)).unwrap().into_dyn();
        let cell = self.cell;
        let tensors: Vec<CTensor> = vec![
            sigma,
            weight_mat(&cell.sBA), weight_mat(&cell.sBA),
            cell.a.clone().into_dyn(), conj(&cell.a.clone().into_dyn()),
            weight_mat(&cell.sAB), weight_mat(&cell.sAB),
            cell.b.clone().into_dyn(), conj(&cell.b.clone().into_dyn()),
        ];
        let connects: Vec<Vec<i32>> = vec![
            vec![1, 2],
            vec![1, 3], vec![2, 4],
            vec![3, 5, 6], vec![4, 5, 7],
            vec![6, 8], vec![7, 9],
            vec![8, 10, -1], vec![9, 10, -2],
        ];
        let out = ncon_ord(tensors, &connects, None, false)?;
        Ok(out.into_shape(chi * chi).unwrap())
    }
}

/// The right transfer operator of one unit cell, acting on flattened χ×χ
/// matrices over the A→B bond.
pub struct RightTransfer<'a> {
    cell: &'a UnitCell,
}

impl<'a> RightTransfer<'a> {
    pub fn new(cell: &'a UnitCell) -> Self { Self { cell } }

    fn chi(&self) -> usize { self.cell.chi_ab() }
}

impl LinearOp for RightTransfer<'_> {
    fn dim(&self) -> usize { self.chi().pow(2) }

    fn apply(&self, v: &nd::Array1<C64>) -> LinalgResult<nd::Array1<C64>> {
        let chi = self.chi();
        let mu: CTensor
            = v.clone().into_shape((chi, chi)).unwrap().into_dyn();
        let cell = self.cell;
        let tensors: Vec<CTensor> = vec![
            mu,
            weight_mat(&cell.sAB), weight_mat(&cell.sAB),
            cell.a.clone().into_dyn(), conj(&cell.a.clone().into_dyn()),
            weight_mat(&cell.sBA), weight_mat(&cell.sBA),
            cell.b.clone().into_dyn(), conj(&cell.b.clone().into_dyn()),
        ];
        let connects: Vec<Vec<i32>> = vec![
            vec![1, 2],
            vec![3, 1], vec![5, 2],
            vec![6, 4, 3], vec![7, 4, 5],
            vec![8, 6], vec![10, 7],
            vec![-1, 9, 8], vec![-2, 9, 10],
        ];
        let out = ncon_ord(tensors, &connects, None, false)?;
        Ok(out.into_shape(chi * chi).unwrap())
    }
}

/// Trace-normalize and symmetrize a raw eigenmatrix into a Hermitian
/// environment density matrix.
///
/// Dividing by the (complex) trace both fixes the global phase left free by
/// the eigensolver and sets the trace to one.
fn settle(raw: nd::Array2<C64>) -> nd::Array2<C64> {
    let tr: C64 = raw.diag().sum();
    let normed = raw.mapv(|z| z / tr);
    let dagger = normed.t().mapv(|z| z.conj());
    (&normed + &dagger).mapv(|z| 0.5 * z)
}

/// Starting vector for the eigensolver: the previous fixed point when its
/// dimensions still match the bond, else the flattened identity over χ.
fn seed(warm: Option<&nd::Array2<C64>>, chi: usize) -> nd::Array1<C64> {
    match warm.filter(|w| w.dim() == (chi, chi)) {
        Some(w) => w.clone().into_shape(chi * chi).unwrap(),
        None => {
            let eye: nd::Array2<C64> = nd::Array2::eye(chi);
            eye.mapv(|z| z / chi as f64).into_shape(chi * chi).unwrap()
        },
    }
}

/// Solve for the left environment density matrices of both bonds.
///
/// Returns `(sigBA, sigAB)`, the fixed point on the B→A bond and the derived
/// matrix on the A→B bond, both Hermitian with unit trace. `warm` seeds the
/// eigensolver when its dimensions match the current bond.
pub fn left_environments(cell: &UnitCell, warm: Option<&nd::Array2<C64>>)
    -> EnvResult<(nd::Array2<C64>, nd::Array2<C64>)>
{
    let chi = cell.chi_ba();
    let v0: nd::Array1<C64> = seed(warm, chi);
    let op = LeftTransfer::new(cell);
    let (_, v) = dominant_eig(&op, Some(&v0), EIG_TOL, EIG_MAXITER)?;
    let sig_ba = settle(v.into_shape((chi, chi)).unwrap());

    // carry the fixed point through the A site to the A-B bond
    let tensors: Vec<CTensor> = vec![
        sig_ba.clone().into_dyn(),
        weight_mat(&cell.sBA), weight_mat(&cell.sBA),
        cell.a.clone().into_dyn(), conj(&cell.a.clone().into_dyn()),
    ];
    let connects: Vec<Vec<i32>> = vec![
        vec![1, 2],
        vec![1, 3], vec![2, 4],
        vec![3, 5, -1], vec![4, 5, -2],
    ];
    let raw = ncon_ord(tensors, &connects, None, false)?;
    let chi_ab = cell.chi_ab();
    let raw: nd::Array2<C64>
        = raw.into_shape((chi_ab, chi_ab)).unwrap();
    let tr: C64 = raw.diag().sum();
    let sig_ab = raw.mapv(|z| z / tr);
    Ok((sig_ba, sig_ab))
}

/// Solve for the right environment density matrices of both bonds.
///
/// Returns `(muAB, muBA)`, the fixed point on the A→B bond and the derived
/// matrix on the B→A bond, both Hermitian with unit trace.
pub fn right_environments(cell: &UnitCell, warm: Option<&nd::Array2<C64>>)
    -> EnvResult<(nd::Array2<C64>, nd::Array2<C64>)>
{
    let chi = cell.chi_ab();
    let v0: nd::Array1<C64> = seed(warm, chi);
    let op = RightTransfer::new(cell);
    let (_, v) = dominant_eig(&op, Some(&v0), EIG_TOL, EIG_MAXITER)?;
    let mu_ab = settle(v.into_shape((chi, chi)).unwrap());

    // carry the fixed point through the A site back to the B-A bond
    let tensors: Vec<CTensor> = vec![
        mu_ab.clone().into_dyn(),
        weight_mat(&cell.sAB), weight_mat(&cell.sAB),
        cell.a.clone().into_dyn(), conj(&cell.a.clone().into_dyn()),
    ];
    let connects: Vec<Vec<i32>> = vec![
        vec![1, 2],
        vec![3, 1], vec![5, 2],
        vec![-1, 4, 3], vec![-2, 4, 5],
    ];
    let raw = ncon_ord(tensors, &connects, None, false)?;
    let chi_ba = cell.chi_ba();
    let raw: nd::Array2<C64>
        = raw.into_shape((chi_ba, chi_ba)).unwrap();
    let tr: C64 = raw.diag().sum();
    let mu_ba = raw.mapv(|z| z / tr);
    Ok((mu_ab, mu_ba))
}
