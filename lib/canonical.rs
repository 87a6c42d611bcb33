//! Gauge fixing: rewriting one bond of the unit cell into canonical
//! (Schmidt) form.
//!
//! Given the left and right environment density matrices of a bond, both are
//! eigendecomposed and their numerically null directions (eigenvalues at or
//! below `dtol`) discarded. The surviving square-root factors sandwich the
//! current bond weights into a small weighted matrix whose SVD yields the new
//! Schmidt coefficients; the singular-vector factors, undone through the
//! inverse square roots, become gauge-change matrices absorbed into the two
//! site tensors flanking the bond. Dropping null directions can shrink the
//! bond below its previous dimension, which is expected behavior rather than
//! an error.

use ndarray as nd;
use ndarray_linalg::{ Eigh, SVD, UPLO };
use num_complex::Complex64 as C64;
use thiserror::Error;
use crate::{
    cell::weight_mat,
    ncon::{ CTensor, NconError, ncon_ord },
};

#[derive(Debug, Error)]
pub enum CanonError {
    /// Returned when an environment matrix has no eigenvalue above the
    /// discard threshold.
    #[error("error in orthogonalize_bond: environment matrix is numerically \
        zero (all eigenvalues <= {0:.3e})")]
    NullEnvironment(f64),

    /// Returned by dense LAPACK routines.
    #[error("lapack error: {0}")]
    Lapack(#[from] ndarray_linalg::error::LinalgError),

    /// Returned when a gauge-change contraction fails.
    #[error("contraction error: {0}")]
    Contraction(#[from] NconError),
}
use CanonError::*;
pub type CanonResult<T> = Result<T, CanonError>;

/// Default eigenvalue discard threshold.
pub const DTOL: f64 = 1e-12;

/// Eigendecompose a Hermitian environment matrix, keeping only eigenpairs
/// with eigenvalue above `dtol`, sorted descending.
fn filtered_eigh(m: &nd::Array2<C64>, dtol: f64)
    -> CanonResult<(nd::Array1<f64>, nd::Array2<C64>)>
{
    let (evals, evecs) = m.eigh(UPLO::Lower)?;
    // eigh returns ascending order; walk from the top
    let keep: Vec<usize>
        = (0..evals.len()).rev()
        .filter(|&i| evals[i] > dtol)
        .collect();
    if keep.is_empty() { return Err(NullEnvironment(dtol)); }
    let d = nd::Array1::from_iter(keep.iter().map(|&i| evals[i]));
    let u = evecs.select(nd::Axis(1), &keep);
    Ok((d, u))
}

/// Bring the bond between `left` and `right` into canonical form.
///
/// `sig` is the left environment of the bond and `mu` its right environment
/// (both Hermitian, from [`crate::environment`]); `s` holds the current bond
/// weights. Returns the updated left tensor, the new unit-norm Schmidt
/// weights, and the updated right tensor. For the B→A bond this is called as
/// `orthogonalize_bond(sigBA, muBA, B, sBA, A, dtol)`.
pub fn orthogonalize_bond(
    sig: &nd::Array2<C64>,
    mu: &nd::Array2<C64>,
    left: &nd::Array3<C64>,
    s: &nd::Array1<f64>,
    right: &nd::Array3<C64>,
    dtol: f64,
) -> CanonResult<(nd::Array3<C64>, nd::Array1<f64>, nd::Array3<C64>)>
{
    let (dl, ul) = filtered_eigh(sig, dtol)?;
    let (dr, ur) = filtered_eigh(mu, dtol)?;
    let kl = dl.len();
    let kr = dr.len();

    // weighted = √DL U_Lᵀ diag(s) U_R √DR; the plain transpose (not the
    // adjoint) is what makes conj(U_L) below cancel against σ = U_L D U_L†
    let ds: nd::Array2<C64>
        = weight_mat(s).into_shape((s.len(), s.len())).unwrap();
    let mut weighted = ul.t().dot(&ds).dot(&ur);
    for (i, mut row) in weighted.rows_mut().into_iter().enumerate() {
        row.mapv_inplace(|z| z * dl[i].sqrt());
    }
    for (j, mut col) in weighted.columns_mut().into_iter().enumerate() {
        col.mapv_inplace(|z| z * dr[j].sqrt());
    }

    let (u_opt, svals, vt_opt) = weighted.svd(true, true)?;
    let u = u_opt.unwrap();
    let vt = vt_opt.unwrap();
    let k = svals.len().min(kl).min(kr);
    let snorm = svals.iter().take(k).map(|x| x * x).sum::<f64>().sqrt();
    let s_new = nd::Array1::from_iter(
        svals.iter().take(k).map(|x| x / snorm));

    // gauge-change matrices: x folds into the left tensor's right bond,
    // y into the right tensor's left bond
    let mut x_fac = ul.mapv(|z| z.conj());
    for (j, mut col) in x_fac.columns_mut().into_iter().enumerate() {
        col.mapv_inplace(|z| z / dl[j].sqrt());
    }
    let x = x_fac.dot(&u.slice(nd::s![.., ..k]));
    let mut y_fac = ur.mapv(|z| z.conj());
    for (j, mut col) in y_fac.columns_mut().into_iter().enumerate() {
        col.mapv_inplace(|z| z / dr[j].sqrt());
    }
    let y = y_fac.dot(&vt.slice(nd::s![..k, ..]).t());

    let left_new = ncon_ord(
        vec![left.clone().into_dyn(), x.into_dyn()],
        &[vec![-1, -2, 2], vec![2, -3]],
        None,
        false,
    )?;
    let right_new = ncon_ord(
        vec![y.into_dyn(), right.clone().into_dyn()],
        &[vec![1, -1], vec![1, -2, -3]],
        None,
        false,
    )?;
    Ok((to3(left_new), s_new, to3(right_new)))
}

fn to3(t: CTensor) -> nd::Array3<C64> {
    t.into_dimensionality::<nd::Ix3>().unwrap()
}
