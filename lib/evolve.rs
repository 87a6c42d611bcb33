//! Trotter gate construction and two-site gate application with bond
//! truncation.
//!
//! A gate is the matrix exponential of one two-site Hamiltonian term, with
//! the prefactor selected by the evolution mode: `i τ H` for unitary
//! dynamics, `−τ H` for imaginary-time projection toward the ground state.
//! Applying a gate to a bond contracts the two flanking site tensors, the
//! three surrounding weight vectors, and the gate into one composite block,
//! then splits the block back apart by SVD, keeping at most `chi` singular
//! values. Discarded singular-value mass is the TEBD truncation error and is
//! reported, not raised.

use ndarray as nd;
use ndarray_linalg::SVD;
use num_complex::Complex64 as C64;
use thiserror::Error;
use crate::{
    cell::weight_mat,
    linalg::{ LinalgError, expm_hermitian },
    ncon::{ NconError, ncon_ord },
};

#[derive(Debug, Error)]
pub enum EvolveError {
    /// Returned when a gate's physical dimensions do not match the site
    /// tensors it is applied to.
    #[error("error in apply_gate: gate physical dimension {0} does not \
        match site dimension {1}")]
    GateDimMismatch(usize, usize),

    /// Returned when gate construction fails in the matrix exponential.
    #[error("gate construction failed: {0}")]
    Expm(#[from] LinalgError),

    /// Returned by dense LAPACK routines.
    #[error("lapack error: {0}")]
    Lapack(#[from] ndarray_linalg::error::LinalgError),

    /// Returned when the composite-block contraction fails.
    #[error("contraction error: {0}")]
    Contraction(#[from] NconError),
}
use EvolveError::*;
pub type EvolveResult<T> = Result<T, EvolveError>;

/// Default clamp applied to bond weights before they are inverted.
pub const STOL: f64 = 1e-7;

/// Evolution mode selecting the gate prefactor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvoType {
    /// Unitary dynamics: gate = exp(i τ H).
    Real,
    /// Imaginary-time projection: gate = exp(−τ H).
    Imag,
}

impl EvoType {
    fn prefactor(self, tau: f64) -> C64 {
        match self {
            Self::Real => C64::new(0.0, tau),
            Self::Imag => C64::new(-tau, 0.0),
        }
    }
}

/// Exponentiate a Hermitian two-site Hamiltonian term into a Trotter gate.
pub fn make_gate(ham: &nd::Array4<C64>, tau: f64, evo: EvoType)
    -> EvolveResult<nd::Array4<C64>>
{
    let d = ham.dim().0;
    let hmat: nd::Array2<C64>
        = ham.clone().into_shape((d * d, d * d)).unwrap();
    let gmat = expm_hermitian(&hmat, evo.prefactor(tau))?;
    Ok(gmat.into_shape((d, d, d, d)).unwrap())
}

/// The result of one gate application.
#[derive(Clone, Debug)]
pub struct GateUpdate {
    /// Updated left site tensor.
    pub left: nd::Array3<C64>,
    /// New bond weights, unit Euclidean norm, length ≤ `chi`.
    pub weights: nd::Array1<f64>,
    /// Updated right site tensor.
    pub right: nd::Array3<C64>,
    /// Squared singular-value mass discarded by truncation, as a fraction of
    /// the total.
    pub truncation_error: f64,
}

/// Apply a two-site gate across the bond between `left` and `right`,
/// truncating the evolved bond to at most `chi`.
///
/// `s_mid` holds the weights on the bond being evolved and `s_out` the
/// weights on the two outer bonds (equal by the unit-cell structure).
/// For the A→B bond this is called as
/// `apply_gate(gateAB, A, sAB, B, sBA, chi, stol)`.
pub fn apply_gate(
    gate: &nd::Array4<C64>,
    left: &nd::Array3<C64>,
    s_mid: &nd::Array1<f64>,
    right: &nd::Array3<C64>,
    s_out: &nd::Array1<f64>,
    chi: usize,
    stol: f64,
) -> EvolveResult<GateUpdate>
{
    let d = left.dim().1;
    if gate.dim().0 != d { return Err(GateDimMismatch(gate.dim().0, d)); }
    let chi_out = s_out.len();

    // clamp outer weights away from zero so they can be divided out later
    let s_trim: nd::Array1<f64> = s_out.mapv(|x| x.max(stol));

    let theta = ncon_ord(
        vec![
            weight_mat(&s_trim),
            left.clone().into_dyn(),
            weight_mat(s_mid),
            right.clone().into_dyn(),
            weight_mat(&s_trim),
            gate.clone().into_dyn(),
        ],
        &[
            vec![-1, 1],
            vec![1, 5, 2],
            vec![2, 4],
            vec![4, 6, 3],
            vec![3, -4],
            vec![-2, -3, 5, 6],
        ],
        None,
        false,
    )?;
    let theta: nd::Array2<C64>
        = theta.into_shape((chi_out * d, d * chi_out)).unwrap();

    let (u_opt, svals, vt_opt) = theta.svd(true, true)?;
    let u = u_opt.unwrap();
    let vt = vt_opt.unwrap();
    let keep = chi.min(svals.len());

    let total: f64 = svals.iter().map(|x| x * x).sum();
    let kept: f64 = svals.iter().take(keep).map(|x| x * x).sum();
    let truncation_error
        = if total > 0.0 { 1.0 - kept / total } else { 0.0 };

    // undo the clamped outer weights to recover bare site tensors
    let left_new = nd::Array3::from_shape_fn(
        (chi_out, d, keep),
        |(i, p, j)| u[[i * d + p, j]] / s_trim[i],
    );
    let right_new = nd::Array3::from_shape_fn(
        (keep, d, chi_out),
        |(i, p, j)| vt[[i, p * chi_out + j]] / s_trim[j],
    );
    let snorm = kept.sqrt();
    let weights = nd::Array1::from_iter(
        svals.iter().take(keep).map(|x| x / snorm));

    Ok(GateUpdate { left: left_new, weights, right: right_new,
        truncation_error })
}
