//! Iterative dominant-eigenpair solving for implicitly defined linear maps,
//! plus the dense matrix exponential.
//!
//! The transfer operators of an infinite chain are never materialized as
//! matrices; they exist only as "apply me to a vector" procedures whose cost
//! scales with the bond dimension cubed rather than to the sixth power. The
//! [`LinearOp`] trait captures exactly that, and [`dominant_eig`] runs power
//! iteration on it. Power iteration suffices here because every operator fed
//! to it is a completely positive map, whose spectral radius is attained by a
//! real positive eigenvalue with a positive semi-definite eigenmatrix.

use ndarray as nd;
use ndarray_linalg::{ Eigh, UPLO };
use num_complex::Complex64 as C64;
use num_traits::Zero;
use thiserror::Error;
use crate::ncon::NconError;

#[derive(Debug, Error)]
pub enum LinalgError {
    /// Returned when power iteration fails to reach its residual tolerance
    /// within the iteration budget.
    #[error("error in dominant_eig: residual above {tol:.3e} after {iters} \
        iterations")]
    NotConverged { iters: usize, tol: f64 },

    /// Returned when an operator application fails.
    #[error("contraction error: {0}")]
    Contraction(#[from] NconError),

    /// Returned by dense LAPACK routines.
    #[error("lapack error: {0}")]
    Lapack(#[from] ndarray_linalg::error::LinalgError),
}
use LinalgError::*;
pub type LinalgResult<T> = Result<T, LinalgError>;

/// A linear map on ℂ<sup>n</sup> defined by its action on a vector.
pub trait LinearOp {
    /// Dimension of the domain (and codomain).
    fn dim(&self) -> usize;

    /// Apply the map to `v`, which has length [`dim`][Self::dim].
    fn apply(&self, v: &nd::Array1<C64>) -> LinalgResult<nd::Array1<C64>>;
}

fn vec_norm(v: &nd::Array1<C64>) -> f64 {
    v.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

fn vec_dot(a: &nd::Array1<C64>, b: &nd::Array1<C64>) -> C64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

/// Find the eigenpair of largest-magnitude eigenvalue of `op` by power
/// iteration.
///
/// `v0` seeds the iteration when its length matches `op.dim()`; otherwise a
/// uniform vector is used. Convergence is declared when the residual
/// ‖op v − λ v‖ drops below `tol · |λ|`, with λ the Rayleigh quotient of the
/// current iterate. The returned eigenvector has unit Euclidean norm.
pub fn dominant_eig<O>(
    op: &O,
    v0: Option<&nd::Array1<C64>>,
    tol: f64,
    maxiter: usize,
) -> LinalgResult<(C64, nd::Array1<C64>)>
where O: LinearOp
{
    let n = op.dim();
    let mut v: nd::Array1<C64> = match v0 {
        Some(v0) if v0.len() == n => v0.clone(),
        _ => nd::Array1::from_elem(n, C64::from(1.0 / n as f64)),
    };
    let norm = vec_norm(&v);
    v.mapv_inplace(|z| z / norm);
    for iter in 0..maxiter {
        let w = op.apply(&v)?;
        let lambda = vec_dot(&v, &w);
        let res = vec_norm(&(&w - &v.mapv(|z| lambda * z)));
        let wnorm = vec_norm(&w);
        if wnorm == 0.0 {
            // the zero vector is a fixed point of any linear map
            return Ok((C64::zero(), v));
        }
        v = w.mapv(|z| z / wnorm);
        if res <= tol * lambda.norm().max(f64::MIN_POSITIVE) {
            log::debug!(
                "dominant_eig: converged after {} iterations, λ = {:.6}",
                iter + 1, lambda.re,
            );
            return Ok((lambda, v));
        }
    }
    Err(NotConverged { iters: maxiter, tol })
}

/// Compute exp(z H) for Hermitian `H` via eigendecomposition.
///
/// Only the lower triangle of `H` is referenced.
pub fn expm_hermitian(h: &nd::Array2<C64>, z: C64)
    -> LinalgResult<nd::Array2<C64>>
{
    let (evals, evecs): (nd::Array1<f64>, nd::Array2<C64>)
        = h.eigh(UPLO::Lower)?;
    let exp_d: nd::Array2<C64>
        = nd::Array2::from_diag(
            &evals.mapv(|e| (z * e).exp()),
        );
    let evecs_h = evecs.t().mapv(|w| w.conj());
    Ok(evecs.dot(&exp_d).dot(&evecs_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use std::f64::consts::FRAC_PI_4;

    struct Dense(nd::Array2<C64>);

    impl LinearOp for Dense {
        fn dim(&self) -> usize { self.0.nrows() }

        fn apply(&self, v: &nd::Array1<C64>)
            -> LinalgResult<nd::Array1<C64>>
        {
            Ok(self.0.dot(v))
        }
    }

    fn c(re: f64) -> C64 { C64::from(re) }

    #[test]
    fn dominant_eigenpair_of_symmetric_matrix() {
        // eigenvalues 3 and 1, dominant eigenvector (1, 1)/√2
        let m = Dense(nd::array![[c(2.0), c(1.0)], [c(1.0), c(2.0)]]);
        let (lambda, v) = dominant_eig(&m, None, 1e-12, 10_000).unwrap();
        assert_approx_eq!(f64, lambda.re, 3.0, epsilon = 1e-9);
        assert_approx_eq!(f64, lambda.im, 0.0, epsilon = 1e-9);
        let ratio = (v[0] / v[1]).norm();
        assert_approx_eq!(f64, ratio, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn warm_start_is_used() {
        let m = Dense(nd::array![[c(5.0), c(0.0)], [c(0.0), c(1.0)]]);
        let v0 = nd::array![c(1.0), c(1e-3)];
        let (lambda, _) = dominant_eig(&m, Some(&v0), 1e-12, 200).unwrap();
        assert_approx_eq!(f64, lambda.re, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_leading_pair_does_not_converge() {
        // eigenvalues +2 and −2: power iteration cannot settle
        let m = Dense(nd::array![[c(2.0), c(0.0)], [c(0.0), c(-2.0)]]);
        let v0 = nd::array![c(1.0), c(1.0)];
        let res = dominant_eig(&m, Some(&v0), 1e-12, 50);
        assert!(matches!(res, Err(LinalgError::NotConverged { .. })));
    }

    #[test]
    fn expm_of_pauli_z() {
        // exp(iθ σz) = diag(e^{iθ}, e^{−iθ})
        let sz = nd::array![[c(1.0), c(0.0)], [c(0.0), c(-1.0)]];
        let theta = FRAC_PI_4;
        let u = expm_hermitian(&sz, C64::new(0.0, theta)).unwrap();
        assert_approx_eq!(f64, u[[0, 0]].re, theta.cos(), epsilon = 1e-12);
        assert_approx_eq!(f64, u[[0, 0]].im, theta.sin(), epsilon = 1e-12);
        assert_approx_eq!(f64, u[[1, 1]].im, -theta.sin(), epsilon = 1e-12);
        assert_approx_eq!(f64, u[[0, 1]].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn expm_of_zero_is_identity() {
        let h = nd::Array2::from_elem((3, 3), c(0.0));
        let u = expm_hermitian(&h, c(-0.5)).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_approx_eq!(f64, u[[i, j]].re, expected,
                    epsilon = 1e-12);
            }
        }
    }
}
