//! The two-site translational unit cell of an infinite matrix product state.
//!
//! The infinite chain … A — B — A — B — … is stored as two rank-3 site
//! tensors together with the Schmidt weight vectors living on the two bond
//! types:
//!
//! ```text
//! ... --- Λ[BA] --- A --- Λ[AB] --- B --- Λ[BA] --- A --- ...
//!                   |               |               |
//!                   | <- physical   | <- physical   |
//! ```
//!
//! Site tensors have axis signature `[left bond, physical, right bond]`. The
//! weight vectors hold non-negative Schmidt coefficients and are kept at unit
//! Euclidean norm by the evolution routines; nothing here enforces that on
//! construction since freshly randomized cells are deliberately un-normalized
//! until the first canonicalization.

use ndarray as nd;
use num_complex::Complex64 as C64;
use rand::Rng;
use thiserror::Error;
use crate::ncon::CTensor;

#[derive(Debug, Error)]
pub enum CellError {
    /// Returned when the two site tensors disagree on the physical dimension.
    #[error("error in UnitCell creation: physical dimensions {0} and {1} \
        differ")]
    PhysicalDimMismatch(usize, usize),

    /// Returned when a bond shared by two tensors (or by a tensor and a
    /// weight vector) has inconsistent dimensions.
    #[error("error in UnitCell creation: bond {bond} has dimension {left} on \
        its left tensor but {right} on its right")]
    BondDimMismatch { bond: &'static str, left: usize, right: usize },

    /// Returned when a weight vector length does not match its bond.
    #[error("error in UnitCell creation: weight vector {bond} has length \
        {len} but the bond has dimension {dim}")]
    WeightLenMismatch { bond: &'static str, len: usize, dim: usize },
}
use CellError::*;
pub type CellResult<T> = Result<T, CellError>;

/// Two site tensors and two Schmidt weight vectors describing an infinite
/// MPS with a two-site unit cell.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitCell {
    /// Site tensor on A sites: `[χ(BA), d, χ(AB)]`.
    pub a: nd::Array3<C64>,
    /// Site tensor on B sites: `[χ(AB), d, χ(BA)]`.
    pub b: nd::Array3<C64>,
    /// Schmidt weights on A→B bonds.
    pub sAB: nd::Array1<f64>,
    /// Schmidt weights on B→A bonds.
    pub sBA: nd::Array1<f64>,
}

impl UnitCell {
    /// Create a new unit cell, checking that all bond and physical
    /// dimensions are mutually consistent.
    pub fn new(
        a: nd::Array3<C64>,
        b: nd::Array3<C64>,
        sAB: nd::Array1<f64>,
        sBA: nd::Array1<f64>,
    ) -> CellResult<Self>
    {
        let (chi_ba_l, d_a, chi_ab_l) = a.dim();
        let (chi_ab_r, d_b, chi_ba_r) = b.dim();
        if d_a != d_b { return Err(PhysicalDimMismatch(d_a, d_b)); }
        if chi_ab_l != chi_ab_r {
            return Err(BondDimMismatch {
                bond: "A-B", left: chi_ab_l, right: chi_ab_r,
            });
        }
        if chi_ba_r != chi_ba_l {
            return Err(BondDimMismatch {
                bond: "B-A", left: chi_ba_r, right: chi_ba_l,
            });
        }
        if sAB.len() != chi_ab_l {
            return Err(WeightLenMismatch {
                bond: "A-B", len: sAB.len(), dim: chi_ab_l,
            });
        }
        if sBA.len() != chi_ba_l {
            return Err(WeightLenMismatch {
                bond: "B-A", len: sBA.len(), dim: chi_ba_l,
            });
        }
        Ok(Self { a, b, sAB, sBA })
    }

    /// Create a cell of the given bond and physical dimensions with site
    /// tensors drawn uniformly from `[0, 1)` and uniform weight vectors.
    ///
    /// The result is far from canonical form; it is meant as a starting
    /// point for imaginary-time evolution, which projects onto the ground
    /// state regardless of the initial state's overlap details.
    pub fn random<R>(chi: usize, d: usize, rng: &mut R) -> Self
    where R: Rng + ?Sized
    {
        let a = nd::Array3::from_shape_simple_fn(
            (chi, d, chi), || C64::from(rng.gen::<f64>()));
        let b = nd::Array3::from_shape_simple_fn(
            (chi, d, chi), || C64::from(rng.gen::<f64>()));
        let s = nd::Array1::from_elem(chi, (chi as f64).sqrt().recip());
        Self { a, b, sAB: s.clone(), sBA: s }
    }

    /// Physical dimension of each site.
    pub fn phys_dim(&self) -> usize { self.a.dim().1 }

    /// Current dimension of the A→B bond.
    pub fn chi_ab(&self) -> usize { self.sAB.len() }

    /// Current dimension of the B→A bond.
    pub fn chi_ba(&self) -> usize { self.sBA.len() }
}

/// Promote a real weight vector to a complex diagonal matrix, as a
/// dynamic-rank tensor ready for contraction.
pub(crate) fn weight_mat(s: &nd::Array1<f64>) -> CTensor {
    nd::Array2::from_diag(&s.mapv(C64::from)).into_dyn()
}

/// Like [`weight_mat`], but with the weights squared.
pub(crate) fn weight_mat_sq(s: &nd::Array1<f64>) -> CTensor {
    nd::Array2::from_diag(&s.mapv(|x| C64::from(x * x))).into_dyn()
}

/// Elementwise complex conjugate.
pub(crate) fn conj(t: &CTensor) -> CTensor { t.mapv(|z| z.conj()) }
