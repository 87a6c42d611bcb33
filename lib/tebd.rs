//! The TEBD driver: periodic canonicalization, measurement, and Trotter
//! evolution of the two-site unit cell.
//!
//! One run proceeds as
//!
//! ```text
//! INIT -> { CANONICALIZE -> MEASURE -> EVOLVE } x numiter -> FINALIZE
//! ```
//!
//! where CANONICALIZE and MEASURE fire only on iterations divisible by
//! `midsteps` (and on the last iteration). The engine owns the unit cell for
//! the duration of the run and hands it back, along with the final reduced
//! density matrices and the recorded measurement traces, when done. A failure
//! anywhere aborts the run at the current iteration; the engine never
//! continues on a stale environment.

use ndarray as nd;
use num_complex::Complex64 as C64;
use thiserror::Error;
use crate::{
    canonical::{ CanonError, DTOL, orthogonalize_bond },
    cell::{ UnitCell, conj, weight_mat_sq },
    density::{ expect_two_site, local_density, site_average },
    environment::{ EnvError, left_environments, right_environments },
    evolve::{ EvoType, EvolveError, STOL, apply_gate, make_gate },
    ncon::{ NconError, ncon_scalar },
};

#[derive(Debug, Error)]
pub enum TebdError {
    /// Returned when a transfer-operator solve fails during
    /// canonicalization.
    #[error("canonicalization failed: {0}")]
    Env(#[from] EnvError),

    /// Returned when gauge fixing fails during canonicalization.
    #[error("gauge fixing failed: {0}")]
    Canon(#[from] CanonError),

    /// Returned when gate construction or application fails.
    #[error("evolution failed: {0}")]
    Evolve(#[from] EvolveError),

    /// Returned when a measurement contraction fails.
    #[error("measurement failed: {0}")]
    Contraction(#[from] NconError),

    /// Returned when the run parameters are invalid.
    #[error("invalid TEBD configuration: {0}")]
    BadConfig(&'static str),
}
pub type TebdResult<T> = Result<T, TebdError>;

/// Run parameters for [`run_tebd`].
#[derive(Clone, Debug)]
pub struct TebdConfig {
    /// Maximum bond dimension.
    pub chi: usize,
    /// Trotter time step.
    pub tau: f64,
    /// Real- or imaginary-time evolution.
    pub evo: EvoType,
    /// Total number of evolution steps.
    pub numiter: usize,
    /// Steps between canonicalization/measurement cycles.
    pub midsteps: usize,
    /// Known reference ground energy; enables the energy-error trace.
    pub e0: Option<f64>,
    /// Single-site operator to trace alongside the energy.
    pub magz: Option<nd::Array2<C64>>,
    /// Clamp on bond weights before inversion in gate application.
    pub stol: f64,
    /// Eigenvalue discard threshold in gauge fixing.
    pub dtol: f64,
}

impl TebdConfig {
    /// Default run parameters for the given bond dimension, time step, and
    /// evolution mode: 1000 iterations, canonicalization every 10.
    pub fn new(chi: usize, tau: f64, evo: EvoType) -> Self {
        Self {
            chi,
            tau,
            evo,
            numiter: 1000,
            midsteps: 10,
            e0: None,
            magz: None,
            stol: STOL,
            dtol: DTOL,
        }
    }

    /// Reject parameter values that would make a run meaningless or panic
    /// partway through.
    pub fn validate(&self) -> TebdResult<()> {
        if self.chi == 0 {
            return Err(TebdError::BadConfig("chi must be at least 1"));
        }
        if self.midsteps == 0 {
            return Err(TebdError::BadConfig("midsteps must be at least 1"));
        }
        if !self.tau.is_finite() {
            return Err(TebdError::BadConfig("tau must be finite"));
        }
        if !(self.stol > 0.0 && self.stol.is_finite()) {
            return Err(TebdError::BadConfig("stol must be positive"));
        }
        if !(self.dtol > 0.0 && self.dtol.is_finite()) {
            return Err(TebdError::BadConfig("dtol must be positive"));
        }
        Ok(())
    }
}

/// Everything a finished run hands back.
#[derive(Clone, Debug)]
pub struct TebdOutput {
    /// Final unit cell.
    pub cell: UnitCell,
    /// Final two-site reduced density matrix on the A→B bond.
    pub rho_ab: nd::Array4<C64>,
    /// Final two-site reduced density matrix on the B→A bond.
    pub rho_ba: nd::Array4<C64>,
    /// Iteration indices at which measurements were taken.
    pub steps: Vec<usize>,
    /// Energy per site at each measurement.
    pub energy: Vec<f64>,
    /// Energy error against the reference ground energy, when one was given.
    pub energy_err: Option<Vec<f64>>,
    /// Per-site expectation of the traced operator, when one was given.
    pub magnetization: Option<Vec<f64>>,
    /// Truncation error of the most recent gate application on each bond.
    pub truncation_error: f64,
}

/// Self-overlap of a site tensor sandwiched between squared weights; its
/// square root is the normalization divisor keeping the MPS on the unit-norm
/// manifold.
fn site_norm(
    t: &nd::Array3<C64>,
    s_left: &nd::Array1<f64>,
    s_right: &nd::Array1<f64>,
) -> TebdResult<f64>
{
    let td = t.clone().into_dyn();
    let overlap = ncon_scalar(
        vec![
            weight_mat_sq(s_left),
            td.clone(),
            conj(&td),
            weight_mat_sq(s_right),
        ],
        &[
            vec![1, 3],
            vec![1, 4, 2],
            vec![3, 4, 5],
            vec![2, 5],
        ],
    )?;
    Ok(overlap.re.sqrt())
}

/// Evolve a unit cell under the two bond Hamiltonians.
///
/// `ham_ab` and `ham_ba` are Hermitian two-site terms with axis signature
/// `[bra, bra, ket, ket]`. The cell is consumed, mutated across the run, and
/// returned in the output.
pub fn run_tebd(
    ham_ab: &nd::Array4<C64>,
    ham_ba: &nd::Array4<C64>,
    mut cell: UnitCell,
    config: &TebdConfig,
) -> TebdResult<TebdOutput>
{
    config.validate()?;
    let gate_ab = make_gate(ham_ab, config.tau, config.evo)?;
    let gate_ba = make_gate(ham_ba, config.tau, config.evo)?;

    // environment warm starts; replaced after every canonicalization
    let mut sig_ba: Option<nd::Array2<C64>> = None;
    let mut mu_ab: Option<nd::Array2<C64>> = None;

    let mut steps: Vec<usize> = Vec::new();
    let mut energy: Vec<f64> = Vec::new();
    let mut energy_err: Vec<f64> = Vec::new();
    let mut magnetization: Vec<f64> = Vec::new();
    let mut truncation_error: f64 = 0.0;

    for k in 0..=config.numiter {
        if k % config.midsteps == 0 || k == config.numiter {
            // canonicalize: environments from both ends, then gauge-fix
            // both bond types
            let (sig, sig_ab) = left_environments(&cell, sig_ba.as_ref())?;
            let (mu, mu_ba) = right_environments(&cell, mu_ab.as_ref())?;
            let (b1, s_ba1, a1) = orthogonalize_bond(
                &sig, &mu_ba, &cell.b, &cell.sBA, &cell.a, config.dtol)?;
            let (a2, s_ab1, b2) = orthogonalize_bond(
                &sig_ab, &mu, &a1, &cell.sAB, &b1, config.dtol)?;
            sig_ba = Some(sig);
            mu_ab = Some(mu);

            let a_norm = site_norm(&a2, &s_ba1, &s_ab1)?;
            let b_norm = site_norm(&b2, &s_ab1, &s_ba1)?;
            cell.a = a2.mapv(|z| z / a_norm);
            cell.b = b2.mapv(|z| z / b_norm);
            cell.sAB = s_ab1;
            cell.sBA = s_ba1;

            // measure
            let (rho_ab, rho_ba) = local_density(&cell)?;
            let e_ab = expect_two_site(ham_ab, &rho_ab)?;
            let e_ba = expect_two_site(ham_ba, &rho_ba)?;
            let e = 0.5 * (e_ab + e_ba).re;
            steps.push(k);
            energy.push(e);
            if let Some(e0) = config.e0 {
                energy_err.push(e - e0);
            }
            if let Some(op) = config.magz.as_ref() {
                magnetization.push(site_average(&cell, op)?.re);
            }
            log::debug!(
                "iteration {} of {}: chi = {}, energy = {:.8}{}",
                k, config.numiter, cell.chi_ab().min(cell.chi_ba()), e,
                config.e0.map(|e0| format!(", error = {:.3e}", e - e0))
                    .unwrap_or_default(),
            );
        }

        if k < config.numiter {
            let up = apply_gate(
                &gate_ab, &cell.a, &cell.sAB, &cell.b, &cell.sBA,
                config.chi, config.stol)?;
            cell.a = up.left;
            cell.sAB = up.weights;
            cell.b = up.right;
            truncation_error = up.truncation_error;
            let up = apply_gate(
                &gate_ba, &cell.b, &cell.sBA, &cell.a, &cell.sAB,
                config.chi, config.stol)?;
            cell.b = up.left;
            cell.sBA = up.weights;
            cell.a = up.right;
            truncation_error = truncation_error.max(up.truncation_error);
        }
    }

    let (rho_ab, rho_ba) = local_density(&cell)?;
    Ok(TebdOutput {
        cell,
        rho_ab,
        rho_ba,
        steps,
        energy,
        energy_err: config.e0.map(|_| energy_err),
        magnetization: config.magz.as_ref().map(|_| magnetization),
        truncation_error,
    })
}
