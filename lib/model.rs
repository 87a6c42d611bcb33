//! The transverse-field Ising chain, the standard benchmark model for
//! imaginary-time TEBD.
//!
//! The Hamiltonian is
//!
//! > *H* = Σ<sub>k</sub> σ<sup>x</sup><sub>k</sub> σ<sup>x</sup><sub>k+1</sub>
//! > + *h* Σ<sub>k</sub> σ<sup>z</sup><sub>k</sub>
//!
//! with unit coupling and transverse field *h* > 0. Its ground energy per
//! site is known in closed form through the complete elliptic integral of
//! the second kind, which makes it the natural end-to-end check for the
//! evolution engine: run imaginary-time TEBD, compare the measured energy to
//! [`ground_energy_per_site`].

use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use std::f64::consts::PI;

/// Pauli matrix σ<sup>x</sup>.
pub static SX: Lazy<nd::Array2<C64>> = Lazy::new(make_sx);

/// Pauli matrix σ<sup>y</sup>.
pub static SY: Lazy<nd::Array2<C64>> = Lazy::new(make_sy);

/// Pauli matrix σ<sup>z</sup>.
pub static SZ: Lazy<nd::Array2<C64>> = Lazy::new(make_sz);

/// Construct σ<sup>x</sup>.
pub fn make_sx() -> nd::Array2<C64> {
    nd::array![
        [C64::zero(), C64::one() ],
        [C64::one(),  C64::zero()],
    ]
}

/// Construct σ<sup>y</sup>.
pub fn make_sy() -> nd::Array2<C64> {
    nd::array![
        [C64::zero(),        C64::new(0.0, -1.0)],
        [C64::new(0.0, 1.0), C64::zero()        ],
    ]
}

/// Construct σ<sup>z</sup>.
pub fn make_sz() -> nd::Array2<C64> {
    nd::array![
        [C64::one(),  C64::zero()    ],
        [C64::zero(), -C64::one()    ],
    ]
}

/// Build the two bond Hamiltonian terms of the transverse-field Ising chain
/// at field strength `h`.
///
/// Each term is σ<sup>x</sup> ⊗ σ<sup>x</sup> + *h* σ<sup>z</sup> ⊗ 1,
/// assigning every site's field to the bond on its right; the A→B and B→A
/// terms are identical by the symmetry of the unit cell. Axis signature is
/// `[bra, bra, ket, ket]` as consumed by
/// [`make_gate`][crate::evolve::make_gate] and
/// [`expect_two_site`][crate::density::expect_two_site].
pub fn transverse_ising(h: f64) -> (nd::Array4<C64>, nd::Array4<C64>) {
    let id: nd::Array2<C64> = nd::Array2::eye(2);
    let hmat = nd::linalg::kron(&*SX, &*SX)
        + nd::linalg::kron(&*SZ, &id).mapv(|z| h * z);
    let ham: nd::Array4<C64> = hmat.into_shape((2, 2, 2, 2)).unwrap();
    (ham.clone(), ham)
}

/// Complete elliptic integral of the second kind, E(m), with parameter
/// convention E(m) = ∫₀^{π/2} √(1 − m sin²θ) dθ.
///
/// Evaluated by the arithmetic-geometric mean recurrence; `m` must lie in
/// [0, 1].
pub fn ellipe(m: f64) -> f64 {
    if m >= 1.0 { return 1.0; }
    let mut a: f64 = 1.0;
    let mut b: f64 = (1.0 - m).sqrt();
    let mut c: f64 = m.sqrt();
    let mut p: f64 = 0.5;
    let mut sum: f64 = 0.5 * m;
    while c.abs() > f64::EPSILON {
        let a_next = 0.5 * (a + b);
        let b_next = (a * b).sqrt();
        c = 0.5 * (a - b);
        a = a_next;
        b = b_next;
        p *= 2.0;
        sum += p * c * c;
    }
    (PI / (2.0 * a)) * (1.0 - sum)
}

/// Exact ground energy per site of the transverse-field Ising chain built by
/// [`transverse_ising`], for `h` > 0.
pub fn ground_energy_per_site(h: f64) -> f64 {
    let ld = h.recip();
    let theta = 2.0 * ld.sqrt() / (1.0 + ld);
    -h * 2.0 * (1.0 + ld) * ellipe(theta * theta) / PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn pauli_algebra() {
        // σx σy = i σz
        let prod = SX.dot(&*SY);
        for i in 0..2 {
            for j in 0..2 {
                let expected = C64::new(0.0, 1.0) * SZ[[i, j]];
                assert_approx_eq!(f64, (prod[[i, j]] - expected).norm(), 0.0,
                    epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn ising_term_is_hermitian() {
        let (ham, _) = transverse_ising(1.3);
        let hmat: nd::Array2<C64>
            = ham.into_shape((4, 4)).unwrap();
        let dagger = hmat.t().mapv(|z| z.conj());
        for (x, y) in hmat.iter().zip(dagger.iter()) {
            assert_approx_eq!(f64, (x - y).norm(), 0.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn ellipe_endpoints() {
        assert_approx_eq!(f64, ellipe(0.0), FRAC_PI_2, epsilon = 1e-14);
        assert_approx_eq!(f64, ellipe(1.0), 1.0, epsilon = 1e-14);
        // E(1/2) from Abramowitz & Stegun
        assert_approx_eq!(f64, ellipe(0.5), 1.350_643_881_047_675_5,
            epsilon = 1e-12);
    }

    #[test]
    fn critical_point_energy() {
        // at h = 1 the closed form reduces to −4/π
        assert_approx_eq!(f64, ground_energy_per_site(1.0),
            -4.0 / PI, epsilon = 1e-12);
    }
}
