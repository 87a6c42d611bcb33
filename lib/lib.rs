#![allow(dead_code, non_snake_case)]

//! Time-evolving block decimation (TEBD) for an infinite one-dimensional
//! lattice in a matrix-product state with a two-site unit cell.
//!
//! Given a nearest-neighbor Hamiltonian split into its two bond terms, the
//! engine evolves the state in real or imaginary time while keeping the bond
//! dimension bounded: imaginary time projects toward the ground state, real
//! time tracks unitary dynamics. Evolution alternates Trotter gates on the
//! two bond types with periodic re-canonicalization, in which the dominant
//! eigenvectors of the chain's transfer operators are found iteratively and
//! used to restore the Schmidt gauge.
//!
//! Everything is built on a single contraction primitive, [`ncon::ncon`],
//! which evaluates an arbitrary tensor network specified by per-axis integer
//! labels.
//!
//! # Example
//!
//! ```no_run
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use itebd::cell::UnitCell;
//! use itebd::evolve::EvoType;
//! use itebd::model::{ ground_energy_per_site, transverse_ising };
//! use itebd::tebd::{ TebdConfig, run_tebd };
//!
//! let h: f64 = 1.0;
//! let (ham_ab, ham_ba) = transverse_ising(h);
//! let mut rng = StdRng::seed_from_u64(10546);
//! let cell = UnitCell::random(16, 2, &mut rng);
//! let mut config = TebdConfig::new(16, 0.1, EvoType::Imag);
//! config.numiter = 900;
//! config.e0 = Some(ground_energy_per_site(h));
//! let out = run_tebd(&ham_ab, &ham_ba, cell, &config).unwrap();
//! println!("E = {:.6}", out.energy.last().unwrap());
//! ```

pub mod ncon;
pub mod linalg;
pub mod cell;
pub mod environment;
pub mod canonical;
pub mod evolve;
pub mod density;
pub mod tebd;
pub mod model;
