//! Local reduced density matrices and expectation values.
//!
//! All of these assume the unit cell is already in canonical form, so the
//! environment on either side of a block collapses to the squared Schmidt
//! weights on the outermost bonds. Everything here is a single fixed-pattern
//! contraction; no iterative solving is involved.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    cell::{ UnitCell, conj, weight_mat, weight_mat_sq },
    ncon::{ CTensor, NconResult, ncon_ord, ncon_scalar },
};

/// Two-site reduced density matrix on the bond between `left` and `right`.
///
/// Axis signature of the result is `[bra_left, bra_right, ket_left,
/// ket_right]` over physical indices, matching the axis convention of the
/// Hamiltonian terms it is contracted against.
fn two_site_density(
    left: &nd::Array3<C64>,
    s_mid: &nd::Array1<f64>,
    right: &nd::Array3<C64>,
    s_out: &nd::Array1<f64>,
) -> NconResult<nd::Array4<C64>>
{
    let d = left.dim().1;
    let l = left.clone().into_dyn();
    let r = right.clone().into_dyn();
    let rho = ncon_ord(
        vec![
            weight_mat_sq(s_out),
            l.clone(), conj(&l),
            weight_mat(s_mid), weight_mat(s_mid),
            r.clone(), conj(&r),
            weight_mat_sq(s_out),
        ],
        &[
            vec![3, 4],
            vec![3, -3, 1], vec![4, -1, 2],
            vec![1, 7], vec![2, 8],
            vec![7, -4, 5], vec![8, -2, 6],
            vec![5, 6],
        ],
        None,
        false,
    )?;
    Ok(rho.into_shape((d, d, d, d)).unwrap())
}

/// Compute the two-site reduced density matrices `(rhoAB, rhoBA)` for both
/// bond types of a canonical unit cell.
pub fn local_density(cell: &UnitCell)
    -> NconResult<(nd::Array4<C64>, nd::Array4<C64>)>
{
    let rho_ab = two_site_density(&cell.a, &cell.sAB, &cell.b, &cell.sBA)?;
    let rho_ba = two_site_density(&cell.b, &cell.sBA, &cell.a, &cell.sAB)?;
    Ok((rho_ab, rho_ba))
}

/// Single-site reduced density matrix of a site tensor flanked by squared
/// weights.
fn one_site_density(
    t: &nd::Array3<C64>,
    s_left: &nd::Array1<f64>,
    s_right: &nd::Array1<f64>,
) -> NconResult<nd::Array2<C64>>
{
    let d = t.dim().1;
    let td: CTensor = t.clone().into_dyn();
    let rho = ncon_ord(
        vec![
            weight_mat_sq(s_left),
            td.clone(),
            weight_mat_sq(s_right),
            conj(&td),
        ],
        &[
            vec![1, 2],
            vec![2, -2, 3],
            vec![3, 4],
            vec![1, -1, 4],
        ],
        None,
        false,
    )?;
    Ok(rho.into_shape((d, d)).unwrap())
}

/// Compute the single-site reduced density matrices `(rhoA, rhoB)` of a
/// canonical unit cell.
pub fn single_density(cell: &UnitCell)
    -> NconResult<(nd::Array2<C64>, nd::Array2<C64>)>
{
    let rho_a = one_site_density(&cell.a, &cell.sBA, &cell.sAB)?;
    let rho_b = one_site_density(&cell.b, &cell.sAB, &cell.sBA)?;
    Ok((rho_a, rho_b))
}

/// Expectation value of a two-site operator against a two-site reduced
/// density matrix.
pub fn expect_two_site(op: &nd::Array4<C64>, rho: &nd::Array4<C64>)
    -> NconResult<C64>
{
    ncon_scalar(
        vec![op.clone().into_dyn(), rho.clone().into_dyn()],
        &[vec![1, 2, 3, 4], vec![1, 2, 3, 4]],
    )
}

/// Expectation value of a single-site operator against a single-site
/// reduced density matrix.
pub fn expect_one_site(op: &nd::Array2<C64>, rho: &nd::Array2<C64>)
    -> NconResult<C64>
{
    ncon_scalar(
        vec![op.clone().into_dyn(), rho.clone().into_dyn()],
        &[vec![1, 2], vec![1, 2]],
    )
}

/// Per-site magnetization: the single-site operator `op` averaged over the
/// A and B sites of a canonical unit cell.
pub fn site_average(cell: &UnitCell, op: &nd::Array2<C64>)
    -> NconResult<C64>
{
    let (rho_a, rho_b) = single_density(cell)?;
    let ma = expect_one_site(op, &rho_a)?;
    let mb = expect_one_site(op, &rho_b)?;
    Ok(0.5 * (ma + mb))
}
