//! Evaluation of arbitrary tensor networks through sequences of pairwise
//! contractions.
//!
//! Networks are specified in the "ncon" convention: each tensor carries a list
//! of signed integer labels, one per axis. A positive label appears on exactly
//! two axes in the network and marks them for contraction against each other
//! (if both occurrences sit on the same tensor, the pair is partial-traced
//! instead). A negative label appears exactly once and marks an open axis of
//! the final result; output axes are ordered so that axis *i* of the result
//! carries label −(*i* + 1).
//!
//! Contraction proceeds label-by-label in ascending numeric order by default;
//! a caller-supplied order can override this. Whenever two tensors are joined,
//! all labels they share are consumed in a single tensordot so no shared index
//! is ever contracted in isolation.
//!
//! # Example
//!
//! ```
//! use ndarray as nd;
//! use num_complex::Complex64 as C64;
//! use itebd::ncon::ncon;
//!
//! // matrix product C = A B as a two-tensor network
//! let a: nd::ArrayD<C64>
//!     = nd::ArrayD::from_shape_fn(nd::IxDyn(&[2, 3]), |ix| {
//!         C64::from((ix[0] + 2 * ix[1]) as f64)
//!     });
//! let b: nd::ArrayD<C64>
//!     = nd::ArrayD::from_shape_fn(nd::IxDyn(&[3, 2]), |ix| {
//!         C64::from((ix[0] * ix[1]) as f64)
//!     });
//! let c = ncon(vec![a, b], &[vec![-1, 1], vec![1, -2]]).unwrap();
//! assert_eq!(c.shape(), &[2, 2]);
//! ```

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

/// A dense complex tensor of runtime-determined rank.
pub type CTensor = nd::ArrayD<C64>;

#[derive(Debug, Error)]
pub enum NconError {
    /// Returned when the number of tensors does not match the number of label
    /// lists.
    #[error("error in ncon: {0} tensors but {1} label lists")]
    CountMismatch(usize, usize),

    /// Returned when a tensor's rank does not match the length of its label
    /// list.
    #[error("error in ncon: tensor {0} has rank {1} but {2} labels")]
    RankMismatch(usize, usize, usize),

    /// Returned when a label list contains zero, which is neither a
    /// contracted nor an open index.
    #[error("error in ncon: zero label on tensor {0}")]
    ZeroLabel(usize),

    /// Returned when a negative (open) label appears more than once in the
    /// network.
    #[error("error in ncon: open label {0} appears {1} times")]
    RepeatedOutputLabel(i32, usize),

    /// Returned when the negative labels present do not form the contiguous
    /// set −1 … −n.
    #[error("error in ncon: open labels must be exactly -1 ..= -{0}")]
    OutputLabelGap(usize),

    /// Returned when a positive (contracted) label appears once or more than
    /// twice in the network.
    #[error("error in ncon: contracted label {0} appears {1} times")]
    UnpairedLabel(i32, usize),

    /// Returned when the two axes joined by a positive label have unequal
    /// dimensions.
    #[error("error in ncon: label {0} joins axes of dimension {1} and {2}")]
    DimMismatch(i32, usize, usize),

    /// Returned when an explicit contraction order is not a permutation of
    /// the distinct positive labels in the network.
    #[error("error in ncon: contraction order {0:?} does not match the \
        contracted labels")]
    BadOrder(Vec<i32>),

    /// Returned when the network contains no tensors.
    #[error("error in ncon: empty network")]
    EmptyNetwork,

    /// Returned by [`ncon_scalar`] when the network still has open indices.
    #[error("error in ncon_scalar: network has {0} open indices")]
    NotScalar(usize),
}
use NconError::*;
pub type NconResult<T> = Result<T, NconError>;

/// Contract a network with the default (ascending) label order and full input
/// validation.
///
/// Returns a rank-0 tensor if the network has no open indices.
pub fn ncon(tensors: Vec<CTensor>, connects: &[Vec<i32>])
    -> NconResult<CTensor>
{
    ncon_ord(tensors, connects, None, true)
}

/// Contract a network down to a scalar.
///
/// Fails with [`NconError::NotScalar`] if any open (negative) labels are
/// present.
pub fn ncon_scalar(tensors: Vec<CTensor>, connects: &[Vec<i32>])
    -> NconResult<C64>
{
    let out = ncon_ord(tensors, connects, None, true)?;
    if out.ndim() != 0 { return Err(NotScalar(out.ndim())); }
    Ok(out.sum())
}

/// Like [`ncon`], but with an optional explicit contraction order over the
/// positive labels and a switch to skip input validation.
///
/// Skipping validation is safe only for label lists already known to be
/// well-formed (e.g. fixed patterns hard-coded by a caller); malformed input
/// may then panic or silently produce garbage.
pub fn ncon_ord(
    tensors: Vec<CTensor>,
    connects: &[Vec<i32>],
    order: Option<&[i32]>,
    check: bool,
) -> NconResult<CTensor>
{
    if check { validate(&tensors, connects, order)?; }
    if tensors.is_empty() { return Err(EmptyNetwork); }
    let mut tens: Vec<CTensor> = tensors;
    let mut labs: Vec<Vec<i32>> = connects.to_vec();

    // partial traces: repeated labels within a single tensor
    for (t, l) in tens.iter_mut().zip(labs.iter_mut()) {
        while let Some(lab) = first_repeat(l) {
            trace_label(t, l, lab);
        }
    }

    // resolve the contraction order
    let mut queue: Vec<i32> = match order {
        Some(ord) => ord.to_vec(),
        None => {
            labs.iter().flatten().copied()
                .filter(|l| *l > 0)
                .unique()
                .sorted_unstable()
                .collect()
        },
    };

    // pairwise contractions
    while let Some(&lead) = queue.first() {
        let mut holders
            = labs.iter().enumerate()
            .filter(|(_, l)| l.contains(&lead))
            .map(|(i, _)| i);
        let ia = holders.next().unwrap();
        match holders.next() {
            None => {
                // both occurrences ended up on one tensor after a prior merge
                trace_label(&mut tens[ia], &mut labs[ia], lead);
                queue.retain(|l| *l != lead);
            },
            Some(ib) => {
                let consumed = contract_pair(&mut tens, &mut labs, ia, ib);
                queue.retain(|l| !consumed.contains(l));
            },
        }
    }

    // outer products between any remaining disjoint pieces
    while tens.len() > 1 {
        let t = tens.pop().unwrap();
        let l = labs.pop().unwrap();
        let joined = tensordot(&tens.pop().unwrap(), &[], &t, &[]);
        let mut jl = labs.pop().unwrap();
        jl.extend_from_slice(&l);
        tens.push(joined);
        labs.push(jl);
    }

    // permute output axes into the −1, −2, … convention
    let t = tens.pop().unwrap();
    let l = labs.pop().unwrap();
    if l.is_empty() { return Ok(t); }
    let mut perm: Vec<usize> = (0..l.len()).collect();
    perm.sort_unstable_by_key(|&i| -l[i]);
    // return in standard layout so callers can reshape freely
    Ok(t.permuted_axes(perm).as_standard_layout().to_owned())
}

/// Contract tensors `ia` and `ib` along every label they share, replacing
/// both with the result. Returns the consumed labels.
fn contract_pair(
    tens: &mut Vec<CTensor>,
    labs: &mut Vec<Vec<i32>>,
    ia: usize,
    ib: usize,
) -> Vec<i32>
{
    let mut shared: Vec<(usize, usize, i32)>
        = labs[ia].iter().enumerate()
        .filter_map(|(pa, l)| {
            labs[ib].iter().position(|m| m == l).map(|pb| (pa, pb, *l))
        })
        .collect();
    // order the shared axes by the smaller operand so the larger one is
    // traversed with friendlier strides
    if tens[ia].len() < tens[ib].len() {
        shared.sort_unstable_by_key(|s| s.0);
    } else {
        shared.sort_unstable_by_key(|s| s.1);
    }
    let ax_a: Vec<usize> = shared.iter().map(|s| s.0).collect();
    let ax_b: Vec<usize> = shared.iter().map(|s| s.1).collect();
    let consumed: Vec<i32> = shared.iter().map(|s| s.2).collect();

    let prod = tensordot(&tens[ia], &ax_a, &tens[ib], &ax_b);
    let mut pl: Vec<i32>
        = labs[ia].iter().copied().filter(|l| !consumed.contains(l)).collect();
    pl.extend(labs[ib].iter().copied().filter(|l| !consumed.contains(l)));

    let (hi, lo) = if ia > ib { (ia, ib) } else { (ib, ia) };
    tens.remove(hi);
    tens.remove(lo);
    labs.remove(hi);
    labs.remove(lo);
    tens.push(prod);
    labs.push(pl);
    consumed
}

/// Contract two tensors along the given axis pairs, generalizing the matrix
/// product. With empty axis lists this is an outer product.
///
/// The result's axes are the free axes of `a` (in order) followed by the free
/// axes of `b`.
pub fn tensordot(a: &CTensor, ax_a: &[usize], b: &CTensor, ax_b: &[usize])
    -> CTensor
{
    let free_a: Vec<usize>
        = (0..a.ndim()).filter(|i| !ax_a.contains(i)).collect();
    let free_b: Vec<usize>
        = (0..b.ndim()).filter(|i| !ax_b.contains(i)).collect();
    let m: usize = free_a.iter().map(|&i| a.shape()[i]).product();
    let k: usize = ax_a.iter().map(|&i| a.shape()[i]).product();
    let n: usize = free_b.iter().map(|&i| b.shape()[i]).product();
    let sh_out: Vec<usize>
        = free_a.iter().map(|&i| a.shape()[i])
        .chain(free_b.iter().map(|&i| b.shape()[i]))
        .collect();

    let mut perm_a = free_a;
    perm_a.extend_from_slice(ax_a);
    let mut perm_b = ax_b.to_vec();
    perm_b.extend_from_slice(&free_b);
    let amat: nd::Array2<C64>
        = a.view().permuted_axes(perm_a)
        .as_standard_layout().to_owned()
        .into_shape((m, k)).unwrap();
    let bmat: nd::Array2<C64>
        = b.view().permuted_axes(perm_b)
        .as_standard_layout().to_owned()
        .into_shape((k, n)).unwrap();
    amat.dot(&bmat).into_shape(sh_out).unwrap()
}

/// Find a label occurring at least twice in `labels`, if any.
fn first_repeat(labels: &[i32]) -> Option<i32> {
    labels.iter().enumerate()
        .find(|(i, l)| labels[i + 1..].contains(l))
        .map(|(_, l)| *l)
}

/// Partial-trace the two axes of `t` carrying `lab`, removing both from
/// `labels`.
fn trace_label(t: &mut CTensor, labels: &mut Vec<i32>, lab: i32) {
    let ax0 = labels.iter().position(|l| *l == lab).unwrap();
    let ax1 = ax0 + 1
        + labels[ax0 + 1..].iter().position(|l| *l == lab).unwrap();
    let d = t.shape()[ax0];
    let mut perm: Vec<usize>
        = (0..t.ndim()).filter(|&i| i != ax0 && i != ax1).collect();
    let sh_free: Vec<usize> = perm.iter().map(|&i| t.shape()[i]).collect();
    let m: usize = sh_free.iter().product();
    perm.push(ax0);
    perm.push(ax1);
    let cube: nd::Array3<C64>
        = t.view().permuted_axes(perm)
        .as_standard_layout().to_owned()
        .into_shape((m, d, d)).unwrap();
    let traced: nd::Array1<C64>
        = cube.outer_iter().map(|block| block.diag().sum()).collect();
    *t = traced.into_shape(sh_free).unwrap();
    labels.retain(|l| *l != lab);
}

fn validate(
    tensors: &[CTensor],
    connects: &[Vec<i32>],
    order: Option<&[i32]>,
) -> NconResult<()>
{
    if tensors.len() != connects.len() {
        return Err(CountMismatch(tensors.len(), connects.len()));
    }
    for (i, (t, l)) in tensors.iter().zip(connects.iter()).enumerate() {
        if t.ndim() != l.len() {
            return Err(RankMismatch(i, t.ndim(), l.len()));
        }
        if l.contains(&0) { return Err(ZeroLabel(i)); }
    }

    // tally every occurrence: label -> [(tensor, axis)]
    let mut occ: HashMap<i32, Vec<(usize, usize)>> = HashMap::default();
    for (i, l) in connects.iter().enumerate() {
        for (ax, lab) in l.iter().enumerate() {
            occ.entry(*lab).or_default().push((i, ax));
        }
    }
    let mut n_open: usize = 0;
    for (lab, sites) in occ.iter() {
        if *lab < 0 {
            if sites.len() != 1 {
                return Err(RepeatedOutputLabel(*lab, sites.len()));
            }
            n_open += 1;
        } else {
            if sites.len() != 2 {
                return Err(UnpairedLabel(*lab, sites.len()));
            }
            let d0 = tensors[sites[0].0].shape()[sites[0].1];
            let d1 = tensors[sites[1].0].shape()[sites[1].1];
            if d0 != d1 { return Err(DimMismatch(*lab, d0, d1)); }
        }
    }
    for neg in 1..=n_open {
        if !occ.contains_key(&-(neg as i32)) {
            return Err(OutputLabelGap(n_open));
        }
    }
    if let Some(ord) = order {
        let mut sorted_ord = ord.to_vec();
        sorted_ord.sort_unstable();
        let mut pos: Vec<i32>
            = occ.keys().copied().filter(|l| *l > 0).collect();
        pos.sort_unstable();
        if sorted_ord != pos { return Err(BadOrder(ord.to_vec())); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use nd::IxDyn;

    fn t(shape: &[usize], data: Vec<f64>) -> CTensor {
        nd::ArrayD::from_shape_vec(
            IxDyn(shape),
            data.into_iter().map(C64::from).collect(),
        ).unwrap()
    }

    // brute-force inner product of two rank-3 tensors over all axes
    fn brute_inner(a: &CTensor, b: &CTensor) -> C64 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn matrix_product() {
        let a = t(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = t(&[3, 2], vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        let c = ncon(vec![a, b], &[vec![-1, 1], vec![1, -2]]).unwrap();
        assert_eq!(c.shape(), &[2, 2]);
        assert_approx_eq!(f64, c[[0, 0]].re, 58.0);
        assert_approx_eq!(f64, c[[0, 1]].re, 64.0);
        assert_approx_eq!(f64, c[[1, 0]].re, 139.0);
        assert_approx_eq!(f64, c[[1, 1]].re, 154.0);
    }

    #[test]
    fn full_contraction_matches_brute_force() {
        let a = t(&[2, 3, 4], (0..24).map(|x| x as f64).collect());
        let b = t(&[2, 3, 4], (0..24).map(|x| (24 - x) as f64).collect());
        let s = ncon_scalar(
            vec![a.clone(), b.clone()],
            &[vec![1, 2, 3], vec![1, 2, 3]],
        ).unwrap();
        let expected = brute_inner(&a, &b);
        assert_approx_eq!(f64, s.re, expected.re);
        assert_approx_eq!(f64, s.im, expected.im);
    }

    #[test]
    fn partial_trace_equals_matrix_trace() {
        let a = t(&[3, 3], (0..9).map(|x| x as f64).collect());
        let s = ncon_scalar(vec![a], &[vec![1, 1]]).unwrap();
        assert_approx_eq!(f64, s.re, 12.0); // 0 + 4 + 8
    }

    #[test]
    fn trace_with_open_axis() {
        // T[i, j, i] summed over i
        let a = t(&[2, 3, 2], (0..12).map(|x| x as f64).collect());
        let out = ncon(vec![a.clone()], &[vec![1, -1, 1]]).unwrap();
        assert_eq!(out.shape(), &[3]);
        for j in 0..3 {
            let expected: f64
                = (0..2).map(|i| a[[i, j, i]].re).sum();
            assert_approx_eq!(f64, out[[j]].re, expected);
        }
    }

    #[test]
    fn outer_product_of_vectors() {
        let a = t(&[2], vec![1.0, 2.0]);
        let b = t(&[3], vec![3.0, 4.0, 5.0]);
        let c = ncon(vec![a, b], &[vec![-1], vec![-2]]).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert_approx_eq!(f64, c[[1, 2]].re, 10.0);
    }

    #[test]
    fn output_axis_order_follows_labels() {
        let a = t(&[2, 3], (0..6).map(|x| x as f64).collect());
        let c = ncon(vec![a.clone()], &[vec![-2, -1]]).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        assert_approx_eq!(f64, c[[2, 1]].re, a[[1, 2]].re);
    }

    #[test]
    fn three_tensor_chain() {
        let a = t(&[2, 3], (0..6).map(|x| x as f64).collect());
        let b = t(&[3, 4], (0..12).map(|x| x as f64).collect());
        let c = t(&[4, 2], (0..8).map(|x| x as f64).collect());
        let s = ncon_scalar(
            vec![a.clone(), b.clone(), c.clone()],
            &[vec![1, 2], vec![2, 3], vec![3, 1]],
        ).unwrap();
        // trace(A B C) by hand
        let mut expected = 0.0;
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    expected += a[[i, j]].re * b[[j, k]].re * c[[k, i]].re;
                }
            }
        }
        assert_approx_eq!(f64, s.re, expected);
    }

    #[test]
    fn explicit_order_agrees_with_default() {
        let a = t(&[2, 3], (0..6).map(|x| x as f64).collect());
        let b = t(&[3, 4], (0..12).map(|x| x as f64).collect());
        let c = t(&[4, 2], (0..8).map(|x| x as f64).collect());
        let connects = [vec![1, 2], vec![2, 3], vec![3, 1]];
        let s0 = ncon_ord(
            vec![a.clone(), b.clone(), c.clone()], &connects, None, true,
        ).unwrap().sum();
        let s1 = ncon_ord(
            vec![a, b, c], &connects, Some(&[3, 1, 2]), true,
        ).unwrap().sum();
        assert_approx_eq!(f64, s0.re, s1.re, epsilon = 1e-12);
    }

    #[test]
    fn count_mismatch_rejected() {
        let a = t(&[2], vec![1.0, 2.0]);
        let res = ncon(vec![a], &[vec![-1], vec![-2]]);
        assert!(matches!(res, Err(NconError::CountMismatch(1, 2))));
    }

    #[test]
    fn rank_mismatch_rejected() {
        let a = t(&[2, 2], vec![1.0; 4]);
        let res = ncon(vec![a], &[vec![-1]]);
        assert!(matches!(res, Err(NconError::RankMismatch(0, 2, 1))));
    }

    #[test]
    fn triple_label_rejected() {
        let a = t(&[2, 2], vec![1.0; 4]);
        let b = t(&[2], vec![1.0; 2]);
        let res = ncon(vec![a, b], &[vec![1, 1], vec![1]]);
        assert!(matches!(res, Err(NconError::UnpairedLabel(1, 3))));
    }

    #[test]
    fn dim_mismatch_identifies_label() {
        let a = t(&[2, 3], vec![1.0; 6]);
        let b = t(&[4, 2], vec![1.0; 8]);
        let res = ncon(vec![a, b], &[vec![-1, 5], vec![5, -2]]);
        assert!(matches!(res, Err(NconError::DimMismatch(5, 3, 4))));
    }

    #[test]
    fn repeated_open_label_rejected() {
        let a = t(&[2], vec![1.0; 2]);
        let b = t(&[2], vec![1.0; 2]);
        let res = ncon(vec![a, b], &[vec![-1], vec![-1]]);
        assert!(matches!(res, Err(NconError::RepeatedOutputLabel(-1, 2))));
    }

    #[test]
    fn bad_order_rejected() {
        let a = t(&[2, 2], vec![1.0; 4]);
        let b = t(&[2, 2], vec![1.0; 4]);
        let res = ncon_ord(
            vec![a, b],
            &[vec![1, 2], vec![1, 2]],
            Some(&[1, 3]),
            true,
        );
        assert!(matches!(res, Err(NconError::BadOrder(_))));
    }
}
