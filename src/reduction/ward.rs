//! C7 — Ward Reduction, grounded in `modified_ward_equivalent.py`'s
//! `ward_reduce` / `y_to_equivalents_10x_rule`.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

fn submatrix(dense: &DMatrix<Complex64>, rows: &[usize], cols: &[usize]) -> DMatrix<Complex64> {
    DMatrix::from_fn(rows.len(), cols.len(), |i, j| dense[(rows[i], cols[j])])
}

fn dense_to_csc(dense: &DMatrix<Complex64>) -> CscMatrix<Complex64> {
    let mut coo = CooMatrix::new(dense.nrows(), dense.ncols());
    for j in 0..dense.ncols() {
        for i in 0..dense.nrows() {
            let v = dense[(i, j)];
            if v != Complex64::new(0.0, 0.0) {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}

/// `Y_eq = Y_rr − Y_re · Y_ee⁻¹ · Y_er`, computed as one dense multi-RHS
/// solve `Y_ee · X = Y_er` rather than an explicit inverse. Returns `Y_rr`
/// unchanged when `retain` covers every bus (nothing to eliminate).
#[allow(non_snake_case)]
pub fn ward_reduce(y: &CscMatrix<Complex64>, retain: &[usize]) -> CscMatrix<Complex64> {
    let n = y.nrows();
    let mut retained = vec![false; n];
    for &r in retain {
        retained[r] = true;
    }
    let eliminate: Vec<usize> = (0..n).filter(|&i| !retained[i]).collect();

    let dense = y.to_dense();
    let yrr = submatrix(&dense, retain, retain);
    if eliminate.is_empty() {
        return dense_to_csc(&yrr);
    }

    let yre = submatrix(&dense, retain, &eliminate);
    let yer = submatrix(&dense, &eliminate, retain);
    let yee = submatrix(&dense, &eliminate, &eliminate);

    let x = yee
        .lu()
        .solve(&yer)
        .expect("Y_ee is nonsingular for a valid Ward elimination set");
    let y_eq = yrr - yre * x;
    dense_to_csc(&y_eq)
}

/// One equivalent branch recovered from a reduced `Y_eq`'s off-diagonal.
#[derive(Debug, Clone, Copy)]
pub struct EquivBranch {
    pub i: usize,
    pub j: usize,
    pub z_eq: Complex64,
}

/// One equivalent shunt recovered from a reduced `Y_eq`'s diagonal.
#[derive(Debug, Clone, Copy)]
pub struct EquivShunt {
    pub bus: usize,
    pub y: Complex64,
}

#[derive(Debug, Clone, Default)]
pub struct EquivElements {
    pub branches: Vec<EquivBranch>,
    pub shunts: Vec<EquivShunt>,
}

/// Recovers branch/shunt elements from `y_eq`, dropping any equivalent
/// branch whose impedance exceeds `10 × x_max`, where `x_max` is the
/// largest `|Im(1/(−Y_ij))|` over **every** off-diagonal of the original
/// (pre-reduction) admittance matrix `original_y` — not just the entries
/// touching the retained set, matching the source exactly. If
/// `original_y` has no off-diagonal entries at all, `x_max` is undefined
/// and no pruning occurs.
pub fn y_to_equivalents_10x_rule(y_eq: &CscMatrix<Complex64>, original_y: &CscMatrix<Complex64>) -> EquivElements {
    let orig_dense = original_y.to_dense();
    let n_orig = orig_dense.nrows();

    let mut x_max: Option<f64> = None;
    for i in 0..n_orig {
        for j in 0..i {
            let y_ij = orig_dense[(i, j)];
            if y_ij != Complex64::new(0.0, 0.0) {
                let candidate = (Complex64::new(1.0, 0.0) / (-y_ij)).im.abs();
                x_max = Some(x_max.map_or(candidate, |m| m.max(candidate)));
            }
        }
    }
    let prune_impedance = x_max.map(|m| 10.0 * m).unwrap_or(f64::INFINITY);

    let dense = y_eq.to_dense();
    let n = dense.nrows();

    let mut branches = Vec::new();
    for i in 0..n {
        for j in 0..i {
            let y_ij = dense[(i, j)];
            if y_ij == Complex64::new(0.0, 0.0) {
                continue;
            }
            let z_eq = Complex64::new(1.0, 0.0) / (-y_ij);
            if z_eq.norm() <= prune_impedance {
                branches.push(EquivBranch { i, j, z_eq });
            }
        }
    }

    let shunts = (0..n)
        .filter_map(|i| {
            let y_ii = dense[(i, i)];
            (y_ii != Complex64::new(0.0, 0.0)).then_some(EquivShunt { bus: i, y: y_ii })
        })
        .collect();

    EquivElements { branches, shunts }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star_y() -> CscMatrix<Complex64> {
        // 0-1, 0-2, 0-3 star, bus 0 is the hub we'll eliminate.
        let mut coo = CooMatrix::new(4, 4);
        let y = Complex64::new(0.0, -20.0);
        for k in 1..4 {
            coo.push(0, 0, -y);
            coo.push(0, k, y);
            coo.push(k, 0, y);
            coo.push(k, k, -y);
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn trivial_retain_all_is_identity() {
        let y = star_y();
        let reduced = ward_reduce(&y, &[0, 1, 2, 3]);
        let dense = reduced.to_dense();
        let orig = y.to_dense();
        for i in 0..4 {
            for j in 0..4 {
                assert!((dense[(i, j)] - orig[(i, j)]).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn eliminating_the_hub_produces_a_fully_meshed_triangle() {
        let y = star_y();
        let reduced = ward_reduce(&y, &[1, 2, 3]);
        let dense = reduced.to_dense();
        assert_eq!(dense.nrows(), 3);
        for i in 0..3 {
            for j in 0..3 {
                if i != j {
                    assert!(dense[(i, j)].norm() > 1e-6, "expected mesh coupling at ({i},{j})");
                }
            }
        }
    }

    #[test]
    fn ten_x_rule_drops_only_far_outliers() {
        // Original network: uniform |x| = 0.1 everywhere, so x_max = 0.1
        // and the prune threshold is 10 * 0.1 = 1.0.
        let mut orig_coo = CooMatrix::new(2, 2);
        let y_typical = Complex64::new(0.0, -10.0);
        orig_coo.push(0, 1, y_typical);
        orig_coo.push(1, 0, y_typical);
        let original = CscMatrix::from(&orig_coo);

        // Reduced equivalent: one branch at the typical scale (kept), one
        // far weaker (its impedance is 20, well past the 1.0 threshold).
        let mut eq_coo = CooMatrix::new(3, 3);
        let y_strong = Complex64::new(0.0, -10.0);
        let y_weak = Complex64::new(0.0, -0.05);
        eq_coo.push(0, 1, y_strong);
        eq_coo.push(1, 0, y_strong);
        eq_coo.push(1, 2, y_weak);
        eq_coo.push(2, 1, y_weak);
        let y_eq = CscMatrix::from(&eq_coo);

        let equiv = y_to_equivalents_10x_rule(&y_eq, &original);
        assert!(equiv.branches.iter().any(|b| (b.i, b.j) == (1, 0)));
        assert!(!equiv.branches.iter().any(|b| (b.i, b.j) == (2, 1)));
    }
}
