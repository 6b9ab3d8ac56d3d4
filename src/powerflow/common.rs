//! Mismatch and injected-power helpers shared by every iterative AC solver.

use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

/// `S = V .* conj(Ybus * V)`, the complex power injected at every bus given
/// the current voltage estimate.
pub fn calc_power(ybus: &CscMatrix<Complex64>, v: &[Complex64]) -> Vec<Complex64> {
    let n = v.len();
    let mut i_calc = vec![Complex64::new(0.0, 0.0); n];
    for col in 0..ybus.ncols() {
        let col_view = ybus.col(col);
        for (&row, &val) in col_view.row_indices().iter().zip(col_view.values()) {
            i_calc[row] += val * v[col];
        }
    }
    i_calc.iter().zip(v.iter()).map(|(ic, vi)| vi * ic.conj()).collect()
}

/// Active/reactive mismatch `Scalc - Sspec` restricted to `pv ∪ pq` for `P`
/// and `pq` alone for `Q`, stacked into one real vector `[dP; dQ]`.
pub fn power_mismatch(
    s_calc: &[Complex64],
    s_spec: &[Complex64],
    pv: &[usize],
    pq: &[usize],
) -> Vec<f64> {
    let mut f = Vec::with_capacity(pv.len() + 2 * pq.len());
    for &i in pv.iter().chain(pq.iter()) {
        f.push(s_calc[i].re - s_spec[i].re);
    }
    for &i in pq {
        f.push(s_calc[i].im - s_spec[i].im);
    }
    f
}

pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

/// Builds the internal-ordering permutation `pv ++ pq ++ vd` that every
/// Newton/LM/FD solver needs: their Jacobian assembly assumes PV buses
/// first, PQ buses next, and the slack/reference buses trimmed off the end
/// (`n_ext = vd.len()`).
pub fn solve_order(indices: &crate::indices::SimulationIndices) -> Vec<usize> {
    let mut perm = Vec::with_capacity(indices.pv.len() + indices.pq.len() + indices.vd.len());
    perm.extend_from_slice(&indices.pv);
    perm.extend_from_slice(&indices.pq);
    perm.extend_from_slice(&indices.vd);
    perm
}

/// `out[i] = v[perm[i]]`.
pub fn permute_vec<T: Copy>(v: &[T], perm: &[usize]) -> Vec<T> {
    perm.iter().map(|&i| v[i]).collect()
}

/// `out[perm[i]] = v[i]`, the inverse of [`permute_vec`].
pub fn unpermute_vec<T: Copy>(v: &[T], perm: &[usize]) -> Vec<T> {
    let mut out: Vec<Option<T>> = vec![None; v.len()];
    for (i, &p) in perm.iter().enumerate() {
        out[p] = Some(v[i]);
    }
    out.into_iter().map(|x| x.expect("perm must be a bijection over 0..n")).collect()
}

/// `m[rows, cols]`, a real sparse matrix restricted to the given row/column
/// index sets. Used to slice `B'`/`B''` and `Bbus` down to their PV/PQ (or
/// PQ-only) blocks before factorizing.
pub fn submatrix_f64(m: &CscMatrix<f64>, rows: &[usize], cols: &[usize]) -> CscMatrix<f64> {
    use nalgebra_sparse::CooMatrix;
    let dense = m.to_dense();
    let mut coo = CooMatrix::new(rows.len(), cols.len());
    for (i, &r) in rows.iter().enumerate() {
        for (j, &c) in cols.iter().enumerate() {
            let v = dense[(r, c)];
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}

/// `out[i, j] = m[perm[i], perm[j]]`.
pub fn permute_matrix(m: &CscMatrix<Complex64>, perm: &[usize]) -> CscMatrix<Complex64> {
    use nalgebra_sparse::CooMatrix;
    let dense = m.to_dense();
    let n = perm.len();
    let mut coo = CooMatrix::new(n, n);
    for i in 0..n {
        for j in 0..n {
            let v = dense[(perm[i], perm[j])];
            if v.norm() > 0.0 {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}
