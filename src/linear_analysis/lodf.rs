//! Line Outage Distribution Factors, grounded in `linear_analysis.py`'s
//! `make_lodf`.

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

const NUMERICAL_ZERO: f64 = 1e-10;
const LODF_CLIP: f64 = 1.2;

/// `H = PTDF · (Cf − Ct)ᵀ`; `LODF[m,c] = H[m,c] / (1 − H[c,c])` for `c ≠
/// m`, diagonal forced to `−1`. Columns whose `1 − H[c,c]` falls at or
/// below `1e-10` (the branch is its own antenna) are zeroed instead of
/// divided by a near-zero denominator. `correct_values` additionally
/// clips any `|LODF| > 1.2` entry to zero.
#[allow(non_snake_case)]
pub fn make_lodf(ptdf: &DMatrix<f64>, cf: &CscMatrix<Complex64>, ct: &CscMatrix<Complex64>, correct_values: bool) -> DMatrix<f64> {
    let n_branch = ptdf.nrows();
    let cf_dense = cf.to_dense();
    let ct_dense = ct.to_dense();
    let incidence = DMatrix::from_fn(n_branch, ptdf.ncols(), |i, j| cf_dense[(i, j)].re - ct_dense[(i, j)].re);

    let h = ptdf * incidence.transpose();

    let mut lodf = DMatrix::<f64>::zeros(n_branch, n_branch);
    for c in 0..n_branch {
        let denom = 1.0 - h[(c, c)];
        if denom.abs() <= NUMERICAL_ZERO {
            continue;
        }
        for m in 0..n_branch {
            if m == c {
                continue;
            }
            let mut value = h[(m, c)] / denom;
            if correct_values && value.abs() > LODF_CLIP {
                value = 0.0;
            }
            lodf[(m, c)] = value;
        }
    }
    for c in 0..n_branch {
        lodf[(c, c)] = -1.0;
    }

    lodf
}
