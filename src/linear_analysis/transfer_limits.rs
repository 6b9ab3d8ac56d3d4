//! Transfer capacity margins, grounded in `linear_analysis.py`'s
//! `make_transfer_limits`.

use nalgebra::DMatrix;

const PTDF_ZERO: f64 = 1e-9;

/// `TMC[m] = val` where `val = (rate_m − flow_m) / PTDF[m, i]` for whichever
/// bus `i` makes `|val|` largest: the largest-magnitude signed transfer at
/// any bus that keeps branch `m` within its rating, over every bus whose
/// PTDF sensitivity on `m` is non-negligible. The sign is kept rather than
/// discarded — it tells the caller which direction the transfer runs.
pub fn make_transfer_limits(ptdf: &DMatrix<f64>, flows: &[f64], rates: &[f64]) -> Vec<f64> {
    let n_branch = ptdf.nrows();
    let n_bus = ptdf.ncols();
    let mut limits = vec![0.0_f64; n_branch];

    for m in 0..n_branch {
        let headroom = rates[m] - flows[m];
        let mut best = 0.0_f64;
        for i in 0..n_bus {
            let sensitivity = ptdf[(m, i)];
            if sensitivity.abs() <= PTDF_ZERO {
                continue;
            }
            let val = headroom / sensitivity;
            if val.abs() > best.abs() {
                best = val;
            }
        }
        limits[m] = best;
    }

    limits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_sign_of_the_dominant_sensitivity() {
        // Bus 0's sensitivity (2.0) gives |val| = 5; bus 1's (-1.0) gives
        // |val| = 10 and wins. The winning value must come out negative,
        // not its absolute value.
        let ptdf = DMatrix::from_row_slice(1, 2, &[2.0, -1.0]);
        let flows = [0.0];
        let rates = [10.0];

        let limits = make_transfer_limits(&ptdf, &flows, &rates);

        assert_eq!(limits.len(), 1);
        assert!((limits[0] - (-10.0)).abs() < 1e-9, "expected -10, got {}", limits[0]);
    }

    #[test]
    fn ignores_negligible_ptdf_entries() {
        let ptdf = DMatrix::from_row_slice(1, 2, &[1e-12, 2.0]);
        let flows = [0.0];
        let rates = [4.0];

        let limits = make_transfer_limits(&ptdf, &flows, &rates);
        assert!((limits[0] - 2.0).abs() < 1e-9);
    }
}
