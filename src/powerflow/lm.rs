//! Levenberg-Marquardt power flow: the same mismatch/Jacobian machinery as
//! Newton-Raphson, but solving the damped normal equations
//! `(H^T H + lambda I) dx = H^T F` instead of `H dx = F` directly, trading
//! Newton's quadratic convergence for robustness on ill-conditioned or
//! poorly-initialized cases.

use std::f64::consts::PI;

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::error::{Logger, SolverError};
use crate::indices::SimulationIndices;

use super::common::{inf_norm, permute_matrix, permute_vec, solve_order, unpermute_vec};
use super::jacobian::{build_jacobian, dsbus_dv};
use super::{NumericPowerFlowResults, PowerFlowOptions};

#[allow(non_snake_case)]
pub fn solve(
    ybus: &CscMatrix<Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    indices: &SimulationIndices,
    opts: &PowerFlowOptions,
) -> Result<NumericPowerFlowResults, SolverError> {
    let perm = solve_order(indices);
    let npv = indices.pv.len();
    let npq = indices.pq.len();
    let n_ext = indices.vd.len();
    let n_internal = npq + npv;
    let num_state = npv + 2 * npq;

    let ybus_p = permute_matrix(ybus, &perm);
    let sbus_p = DVector::from_vec(permute_vec(s_bus, &perm));
    let mut v = DVector::from_vec(permute_vec(v0, &perm));

    let mut logger = Logger::new();
    let mismatch = |v: &DVector<Complex64>| -> DVector<f64> {
        let mis = v.component_mul(&(&ybus_p * v).map(|c| c.conj())) - &sbus_p;
        let mut f = DVector::zeros(num_state);
        for i in 0..n_internal {
            f[i] = mis[i].re;
        }
        for (k, i) in (npv..n_internal).enumerate() {
            f[n_internal + k] = mis[i].im;
        }
        f
    };

    let mut f = mismatch(&v);
    let mut f_norm = inf_norm(f.as_slice());
    let mut lambda: Option<f64> = None;

    for iter in 0..opts.max_iter {
        if f_norm < opts.tolerance {
            return Ok(finish(&v, &perm, true, iter, f_norm, logger));
        }

        let v_norm = v.map(|e| if e.norm() > 0.0 { e / e.norm() } else { Complex64::new(1.0, 0.0) });
        let (ds_dvm, ds_dva) = dsbus_dv(&ybus_p, &v, &v_norm);
        let jacobian = build_jacobian(&ds_dvm, &ds_dva, npv, n_ext);
        let h = jacobian.to_dense();
        let hth = h.transpose() * &h;

        let lam = *lambda.get_or_insert_with(|| {
            1e-3 * (0..hth.nrows()).map(|i| hth[(i, i)]).fold(0.0_f64, f64::max)
        });

        let rhs = h.transpose() * &f;
        let mut a = hth.clone();
        for i in 0..a.nrows() {
            a[(i, i)] += lam;
        }
        let dx = match a.clone().lu().solve(&rhs) {
            Some(dx) => dx,
            None => return Err(SolverError::Singular),
        };

        let predicted_reduction: f64 = (dx.transpose() * (lam * &dx + &rhs))[(0, 0)];
        let trial_v = apply_step(&v, &dx, n_internal, npv, 1.0);
        let trial_f = mismatch(&trial_v);
        let trial_norm = inf_norm(trial_f.as_slice());
        let actual_reduction = f_norm * f_norm - trial_norm * trial_norm;
        let rho = if predicted_reduction.abs() > 1e-30 { actual_reduction / predicted_reduction } else { -1.0 };

        if rho > 0.0 {
            v = trial_v;
            f = trial_f;
            f_norm = trial_norm;
            let shrink = 1.0 - (2.0 * rho - 1.0).powi(3);
            lambda = Some(lam * shrink.max(1.0 / 3.0));
        } else {
            lambda = Some(lam * 2.0);
            logger.warn(format!("LM step rejected at iteration {iter}, rho={rho:.3e}"));
        }
    }

    Ok(finish(&v, &perm, f_norm < opts.tolerance, opts.max_iter, f_norm, logger))
}

fn apply_step(v: &DVector<Complex64>, dx: &DVector<f64>, n_bus: usize, npv: usize, mu: f64) -> DVector<Complex64> {
    let mut v_a = v.map(|e| e.arg());
    let mut v_m = v.map(|e| e.norm());
    for i in 0..n_bus {
        v_a[i] = (v_a[i] - mu * dx[i]).rem_euclid(2.0 * PI);
    }
    for (k, i) in (npv..n_bus).enumerate() {
        v_m[i] -= mu * dx[n_bus + k];
    }
    v_m.zip_map(&v_a, |vm, a| Complex64::from_polar(vm, a))
}

fn finish(
    v: &DVector<Complex64>,
    perm: &[usize],
    converged: bool,
    iterations: usize,
    max_mismatch: f64,
    logger: Logger,
) -> NumericPowerFlowResults {
    NumericPowerFlowResults { voltage: unpermute_vec(v.as_slice(), perm), converged, iterations, max_mismatch, logger }
}
