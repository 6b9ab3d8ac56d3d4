//! Newton-Raphson power flow with Armijo-style backtracking, grounded on
//! the teacher's `newtonpf.rs`/`dsbus_dv.rs` generalized with a line search:
//! a trial step that doesn't shrink the mismatch norm is retried at a
//! smaller step length instead of being accepted outright.

use std::f64::consts::PI;

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::error::{Logger, SolverError};
use crate::indices::SimulationIndices;
use crate::solver::Solve;

use super::common::{calc_power, inf_norm, permute_matrix, permute_vec, power_mismatch, solve_order, unpermute_vec};
use super::jacobian::{build_jacobian, dsbus_dv};
use super::{NumericPowerFlowResults, PowerFlowOptions};

/// Runs Newton-Raphson to convergence (or exhaustion of `opts.max_iter`)
/// starting from `v0`. `ybus`, `s_bus`, and `v0` are all in the circuit's
/// original bus numbering; the result's `voltage` vector is returned in
/// that same numbering.
#[allow(non_snake_case)]
pub fn solve<S: Solve>(
    ybus: &CscMatrix<Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    indices: &SimulationIndices,
    opts: &PowerFlowOptions,
    solver: &mut S,
) -> Result<NumericPowerFlowResults, SolverError> {
    let perm = solve_order(indices);
    let npv = indices.pv.len();
    let npq = indices.pq.len();
    let n_ext = indices.vd.len();

    let ybus_p = permute_matrix(ybus, &perm);
    let sbus_p = DVector::from_vec(permute_vec(s_bus, &perm));
    let mut v = DVector::from_vec(permute_vec(v0, &perm));
    let mut v_norm = v.map(|e| if e.norm() > 0.0 { e / e.norm() } else { Complex64::new(1.0, 0.0) });

    let n_internal = npq + npv;
    let num_state = npv + 2 * npq;

    let mut logger = Logger::new();
    let mut mis = v.component_mul(&(&ybus_p * &v).map(|c| c.conj())) - &sbus_p;
    let mut f = assemble_f(&mis, n_internal, num_state, npv);
    let mut f_norm = inf_norm(f.as_slice());

    let mut v_m = v.map(|e| e.norm());
    let mut v_a = v.map(|e| e.arg());

    for iter in 0..opts.max_iter {
        if f_norm < opts.tolerance {
            return Ok(converged_result(&v, &perm, iter, f_norm, logger));
        }

        let (ds_dvm, ds_dva) = dsbus_dv(&ybus_p, &v, &v_norm);
        let jacobian = build_jacobian(&ds_dvm, &ds_dva, npv, n_ext);
        let n = jacobian.nrows();
        let (mut ap, mut ai, mut ax) = jacobian.disassemble();
        let mut rhs = f.as_slice().to_vec();
        solver
            .solve(&mut ap, &mut ai, &mut ax, &mut rhs, n)
            .map_err(|_| SolverError::Singular)?;
        let dx = DVector::from_vec(rhs);

        let mut mu = 1.0;
        let mut accepted = false;
        for _retry in 0..10 {
            let (trial_v, trial_v_a, trial_v_m, trial_v_norm) =
                trial_step(&v_a, &v_m, &dx, n_internal, npv, mu);
            let trial_mis = trial_v.component_mul(&(&ybus_p * &trial_v).map(|c| c.conj())) - &sbus_p;
            let trial_f = assemble_f(&trial_mis, n_internal, num_state, npv);
            let trial_norm = inf_norm(trial_f.as_slice());

            if trial_norm < f_norm || mu <= 0.01 {
                v = trial_v;
                v_a = trial_v_a;
                v_m = trial_v_m;
                v_norm = trial_v_norm;
                mis = trial_mis;
                f = trial_f;
                f_norm = trial_norm;
                accepted = true;
                break;
            }
            mu *= opts.acceleration_factor;
        }
        if !accepted {
            logger.warn(format!("backtracking exhausted at iteration {iter}"));
        }
    }

    if f_norm < opts.tolerance {
        return Ok(converged_result(&v, &perm, opts.max_iter, f_norm, logger));
    }

    let voltage = unpermute_vec(v.as_slice(), &perm);
    Ok(NumericPowerFlowResults::diverged(voltage, opts.max_iter, f_norm, logger))
}

fn converged_result(
    v: &DVector<Complex64>,
    perm: &[usize],
    iterations: usize,
    f_norm: f64,
    logger: Logger,
) -> NumericPowerFlowResults {
    NumericPowerFlowResults {
        voltage: unpermute_vec(v.as_slice(), perm),
        converged: true,
        iterations,
        max_mismatch: f_norm,
        logger,
    }
}

#[allow(non_snake_case)]
fn assemble_f(mis: &DVector<Complex64>, n_bus: usize, num_state: usize, npv: usize) -> DVector<f64> {
    let mut f = DVector::zeros(num_state);
    for i in 0..n_bus {
        f[i] = mis[i].re;
    }
    for (k, i) in (npv..n_bus).enumerate() {
        f[n_bus + k] = mis[i].im;
    }
    f
}

#[allow(clippy::too_many_arguments)]
fn trial_step(
    v_a: &DVector<f64>,
    v_m: &DVector<f64>,
    dx: &DVector<f64>,
    n_bus: usize,
    npv: usize,
    mu: f64,
) -> (DVector<Complex64>, DVector<f64>, DVector<f64>, DVector<Complex64>) {
    let mut v_a = v_a.clone();
    let mut v_m = v_m.clone();

    for i in 0..n_bus {
        v_a[i] = (v_a[i] - mu * dx[i]).rem_euclid(2.0 * PI);
    }
    for (k, i) in (npv..n_bus).enumerate() {
        v_m[i] -= mu * dx[n_bus + k];
    }

    let v_norm = v_a.map(|a| Complex64::from_polar(1.0, a));
    let v = v_m.zip_map(&v_norm, |vm, e| vm * e);
    (v, v_a, v_m, v_norm)
}

/// Computes the post-solve complex power injection at every bus, useful
/// for recovering slack/PV reactive output after convergence.
pub fn solved_power(ybus: &CscMatrix<Complex64>, v: &[Complex64]) -> Vec<Complex64> {
    calc_power(ybus, v)
}
