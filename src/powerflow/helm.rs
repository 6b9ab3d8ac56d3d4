//! C4.4.4 — Holomorphic Embedding power flow (HELM), grounded directly on
//! `helm_power_flow.py`'s `helm_coefficients_josep` coefficient recurrence
//! and its `pade4all`/`epsilon` summation routines.
//!
//! Only single-slack islands are supported (§9 Open Question 3's
//! documented decision: the source itself warns "sigma values may not be
//! correct" for multiple slacks, and this crate never computes sigma, but
//! the recurrence's `Yslack` reduction assumes exactly one reference bus).

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::admittance::SeriesAdmittanceMatrices;
use crate::error::{Logger, SolverError};
use crate::indices::SimulationIndices;

use super::common::{calc_power, inf_norm, power_mismatch};
use super::{NumericPowerFlowResults, PowerFlowOptions};

fn dense_block(m: &CscMatrix<Complex64>, rows: &[usize], cols: &[usize]) -> DMatrix<Complex64> {
    let dense = m.to_dense();
    DMatrix::from_fn(rows.len(), cols.len(), |i, j| dense[(rows[i], cols[j])])
}

/// The real system matrix `[[G,-B,Xim],[B,G,Xre],[Vre,Vim,0]]` every
/// coefficient order solves against, factorized once (`helm_josep`
/// factorizes `MAT` a single time via `factorized(MAT)` and reuses it for
/// every right-hand side).
struct HelmSystem {
    lu: nalgebra::linalg::LU<f64, nalgebra::Dyn, nalgebra::Dyn>,
    npqpv: usize,
    npv: usize,
}

impl HelmSystem {
    fn build(yred: &DMatrix<Complex64>, u0: &DVector<Complex64>, x0: &DVector<Complex64>, pv_pos: &[usize]) -> Self {
        let npqpv = yred.nrows();
        let npv = pv_pos.len();
        let n = 2 * npqpv + npv;
        let mut mat = DMatrix::<f64>::zeros(n, n);

        for i in 0..npqpv {
            for j in 0..npqpv {
                let y = yred[(i, j)];
                mat[(i, j)] = y.re;
                mat[(i, npqpv + j)] = -y.im;
                mat[(npqpv + i, j)] = y.im;
                mat[(npqpv + i, npqpv + j)] = y.re;
            }
        }
        for (k, &p) in pv_pos.iter().enumerate() {
            mat[(p, 2 * npqpv + k)] = -x0[p].im;
            mat[(npqpv + p, 2 * npqpv + k)] = x0[p].re;
            mat[(2 * npqpv + k, p)] = 2.0 * u0[p].re;
            mat[(2 * npqpv + k, npqpv + p)] = 2.0 * u0[p].im;
        }

        Self { lu: mat.lu(), npqpv, npv }
    }

    fn solve(&self, rhs: DVector<f64>) -> Option<(DVector<Complex64>, DVector<f64>)> {
        let lhs = self.lu.solve(&rhs)?;
        let u = DVector::from_fn(self.npqpv, |i, _| Complex64::new(lhs[i], lhs[self.npqpv + i]));
        let q = DVector::from_fn(self.npv, |i, _| lhs[2 * self.npqpv + i]);
        Some((u, q))
    }
}

/// Diagonal Padé `[L/M]`, `L=M=⌊order/2⌋`, evaluated at the physical
/// embedding point `s=1` — mirrors `pade4all` specialized to `s=1`, which
/// collapses every `s^i` power to `1`.
fn pade_at_one(coeffs: &[Complex64]) -> Option<Complex64> {
    let order = coeffs.len() - 1;
    let l = order / 2;
    if l == 0 {
        return Some(coeffs.iter().copied().sum());
    }

    let rhs = DVector::from_iterator(l, (0..l).map(|i| coeffs[l + 1 + i]));
    let c = DMatrix::from_fn(l, l, |i, j| coeffs[i + 1 + j]);
    let x = c.lu().solve(&(-rhs))?;

    let mut b = vec![Complex64::new(0.0, 0.0); l + 1];
    b[0] = Complex64::new(1.0, 0.0);
    for i in 0..l {
        b[i + 1] = x[l - 1 - i];
    }

    let mut a = vec![Complex64::new(0.0, 0.0); l + 1];
    a[0] = coeffs[0];
    for i in 0..l {
        let k = i + 1;
        let mut val = Complex64::new(0.0, 0.0);
        for j in 0..=k {
            val += coeffs[k - j] * b[j];
        }
        a[i + 1] = val;
    }

    let p: Complex64 = a.iter().copied().sum();
    let q: Complex64 = b.iter().copied().sum();
    if q.norm() < 1e-14 {
        None
    } else {
        Some(p / q)
    }
}

/// Wynn's epsilon algorithm applied to the sequence of partial sums,
/// ported directly from the recursive form in `epsilon` (Weniger 1989).
fn wynn_epsilon(partial_sums: &[Complex64]) -> Complex64 {
    let tiny = f64::MIN_POSITIVE;
    let huge = f64::MAX;
    let mut e = vec![Complex64::new(0.0, 0.0); partial_sums.len()];
    let mut estim = partial_sums[0];

    for n in 0..partial_sums.len() {
        e[n] = partial_sums[n];
        if n == 0 {
            estim = partial_sums[0];
            continue;
        }
        let mut aux2 = Complex64::new(0.0, 0.0);
        for j in (1..=n).rev() {
            let aux1 = aux2;
            aux2 = e[j - 1];
            let mut diff = e[j] - aux2;
            if diff.norm() <= tiny {
                e[j - 1] = Complex64::new(huge, huge);
            } else {
                if diff == Complex64::new(0.0, 0.0) {
                    diff = Complex64::new(tiny, 0.0);
                }
                e[j - 1] = aux1 + Complex64::new(1.0, 0.0) / diff;
            }
        }
        estim = if n % 2 == 0 { e[0] } else { e[1] };
    }
    estim
}

/// Runs the HELM coefficient recurrence and sums it (Padé or Wynn-ε per
/// `opts.use_pade`) to produce a voltage solution.
#[allow(non_snake_case)]
pub fn solve(
    ybus: &CscMatrix<Complex64>,
    series: &SeriesAdmittanceMatrices,
    s_bus: &[Complex64],
    v0: &[Complex64],
    indices: &SimulationIndices,
    opts: &PowerFlowOptions,
) -> Result<NumericPowerFlowResults, SolverError> {
    let mut logger = Logger::new();
    let n_bus = v0.len();

    if indices.vd.len() != 1 {
        logger.error("HELM supports exactly one slack bus per island");
        return Err(SolverError::Singular);
    }
    let sl = indices.vd[0];
    let pqpv = &indices.pqpv;
    let npqpv = pqpv.len();

    if npqpv == 0 {
        return Ok(NumericPowerFlowResults { voltage: v0.to_vec(), converged: true, iterations: 0, max_mismatch: 0.0, logger });
    }

    let mut pos_of = vec![usize::MAX; n_bus];
    for (k, &b) in pqpv.iter().enumerate() {
        pos_of[b] = k;
    }
    let pv_pos: Vec<usize> = indices.pv.iter().map(|&b| pos_of[b]).collect();
    let pq_pos: Vec<usize> = indices.pq.iter().map(|&b| pos_of[b]).collect();

    let p_vec: Vec<f64> = pqpv.iter().map(|&b| s_bus[b].re).collect();
    let q_vec: Vec<f64> = pqpv.iter().map(|&b| s_bus[b].im).collect();
    let ysh: Vec<Complex64> = pqpv.iter().map(|&b| series.yshunt[b]).collect();
    let vset2: Vec<f64> = pqpv.iter().map(|&b| v0[b].norm() * v0[b].norm()).collect();

    let yred = dense_block(&series.yseries, pqpv, pqpv);
    let yslack_col: Vec<Complex64> = dense_block(&series.yseries, pqpv, &[sl]).column(0).iter().map(|y| -*y).collect();

    let yred_lu = yred.clone().lu();
    let rhs0 = DVector::from_column_slice(&yslack_col);
    let u0 = yred_lu.solve(&rhs0).ok_or(SolverError::Singular)?;
    let x0: DVector<Complex64> = DVector::from_fn(npqpv, |i, _| Complex64::new(1.0, 0.0) / u0[i].conj());

    let system = HelmSystem::build(&yred, &u0, &x0, &pv_pos);

    let mut u: Vec<DVector<Complex64>> = vec![u0.clone()];
    let mut x: Vec<DVector<Complex64>> = vec![x0.clone()];
    let mut q: Vec<DVector<f64>> = Vec::new();

    let vslack_delta = v0[sl] - Complex64::new(1.0, 0.0);
    let mut valor = DVector::<Complex64>::zeros(npqpv);
    for &i in &pq_pos {
        valor[i] = yslack_col[i] * vslack_delta + Complex64::new(p_vec[i], -q_vec[i]) * x0[i] - u0[i] * ysh[i];
    }
    for &i in &pv_pos {
        valor[i] = yslack_col[i] * vslack_delta + p_vec[i] * x0[i] - u0[i] * ysh[i];
    }

    let mut rhs = DVector::<f64>::zeros(2 * npqpv + pv_pos.len());
    for i in 0..npqpv {
        rhs[i] = valor[i].re;
        rhs[npqpv + i] = valor[i].im;
    }
    for (k, &i) in pv_pos.iter().enumerate() {
        rhs[2 * npqpv + k] = vset2[i] - (u0[i] * u0[i]).re;
    }
    let (u1, q0) = system.solve(rhs).ok_or(SolverError::Singular)?;
    let x1: DVector<Complex64> = DVector::from_fn(npqpv, |i, _| -x0[i] * u1[i].conj() / u0[i].conj());

    let mut q0_full = DVector::<f64>::zeros(npqpv);
    for (k, &i) in pv_pos.iter().enumerate() {
        q0_full[i] = q0[k];
    }
    q.push(q0_full);
    u.push(u1);
    x.push(x1);

    let mut overflow = false;
    let mut last_finite_order = 1;

    let mut c = 2usize;
    while c <= opts.max_coeff {
        let mut valor = DVector::<Complex64>::zeros(npqpv);
        for &i in &pq_pos {
            valor[i] = Complex64::new(p_vec[i], -q_vec[i]) * x[c - 1][i] - u[c - 1][i] * ysh[i];
        }
        for &i in &pv_pos {
            let mut conv2 = Complex64::new(0.0, 0.0);
            for k in 1..c {
                conv2 += x[k][i] * q[c - 1 - k][i];
            }
            valor[i] = Complex64::new(0.0, -1.0) * conv2 - u[c - 1][i] * ysh[i] + x[c - 1][i] * p_vec[i];
        }

        let mut rhs = DVector::<f64>::zeros(2 * npqpv + pv_pos.len());
        for i in 0..npqpv {
            rhs[i] = valor[i].re;
            rhs[npqpv + i] = valor[i].im;
        }
        for (k, &i) in pv_pos.iter().enumerate() {
            let mut conv3 = Complex64::new(0.0, 0.0);
            for kk in 1..c {
                conv3 += u[kk][i] * u[c - kk][i].conj();
            }
            rhs[2 * npqpv + k] = -conv3.re;
        }

        let Some((uc, qc)) = system.solve(rhs) else {
            logger.warn(format!("HELM system solve failed at order {c}, truncating series"));
            break;
        };

        let mut q_full = DVector::<f64>::zeros(npqpv);
        for (k, &i) in pv_pos.iter().enumerate() {
            q_full[i] = qc[k];
        }

        u.push(uc);
        q.push(q_full);

        let xc: DVector<Complex64> = DVector::from_fn(npqpv, |i, _| {
            let mut s = Complex64::new(0.0, 0.0);
            for k in 1..=c {
                s += u[k][i].conj() * x[c - k][i];
            }
            -s / u[0][i].conj()
        });
        x.push(xc);

        let partial_max_re = pqpv
            .iter()
            .enumerate()
            .map(|(i, _)| u[0..=c].iter().map(|uc| uc[i].re).sum::<f64>())
            .fold(f64::NEG_INFINITY, f64::max);

        if !partial_max_re.is_finite() || partial_max_re >= 10.0 {
            overflow = true;
            logger.warn(format!("HELM coefficient magnitude exceeded threshold at order {c}"));
            break;
        }
        last_finite_order = c;

        let mut v_full = v0.to_vec();
        for (k, &bus) in pqpv.iter().enumerate() {
            v_full[bus] = u[0..=c].iter().map(|uc| uc[k]).sum();
        }
        let s_calc = calc_power(ybus, &v_full);
        let f = power_mismatch(&s_calc, s_bus, &indices.pv, &indices.pq);
        let norm_f = inf_norm(&f);

        if norm_f < opts.tolerance && c % 2 == 1 {
            return Ok(NumericPowerFlowResults { voltage: v_full, converged: true, iterations: c, max_mismatch: norm_f, logger });
        }

        c += 1;
    }

    let order = last_finite_order;
    let mut v_full = v0.to_vec();
    for (k, &bus) in pqpv.iter().enumerate() {
        let series_coeffs: Vec<Complex64> = u[0..=order].iter().map(|uc| uc[k]).collect();
        let summed = if opts.use_pade {
            pade_at_one(&series_coeffs).unwrap_or_else(|| series_coeffs.iter().copied().sum())
        } else {
            let mut running = Complex64::new(0.0, 0.0);
            let partials: Vec<Complex64> = series_coeffs
                .iter()
                .map(|c| {
                    running += c;
                    running
                })
                .collect();
            wynn_epsilon(&partials)
        };
        v_full[bus] = summed;
    }

    let s_calc = calc_power(ybus, &v_full);
    let f = power_mismatch(&s_calc, s_bus, &indices.pv, &indices.pq);
    let norm_f = inf_norm(&f);

    if overflow {
        return Ok(NumericPowerFlowResults { voltage: v_full, converged: norm_f < opts.tolerance, iterations: order, max_mismatch: norm_f, logger });
    }

    Ok(NumericPowerFlowResults { voltage: v_full, converged: norm_f < opts.tolerance, iterations: order, max_mismatch: norm_f, logger })
}

/// Base-case state reusable across many admittance-delta re-solves without
/// refactorizing the system matrix, grounded on `helm_preparation_dY`: a
/// topology change (e.g. a branch outage under contingency analysis) is
/// injected as an extra current term in the coefficient recurrence rather
/// than by rebuilding `MAT`.
pub struct HelmPreparation {
    system: HelmSystem,
    yred: DMatrix<Complex64>,
    yslack_col: Vec<Complex64>,
    pq_pos: Vec<usize>,
    pv_pos: Vec<usize>,
    ysh: Vec<Complex64>,
    p_vec: Vec<f64>,
    q_vec: Vec<f64>,
    vset2: Vec<f64>,
    pqpv: Vec<usize>,
}

impl HelmPreparation {
    /// Factorizes the base-case `MAT` once, mirroring `helm_preparation_dY`.
    pub fn build(
        series: &SeriesAdmittanceMatrices,
        s_bus: &[Complex64],
        v0: &[Complex64],
        indices: &SimulationIndices,
    ) -> Result<Self, SolverError> {
        let n_bus = v0.len();
        if indices.vd.len() != 1 {
            return Err(SolverError::Singular);
        }
        let sl = indices.vd[0];
        let pqpv = indices.pqpv.clone();
        let npqpv = pqpv.len();
        if npqpv == 0 {
            return Err(SolverError::Singular);
        }

        let mut pos_of = vec![usize::MAX; n_bus];
        for (k, &b) in pqpv.iter().enumerate() {
            pos_of[b] = k;
        }
        let pv_pos: Vec<usize> = indices.pv.iter().map(|&b| pos_of[b]).collect();
        let pq_pos: Vec<usize> = indices.pq.iter().map(|&b| pos_of[b]).collect();

        let p_vec: Vec<f64> = pqpv.iter().map(|&b| s_bus[b].re).collect();
        let q_vec: Vec<f64> = pqpv.iter().map(|&b| s_bus[b].im).collect();
        let ysh: Vec<Complex64> = pqpv.iter().map(|&b| series.yshunt[b]).collect();
        let vset2: Vec<f64> = pqpv.iter().map(|&b| v0[b].norm() * v0[b].norm()).collect();

        let yred = dense_block(&series.yseries, &pqpv, &pqpv);
        let yslack_col: Vec<Complex64> = dense_block(&series.yseries, &pqpv, &[sl]).column(0).iter().map(|y| -*y).collect();

        let yred_lu = yred.clone().lu();
        let rhs0 = DVector::from_column_slice(&yslack_col);
        let u0 = yred_lu.solve(&rhs0).ok_or(SolverError::Singular)?;
        let x0: DVector<Complex64> = DVector::from_fn(npqpv, |i, _| Complex64::new(1.0, 0.0) / u0[i].conj());
        let system = HelmSystem::build(&yred, &u0, &x0, &pv_pos);

        Ok(Self { system, yred, yslack_col, pq_pos, pv_pos, ysh, p_vec, q_vec, vset2, pqpv })
    }
}

/// Re-runs the HELM coefficient recurrence against `prep`'s base case with
/// an additional admittance delta `dy` (dense, indexed by position within
/// `pqpv`, zero where topology is unchanged), grounded on
/// `helm_coefficients_dY`: order 0 solves the directly-perturbed reduced
/// system once (cheap — one extra dense solve), and every order `c >= 1`
/// reuses `prep`'s factorized `MAT` with the perturbation folded in as a
/// compensating current `-dy @ u[c]`, since `dy` carries no series order
/// of its own and so scales every coefficient identically.
#[allow(non_snake_case)]
pub fn helm_coefficients_dy(
    prep: &HelmPreparation,
    dy: &DMatrix<Complex64>,
    ybus: &CscMatrix<Complex64>,
    s_bus: &[Complex64],
    v0: &[Complex64],
    indices: &SimulationIndices,
    opts: &PowerFlowOptions,
) -> Result<NumericPowerFlowResults, SolverError> {
    let mut logger = Logger::new();
    let npqpv = prep.pqpv.len();
    let pq_pos = &prep.pq_pos;
    let pv_pos = &prep.pv_pos;

    let yred_pert = &prep.yred + dy;
    let u0 = yred_pert
        .clone()
        .lu()
        .solve(&DVector::from_column_slice(&prep.yslack_col))
        .ok_or(SolverError::Singular)?;
    let x0: DVector<Complex64> = DVector::from_fn(npqpv, |i, _| Complex64::new(1.0, 0.0) / u0[i].conj());

    let mut u: Vec<DVector<Complex64>> = vec![u0.clone()];
    let mut x: Vec<DVector<Complex64>> = vec![x0.clone()];
    let mut q: Vec<DVector<f64>> = Vec::new();

    let mut valor = DVector::<Complex64>::zeros(npqpv);
    let dy_u0 = dy * &u0;
    for &i in pq_pos {
        valor[i] = Complex64::new(prep.p_vec[i], -prep.q_vec[i]) * x0[i] - u0[i] * prep.ysh[i] - dy_u0[i];
    }
    for &i in pv_pos {
        valor[i] = prep.p_vec[i] * x0[i] - u0[i] * prep.ysh[i] - dy_u0[i];
    }

    let mut rhs = DVector::<f64>::zeros(2 * npqpv + pv_pos.len());
    for i in 0..npqpv {
        rhs[i] = valor[i].re;
        rhs[npqpv + i] = valor[i].im;
    }
    for (k, &i) in pv_pos.iter().enumerate() {
        rhs[2 * npqpv + k] = prep.vset2[i] - (u0[i] * u0[i]).re;
    }
    let (u1, q0) = prep.system.solve(rhs).ok_or(SolverError::Singular)?;
    let x1: DVector<Complex64> = DVector::from_fn(npqpv, |i, _| -x0[i] * u1[i].conj() / u0[i].conj());

    let mut q0_full = DVector::<f64>::zeros(npqpv);
    for (k, &i) in pv_pos.iter().enumerate() {
        q0_full[i] = q0[k];
    }
    q.push(q0_full);
    u.push(u1);
    x.push(x1);

    let mut overflow = false;
    let mut last_finite_order = 1;
    let mut c = 2usize;
    while c <= opts.max_coeff {
        let dy_uprev = dy * &u[c - 1];
        let mut valor = DVector::<Complex64>::zeros(npqpv);
        for &i in pq_pos {
            valor[i] = Complex64::new(prep.p_vec[i], -prep.q_vec[i]) * x[c - 1][i] - u[c - 1][i] * prep.ysh[i] - dy_uprev[i];
        }
        for &i in pv_pos {
            let mut conv2 = Complex64::new(0.0, 0.0);
            for k in 1..c {
                conv2 += x[k][i] * q[c - 1 - k][i];
            }
            valor[i] = Complex64::new(0.0, -1.0) * conv2 - u[c - 1][i] * prep.ysh[i] + x[c - 1][i] * prep.p_vec[i] - dy_uprev[i];
        }

        let mut rhs = DVector::<f64>::zeros(2 * npqpv + pv_pos.len());
        for i in 0..npqpv {
            rhs[i] = valor[i].re;
            rhs[npqpv + i] = valor[i].im;
        }
        for (k, &i) in pv_pos.iter().enumerate() {
            let mut conv3 = Complex64::new(0.0, 0.0);
            for kk in 1..c {
                conv3 += u[kk][i] * u[c - kk][i].conj();
            }
            rhs[2 * npqpv + k] = -conv3.re;
        }

        let Some((uc, qc)) = prep.system.solve(rhs) else {
            logger.warn(format!("incremental HELM system solve failed at order {c}, truncating series"));
            break;
        };

        let mut q_full = DVector::<f64>::zeros(npqpv);
        for (k, &i) in pv_pos.iter().enumerate() {
            q_full[i] = qc[k];
        }
        u.push(uc);
        q.push(q_full);

        let xc: DVector<Complex64> = DVector::from_fn(npqpv, |i, _| {
            let mut s = Complex64::new(0.0, 0.0);
            for k in 1..=c {
                s += u[k][i].conj() * x[c - k][i];
            }
            -s / u[0][i].conj()
        });
        x.push(xc);

        let partial_max_re = (0..npqpv)
            .map(|i| u[0..=c].iter().map(|uc| uc[i].re).sum::<f64>())
            .fold(f64::NEG_INFINITY, f64::max);
        if !partial_max_re.is_finite() || partial_max_re >= 10.0 {
            overflow = true;
            logger.warn(format!("incremental HELM coefficient magnitude exceeded threshold at order {c}"));
            break;
        }
        last_finite_order = c;
        c += 1;
    }

    let order = last_finite_order;
    let mut v_full = v0.to_vec();
    for (k, &bus) in prep.pqpv.iter().enumerate() {
        let series_coeffs: Vec<Complex64> = u[0..=order].iter().map(|uc| uc[k]).collect();
        let summed = if opts.use_pade {
            pade_at_one(&series_coeffs).unwrap_or_else(|| series_coeffs.iter().copied().sum())
        } else {
            let mut running = Complex64::new(0.0, 0.0);
            let partials: Vec<Complex64> = series_coeffs
                .iter()
                .map(|c| {
                    running += c;
                    running
                })
                .collect();
            wynn_epsilon(&partials)
        };
        v_full[bus] = summed;
    }

    let s_calc = calc_power(ybus, &v_full);
    let f = power_mismatch(&s_calc, s_bus, &indices.pv, &indices.pq);
    let norm_f = inf_norm(&f);
    Ok(NumericPowerFlowResults { voltage: v_full, converged: !overflow && norm_f < opts.tolerance, iterations: order, max_mismatch: norm_f, logger })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admittance::AdmittanceMatrices;
    use crate::circuit::{BranchRecord, BusRecord, BusType, GeneratorRecord, GridSnapshot, LoadRecord, NumericalCircuit, SequenceDomain};

    fn two_bus_grid() -> GridSnapshot {
        let slack = BusRecord {
            v_nom: 110.0, v_min: 0.9, v_max: 1.1, bus_type: BusType::Slack,
            is_dc: false, v0: 1.0, theta0: 0.0, area: 0, zone: 0,
        };
        let pq = BusRecord { bus_type: BusType::Pq, ..slack.clone() };
        GridSnapshot {
            buses: vec![slack, pq],
            branches: vec![BranchRecord { from: 0, to: 1, r: 0.01, x: 0.1, ..Default::default() }],
            generators: vec![GeneratorRecord {
                bus_idx: 0, p: 0.0, v_set: 1.0, q_min: -10.0, q_max: 10.0,
                p_min: -10.0, p_max: 10.0, is_slack: true, is_controlled: true,
                active: true, cost: (0.0, 0.0, 0.0), q_fixed: None,
            }],
            loads: vec![LoadRecord { bus_idx: 1, s: Complex64::new(0.2, 0.05), active: true }],
            shunts: vec![],
            contingencies: vec![],
            s_base: 100.0,
            freq_hz: 50.0,
        }
    }

    #[test]
    fn matches_newton_on_a_radial_feeder() {
        let grid = two_bus_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let indices = circuit.simulation_indices();
        let y = AdmittanceMatrices::build(&circuit, SequenceDomain::Positive, false);
        let series = SeriesAdmittanceMatrices::build(&circuit);
        let s_bus = circuit.s_bus();
        let v0 = vec![Complex64::new(1.0, 0.0); circuit.n_bus];

        let helm_result = solve(&y.ybus, &series, &s_bus, &v0, &indices, &PowerFlowOptions::default()).unwrap();

        let mut solver = crate::solver::DefaultSolver::default();
        let nr_result = super::super::newton::solve(&y.ybus, &s_bus, &v0, &indices, &PowerFlowOptions::default(), &mut solver).unwrap();

        assert!(helm_result.converged);
        assert!((helm_result.voltage[1] - nr_result.voltage[1]).norm() < 1e-6);
    }

    #[test]
    fn incremental_helm_with_zero_delta_matches_base_solve() {
        let grid = two_bus_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let indices = circuit.simulation_indices();
        let y = AdmittanceMatrices::build(&circuit, SequenceDomain::Positive, false);
        let series = SeriesAdmittanceMatrices::build(&circuit);
        let s_bus = circuit.s_bus();
        let v0 = vec![Complex64::new(1.0, 0.0); circuit.n_bus];
        let opts = PowerFlowOptions::default();

        let base = solve(&y.ybus, &series, &s_bus, &v0, &indices, &opts).unwrap();

        let prep = HelmPreparation::build(&series, &s_bus, &v0, &indices).unwrap();
        let dy = DMatrix::<Complex64>::zeros(indices.pqpv.len(), indices.pqpv.len());
        let incremental = helm_coefficients_dy(&prep, &dy, &y.ybus, &s_bus, &v0, &indices, &opts).unwrap();

        assert!(incremental.converged);
        assert!((incremental.voltage[1] - base.voltage[1]).norm() < 1e-6);
    }

    #[test]
    fn rejects_multi_slack_islands() {
        let mut grid = two_bus_grid();
        grid.buses[1].bus_type = BusType::Slack;
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let indices = circuit.simulation_indices();
        let y = AdmittanceMatrices::build(&circuit, SequenceDomain::Positive, false);
        let series = SeriesAdmittanceMatrices::build(&circuit);
        let s_bus = circuit.s_bus();
        let v0 = vec![Complex64::new(1.0, 0.0); circuit.n_bus];

        let result = solve(&y.ybus, &series, &s_bus, &v0, &indices, &PowerFlowOptions::default());
        assert_eq!(result.unwrap_err(), SolverError::Singular);
    }
}
