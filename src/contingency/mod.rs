//! C6 — Contingency Composer, grounded in `linear_analysis.py`'s
//! `ContingencyIndices` / `LinearMultiContingency` / `LinearMultiContingencies`.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::circuit::{ContingencyGroup, ContingencyOp, NumericalCircuit};
use crate::error::Logger;

const SPARSIFY_THRESHOLD: f64 = 1e-4;
const PSEUDO_INVERSE_EPS: f64 = 1e-10;

/// Resolved member indices for one [`ContingencyGroup`]. Device `idtag`s in
/// this crate are direct positions in the compiled circuit's `branch`/
/// `generators` arrays, so resolution is a bounds check rather than a name
/// lookup — an idtag past the end of its array is non-fatal, logged and
/// dropped (the member contributes nothing to its group).
#[derive(Debug, Clone, Default)]
pub struct ContingencyIndices {
    pub branch_indices: Vec<usize>,
    pub bus_indices: Vec<usize>,
    pub injection_factors: Vec<f64>,
}

impl ContingencyIndices {
    pub fn resolve(group: &ContingencyGroup, circuit: &NumericalCircuit, logger: &mut Logger) -> Self {
        let mut out = ContingencyIndices::default();
        for member in &group.members {
            match member.op {
                ContingencyOp::Active => {
                    let idx = member.idtag as usize;
                    if idx < circuit.n_branch() {
                        out.branch_indices.push(idx);
                    } else {
                        logger.warn(format!("contingency group '{}': branch idtag {} not found", group.name, member.idtag));
                    }
                }
                ContingencyOp::PowerPercentage => {
                    let idx = member.idtag as usize;
                    if idx < circuit.generators.len() {
                        out.bus_indices.push(circuit.generators[idx].bus_idx as usize);
                        out.injection_factors.push(member.value);
                    } else {
                        logger.warn(format!("contingency group '{}': generator idtag {} not found", group.name, member.idtag));
                    }
                }
            }
        }
        out
    }
}

/// One composed N-k event: sparse MLODF / compensated-PTDF factors plus the
/// index sets and injection scaling they apply to, ready for repeated
/// [`Self::contingency_flow`] queries against different base flows.
#[derive(Debug, Clone)]
pub struct LinearMultiContingency {
    pub branch_indices: Vec<usize>,
    pub bus_indices: Vec<usize>,
    pub injection_factors: Vec<f64>,
    pub mlodf: CscMatrix<f64>,
    pub compensated_ptdf: CscMatrix<f64>,
}

impl LinearMultiContingency {
    /// `f = base_flow + MLODF · base_flow[β_δ] + Compensated · (inj_factor ⊙ injections[β_i])`.
    pub fn contingency_flow(&self, base_flow: &[f64], injections: &[f64]) -> Vec<f64> {
        let mut flow = base_flow.to_vec();

        if !self.branch_indices.is_empty() {
            let outaged: Vec<f64> = self.branch_indices.iter().map(|&k| base_flow[k]).collect();
            let outaged = nalgebra::DVector::from_vec(outaged);
            let delta = &self.mlodf * &outaged;
            for (f, d) in flow.iter_mut().zip(delta.iter()) {
                *f += d;
            }
        }

        if !self.bus_indices.is_empty() {
            let delta_inj: Vec<f64> = self
                .bus_indices
                .iter()
                .zip(&self.injection_factors)
                .map(|(&i, &factor)| factor * injections[i])
                .collect();
            let delta_inj = nalgebra::DVector::from_vec(delta_inj);
            let delta = &self.compensated_ptdf * &delta_inj;
            for (f, d) in flow.iter_mut().zip(delta.iter()) {
                *f += d;
            }
        }

        flow
    }
}

/// Builds one [`LinearMultiContingency`] per [`ContingencyGroup`], dispatch
/// on `len(branch_indices)`: 0 (injection-only), 1 (direct LODF column,
/// no Schur solve), >1 (full Schur complement `M = I − LODF[β,β]`).
pub struct LinearMultiContingencies {
    pub indices: Vec<ContingencyIndices>,
    pub multi_contingencies: Vec<LinearMultiContingency>,
}

impl LinearMultiContingencies {
    pub fn compute(groups: &[ContingencyGroup], circuit: &NumericalCircuit, lodf: &DMatrix<f64>, ptdf: &DMatrix<f64>, logger: &mut Logger) -> Self {
        let n_branch = lodf.nrows();
        let indices: Vec<ContingencyIndices> = groups.iter().map(|g| ContingencyIndices::resolve(g, circuit, logger)).collect();
        let multi_contingencies = indices.iter().map(|ci| Self::compose(ci, n_branch, lodf, ptdf, logger)).collect();
        Self { indices, multi_contingencies }
    }

    fn compose(ci: &ContingencyIndices, n_branch: usize, lodf: &DMatrix<f64>, ptdf: &DMatrix<f64>, logger: &mut Logger) -> LinearMultiContingency {
        let beta = &ci.branch_indices;
        let bus = &ci.bus_indices;

        let mlodf_dense = match beta.len() {
            0 => DMatrix::<f64>::zeros(n_branch, 0),
            1 => lodf.select_columns(beta.iter()),
            _ => {
                let l = lodf.select_columns(beta.iter());
                let mut m = DMatrix::<f64>::identity(beta.len(), beta.len());
                for (i, &bi) in beta.iter().enumerate() {
                    for (j, &bj) in beta.iter().enumerate() {
                        if i != j {
                            m[(i, j)] = -lodf[(bi, bj)];
                        }
                    }
                }
                match m.clone().try_inverse() {
                    Some(m_inv) => l * m_inv,
                    None => {
                        logger.warn("antenna contingency: M singular, falling back to pseudo-inverse");
                        match m.pseudo_inverse(PSEUDO_INVERSE_EPS) {
                            Ok(m_pinv) => l * m_pinv,
                            Err(_) => DMatrix::<f64>::zeros(n_branch, beta.len()),
                        }
                    }
                }
            }
        };

        let compensated_dense = if bus.is_empty() {
            DMatrix::<f64>::zeros(n_branch, 0)
        } else if beta.is_empty() {
            ptdf.select_columns(bus.iter())
        } else {
            let ptdf_k_i = ptdf.select_columns(bus.iter());
            let ptdf_bd_i = DMatrix::from_fn(beta.len(), bus.len(), |i, j| ptdf[(beta[i], bus[j])]);
            &mlodf_dense * ptdf_bd_i + ptdf_k_i
        };

        LinearMultiContingency {
            branch_indices: beta.clone(),
            bus_indices: bus.clone(),
            injection_factors: ci.injection_factors.clone(),
            mlodf: sparsify_dense(&mlodf_dense),
            compensated_ptdf: sparsify_dense(&compensated_dense),
        }
    }
}

fn sparsify_dense(dense: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(dense.nrows(), dense.ncols());
    for j in 0..dense.ncols() {
        for i in 0..dense.nrows() {
            let v = dense[(i, j)];
            if v.abs() > SPARSIFY_THRESHOLD {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{BranchRecord, BusRecord, BusType, ContingencyOp, ContingencyRecord, GeneratorRecord, GridSnapshot, LoadRecord};
    use crate::solver::DefaultSolver;
    use num_complex::Complex64;

    fn meshed_grid() -> GridSnapshot {
        let mut bus = BusRecord {
            v_nom: 110.0, v_min: 0.9, v_max: 1.1, bus_type: BusType::Pq,
            is_dc: false, v0: 1.0, theta0: 0.0, area: 0, zone: 0,
        };
        let mut buses = vec![bus.clone(); 4];
        buses[0].bus_type = BusType::Slack;
        bus.bus_type = BusType::Pv;
        buses[1] = bus;

        GridSnapshot {
            buses,
            branches: vec![
                BranchRecord { from: 0, to: 1, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 1, to: 2, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 2, to: 3, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 3, to: 0, r: 0.0, x: 0.05, ..Default::default() },
                BranchRecord { from: 0, to: 2, r: 0.0, x: 0.08, ..Default::default() },
            ],
            generators: vec![GeneratorRecord {
                bus_idx: 0, p: 0.0, v_set: 1.0, q_min: -1.0, q_max: 1.0,
                p_min: 0.0, p_max: 1.0, is_slack: true, is_controlled: true,
                active: true, cost: (0.0, 0.0, 0.0), q_fixed: None,
            }],
            loads: vec![LoadRecord { bus_idx: 2, s: Complex64::new(0.5, 0.2), active: true }],
            shunts: vec![],
            contingencies: vec![],
            s_base: 100.0,
            freq_hz: 50.0,
        }
    }

    #[test]
    fn single_branch_contingency_matches_direct_lodf_column() {
        let grid = meshed_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let mut solver = DefaultSolver::default();
        let (linear, log) = crate::linear_analysis::run(&circuit, false, false, &mut solver);
        assert!(log.is_empty());

        let group = ContingencyGroup {
            name: "outage-0".to_string(),
            members: vec![ContingencyRecord { idtag: 0, op: ContingencyOp::Active, value: 0.0 }],
        };

        let mut logger = Logger::new();
        let mc = LinearMultiContingencies::compute(&[group], &circuit, &linear.lodf, &linear.ptdf, &mut logger);
        assert!(logger.is_empty());
        assert_eq!(mc.multi_contingencies.len(), 1);

        let base_flow = vec![1.0, 0.5, -0.2, 0.3, 0.1];
        let flow = mc.multi_contingencies[0].contingency_flow(&base_flow, &[]);
        for k in 0..base_flow.len() {
            let expected = base_flow[k] + linear.lodf[(k, 0)] * base_flow[0];
            assert!((flow[k] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn unresolvable_idtag_is_non_fatal() {
        let grid = meshed_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let mut solver = DefaultSolver::default();
        let (linear, _) = crate::linear_analysis::run(&circuit, false, false, &mut solver);

        let group = ContingencyGroup {
            name: "bogus".to_string(),
            members: vec![ContingencyRecord { idtag: 999, op: ContingencyOp::Active, value: 0.0 }],
        };

        let mut logger = Logger::new();
        let mc = LinearMultiContingencies::compute(&[group], &circuit, &linear.lodf, &linear.ptdf, &mut logger);
        assert!(!logger.is_empty());
        assert!(mc.multi_contingencies[0].branch_indices.is_empty());

        let base_flow = vec![1.0; circuit.n_branch()];
        let flow = mc.multi_contingencies[0].contingency_flow(&base_flow, &[]);
        assert_eq!(flow, base_flow);
    }

    #[test]
    fn double_branch_contingency_produces_finite_flows() {
        let grid = meshed_grid();
        let circuit = NumericalCircuit::compile_at(&grid, 0).unwrap();
        let mut solver = DefaultSolver::default();
        let (linear, _) = crate::linear_analysis::run(&circuit, false, false, &mut solver);

        let group = ContingencyGroup {
            name: "double-outage".to_string(),
            members: vec![
                ContingencyRecord { idtag: 0, op: ContingencyOp::Active, value: 0.0 },
                ContingencyRecord { idtag: 4, op: ContingencyOp::Active, value: 0.0 },
            ],
        };

        let mut logger = Logger::new();
        let mc = LinearMultiContingencies::compute(&[group], &circuit, &linear.lodf, &linear.ptdf, &mut logger);
        let base_flow = vec![1.0, 0.5, -0.2, 0.3, 0.1];
        let flow = mc.multi_contingencies[0].contingency_flow(&base_flow, &[]);
        assert!(flow.iter().all(|v| v.is_finite()));
    }
}
