//! C3 — Simulation Indices: the bus-type partition every power-flow
//! solver and linear-analysis routine slices its vectors and matrices by.
//!
//! Derived once per compiled circuit (or per island) and reused across an
//! entire solve; none of the solvers mutate a circuit's bus types mid-run
//! except through the explicit PV/PQ switching pass in
//! [`crate::powerflow::switching`], which produces a fresh
//! [`SimulationIndices`] after each switch.

use crate::circuit::{BusType, NumericalCircuit};

/// Zero-based bus index partition by electrical role.
///
/// `pq` also contains [`BusType::NoSlack`] buses: numerically they behave
/// exactly like ordinary PQ buses, the `NoSlack` marking only matters to
/// callers deciding which buses are eligible to be promoted to a reference
/// bus (this crate never performs that promotion itself).
#[derive(Debug, Clone, Default)]
pub struct SimulationIndices {
    pub pq: Vec<usize>,
    pub pv: Vec<usize>,
    pub vd: Vec<usize>,
    pub no_slack: Vec<usize>,
    /// `pv` followed by `pq`, in ascending bus-index order within each
    /// group — the ordering every Newton/LM/FD Jacobian assumes for its
    /// angle block.
    pub pqpv: Vec<usize>,
}

impl SimulationIndices {
    pub fn from_circuit(circuit: &NumericalCircuit) -> Self {
        let mut pq = Vec::new();
        let mut pv = Vec::new();
        let mut vd = Vec::new();
        let mut no_slack = Vec::new();

        for (i, bus) in circuit.bus.iter().enumerate() {
            match bus.bus_type {
                BusType::Pq => pq.push(i),
                BusType::Pv => pv.push(i),
                BusType::Slack => vd.push(i),
                BusType::NoSlack => {
                    pq.push(i);
                    no_slack.push(i);
                }
            }
        }

        let mut pqpv = Vec::with_capacity(pv.len() + pq.len());
        pqpv.extend_from_slice(&pv);
        pqpv.extend_from_slice(&pq);
        pqpv.sort_unstable();

        Self { pq, pv, vd, no_slack, pqpv }
    }

    pub fn n_pq(&self) -> usize {
        self.pq.len()
    }

    pub fn n_pv(&self) -> usize {
        self.pv.len()
    }

    pub fn n_slack(&self) -> usize {
        self.vd.len()
    }

    /// Indices of every non-slack bus, in ascending order. This is the
    /// "no_slack" index set used to slice a full admittance matrix down to
    /// `Bpqpv`/`Bred` for DC and linear-analysis solves — distinct from the
    /// `no_slack` *bus-type* field above, which only tracks buses
    /// explicitly barred from slack promotion.
    pub fn non_slack(&self, n_bus: usize) -> Vec<usize> {
        let is_slack: Vec<bool> = {
            let mut mask = vec![false; n_bus];
            for &i in &self.vd {
                mask[i] = true;
            }
            mask
        };
        (0..n_bus).filter(|&i| !is_slack[i]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{BranchRecord, BusRecord, GeneratorRecord, GridSnapshot, LoadRecord};
    use num_complex::Complex64;

    fn grid() -> GridSnapshot {
        let base = BusRecord {
            v_nom: 110.0,
            v_min: 0.9,
            v_max: 1.1,
            bus_type: BusType::Pq,
            is_dc: false,
            v0: 1.0,
            theta0: 0.0,
            area: 0,
            zone: 0,
        };
        let mut buses = vec![base.clone(); 4];
        buses[0].bus_type = BusType::Slack;
        buses[1].bus_type = BusType::Pv;
        buses[3].bus_type = BusType::NoSlack;

        GridSnapshot {
            buses,
            branches: vec![
                BranchRecord { from: 0, to: 1, ..Default::default() },
                BranchRecord { from: 1, to: 2, ..Default::default() },
                BranchRecord { from: 2, to: 3, ..Default::default() },
            ],
            generators: vec![GeneratorRecord {
                bus_idx: 0,
                p: 0.0,
                v_set: 1.0,
                q_min: -1.0,
                q_max: 1.0,
                p_min: 0.0,
                p_max: 1.0,
                is_slack: true,
                is_controlled: true,
                active: true,
                cost: (0.0, 0.0, 0.0),
                q_fixed: None,
            }],
            loads: vec![LoadRecord { bus_idx: 2, s: Complex64::new(0.0, 0.0), active: true }],
            shunts: vec![],
            contingencies: vec![],
            s_base: 100.0,
            freq_hz: 50.0,
        }
    }

    #[test]
    fn partitions_match_bus_types() {
        let circuit = NumericalCircuit::compile_at(&grid(), 0).unwrap();
        let idx = circuit.simulation_indices();
        assert_eq!(idx.vd, vec![0]);
        assert_eq!(idx.pv, vec![1]);
        assert_eq!(idx.pq, vec![2, 3]);
        assert_eq!(idx.no_slack, vec![3]);
        assert_eq!(idx.pqpv, vec![1, 2, 3]);
    }

    #[test]
    fn non_slack_excludes_only_reference_buses() {
        let circuit = NumericalCircuit::compile_at(&grid(), 0).unwrap();
        let idx = circuit.simulation_indices();
        assert_eq!(idx.non_slack(4), vec![1, 2, 3]);
    }
}
