use std::cell::OnceCell;
use std::collections::HashSet;

use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use crate::error::CompileError;
use crate::indices::SimulationIndices;

use super::types::*;

/// A fully-resolved, array-oriented power-system snapshot ready for
/// admittance assembly and solving. Produced by [`NumericalCircuit::compile_at`]
/// from a caller-supplied [`GridSnapshot`]; never parses anything itself.
///
/// Bus-local indices (`0..n_bus`) are the only indices the rest of this
/// crate works with. `bus_original_index` recovers the index into the
/// `GridSnapshot` that produced this circuit, which matters after
/// [`NumericalCircuit::split_into_islands`] renumbers buses.
pub struct NumericalCircuit {
    pub n_bus: usize,
    pub bus: Vec<BusRecord>,
    pub branch: Vec<BranchRecord>,
    pub generators: Vec<GeneratorRecord>,
    pub loads: Vec<LoadRecord>,
    pub shunts: Vec<ShuntRecord>,
    pub s_base: f64,
    pub freq_hz: f64,
    /// The period this circuit was compiled for. Reserved for callers that
    /// maintain multi-period injection profiles outside this crate and
    /// re-invoke `compile_at` once per period; this crate treats every
    /// compiled circuit as a single static snapshot regardless of its value.
    pub t_idx: usize,
    pub bus_original_index: Vec<u32>,
    /// Recovers the index into the pre-split circuit's `branch` array that
    /// produced each of this circuit's branches. Identity for a freshly
    /// compiled circuit; remapped by [`NumericalCircuit::split_into_islands`].
    pub branch_original_index: Vec<u32>,

    Cf: OnceCell<CscMatrix<Complex64>>,
    Ct: OnceCell<CscMatrix<Complex64>>,
}

impl NumericalCircuit {
    /// Validates and compiles a [`GridSnapshot`] into a [`NumericalCircuit`].
    ///
    /// Validation performed: the grid is non-empty, every branch endpoint
    /// indexes an existing bus, every branch's control mode/kind is
    /// consistent with its endpoints' AC/DC domain, and contingency group
    /// member `idtag`s are unique within their group.
    pub fn compile_at(grid: &GridSnapshot, t_idx: usize) -> Result<NumericalCircuit, CompileError> {
        if grid.buses.is_empty() {
            return Err(CompileError::EmptyNetwork);
        }

        let n_bus = grid.buses.len();
        for (i, br) in grid.branches.iter().enumerate() {
            if br.from as usize >= n_bus || br.to as usize >= n_bus {
                return Err(CompileError::InvalidBranchEndpoint { branch: i });
            }
        }

        for (i, br) in grid.branches.iter().enumerate() {
            let from_dc = grid.buses[br.from as usize].is_dc;
            let to_dc = grid.buses[br.to as usize].is_dc;
            let consistent = match br.kind {
                // A VSC bridges the AC and DC domains; wiring it between
                // two buses of the same domain leaves nothing for it to convert.
                BranchKind::Vsc => from_dc != to_dc,
                // A DC line's own endpoints must both live on the DC side.
                BranchKind::DcLine => from_dc && to_dc,
                // Every other kind is an AC-only device.
                BranchKind::Line | BranchKind::Transformer | BranchKind::Upfc | BranchKind::Switch => {
                    !from_dc && !to_dc
                }
            };
            if !consistent {
                return Err(CompileError::InvalidControl { branch: i });
            }
        }

        for group in &grid.contingencies {
            let mut seen = HashSet::new();
            for member in &group.members {
                if !seen.insert(member.idtag) {
                    return Err(CompileError::DuplicateKey { id: member.idtag });
                }
            }
        }

        Ok(NumericalCircuit {
            n_bus,
            bus: grid.buses.clone(),
            branch: grid.branches.clone(),
            generators: grid.generators.clone(),
            loads: grid.loads.clone(),
            shunts: grid.shunts.clone(),
            s_base: grid.s_base,
            freq_hz: grid.freq_hz,
            t_idx,
            bus_original_index: (0..n_bus as u32).collect(),
            branch_original_index: (0..grid.branches.len() as u32).collect(),
            Cf: OnceCell::new(),
            Ct: OnceCell::new(),
        })
    }

    pub fn n_branch(&self) -> usize {
        self.branch.len()
    }

    /// From-bus incidence matrix, `Cf[k, branch[k].from] = 1`. Built once
    /// and cached; branches are never added or removed from a compiled
    /// circuit, so the pattern can't go stale.
    pub fn cf(&self) -> &CscMatrix<Complex64> {
        self.Cf.get_or_init(|| self.build_incidence(true))
    }

    /// To-bus incidence matrix, `Ct[k, branch[k].to] = 1`.
    pub fn ct(&self) -> &CscMatrix<Complex64> {
        self.Ct.get_or_init(|| self.build_incidence(false))
    }

    fn build_incidence(&self, from_side: bool) -> CscMatrix<Complex64> {
        let n_branch = self.n_branch();
        let mut coo = CooMatrix::new(n_branch, self.n_bus);
        for (k, br) in self.branch.iter().enumerate() {
            let bus = if from_side { br.from } else { br.to };
            coo.push(k, bus as usize, Complex64::new(1.0, 0.0));
        }
        CscMatrix::from(&coo)
    }

    /// Complex bus power injection vector, loads and shunts negative
    /// (consuming) and generators positive (producing), per unit on `s_base`.
    /// Shunt admittance is folded into the admittance matrix diagonal
    /// separately and is *not* represented here.
    pub fn s_bus(&self) -> Vec<Complex64> {
        let mut s = vec![Complex64::new(0.0, 0.0); self.n_bus];
        for load in self.loads.iter().filter(|l| l.active) {
            s[load.bus_idx as usize] -= load.s / self.s_base;
        }
        for gen in self.generators.iter().filter(|g| g.active) {
            let q = gen.q_fixed.unwrap_or(0.0);
            s[gen.bus_idx as usize] += Complex64::new(gen.p, q) / self.s_base;
        }
        s
    }

    pub fn simulation_indices(&self) -> SimulationIndices {
        SimulationIndices::from_circuit(self)
    }

    /// Splits this circuit into its connected components over the
    /// *active* branch subgraph, each returned as an independently
    /// solvable [`NumericalCircuit`] with its own `0..n_bus` numbering.
    ///
    /// Islands are ordered by their smallest original bus index, and
    /// within an island buses keep ascending original-index order, so the
    /// split is fully deterministic given the input circuit.
    pub fn split_into_islands(&self) -> Vec<NumericalCircuit> {
        let mut parent: Vec<usize> = (0..self.n_bus).collect();

        fn find(parent: &mut [usize], x: usize) -> usize {
            if parent[x] != x {
                parent[x] = find(parent, parent[x]);
            }
            parent[x]
        }
        fn union(parent: &mut [usize], a: usize, b: usize) {
            let (ra, rb) = (find(parent, a), find(parent, b));
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }

        for br in self.branch.iter().filter(|b| b.active) {
            union(&mut parent, br.from as usize, br.to as usize);
        }

        let roots: Vec<usize> = (0..self.n_bus).map(|i| find(&mut parent, i)).collect();
        let mut island_order: Vec<usize> = {
            let mut seen = HashSet::new();
            roots
                .iter()
                .filter(|r| seen.insert(**r))
                .copied()
                .collect()
        };
        island_order.sort_unstable();

        let mut islands = Vec::with_capacity(island_order.len());
        for root in island_order {
            let mut members: Vec<usize> = (0..self.n_bus).filter(|&i| roots[i] == root).collect();
            members.sort_unstable();

            let mut local_of = vec![usize::MAX; self.n_bus];
            for (local, &orig) in members.iter().enumerate() {
                local_of[orig] = local;
            }

            let bus: Vec<BusRecord> = members.iter().map(|&i| self.bus[i].clone()).collect();
            let bus_original_index: Vec<u32> = members.iter().map(|&i| self.bus_original_index[i]).collect();

            let mut branch: Vec<BranchRecord> = Vec::new();
            let mut branch_original_index: Vec<u32> = Vec::new();
            for (k, br) in self.branch.iter().enumerate() {
                if local_of[br.from as usize] == usize::MAX || local_of[br.to as usize] == usize::MAX {
                    continue;
                }
                if roots[br.from as usize] != root {
                    continue;
                }
                let mut br = br.clone();
                br.from = local_of[br.from as usize] as u32;
                br.to = local_of[br.to as usize] as u32;
                branch.push(br);
                branch_original_index.push(self.branch_original_index[k]);
            }

            let generators = self
                .generators
                .iter()
                .filter(|g| roots[g.bus_idx as usize] == root)
                .map(|g| {
                    let mut g = g.clone();
                    g.bus_idx = local_of[g.bus_idx as usize] as u32;
                    g
                })
                .collect();

            let loads = self
                .loads
                .iter()
                .filter(|l| roots[l.bus_idx as usize] == root)
                .map(|l| {
                    let mut l = l.clone();
                    l.bus_idx = local_of[l.bus_idx as usize] as u32;
                    l
                })
                .collect();

            let shunts = self
                .shunts
                .iter()
                .filter(|s| roots[s.bus_idx as usize] == root)
                .map(|s| {
                    let mut s = s.clone();
                    s.bus_idx = local_of[s.bus_idx as usize] as u32;
                    s
                })
                .collect();

            islands.push(NumericalCircuit {
                n_bus: bus.len(),
                bus,
                branch,
                generators,
                loads,
                shunts,
                s_base: self.s_base,
                freq_hz: self.freq_hz,
                t_idx: self.t_idx,
                bus_original_index,
                branch_original_index,
                Cf: OnceCell::new(),
                Ct: OnceCell::new(),
            });
        }

        islands
    }
}
