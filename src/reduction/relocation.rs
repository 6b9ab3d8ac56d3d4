//! C8 — Generator Relocation + DC Inverse PF Redistribution, grounded in
//! `modified_ward_equivalent.py`'s `build_distance_graph_from_Yeq` /
//! `relocate_generators` / `dc_inverse_pf_redistribution`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use ordered_float::OrderedFloat;

use crate::powerflow::common::submatrix_f64;
use crate::solver::Solve;

const SERIES_ZERO: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    /// Edge weight `|z_eq| = |1/(-Y_ij)|`.
    Ac,
    /// Edge weight `|Im(z_eq)|`.
    Dc,
}

/// Undirected weighted graph over bus positions in whatever `Y`'s numbering
/// is (typically `G2`, the boundary ∪ internal ∪ generator-bus reduction).
#[derive(Debug, Clone)]
pub struct DistanceGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl DistanceGraph {
    fn with_nodes(n: usize) -> Self {
        Self { adjacency: vec![Vec::new(); n] }
    }

    /// Repeated edges keep the minimum weight, matching the source's
    /// `G[a][b]["weight"] = min(...)` on a duplicate `add_edge`.
    fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        match self.adjacency[a].iter_mut().find(|(n, _)| *n == b) {
            Some(e) => e.1 = e.1.min(weight),
            None => self.adjacency[a].push((b, weight)),
        }
        match self.adjacency[b].iter_mut().find(|(n, _)| *n == a) {
            Some(e) => e.1 = e.1.min(weight),
            None => self.adjacency[b].push((a, weight)),
        }
    }

    /// Dijkstra shortest-path distance from `source` to every reachable node.
    pub fn shortest_paths(&self, source: usize) -> HashMap<usize, f64> {
        let mut dist: HashMap<usize, f64> = HashMap::new();
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f64>, usize)>> = BinaryHeap::new();

        dist.insert(source, 0.0);
        heap.push(Reverse((OrderedFloat(0.0), source)));

        while let Some(Reverse((OrderedFloat(d), u))) = heap.pop() {
            if dist.get(&u).is_some_and(|&best| d > best) {
                continue;
            }
            for &(v, w) in &self.adjacency[u] {
                let nd = d + w;
                if dist.get(&v).is_none_or(|&best| nd < best) {
                    dist.insert(v, nd);
                    heap.push(Reverse((OrderedFloat(nd), v)));
                }
            }
        }
        dist
    }
}

/// Builds the electrical-distance graph from a reduced admittance matrix's
/// off-diagonals. Entries at or below `1e-12` are treated as no coupling at
/// all, matching the source's `eps` guard.
pub fn build_distance_graph(y_eq: &CscMatrix<Complex64>, mode: DistanceMode) -> DistanceGraph {
    let n = y_eq.nrows();
    let dense = y_eq.to_dense();
    let mut graph = DistanceGraph::with_nodes(n);

    for i in 0..n {
        for j in 0..i {
            let y_ij = dense[(i, j)];
            if y_ij.norm() <= SERIES_ZERO {
                continue;
            }
            let z = Complex64::new(1.0, 0.0) / (-y_ij);
            let weight = match mode {
                DistanceMode::Ac => z.norm(),
                DistanceMode::Dc => z.im.abs(),
            };
            graph.add_edge(i, j, weight);
        }
    }
    graph
}

/// For each eliminated generator bus, the nearest boundary bus by
/// electrical distance. A generator with no path to any boundary bus (an
/// isolated sub-island) is simply absent from the returned map, not an
/// error — grounded in the source's `except nx.NetworkXNoPath: continue`.
pub fn relocate_generators(graph: &DistanceGraph, generator_positions: &[usize], boundary_positions: &[usize]) -> HashMap<usize, usize> {
    let mut map = HashMap::new();
    if boundary_positions.is_empty() {
        return map;
    }

    for &g in generator_positions {
        let dist = graph.shortest_paths(g);
        let mut best: Option<(usize, f64)> = None;
        for &b in boundary_positions {
            if let Some(&d) = dist.get(&b) {
                if best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((b, d));
                }
            }
        }
        if let Some((b, _)) = best {
            map.insert(g, b);
        }
    }
    map
}

/// `B[i,j] = -1/x_ij` for `i ≠ j` wherever the admittance off-diagonal has a
/// non-negligible series reactance, `B[i,i] = -Σ_j B[i,j]`. Built directly
/// from `Y`'s off-diagonal reactances rather than from a compiled circuit's
/// `Bbus`, since this runs on a reduction sub-circuit without a full
/// [`crate::circuit::NumericalCircuit`] recompile.
fn build_b_from_y(y: &CscMatrix<Complex64>) -> CscMatrix<f64> {
    let n = y.nrows();
    let dense = y.to_dense();
    let mut coo = CooMatrix::new(n, n);
    let mut diag = vec![0.0_f64; n];

    for i in 0..n {
        for j in 0..i {
            let y_ij = dense[(i, j)];
            if y_ij.norm() <= SERIES_ZERO {
                continue;
            }
            let z = Complex64::new(1.0, 0.0) / (-y_ij);
            let x = z.im;
            if x.abs() < SERIES_ZERO {
                continue;
            }
            let val = -1.0 / x;
            coo.push(i, j, val);
            coo.push(j, i, val);
            diag[i] += val;
            diag[j] += val;
        }
    }
    for i in 0..n {
        coo.push(i, i, -diag[i]);
    }
    CscMatrix::from(&coo)
}

/// Solves `B[mask,mask] · theta[mask] = Pinj[mask]` with `theta[slack] = 0`.
fn dc_theta<S: Solve>(b: &CscMatrix<f64>, p_inj: &[f64], slack_idx: usize, solver: &mut S) -> Vec<f64> {
    let n = b.nrows();
    let non_slack: Vec<usize> = (0..n).filter(|&i| i != slack_idx).collect();
    let bnn = submatrix_f64(b, &non_slack, &non_slack);
    let mut rhs: Vec<f64> = non_slack.iter().map(|&i| p_inj[i]).collect();

    let nn = bnn.nrows();
    let (mut ap, mut ai, mut ax) = bnn.disassemble();
    solver
        .solve(&mut ap, &mut ai, &mut ax, &mut rhs, nn)
        .expect("B is nonsingular off the slack row/column");

    let mut theta = vec![0.0_f64; n];
    for (&i, &t) in non_slack.iter().zip(rhs.iter()) {
        theta[i] = t;
    }
    theta
}

/// Boundary loads the reduced grid must carry to reproduce the full
/// network's boundary angles under DC, per `DCInversePF`.
#[derive(Debug, Clone)]
pub struct DcInversePf {
    pub theta_boundary: Vec<f64>,
    pub b_red: CscMatrix<f64>,
    pub p_target: Vec<f64>,
    pub p_gen_assigned: Vec<f64>,
    pub l_new: Vec<f64>,
}

/// Full five-step pipeline from spec §4.8: full-network DC solve, extract
/// boundary angles, reduced-grid target injections, aggregate relocated
/// generator output at each boundary bus, and the boundary loads that
/// reconcile the two. `boundary_idx_full[0]` is used as the full-network DC
/// slack (the source's `slack_y = int(boundary_idx_in_Y[0])`).
#[allow(clippy::too_many_arguments)]
pub fn dc_inverse_pf_redistribution<S: Solve>(
    y_full: &CscMatrix<Complex64>,
    p_inj_full: &[f64],
    boundary_idx_full: &[usize],
    y_eq_g1: &CscMatrix<Complex64>,
    relocation_map: &HashMap<usize, usize>,
    boundary_pos_in_g2: &[usize],
    gen_pos_in_g2: &[usize],
    gen_p_pu: &[f64],
    solver: &mut S,
) -> DcInversePf {
    let b_full = build_b_from_y(y_full);
    let slack = boundary_idx_full[0];
    let theta_full = dc_theta(&b_full, p_inj_full, slack, solver);
    let theta_boundary: Vec<f64> = boundary_idx_full.iter().map(|&i| theta_full[i]).collect();

    let b_red = build_b_from_y(y_eq_g1);
    let p_target = spmv(&b_red, &theta_boundary);

    let boundary_pos_to_idx: HashMap<usize, usize> = boundary_pos_in_g2.iter().enumerate().map(|(i, &pos)| (pos, i)).collect();

    let mut p_gen_assigned = vec![0.0_f64; boundary_idx_full.len()];
    for (&g2_pos, &pg) in gen_pos_in_g2.iter().zip(gen_p_pu) {
        let Some(&b2_pos) = relocation_map.get(&g2_pos) else { continue };
        let Some(&idx) = boundary_pos_to_idx.get(&b2_pos) else { continue };
        p_gen_assigned[idx] += pg;
    }

    let l_new: Vec<f64> = p_gen_assigned.iter().zip(&p_target).map(|(&pg, &pt)| pg - pt).collect();

    DcInversePf { theta_boundary, b_red, p_target, p_gen_assigned, l_new }
}

fn spmv(m: &CscMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; m.nrows()];
    for col in 0..m.ncols() {
        let view = m.col(col);
        for (&row, &val) in view.row_indices().iter().zip(view.values()) {
            out[row] += val * x[col];
        }
    }
    out
}
