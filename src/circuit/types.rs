//! Plain data records describing a grid snapshot, as handed to
//! [`super::NumericalCircuit::compile_at`] by an external collaborator
//! (a parser, a GUI, a test). This crate never reads a file; populating
//! these records is entirely the caller's responsibility.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Bus classification. `NoSlack` marks a bus explicitly excluded from ever
/// becoming a reference bus even if every generator on it trips (distinct
/// from plain `PQ`, which is merely a load bus with no controllable
/// injection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    Pq,
    Pv,
    Slack,
    NoSlack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusRecord {
    pub v_nom: f64,
    pub v_min: f64,
    pub v_max: f64,
    pub bus_type: BusType,
    pub is_dc: bool,
    pub v0: f64,
    pub theta0: f64,
    pub area: u32,
    pub zone: u32,
}

/// Winding connection, relevant only to zero/negative sequence assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindingConnection {
    /// Wye-wye, both sides grounded.
    Gg,
    /// Grounded-wye / delta.
    Gd,
    /// Star-delta; treated identically to `Gd` (see DESIGN.md Open Question 4).
    Sd,
    /// Neither side grounded (delta-delta or ungrounded wye); zero-sequence
    /// current is blocked.
    Yy,
}

/// Sequence domain requested from the admittance assembler. Positive
/// sequence is the only domain power-flow/PTDF/Ward machinery in this
/// crate consumes; zero/negative sequence assembly is exposed for callers
/// doing short-circuit analysis on top of this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequenceDomain {
    Zero,
    #[default]
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Uncontrolled,
    /// Transformer tap controls voltage magnitude at a remote/local bus.
    VoltageControl,
    /// VSC controls active power injected at its AC terminal.
    PowerControl,
    /// VSC controls DC-side voltage.
    DcVoltageControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Line,
    Transformer,
    DcLine,
    Vsc,
    Upfc,
    Switch,
}

/// VSC-specific quadratic loss coefficients, `P_loss = a1 + a2|I| + a3|I|^2`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VscLossCoefficients {
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRecord {
    pub from: u32,
    pub to: u32,
    pub kind: BranchKind,
    pub r: f64,
    pub x: f64,
    pub g: f64,
    pub b: f64,
    pub m: f64,
    pub tau: f64,
    pub vtap_f: f64,
    pub vtap_t: f64,
    pub rate: f64,
    pub contingency_rate: f64,
    pub active: bool,
    pub conn: WindingConnection,
    pub control_mode: ControlMode,
    /// VSC switching-loss conductance, folded into `ytt` when `kind == Vsc`.
    pub g_sw: f64,
    /// VSC equivalent shunt susceptance.
    pub b_eq: f64,
    pub vsc_losses: VscLossCoefficients,
}

impl Default for BranchRecord {
    fn default() -> Self {
        Self {
            from: 0,
            to: 0,
            kind: BranchKind::Line,
            r: 0.0,
            x: 1e-6,
            g: 0.0,
            b: 0.0,
            m: 1.0,
            tau: 0.0,
            vtap_f: 1.0,
            vtap_t: 1.0,
            rate: f64::INFINITY,
            contingency_rate: f64::INFINITY,
            active: true,
            conn: WindingConnection::Gg,
            control_mode: ControlMode::Uncontrolled,
            g_sw: 0.0,
            b_eq: 0.0,
            vsc_losses: VscLossCoefficients::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorRecord {
    pub bus_idx: u32,
    pub p: f64,
    pub v_set: f64,
    pub q_min: f64,
    pub q_max: f64,
    pub p_min: f64,
    pub p_max: f64,
    pub is_slack: bool,
    pub is_controlled: bool,
    pub active: bool,
    pub cost: (f64, f64, f64),
    /// Set once a PV bus this generator controls is demoted to PQ by
    /// [`crate::powerflow::switching`]: the reactive power clamped to the
    /// violated limit, in the same units as `p`. `None` while the bus is
    /// still PV and `Q` is being solved for.
    pub q_fixed: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRecord {
    pub bus_idx: u32,
    pub s: Complex64,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuntRecord {
    pub bus_idx: u32,
    pub y: Complex64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContingencyOp {
    /// The device is taken out of service entirely.
    Active,
    /// The device's injection is scaled by the accompanying factor in `[0, 1]`.
    PowerPercentage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContingencyRecord {
    pub idtag: u32,
    pub op: ContingencyOp,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContingencyGroup {
    pub name: String,
    pub members: Vec<ContingencyRecord>,
}

/// Plain-array grid description consumed by [`super::NumericalCircuit::compile_at`].
/// All index fields refer to positions within `buses`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub buses: Vec<BusRecord>,
    pub branches: Vec<BranchRecord>,
    pub generators: Vec<GeneratorRecord>,
    pub loads: Vec<LoadRecord>,
    pub shunts: Vec<ShuntRecord>,
    pub contingencies: Vec<ContingencyGroup>,
    pub s_base: f64,
    pub freq_hz: f64,
}
