//! C7/C8 — Grid Reduction: Ward equivalencing and the generator
//! relocation + DC inverse power-flow redistribution built on top of it,
//! grounded in `modified_ward_equivalent.py`.

pub mod relocation;
pub mod ward;

pub use relocation::{build_distance_graph, dc_inverse_pf_redistribution, relocate_generators, DcInversePf, DistanceGraph, DistanceMode};
pub use ward::{y_to_equivalents_10x_rule, ward_reduce, EquivBranch, EquivElements, EquivShunt};
