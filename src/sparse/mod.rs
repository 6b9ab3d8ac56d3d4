//! Format-agnostic sparse-matrix helpers shared by the admittance assembler,
//! the Jacobian builders, and the linear-analysis block assembly.

pub mod cast;
pub mod conj;
pub mod slice;
pub mod stack;

pub use cast::Cast;
pub use conj::{Conjugate, RealImage};
pub use slice::{slice_csc_matrix, slice_csc_matrix_block};
pub use stack::{csc_hstack, csc_vstack, csr_hstack, csr_vstack};
