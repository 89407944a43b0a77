//! `qmm-core`: recursive quadtree block decomposition over sparse matrices, with
//! per-leaf index-width narrowing and sparse-accumulator-driven leaf multiply.
//!
//! Most callers only need [`Matrix`], [`multiply`], a [`Semiring`] impl, and [`Config`];
//! the module tree below is public so `qmm-mtx`/`qmm-cli` (and anyone building their own
//! tuple source or semiring) can reach the lower layers directly.

pub mod accumulator;
pub mod block;
pub mod config;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod leaf;
pub mod leafmul;
pub mod matrix;
pub mod multiply;
pub mod node;
pub mod pretty;
pub mod semiring;
pub mod spa;
pub mod subdivide;
pub mod tuple_stream;
pub mod width;

pub use config::Config;
pub use error::{CollectWarnings, IgnoreWarnings, InputWarning, MultiplyError, WarningSink};
pub use geometry::{Index, Shape};
pub use matrix::Matrix;
pub use semiring::{MinPlus, OrAnd, PlusTimes, Semiring};
pub use tuple_stream::{OffsetTupleStream, TupleStream};

/// `c = a * b` under `semiring` (§6): the `Matrix`-typed entry point. Thin re-export of
/// [`matrix::multiply_matrices`] under the name the crate's own doc calls it.
pub use matrix::multiply_matrices as multiply;
