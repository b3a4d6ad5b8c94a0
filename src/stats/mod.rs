//! Gaussian summaries of embedding tables and the distance between them.

mod frechet;
mod gaussian;

pub use frechet::{DEFAULT_EPSILON, frechet_distance, stable_trace_sqrt_product};
pub use gaussian::GaussianFit;
