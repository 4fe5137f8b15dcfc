//! Book recommendations from borrowing history.

mod engine;
mod matrix;
mod svd;

pub use engine::Recommender;
pub use matrix::InteractionMatrix;
pub use svd::TruncatedSvd;
