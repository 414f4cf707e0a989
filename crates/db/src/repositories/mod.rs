//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod measurement_repo;
pub mod node_repo;

pub use measurement_repo::MeasurementRepo;
pub use node_repo::NodeRepo;
