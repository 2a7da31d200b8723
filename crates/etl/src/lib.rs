pub mod engine;
pub mod error;
pub mod paginator;
pub mod transform;

pub use engine::Etl;
pub use error::EtlError;
pub use paginator::{plan, Batch};
