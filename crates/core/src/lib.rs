pub mod cancel;
pub mod config;
pub mod models;

pub use cancel::Cancel;
pub use config::Config;
pub use models::*;
