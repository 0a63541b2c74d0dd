pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod normalize;

pub use config::Config;
pub use domain::*;
pub use envelope::*;
pub use error::*;
