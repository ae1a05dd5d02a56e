mod config;
mod constants;
mod data;
mod error;
mod stats;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use error::*;
pub use stats::*;
