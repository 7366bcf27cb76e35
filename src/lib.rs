pub mod echonetlite;
pub mod error;
pub mod meter;
pub mod polling;
pub mod settings;
pub mod skstack;

pub use error::{Error, Result};
