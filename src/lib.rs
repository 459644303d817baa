pub mod bench;
pub mod config;
pub mod ds_impl;
pub mod error;

pub use error::{Error, Result};
