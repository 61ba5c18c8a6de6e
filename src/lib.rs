pub mod config;
pub mod error;
pub mod inference;
pub mod interface;
pub mod orientation;
pub mod pipeline;
pub mod preprocessing;
pub mod ranking;

pub use error::{Error, Result};
