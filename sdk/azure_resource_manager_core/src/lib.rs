#![doc = include_str!("../README.md")]

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use error::{ArmError, ArmResult};
