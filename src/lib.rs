#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod alarm;
#[cfg(feature = "board")]
pub mod board;
pub mod config;
pub mod error;
pub mod gptimer;
pub mod press;

pub use error::{Error, Result};
