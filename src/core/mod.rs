//! Core domain models
//!
//! This module defines the data threaded through a triage run: messages,
//! domains, the pipeline state, the step contract, and configuration.

pub mod config;
pub mod domain;
pub mod message;
pub mod state;
pub mod step;

pub use domain::*;
pub use message::*;
pub use state::*;
pub use step::*;
