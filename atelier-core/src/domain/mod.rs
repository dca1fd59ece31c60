//! Core domain types
//!
//! This module contains the core domain structures used across Atelier services.
//! These types are shared between the server (which tracks job state) and the
//! runner (which executes inference for a job).

pub mod job;
pub mod request;
pub mod topology;
