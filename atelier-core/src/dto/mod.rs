//! Data Transfer Objects for the public API
//!
//! This module contains DTOs used for communication between the gateway and
//! its clients (CLI, client library). DTOs are flattened views of domain
//! entities shaped for the wire.

pub mod health;
pub mod job;
