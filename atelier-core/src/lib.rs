//! Atelier Core
//!
//! Core types and abstractions for the Atelier image generation service.
//!
//! This crate contains:
//! - Domain types: Core business entities (Job, GenerationRequest, Topology)
//! - DTOs: Data transfer objects exchanged between the gateway and its clients

pub mod domain;
pub mod dto;
