//! `sovereign-core`: shared building blocks for the command pipeline.
//!
//! This crate contains **pure** primitives (no infrastructure concerns): the
//! identifiers every layer passes around and the domain error model.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{CallerId, OrganizationId, RecordId};
