//! `sovereign-auth`: authorization boundary for the command pipeline.
//!
//! This crate is intentionally decoupled from HTTP and storage: role lookups
//! go through the [`RoleLookup`] trait, decisions are pure functions.

pub mod authorize;
pub mod directory;
pub mod principal;
pub mod roles;

pub use authorize::{AccessRequirement, AuthzError, authorize};
pub use directory::{InMemoryRoleDirectory, RoleLookup, RoleLookupError};
pub use principal::Membership;
pub use roles::Role;
