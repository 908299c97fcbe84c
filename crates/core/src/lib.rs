//! `meridian-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model, and the optimistic
//! concurrency expectation used by every mutable store.

pub mod entity;
pub mod error;
pub mod id;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{RoleId, TenantId, UserId};
pub use version::ExpectedVersion;
