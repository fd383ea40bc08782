//! Core data models for the bug tracker.
//!
//! These entities map to database tables via `sqlx::FromRow` and serialize
//! as camelCase JSON via `serde`. Each implements the store's `Entity` trait.

pub mod bug;
pub mod project;
pub mod user;
