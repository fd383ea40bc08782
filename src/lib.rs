//! Bug tracking HTTP API backed by SQLite.
//!
//! Projects own bugs. Deleting a project deletes its bugs in the same
//! transaction. A single administrative identity can log in and receive a
//! signed session token.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
