//! # huddle-common
//!
//! Shared types, configuration, error handling, and the authorization gate used
//! across all Huddle crates. This is the foundation layer: no I/O, just
//! primitives and contracts.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway_event;
pub mod models;
pub mod permissions;
pub mod snowflake;
pub mod timestamp;
pub mod validation;
