//! Core domain models shared across all Huddle services.
//!
//! These are the "truth" types: what the database stores and the API serializes.
//! Every model uses time-sortable UUID v7 identifiers.

pub mod channel;
pub mod conversation;
pub mod member;
pub mod message;
pub mod profile;
pub mod server;

/// Re-export all model types for convenience.
pub use channel::*;
pub use conversation::*;
pub use member::*;
pub use message::*;
pub use profile::*;
pub use server::*;
