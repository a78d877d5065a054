//! Repository layer: query functions organized by domain.
//!
//! Functions take the pool (or an open transaction) and return
//! `sqlx::Error`; mapping to API errors happens in the services.

pub mod channels;
pub mod conversations;
pub mod members;
pub mod messages;
pub mod profiles;
pub mod servers;
