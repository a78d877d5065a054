//! Domain services shared by the route handlers.
//!
//! Routes parse and shape HTTP; services resolve identity, consult the
//! authorization gate, write, and publish.

pub mod conversations;
pub mod identity;
pub mod messages;
