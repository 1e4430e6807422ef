//! These models represent the objects passed around during a turn
//!
//! A turn talks to two external parties: the language model (through a provider) and
//! the capabilities a handler may invoke. Provider implementations convert their wire
//! formats into these internal structs immediately, so the router, handler and
//! dispatcher only ever see these types.
pub mod message;
pub mod role;
pub mod tool;
pub mod transcript;
