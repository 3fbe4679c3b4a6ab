// Domain layer - knock detection rules and the contracts they depend on.
// Nothing in here talks to the OS directly; adapters live in infrastructure.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;

pub use errors::*;
