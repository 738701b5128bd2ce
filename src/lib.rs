//! Declarative synchronization of Vault state.
//!
//! Resource files describe auth backends, secret engines, policies, users
//! and static secrets; [`sync::Synchronizer`] converges a Vault server to
//! match them.

pub mod cli;
pub mod config;
pub mod logging;
pub mod resources;
pub mod sync;
pub mod transit;
pub mod vault;
