//! Call Session Manager core: a stateful relay that lets authenticated
//! endpoints locate one another, negotiate peer-to-peer media sessions, and
//! observe each other's call lifecycle, without carrying media traffic
//! itself.
//!
//! [`csm::Csm`] is the single entry point transport code talks to. Everything
//! else in this crate is a table or helper it owns.

pub mod call;
pub mod clock;
pub mod config;
pub mod csm;
pub mod directory;
pub mod error;
pub mod events;
pub mod http;
pub mod ids;
pub mod pending;
pub mod presence;
pub mod registry;
pub mod router;
pub mod sweeper;
pub mod transport;
