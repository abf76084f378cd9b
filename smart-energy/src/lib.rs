//! Smart energy application layer: the DRLC load control event table, the
//! ESI table, the DRLC server mirror, registration and the trust center keepalive.
//!
//! Nothing here talks to a radio. Everything the stack provides comes in
//! through [`host::Host`] and [`host::StackHost`].

pub mod error;
pub mod host;
pub mod config;
pub mod esi;
pub mod outgoing;
pub mod drlc;
pub mod event_action;
pub mod drlc_server;
pub mod registration;
pub mod keepalive;
pub mod device;

pub use error::{ Error, DrlcError };
pub use device::SeDevice;
