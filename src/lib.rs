//! # Adapter core
//!
//! The control-plane engine for one local Bluetooth adapter. The central
//! type is [`adapter::Adapter`]: it validates each inbound method call,
//! drives the controller through the [`link`] traits, and keeps the state
//! machines for bonding and discovery. Asynchronous controller completions
//! enter through [`adapter::Adapter::handle_event`], fed from a single event
//! queue; see [`daemon::run`] for the loop that ties the two together.
//!
//! # External collaborators
//!
//! Bus marshalling, persistence and the OUI registry stay outside this
//! crate: method calls arrive already unmarshalled as
//! [`adapter::Method`] values, records go through [`store::DeviceStore`],
//! and company lookups through [`ids::OuiResolver`]. The Linux HCI socket
//! transport in [`link::socket`] is the production [`link::ControllerIo`];
//! any other implementation of that trait will do, which is how the test
//! suite drives the state machines.

#[macro_use]
extern crate num_derive;
#[macro_use]
extern crate thiserror;

pub use address::*;
pub use error::{Error, Result};

pub mod adapter;
pub mod class;
pub mod daemon;
pub mod ids;
pub mod link;
pub mod reply;
pub mod store;

mod address;
mod error;
