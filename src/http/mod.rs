//! Remote execution transport
//!
//! Wire types exchanged with a remote executor and the transport that
//! carries them. The engine only ever sends unit names and positions; the
//! remote side decides how to run them.

mod client;
mod wire;

pub use client::{HttpTransport, RemoteTarget, RemoteTransport, TransportError};
pub use wire::{
    RemoteRunRequest, RemoteRunResponse, RemoteStatus, RemoteUnitResult, UnitDescriptor,
};
