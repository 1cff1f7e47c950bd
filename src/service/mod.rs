//! Network services around the filter core.
//!
//! The core heaps do no I/O; everything network-facing lives here:
//!
//! - [`wire`]: the newline-delimited JSON frames of the filter protocol.
//! - [`FilterService`]: TCP server mapping wire requests onto the façade.
//! - [`FilterClient`]: blocking client for the wire protocol.
//! - [`Proxy`]: HTTP/1.1 front end translating query requests into wire
//!   calls.

pub mod client;
pub mod filter;
pub mod proxy;
pub mod wire;

pub use client::FilterClient;
pub use filter::FilterService;
pub use proxy::Proxy;
