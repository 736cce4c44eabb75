//! Integration seams: the transport session and the venue descriptor.

pub mod descriptor;
pub mod transport;

pub use descriptor::{ExchangeDescriptor, StaticDescriptor};
pub use transport::{Transport, TransportEvent};
