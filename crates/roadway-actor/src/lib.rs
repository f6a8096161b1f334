//! Roadway Actor - the road as a serialized service
//!
//! A single task owns the road state and handles one request at a time.
//! Callers talk to it through a cloneable [`RoadHandle`]; every call
//! carries its own reply channel. Requests that cannot complete yet are
//! parked and retried whenever the state they wait on changes.

pub mod request;
pub mod service;
pub mod handle;

pub use handle::*;
pub use service::*;
