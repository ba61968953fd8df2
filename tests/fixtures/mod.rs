//! Loopback stand-ins for the network peers the agent talks to
//!
//! - [`Responder`] answers discovery probes over UDP
//! - [`FakeBroker`] speaks just enough MQTT 3.1.1 to accept a session
//!
//! Both bind `127.0.0.1:0`, so tests can run concurrently.

mod broker;
mod responder;

pub use broker::{FakeBroker, ReceivedPublish};
pub use responder::Responder;
