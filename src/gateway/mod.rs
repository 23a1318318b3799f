//! WebSocket gateway for live observers.
//!
//! Dashboards and tails connect here to watch the fleet in real time.
//! Every accepted connection becomes a hub subscriber and receives each
//! event as a JSON text frame. The channel is one-way: inbound text is
//! ignored, so a misbehaving observer can never mutate server state.

pub mod server;

pub use server::GatewayServer;
