//! WebSocket transport: wire protocol, connection handling, fan-out

pub mod handler;
pub mod protocol;
pub mod relay;
