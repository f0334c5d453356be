// ── Module-state feed ──
//
// Connection lifecycle for the streaming state feed: a pure state machine
// that decides when to reconnect, and the async driver that runs it
// against a real WebSocket.

mod machine;
mod session;

pub use machine::{ConnectionState, FeedMachine, ReconnectConfig};
pub(crate) use session::FeedDriver;
