// floorsync-api: HTTP and WebSocket transport for a module state server

pub mod error;
pub mod feed;
pub mod module;
pub mod transport;

pub use error::Error;
pub use feed::{FeedSink, FeedSource, PatchOp};
pub use module::ModuleClient;
pub use transport::{TlsMode, TransportConfig};
