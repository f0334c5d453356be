// floorsync-core: Subscription registry, state mirror and reconnecting feed
// between floorsync-api and consumers (CLI, UI shells).

pub mod address;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod duration;
pub mod error;
pub mod feed;
pub mod model;
pub mod patch;
pub mod registry;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use address::ModuleAddress;
pub use clock::ClockOffset;
pub use config::{DEFAULT_FEED_PATH, DashboardConfig};
pub use dashboard::Dashboard;
pub use duration::{format_duration, parse_duration, parse_timeout};
pub use error::CoreError;
pub use feed::{ConnectionState, FeedMachine, ReconnectConfig};
pub use model::RelayValue;
pub use patch::{StateMirror, Touched};
pub use registry::{Listener, SubscriptionRegistry};
pub use stream::{ModuleSnapshot, ModuleStream, ModuleWatchStream};

// Wire types consumers need to drive the registry directly.
pub use floorsync_api::{PatchOp, TlsMode, TransportConfig};
