/// Embedded HTTP responder
///
/// Serves library media to renderers and exposes the device listing and
/// selection protocol as a small JSON API.

pub mod media;
pub mod routes;
pub mod server;
pub mod types;

pub use media::{parse_range, ByteRange};
pub use routes::{create_router, AppState};
pub use server::MediaServer;
pub use types::*;
