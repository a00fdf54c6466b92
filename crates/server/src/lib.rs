//! Chat Relay Server
//!
//! A single-room message relay: clients post chat-style messages and any
//! number of readers receive them live over Server-Sent Events, with
//! resume-after-disconnect and an explicit "clear history" signal.
//!
//! # Features
//!
//! - **Bounded append-only log**: messages get strictly increasing ids;
//!   the oldest entries are evicted silently once capacity is reached
//! - **Live fan-out**: every mutation wakes all connected stream sessions
//!   through one broadcast primitive; each session re-derives its view
//!   from the shared log
//! - **Replay support**: `Last-Event-ID` resumes a stream from any id
//! - **Clear epoch**: wiping history advances a monotonic epoch so live
//!   and reconnecting readers learn about the wipe without id reuse
//! - **Heartbeats**: idle streams emit a comment ping so proxies keep the
//!   connection open
//!
//! # Example
//!
//! ```rust,no_run
//! use chatrelay_server::{server, types::ServerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = ServerOptions {
//!         port: 5000,
//!         ..Default::default()
//!     };
//!
//!     server::start_server(options).await.unwrap();
//! }
//! ```
//!
//! # Protocol
//!
//! ## Posting a message
//!
//! ```text
//! POST /api/message HTTP/1.1
//! Content-Type: application/json
//!
//! {"role": "user", "content": "hi", "name": "ada"}
//!
//! Response: 201 Created
//! {"id":1,"ts":1700000000.5,"role":"user","content":"hi","name":"ada"}
//! ```
//!
//! ## Streaming
//!
//! ```text
//! GET /stream HTTP/1.1
//! Last-Event-ID: 41
//!
//! id: 42
//! event: message
//! data: {"id":42,"ts":1700000012.1,"role":"assistant","content":"hello","name":""}
//!
//! event: clear
//! data: {}
//!
//! : ping
//! ```
//!
//! ## Clearing history
//!
//! ```text
//! POST /api/clear HTTP/1.1
//!
//! Response: 200 OK
//! {"status":"cleared"}
//! ```
//!
//! Ids are never reused: a message appended after a clear always carries a
//! higher id than anything issued before it, so client resume cursors stay
//! valid across wipes.

pub mod server;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use server::{create_router, start_server, AppState};
pub use session::{SessionEvent, HEARTBEAT_INTERVAL};
pub use store::{ChangeNotification, MessageLog, DEFAULT_CAPACITY};
pub use types::{Message, Role, ServerOptions, ValidationError};
