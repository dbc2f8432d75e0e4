//! filedock-core — client state, controller and HTTP transport for the
//! filedock file-storage API.
//!
//! # Modules
//! - `api`           — wire types for the `/api/*` endpoints
//! - `api_client`    — the `FileApi` seam and its reqwest implementation
//! - `state`         — `AppState`, `Action` and the reducer
//! - `controller`    — operations that sequence validation, calls and state
//! - `session_store` — persisted session token (keyring, file, memory)
//! - `config`        — layered client configuration
//! - `paths`         — platform directories

pub mod api;
pub mod api_client;
pub mod config;
pub mod controller;
pub mod error;
pub mod paths;
pub mod session_store;
pub mod state;

pub use api::{DownloadedFile, FileEntry, PendingFile, UploadedFile};
pub use api_client::{ApiClient, FileApi};
pub use config::{ClientConfig, SessionStoreKind};
pub use controller::Controller;
pub use error::ClientError;
pub use session_store::{open_store, FileStore, KeyringStore, MemoryStore, SessionStore};
pub use state::{Action, AppState};
