//! Keysmith - license keys for distributed scripts
//!
//! An admin issues a key for a script, an end user activates it exactly once
//! against their user id, and anyone can later ask whether a user holds an
//! activated license for a given script.
//!
//! # Features
//!
//! - `server` - Server components (handlers, database). Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//! - `jwt-auth` - Accept JWT bearer tokens as the admin credential.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (server + sqlite)
//! keysmith = "0.1"
//!
//! # Client-only (no server components)
//! keysmith = { version = "0.1", default-features = false }
//!
//! # Server with PostgreSQL
//! keysmith = { version = "0.1", features = ["server", "postgres"] }
//! ```

// Core modules (always available)
pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod license_key;

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
