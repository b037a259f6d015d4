//! Xcode Server REST client implementing `CiServerClient`.

mod blueprint;
mod client;
mod wire;

pub use blueprint::{bot_creation_payload, repository_identifier};
pub use client::{XcodeServerClient, XcodeServerConfig, XCODE_SERVER_DEFAULT_PORT};
