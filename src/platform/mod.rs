// LogDeck - platform/mod.rs
//
// Platform abstraction layer: directories, config.toml, persisted auth.
// Dependencies: standard library, directories, toml, serde_json.
// Must NOT depend on: app.

pub mod config;
pub mod credentials;
