// LogDeck - app/mod.rs
//
// Application layer: HTTP API, auth and project stores, background
// managers for polling and project creation.
// Dependencies: core, platform, util.

pub mod api;
pub mod auth;
pub mod creation;
pub mod poller;
pub mod store;
