// LogDeck - core/mod.rs
//
// Core business logic layer.
// Dependencies: model types, regex, serde/toml for definition parsing.
// Must NOT depend on: platform, app, or perform any network/file I/O.

pub mod creation;
pub mod fields;
pub mod model;
pub mod polling;
pub mod wizard;
