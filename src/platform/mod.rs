// rolltail - platform/mod.rs
//
// Platform abstraction layer: filesystem watches, path resolution, config.
// Dependencies: standard library, notify, directories, toml.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
pub mod watch;
