// rolltail - core/mod.rs
//
// Core domain logic: data model and candidate selection.
// Must NOT depend on: app, platform.

pub mod model;
pub mod scanner;
