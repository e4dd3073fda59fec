// rolltail - lib.rs
//
// Library entry point. The `rolltail` binary is a thin CLI over `app::runner`;
// everything else is exposed here for integration tests and embedding.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
