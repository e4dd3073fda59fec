// rolltail - app/mod.rs
//
// Application layer: tailers, their lifecycle plumbing, and the runner.
// Dependencies: core, platform, util.

pub mod dir_tail;
pub mod lifecycle;
pub mod runner;
pub mod stream;
pub mod tail;
