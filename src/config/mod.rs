//! Configuration management for outpost.
//!
//! Settings come from an optional JSON file in the XDG config directory and
//! are overridden by command-line flags. The result is frozen into a
//! [`RunContext`] that is passed to every component of a run.

mod settings;

pub use settings::{AppSettings, Paths, RunContext};
