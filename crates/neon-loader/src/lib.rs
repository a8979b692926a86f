//! Progressive media loader for the Neon Murer site.
//!
//! Scans a rendered page for media marked for deferred loading, shows
//! lightweight placeholders, and swaps in the real resources once they
//! approach the viewport. Hosts without visibility observation fall back
//! to loading everything immediately.

pub mod assets;
pub mod cli;
pub mod config;
pub mod dom;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod observer;
pub mod placeholder;
pub mod report;
pub mod srcset;
pub mod strategy;
pub mod styles;

pub use config::LoaderConfig;
pub use dom::{DocumentAdapter, ElementId, Rect};
pub use error::{LoaderError, Result};
pub use loader::{DisplayState, LazyLoader};
