//! Key-value store abstraction.
//!
//! This module defines the core trait for stores and the per-entry options.

mod options;
mod traits;

pub use options::EntryOptions;
pub use traits::KeyValueStore;
