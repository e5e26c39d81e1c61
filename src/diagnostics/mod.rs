// SPDX-License-Identifier: MPL-2.0
//! Diagnostics for native resource usage.
//!
//! - [`ResourceTracker`]: shared live/opened counters per handle kind
//! - [`ResourceGuard`]: RAII token held by each adapter owning a native handle

mod resources;

pub use resources::{ResourceGuard, ResourceKind, ResourceTracker};
