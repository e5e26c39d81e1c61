// SPDX-License-Identifier: MPL-2.0
//! Application layer - Ports between the playback loop and native adapters.
//!
//! - [`port`]: Trait definitions (interfaces) for dependency inversion
//!
//! # Dependency Rule
//!
//! - Application layer depends on domain layer (uses domain types)
//! - Infrastructure layer implements application layer ports
//! - The playback loop (`video_player`) only talks to ports

pub mod port;
