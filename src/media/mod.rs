// SPDX-License-Identifier: MPL-2.0
//! Media file helpers built on top of the pipeline.

pub mod frame_export;

pub use frame_export::ExportFormat;
