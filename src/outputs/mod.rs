//! Output generation: JSON files on disk and the console report.
//!
//! # Submodules
//!
//! - [`json`]: writes the bank and pending files (pretty JSON, full rewrite)
//! - [`preview`]: renders the step report, dry-run preview and approval summary

pub mod json;
pub mod preview;
