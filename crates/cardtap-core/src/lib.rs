//! Core data model for contactless card readings.
//!
//! Everything a single tag presentation produces lives here: the
//! [`TagHandle`] identifying the presentation, the [`Technology`] it was
//! classified as, the per-sector outcomes of a memory card read and the
//! terminal [`ReadingResult`] handed to a results sink.

pub mod constants;
pub mod error;
pub mod masking;
pub mod types;

pub use error::{Error, Result};
pub use masking::mask_card_number;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
