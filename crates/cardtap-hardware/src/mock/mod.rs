//! Mock channel implementations for testing and development.
//!
//! This module provides a simulated reader field and simulated cards that can
//! be controlled programmatically without requiring physical hardware.

pub mod apdu;
pub mod block;
pub mod factory;
pub mod probe;
pub mod tag_source;

pub use apdu::{DEFAULT_MAX_TRANSCEIVE_LENGTH, MockApduChannel};
pub use block::MockBlockChannel;
pub use factory::MockChannelFactory;
pub use probe::{ChannelCall, MockChannelProbe};
pub use tag_source::{MockTagSource, MockTagSourceHandle};
