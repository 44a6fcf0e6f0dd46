//! Constants shared by every layer of the card reading engine.
//!
//! Technology markers are the strings a presented tag advertises for each
//! low-level protocol layer it supports. Tag sources produce them, the
//! technology detector consumes them.
//!
//! # Usage
//!
//! ```
//! use cardtap_core::constants::*;
//!
//! let advertised = [TECH_NFC_A, TECH_MIFARE_CLASSIC];
//! assert!(advertised.contains(&TECH_MIFARE_CLASSIC));
//! assert_eq!(KEY_MIFARE_APPLICATION_DIRECTORY.len(), MIFARE_KEY_LENGTH);
//! ```

// ============================================================================
// Technology Markers
// ============================================================================

/// Sector/block memory card layer (MIFARE Classic family).
pub const TECH_MIFARE_CLASSIC: &str = "mifare-classic";

/// ISO 14443-4 application protocol layer (command/response APDUs).
pub const TECH_ISO_DEP: &str = "iso-dep";

/// ISO 14443-3 type A radio layer.
pub const TECH_NFC_A: &str = "nfc-a";

/// ISO 14443-3 type B radio layer.
pub const TECH_NFC_B: &str = "nfc-b";

// ============================================================================
// Tag Identifiers
// ============================================================================

/// Minimum UID length in bytes (ISO/IEC 14443-3).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (ISO/IEC 14443-3).
pub const MAX_UID_LENGTH: usize = 10;

// ============================================================================
// Memory Card Layout
// ============================================================================

/// Size of one MIFARE Classic block in bytes.
pub const MIFARE_BLOCK_SIZE: usize = 16;

/// Length of a MIFARE Classic sector key in bytes.
pub const MIFARE_KEY_LENGTH: usize = 6;

/// Key A of the MIFARE Application Directory.
///
/// This is the only key the sector reader ever tries. Sectors protected by
/// any other key are reported as not authenticated.
pub const KEY_MIFARE_APPLICATION_DIRECTORY: [u8; MIFARE_KEY_LENGTH] =
    [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];

// ============================================================================
// Display Markers
// ============================================================================

/// Redaction prefix placed in front of the last four digits of a card number.
pub const CARD_NUMBER_MASK_PREFIX: &str = "**** **** **** ";

/// Number of trailing card number characters left visible after masking.
pub const CARD_NUMBER_VISIBLE_DIGITS: usize = 4;

/// Marker returned when a card number is too short to be masked.
pub const INVALID_CARD_NUMBER: &str = "Invalid";

/// Display value for an expiry date or card type the decoder did not find.
pub const UNKNOWN_VALUE: &str = "Unknown";
