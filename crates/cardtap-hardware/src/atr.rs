//! Answer To Reset parsing for contactless readers.
//!
//! A PC/SC contactless reader synthesizes an ATR for the tag in its field.
//! For ISO-DEP tags the historical bytes carry the tag's ATS historical
//! bytes. For memory cards they follow the PC/SC storage card format:
//!
//! ```text
//! 80 4F 0C A0 00 00 03 06 SS NN NN 00 00 00 00
//! |  |  |  |              |  |
//! |  |  |  RID (PC/SC)    |  card name
//! |  |  length            standard
//! |  application identifier tag
//! category indicator
//! ```

use crate::types::MifareClassicLayout;
use crate::{ChannelError, Result};
use cardtap_core::constants::{TECH_ISO_DEP, TECH_MIFARE_CLASSIC, TECH_NFC_A};

/// Registered application provider identifier of the PC/SC workgroup.
const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

const CATEGORY_STATUS_AT_END: u8 = 0x80;
const TAG_APPLICATION_IDENTIFIER: u8 = 0x4F;

/// Parsed Answer To Reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atr {
    bytes: Vec<u8>,
    historical_start: usize,
    historical_len: usize,
}

impl Atr {
    /// Parse a raw ATR.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::InvalidData` if the interface bytes or the
    /// historical bytes run past the end of the ATR.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardtap_hardware::atr::Atr;
    ///
    /// let atr = Atr::parse(&[0x3B, 0x82, 0x80, 0x01, 0x80, 0x73, 0x72]).unwrap();
    /// assert_eq!(atr.historical_bytes(), &[0x80, 0x73]);
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let format = *bytes
            .get(1)
            .ok_or_else(|| ChannelError::invalid_data("ATR shorter than 2 bytes"))?;

        let historical_len = usize::from(format & 0x0F);
        let mut indicator = format >> 4;
        let mut cursor = 2;

        loop {
            // TA, TB and TC are skipped, TD chains to the next group.
            let skipped = (indicator & 0x07).count_ones() as usize;
            cursor += skipped;
            if indicator & 0x08 == 0 {
                break;
            }
            let td = *bytes
                .get(cursor)
                .ok_or_else(|| ChannelError::invalid_data("ATR truncated in interface bytes"))?;
            cursor += 1;
            indicator = td >> 4;
        }

        if cursor + historical_len > bytes.len() {
            return Err(ChannelError::invalid_data(format!(
                "ATR declares {historical_len} historical bytes, {} available",
                bytes.len().saturating_sub(cursor)
            )));
        }

        Ok(Self {
            bytes: bytes.to_vec(),
            historical_start: cursor,
            historical_len,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn historical_bytes(&self) -> &[u8] {
        &self.bytes[self.historical_start..self.historical_start + self.historical_len]
    }

    /// Card name from PC/SC storage card historical bytes, if present.
    pub fn storage_card_name(&self) -> Option<u16> {
        let historical = self.historical_bytes();
        if historical.len() < 11
            || historical[0] != CATEGORY_STATUS_AT_END
            || historical[1] != TAG_APPLICATION_IDENTIFIER
            || historical[3..8] != PCSC_RID
        {
            return None;
        }
        Some(u16::from_be_bytes([historical[9], historical[10]]))
    }

    /// MIFARE Classic layout of a storage card, if the card is one.
    pub fn mifare_layout(&self) -> Option<MifareClassicLayout> {
        self.storage_card_name()
            .and_then(MifareClassicLayout::from_pcsc_card_name)
    }

    /// Technology markers a tag with this ATR advertises.
    ///
    /// Storage cards advertise `nfc-a`, plus `mifare-classic` when the card
    /// name is a MIFARE Classic variant. Every other tag is ISO-DEP.
    pub fn technologies(&self) -> Vec<&'static str> {
        if self.storage_card_name().is_some() {
            let mut techs = vec![TECH_NFC_A];
            if self.mifare_layout().is_some() {
                techs.push(TECH_MIFARE_CLASSIC);
            }
            techs
        } else {
            vec![TECH_ISO_DEP, TECH_NFC_A]
        }
    }
}
