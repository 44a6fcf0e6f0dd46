//! APDU command building and response parsing.

use crate::error::{DecodeError, Result};

/// Response APDU split into data and status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl ApduResponse {
    /// Split raw response bytes.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Malformed` if the response has no status word.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let split = bytes.len().checked_sub(2).ok_or_else(|| {
            DecodeError::malformed(format!("response of {} bytes has no status word", bytes.len()))
        })?;

        Ok(Self {
            data: bytes[..split].to_vec(),
            sw1: bytes[split],
            sw2: bytes[split + 1],
        })
    }

    /// Check if the response indicates success (9000)
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the full status word as a 16-bit value
    pub fn status_word(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// Get status word as hex string (e.g., "9000")
    pub fn status_string(&self) -> String {
        format!("{:02X}{:02X}", self.sw1, self.sw2)
    }
}

/// Command APDU builder (short form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u8>,
}

impl ApduCommand {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Set expected response length (`00` means up to 256 bytes)
    pub fn le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Build the APDU command bytes.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Malformed` if the data does not fit a short APDU.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if !self.data.is_empty() {
            let lc = u8::try_from(self.data.len()).map_err(|_| {
                DecodeError::malformed(format!("command data of {} bytes", self.data.len()))
            })?;
            apdu.push(lc);
            apdu.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            apdu.push(le);
        }

        Ok(apdu)
    }
}

/// EMV commands used while reading a card
pub mod commands {
    use super::ApduCommand;
    use crate::error::{DecodeError, Result};

    /// SELECT by name (AID or directory name)
    pub fn select(name: &[u8]) -> ApduCommand {
        ApduCommand::new(0x00, 0xA4, 0x04, 0x00)
            .data(name.to_vec())
            .le(0x00)
    }

    /// GET PROCESSING OPTIONS with data wrapped in command template `83`
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Malformed` if the PDOL answer needs a long-form length.
    pub fn get_processing_options(pdol_data: &[u8]) -> Result<ApduCommand> {
        let length = u8::try_from(pdol_data.len())
            .ok()
            .filter(|len| *len < 0x80)
            .ok_or_else(|| DecodeError::malformed(format!("PDOL answer of {} bytes", pdol_data.len())))?;

        let mut data = Vec::with_capacity(pdol_data.len() + 2);
        data.push(0x83);
        data.push(length);
        data.extend_from_slice(pdol_data);

        Ok(ApduCommand::new(0x80, 0xA8, 0x00, 0x00).data(data).le(0x00))
    }

    /// READ RECORD
    pub fn read_record(record_number: u8, sfi: u8) -> ApduCommand {
        let p2 = (sfi << 3) | 0x04;
        ApduCommand::new(0x00, 0xB2, record_number, p2).le(0x00)
    }

    /// GET RESPONSE, fetching data announced by a `61XX` status
    pub fn get_response(length: u8) -> ApduCommand {
        ApduCommand::new(0x00, 0xC0, 0x00, 0x00).le(length)
    }
}
