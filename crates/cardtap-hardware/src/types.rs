//! Reader metadata, MIFARE Classic keys and card geometry.

use cardtap_core::constants::{MIFARE_BLOCK_SIZE, MIFARE_KEY_LENGTH};
use serde::{Deserialize, Serialize};

/// A six byte MIFARE Classic sector key.
pub type SectorKey = [u8; MIFARE_KEY_LENGTH];

/// Which of the two sector keys to authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Key A (authentication code 0x60).
    A,
    /// Key B (authentication code 0x61).
    B,
}

impl KeyType {
    /// MIFARE authentication command code for this key.
    #[must_use]
    pub fn auth_code(self) -> u8 {
        match self {
            Self::A => 0x60,
            Self::B => 0x61,
        }
    }
}

/// What a tag source reports about the reader behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// PC/SC reader name, e.g. "ACS ACR122U PICC Interface".
    pub name: String,

    /// Air interfaces the reader polls for, e.g. "ISO14443A".
    pub protocols: Vec<String>,

    /// Highest air interface bit rate, when known.
    pub max_baud_rate: Option<u32>,
}

impl ReaderInfo {
    pub fn new(name: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            protocols,
            max_baud_rate: None,
        }
    }

    pub fn with_max_baud_rate(mut self, bits_per_second: u32) -> Self {
        self.max_baud_rate = Some(bits_per_second);
        self
    }
}

/// Number of small sectors (4 blocks each) at the start of every layout.
const SMALL_SECTOR_COUNT: u8 = 32;
const SMALL_SECTOR_BLOCKS: u8 = 4;
const LARGE_SECTOR_BLOCKS: u8 = 16;

/// Memory layout of a MIFARE Classic card.
///
/// Sectors 0-31 hold 4 blocks each, sectors 32-39 (4K only) hold 16.
/// The last block of every sector is the sector trailer.
///
/// # Examples
///
/// ```
/// use cardtap_hardware::types::MifareClassicLayout;
///
/// let layout = MifareClassicLayout::Classic4K;
/// assert_eq!(layout.sector_count(), 40);
/// assert_eq!(layout.first_block(32), Some(128));
/// assert_eq!(layout.blocks_in_sector(39), Some(16));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MifareClassicLayout {
    /// MIFARE Mini (320 bytes, 5 sectors).
    Mini,
    /// MIFARE Classic 1K (16 sectors).
    Classic1K,
    /// MIFARE Classic 2K / Plus 2K in SL1 (32 sectors).
    Classic2K,
    /// MIFARE Classic 4K (40 sectors).
    Classic4K,
}

impl MifareClassicLayout {
    /// Layout for a PC/SC part-3 card name, if it names a Classic card.
    #[must_use]
    pub fn from_pcsc_card_name(name: u16) -> Option<Self> {
        match name {
            0x0001 => Some(Self::Classic1K),
            0x0002 | 0x0037 | 0x0039 => Some(Self::Classic4K),
            0x0026 => Some(Self::Mini),
            0x0036 | 0x0038 => Some(Self::Classic2K),
            _ => None,
        }
    }

    /// Human-readable card name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mini => "Mifare Mini",
            Self::Classic1K => "Mifare Classic 1K",
            Self::Classic2K => "Mifare Classic 2K",
            Self::Classic4K => "Mifare Classic 4K",
        }
    }

    #[must_use]
    pub fn sector_count(self) -> u8 {
        match self {
            Self::Mini => 5,
            Self::Classic1K => 16,
            Self::Classic2K => 32,
            Self::Classic4K => 40,
        }
    }

    /// Total number of blocks on the card.
    #[must_use]
    pub fn block_count(self) -> u16 {
        (0..self.sector_count())
            .filter_map(|s| self.blocks_in_sector(s))
            .map(u16::from)
            .sum()
    }

    /// Total card memory in bytes.
    #[must_use]
    pub fn size_bytes(self) -> usize {
        usize::from(self.block_count()) * MIFARE_BLOCK_SIZE
    }

    /// Number of blocks in `sector`, or `None` past the last sector.
    #[must_use]
    pub fn blocks_in_sector(self, sector: u8) -> Option<u8> {
        if sector >= self.sector_count() {
            None
        } else if sector < SMALL_SECTOR_COUNT {
            Some(SMALL_SECTOR_BLOCKS)
        } else {
            Some(LARGE_SECTOR_BLOCKS)
        }
    }

    /// Index of the first block of `sector`, or `None` past the last sector.
    #[must_use]
    pub fn first_block(self, sector: u8) -> Option<u16> {
        self.blocks_in_sector(sector)?;
        let sector = u16::from(sector);
        let small = u16::from(SMALL_SECTOR_COUNT);
        if sector < small {
            Some(sector * u16::from(SMALL_SECTOR_BLOCKS))
        } else {
            let large_start = small * u16::from(SMALL_SECTOR_BLOCKS);
            Some(large_start + (sector - small) * u16::from(LARGE_SECTOR_BLOCKS))
        }
    }

    /// Sector containing `block`, or `None` past the last block.
    #[must_use]
    pub fn sector_of_block(self, block: u16) -> Option<u8> {
        (0..self.sector_count()).find(|&sector| {
            match (self.first_block(sector), self.blocks_in_sector(sector)) {
                (Some(first), Some(count)) => (first..first + u16::from(count)).contains(&block),
                _ => false,
            }
        })
    }
}
