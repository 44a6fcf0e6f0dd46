use crate::{
    Result,
    constants::{MAX_UID_LENGTH, MIN_UID_LENGTH, UNKNOWN_VALUE},
    error::Error,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// One physical presentation of a tag to the reader.
///
/// A handle is created when a tag enters the field and is never reused: a
/// tag presented again gets a new handle with a new presentation id, even
/// when its UID is the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagHandle {
    id: Uuid,
    #[serde(with = "hex::serde")]
    uid: Vec<u8>,
    technologies: BTreeSet<String>,
    detected_at: DateTime<Utc>,
}

impl TagHandle {
    /// Create a handle for a freshly detected tag.
    ///
    /// # Errors
    /// Returns `Error::InvalidTagId` if the UID is not 4-10 bytes long
    /// (ISO 14443), and `Error::InvalidTechnology` if a technology marker
    /// is blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardtap_core::TagHandle;
    /// use cardtap_core::constants::{TECH_MIFARE_CLASSIC, TECH_NFC_A};
    ///
    /// let tag = TagHandle::new(vec![0x04, 0xAB, 0xCD, 0xEF], [TECH_NFC_A, TECH_MIFARE_CLASSIC]).unwrap();
    /// assert_eq!(tag.uid_hex(), "04ABCDEF");
    /// assert!(tag.advertises(TECH_MIFARE_CLASSIC));
    /// ```
    pub fn new<I, S>(uid: Vec<u8>, technologies: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let uid_len = uid.len();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&uid_len) {
            return Err(Error::InvalidTagId(format!(
                "UID must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} bytes, got {uid_len}"
            )));
        }

        let mut markers = BTreeSet::new();
        for tech in technologies {
            let tech = tech.into();
            if tech.trim().is_empty() {
                return Err(Error::InvalidTechnology(tech));
            }
            markers.insert(tech);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            uid,
            technologies: markers,
            detected_at: Utc::now(),
        })
    }

    /// Unique id of this presentation.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tag unique identifier bytes.
    #[must_use]
    pub fn uid(&self) -> &[u8] {
        &self.uid
    }

    /// Get the UID as an uppercase hexadecimal string.
    #[must_use]
    pub fn uid_hex(&self) -> String {
        hex::encode_upper(&self.uid)
    }

    /// Technology markers the tag advertised.
    #[must_use]
    pub fn technologies(&self) -> &BTreeSet<String> {
        &self.technologies
    }

    /// Returns `true` if the tag advertised the given technology marker.
    #[must_use]
    pub fn advertises(&self, marker: &str) -> bool {
        self.technologies.contains(marker)
    }

    /// When the tag entered the field.
    #[must_use]
    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}

impl fmt::Display for TagHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.uid_hex())
    }
}

/// Reading strategy a presented tag was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    /// Sector/block memory card.
    MemoryCard,
    /// Card speaking command/response APDUs.
    ApplicationProtocol,
    /// Nothing this engine can read.
    Unsupported,
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Technology::MemoryCard => write!(f, "Memory card"),
            Technology::ApplicationProtocol => write!(f, "Application protocol"),
            Technology::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Outcome of authenticating one sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthResult {
    Authenticated,
    AuthFailed,
}

/// One block read from an authenticated sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    index: u16,
    #[serde(with = "hex::serde")]
    data: Vec<u8>,
}

impl Block {
    /// Absolute block index on the card.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Raw block bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Block contents as text, lossy UTF-8 with padding and control bytes trimmed.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data)
            .trim_matches(|c: char| c <= ' ')
            .to_string()
    }
}

/// Result of visiting one sector of a memory card.
///
/// Block indices of an authenticated sector are contiguous and ascending,
/// starting at the sector's first block. A sector that failed
/// authentication carries no blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorReadOutcome {
    sector: u8,
    auth: AuthResult,
    blocks: Vec<Block>,
}

impl SectorReadOutcome {
    /// Outcome of an authenticated sector whose blocks were read in order,
    /// the first one being `first_block`.
    #[must_use]
    pub fn authenticated(sector: u8, first_block: u16, blocks: Vec<Vec<u8>>) -> Self {
        let blocks = blocks
            .into_iter()
            .zip(first_block..)
            .map(|(data, index)| Block { index, data })
            .collect();

        Self {
            sector,
            auth: AuthResult::Authenticated,
            blocks,
        }
    }

    /// Outcome of a sector the default key could not open.
    #[must_use]
    pub fn auth_failed(sector: u8) -> Self {
        Self {
            sector,
            auth: AuthResult::AuthFailed,
            blocks: Vec::new(),
        }
    }

    /// Zero-based sector index.
    #[must_use]
    pub fn sector(&self) -> u8 {
        self.sector
    }

    #[must_use]
    pub fn auth(&self) -> AuthResult {
        self.auth
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth == AuthResult::Authenticated
    }

    /// Blocks read from this sector, ascending.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

/// Every sector outcome of one memory card, in ascending sector order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MemoryCardReading {
    sectors: Vec<SectorReadOutcome>,
}

impl MemoryCardReading {
    /// Build a reading from outcomes already ordered by sector index.
    #[must_use]
    pub fn new(sectors: Vec<SectorReadOutcome>) -> Self {
        debug_assert!(
            sectors
                .iter()
                .enumerate()
                .all(|(i, outcome)| usize::from(outcome.sector) == i),
            "sector outcomes must be contiguous and ascending from 0"
        );
        Self { sectors }
    }

    #[must_use]
    pub fn sectors(&self) -> &[SectorReadOutcome] {
        &self.sectors
    }

    /// Number of sector outcomes, equal to the card's sector count.
    #[must_use]
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Number of sectors the default key opened.
    #[must_use]
    pub fn authenticated_count(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_authenticated()).count()
    }

    /// Indices of sectors that failed authentication.
    pub fn locked_sectors(&self) -> impl Iterator<Item = u8> + '_ {
        self.sectors
            .iter()
            .filter(|s| !s.is_authenticated())
            .map(SectorReadOutcome::sector)
    }

    /// All blocks read, paired with their sector index.
    pub fn blocks(&self) -> impl Iterator<Item = (u8, &Block)> + '_ {
        self.sectors
            .iter()
            .flat_map(|s| s.blocks.iter().map(move |b| (s.sector, b)))
    }
}

/// Card details extracted from an application-protocol card.
///
/// The card number is always stored masked; the full number never leaves
/// the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardSummary {
    /// Masked card number, last four digits visible.
    pub masked_number: String,

    /// Application expiration date, if the card exposed one.
    pub expiry: Option<NaiveDate>,

    /// Card scheme or application label, if known.
    pub card_type: Option<String>,
}

impl CardSummary {
    /// Expiry formatted as `MM/YY`, or `Unknown`.
    #[must_use]
    pub fn expiry_display(&self) -> String {
        self.expiry
            .map(|date| date.format("%m/%y").to_string())
            .unwrap_or_else(|| UNKNOWN_VALUE.to_string())
    }

    /// Card type label, or `Unknown`.
    #[must_use]
    pub fn card_type_display(&self) -> &str {
        self.card_type.as_deref().unwrap_or(UNKNOWN_VALUE)
    }
}

/// Terminal value of one tag presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadingResult {
    /// Sector dump of a memory card.
    MemoryCard(MemoryCardReading),

    /// Decoded application-protocol card.
    Card(CardSummary),

    /// The tag advertised no technology the engine reads.
    UnsupportedTag,

    /// The channel could not be opened or failed mid-reading.
    TransportFailure { reason: String },

    /// The card answered, but its data could not be interpreted.
    DecodeFailure { reason: String },
}

impl ReadingResult {
    pub fn transport_failure(reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            reason: reason.into(),
        }
    }

    pub fn decode_failure(reason: impl Into<String>) -> Self {
        Self::DecodeFailure {
            reason: reason.into(),
        }
    }

    /// Returns `true` if card data was read.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::MemoryCard(_) | Self::Card(_))
    }

    /// Short status line for the user.
    #[must_use]
    pub fn status_line(&self) -> &'static str {
        match self {
            Self::MemoryCard(_) | Self::Card(_) => "Card read successfully!",
            Self::UnsupportedTag => "Unsupported card type.",
            Self::TransportFailure { .. } => "Error reading card",
            Self::DecodeFailure { .. } => "Could not decode card",
        }
    }
}

impl fmt::Display for ReadingResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MemoryCard(reading) => {
                write!(f, "{}", self.status_line())?;
                for (sector, block) in reading.blocks() {
                    write!(
                        f,
                        "\nSector {}, Block {}: {}",
                        sector,
                        block.index(),
                        block.text()
                    )?;
                }
                Ok(())
            }
            Self::Card(summary) => write!(
                f,
                "{}\nCard Number: {}\nExpiry Date: {}\nCard Type: {}",
                self.status_line(),
                summary.masked_number,
                summary.expiry_display(),
                summary.card_type_display()
            ),
            Self::UnsupportedTag => write!(f, "{}", self.status_line()),
            Self::TransportFailure { reason } | Self::DecodeFailure { reason } => {
                write!(f, "{}: {}", self.status_line(), reason)
            }
        }
    }
}
