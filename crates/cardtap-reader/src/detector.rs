//! Technology detection.
//!
//! A tag may advertise several technology layers at once (a MIFARE Classic
//! card with an ISO-DEP emulation, for instance). Which reading strategy wins
//! is decided by a [`DetectionPriority`] chosen by configuration.

use cardtap_core::Technology;
use cardtap_core::constants::{TECH_ISO_DEP, TECH_MIFARE_CLASSIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Order in which the reading strategies are tried against a tag's markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPriority {
    /// Prefer the sector reader when the memory card marker is present.
    #[default]
    MemoryCardFirst,

    /// Prefer the APDU decoder when the application protocol marker is present.
    ApplicationProtocolFirst,
}

impl DetectionPriority {
    /// Technologies in the order they are tried.
    fn order(self) -> [(&'static str, Technology); 2] {
        let memory = (TECH_MIFARE_CLASSIC, Technology::MemoryCard);
        let apdu = (TECH_ISO_DEP, Technology::ApplicationProtocol);
        match self {
            Self::MemoryCardFirst => [memory, apdu],
            Self::ApplicationProtocolFirst => [apdu, memory],
        }
    }
}

impl fmt::Display for DetectionPriority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MemoryCardFirst => write!(f, "memory_card_first"),
            Self::ApplicationProtocolFirst => write!(f, "application_protocol_first"),
        }
    }
}

/// Classify a tag from the technology markers it advertises.
///
/// Markers this engine has no strategy for (`nfc-a`, `ndef`, ...) are ignored.
///
/// # Examples
///
/// ```
/// use cardtap_core::Technology;
/// use cardtap_reader::detector::{classify, DetectionPriority};
/// use std::collections::BTreeSet;
///
/// let techs: BTreeSet<String> = ["nfc-a", "mifare-classic", "iso-dep"]
///     .into_iter()
///     .map(String::from)
///     .collect();
///
/// assert_eq!(classify(&techs, DetectionPriority::MemoryCardFirst), Technology::MemoryCard);
/// assert_eq!(
///     classify(&techs, DetectionPriority::ApplicationProtocolFirst),
///     Technology::ApplicationProtocol
/// );
/// assert_eq!(classify(&BTreeSet::new(), DetectionPriority::default()), Technology::Unsupported);
/// ```
#[must_use]
pub fn classify(technologies: &BTreeSet<String>, priority: DetectionPriority) -> Technology {
    priority
        .order()
        .into_iter()
        .find(|(marker, _)| technologies.contains(*marker))
        .map_or(Technology::Unsupported, |(_, technology)| technology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtap_core::constants::{TECH_NFC_A, TECH_NFC_B};
    use rstest::rstest;

    fn techs(markers: &[&str]) -> BTreeSet<String> {
        markers.iter().map(|m| (*m).to_string()).collect()
    }

    #[rstest]
    #[case(&[TECH_MIFARE_CLASSIC], DetectionPriority::MemoryCardFirst, Technology::MemoryCard)]
    #[case(&[TECH_MIFARE_CLASSIC], DetectionPriority::ApplicationProtocolFirst, Technology::MemoryCard)]
    #[case(&[TECH_ISO_DEP], DetectionPriority::MemoryCardFirst, Technology::ApplicationProtocol)]
    #[case(&[TECH_NFC_A, TECH_ISO_DEP], DetectionPriority::ApplicationProtocolFirst, Technology::ApplicationProtocol)]
    #[case(&[TECH_MIFARE_CLASSIC, TECH_ISO_DEP], DetectionPriority::MemoryCardFirst, Technology::MemoryCard)]
    #[case(&[TECH_MIFARE_CLASSIC, TECH_ISO_DEP], DetectionPriority::ApplicationProtocolFirst, Technology::ApplicationProtocol)]
    #[case(&[TECH_NFC_A], DetectionPriority::MemoryCardFirst, Technology::Unsupported)]
    #[case(&[TECH_NFC_B, "ndef"], DetectionPriority::ApplicationProtocolFirst, Technology::Unsupported)]
    #[case(&[], DetectionPriority::MemoryCardFirst, Technology::Unsupported)]
    fn test_classify(
        #[case] markers: &[&str],
        #[case] priority: DetectionPriority,
        #[case] expected: Technology,
    ) {
        assert_eq!(classify(&techs(markers), priority), expected);
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        assert_eq!(
            classify(&techs(&["MIFARE-CLASSIC", "ISO-DEP"]), DetectionPriority::default()),
            Technology::Unsupported
        );
    }

    #[test]
    fn test_priority_serde_names() {
        let json = serde_json::to_string(&DetectionPriority::ApplicationProtocolFirst).unwrap();
        assert_eq!(json, "\"application_protocol_first\"");

        let parsed: DetectionPriority = serde_json::from_str("\"memory_card_first\"").unwrap();
        assert_eq!(parsed, DetectionPriority::MemoryCardFirst);
        assert_eq!(parsed.to_string(), "memory_card_first");
    }
}
