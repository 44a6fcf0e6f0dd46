//! Payment application identifiers.

/// PPSE, the contactless payment directory.
pub const PPSE: &[u8] = b"2PAY.SYS.DDF01";

/// Applications tried when the card has no usable PPSE.
pub const KNOWN_AIDS: &[&[u8]] = &[
    // Visa credit/debit
    &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10],
    // Visa Electron
    &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x20, 0x10],
    // Mastercard
    &[0xA0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10],
    // Maestro
    &[0xA0, 0x00, 0x00, 0x00, 0x04, 0x30, 0x60],
    // American Express
    &[0xA0, 0x00, 0x00, 0x00, 0x25, 0x01],
    // Discover
    &[0xA0, 0x00, 0x00, 0x01, 0x52, 0x30, 0x10],
    // JCB
    &[0xA0, 0x00, 0x00, 0x00, 0x65, 0x10, 0x10],
    // UnionPay
    &[0xA0, 0x00, 0x00, 0x03, 0x33, 0x01, 0x01, 0x01],
    // Interac
    &[0xA0, 0x00, 0x00, 0x02, 0x77, 0x10, 0x10],
];

/// Registered application providers (first 5 bytes of an AID).
const PROVIDERS: &[([u8; 5], &str)] = &[
    ([0xA0, 0x00, 0x00, 0x00, 0x03], "Visa"),
    ([0xA0, 0x00, 0x00, 0x00, 0x04], "Mastercard"),
    ([0xA0, 0x00, 0x00, 0x00, 0x25], "American Express"),
    ([0xA0, 0x00, 0x00, 0x01, 0x52], "Discover"),
    ([0xA0, 0x00, 0x00, 0x00, 0x65], "JCB"),
    ([0xA0, 0x00, 0x00, 0x03, 0x33], "UnionPay"),
    ([0xA0, 0x00, 0x00, 0x02, 0x77], "Interac"),
    ([0xA0, 0x00, 0x00, 0x00, 0x42], "CB"),
    ([0xA0, 0x00, 0x00, 0x06, 0x58], "MIR"),
    ([0xA0, 0x00, 0x00, 0x05, 0x24], "RuPay"),
    ([0xA0, 0x00, 0x00, 0x01, 0x54], "Elo"),
];

/// Card brand of an application, from its provider identifier.
///
/// # Examples
///
/// ```
/// use cardtap_emv::aid::card_type_for_aid;
///
/// assert_eq!(card_type_for_aid(&[0xA0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10]), Some("Mastercard"));
/// assert_eq!(card_type_for_aid(&[0xA0, 0x00]), None);
/// ```
pub fn card_type_for_aid(aid: &[u8]) -> Option<&'static str> {
    let rid = aid.get(..5)?;
    PROVIDERS
        .iter()
        .find(|(provider, _)| provider.as_slice() == rid)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10], Some("Visa"))]
    #[case(&[0xA0, 0x00, 0x00, 0x00, 0x25, 0x01], Some("American Express"))]
    #[case(&[0xA0, 0x00, 0x00, 0x01, 0x52, 0x30, 0x10], Some("Discover"))]
    #[case(&[0xA0, 0x00, 0x00, 0x03, 0x33, 0x01, 0x01, 0x01], Some("UnionPay"))]
    #[case(&[0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01], None)]
    #[case(&[], None)]
    fn test_card_type_for_aid(#[case] aid: &[u8], #[case] expected: Option<&str>) {
        assert_eq!(card_type_for_aid(aid), expected);
    }

    #[test]
    fn test_known_aids_have_providers() {
        for aid in KNOWN_AIDS {
            assert!(card_type_for_aid(aid).is_some(), "{}", hex::encode_upper(aid));
        }
    }
}
