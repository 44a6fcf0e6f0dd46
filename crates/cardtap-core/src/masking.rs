//! Display masking for payment card numbers.

use crate::constants::{CARD_NUMBER_MASK_PREFIX, CARD_NUMBER_VISIBLE_DIGITS, INVALID_CARD_NUMBER};

/// Mask a card number so only its last four characters stay visible.
///
/// Numbers with four characters or fewer cannot be masked meaningfully and
/// yield the [`INVALID_CARD_NUMBER`] marker instead.
///
/// # Examples
///
/// ```
/// use cardtap_core::mask_card_number;
///
/// assert_eq!(mask_card_number("4111111111111111"), "**** **** **** 1111");
/// assert_eq!(mask_card_number("12"), "Invalid");
/// assert_eq!(mask_card_number(""), "Invalid");
/// ```
#[must_use]
pub fn mask_card_number(raw: &str) -> String {
    let len = raw.chars().count();
    if len <= CARD_NUMBER_VISIBLE_DIGITS {
        return INVALID_CARD_NUMBER.to_string();
    }

    let visible: String = raw.chars().skip(len - CARD_NUMBER_VISIBLE_DIGITS).collect();
    format!("{CARD_NUMBER_MASK_PREFIX}{visible}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("4111111111111111", "**** **** **** 1111")]
    #[case("5500005555555559", "**** **** **** 5559")]
    #[case("12345", "**** **** **** 2345")]
    #[case("371449635398431", "**** **** **** 8431")]
    fn test_mask_card_number(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(mask_card_number(raw), expected);
    }

    #[rstest]
    #[case("")]
    #[case("12")]
    #[case("1234")]
    fn test_mask_card_number_invalid(#[case] raw: &str) {
        assert_eq!(mask_card_number(raw), INVALID_CARD_NUMBER);
    }

    #[test]
    fn test_mask_counts_characters_not_bytes() {
        assert_eq!(mask_card_number("ééééé"), "**** **** **** éééé");
    }

    proptest! {
        #[test]
        fn prop_mask_keeps_only_last_four(number in "[0-9]{5,19}") {
            let masked = mask_card_number(&number);
            prop_assert!(masked.starts_with(CARD_NUMBER_MASK_PREFIX));
            prop_assert!(masked.ends_with(&number[number.len() - 4..]));
            prop_assert_eq!(masked.len(), CARD_NUMBER_MASK_PREFIX.len() + 4);
        }

        #[test]
        fn prop_short_numbers_are_invalid(number in "[0-9]{0,4}") {
            prop_assert_eq!(mask_card_number(&number), INVALID_CARD_NUMBER);
        }
    }
}
