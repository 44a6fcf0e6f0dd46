//! Shared helpers for the reading engine integration tests.
//!
//! Builds scripted mock cards: MIFARE Classic cards with locked sectors or
//! failing blocks, and EMV cards answering a PPSE/SELECT/GPO/READ RECORD
//! sequence.

#![allow(dead_code)]

use cardtap_core::TagHandle;
use cardtap_core::constants::{TECH_ISO_DEP, TECH_MIFARE_CLASSIC, TECH_NFC_A};
use cardtap_hardware::mock::{MockApduChannel, MockBlockChannel, MockChannelFactory};
use cardtap_hardware::types::MifareClassicLayout;

pub const MEMORY_UID: [u8; 4] = [0x04, 0xDE, 0xAD, 0x01];
pub const EMV_UID: [u8; 4] = [0x08, 0xBE, 0xEF, 0x02];

pub const VISA_AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10];
pub const VISA_PAN: &str = "4111111111111111";

pub fn memory_tag() -> TagHandle {
    TagHandle::new(MEMORY_UID.to_vec(), [TECH_NFC_A, TECH_MIFARE_CLASSIC]).unwrap()
}

pub fn emv_tag() -> TagHandle {
    TagHandle::new(EMV_UID.to_vec(), [TECH_NFC_A, TECH_ISO_DEP]).unwrap()
}

/// Mifare Mini with readable text in the first data block of every sector.
pub fn memory_card() -> MockBlockChannel {
    (0..5u16).fold(MockBlockChannel::new(MifareClassicLayout::Mini), |card, sector| {
        let block = if sector == 0 { 1 } else { sector * 4 };
        card.with_text_block(block, &format!("SECTOR {sector}"))
    })
}

pub fn block_factory(card: MockBlockChannel) -> MockChannelFactory {
    MockChannelFactory::new().with_block_card(MEMORY_UID.to_vec(), card)
}

pub fn apdu_factory(card: MockApduChannel) -> MockChannelFactory {
    MockChannelFactory::new().with_apdu_card(EMV_UID.to_vec(), card)
}

/// Short form BER-TLV object.
pub fn tlv(tag: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.push(u8::try_from(value.len()).unwrap());
    out.extend_from_slice(value);
    out
}

/// Response data followed by `9000`.
pub fn ok(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.extend_from_slice(&[0x90, 0x00]);
    out
}

pub fn select(name: &[u8]) -> Vec<u8> {
    let mut apdu = vec![0x00, 0xA4, 0x04, 0x00, u8::try_from(name.len()).unwrap()];
    apdu.extend_from_slice(name);
    apdu.push(0x00);
    apdu
}

pub const GPO_EMPTY_PDOL: [u8; 8] = [0x80, 0xA8, 0x00, 0x00, 0x02, 0x83, 0x00, 0x00];

/// READ RECORD 1 of SFI 1.
pub const READ_RECORD_1_1: [u8; 5] = [0x00, 0xB2, 0x01, 0x0C, 0x00];

/// Visa card listed in its PPSE, with the PAN and expiry in SFI 1 record 1.
pub fn emv_card(pan_bcd: &[u8], expiry_bcd: &[u8]) -> MockApduChannel {
    let directory_entry = tlv(&[0x61], &[tlv(&[0x4F], &VISA_AID), tlv(&[0x87], &[0x01])].concat());
    let ppse = tlv(
        &[0x6F],
        &[
            tlv(&[0x84], b"2PAY.SYS.DDF01"),
            tlv(&[0xA5], &tlv(&[0xBF, 0x0C], &directory_entry)),
        ]
        .concat(),
    );

    let fci = tlv(
        &[0x6F],
        &[tlv(&[0x84], &VISA_AID), tlv(&[0xA5], &tlv(&[0x50], b"VISA CREDIT"))].concat(),
    );

    let gpo = tlv(
        &[0x77],
        &[tlv(&[0x82], &[0x20, 0x00]), tlv(&[0x94], &[0x08, 0x01, 0x01, 0x00])].concat(),
    );

    let record = tlv(
        &[0x70],
        &[tlv(&[0x5A], pan_bcd), tlv(&[0x5F, 0x24], expiry_bcd)].concat(),
    );

    MockApduChannel::new()
        .with_historical_bytes(&[0x80, 0x73, 0xC8, 0x21])
        .respond(&select(b"2PAY.SYS.DDF01"), &ok(&ppse))
        .respond(&select(&VISA_AID), &ok(&fci))
        .respond(&GPO_EMPTY_PDOL, &ok(&gpo))
        .respond(&READ_RECORD_1_1, &ok(&record))
}

/// The standard Visa test card, expiring 2028-12-31.
pub fn visa_card() -> MockApduChannel {
    emv_card(&[0x41, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11], &[0x28, 0x12, 0x31])
}
