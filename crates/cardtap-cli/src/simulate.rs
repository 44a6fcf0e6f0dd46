//! Simulated tags for trying the engine without a reader.

use crate::cli::Scenario;
use cardtap_core::constants::{TECH_ISO_DEP, TECH_MIFARE_CLASSIC, TECH_NFC_A};
use cardtap_hardware::mock::{MockApduChannel, MockBlockChannel, MockChannelFactory};
use cardtap_hardware::types::MifareClassicLayout;

const VISA_AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10];

/// A tag ready to be presented: its UID, advertised markers and the factory
/// that knows how to talk to it.
pub struct SimulatedTag {
    pub uid: Vec<u8>,
    pub technologies: Vec<&'static str>,
    pub factory: MockChannelFactory,
}

impl SimulatedTag {
    pub fn for_scenario(scenario: Scenario) -> Self {
        let memory_uid = vec![0x04, 0x9C, 0x21, 0x5A];
        let emv_uid = vec![0x08, 0x3F, 0x71, 0xE2];

        match scenario {
            Scenario::Memory => Self::memory(memory_uid, memory_card()),
            Scenario::Locked => Self::memory(
                memory_uid,
                memory_card()
                    .with_sector_key(2, [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7])
                    .lock_sector(5),
            ),
            Scenario::TornMemory => Self::memory(memory_uid, memory_card().fail_read_at(9)),
            Scenario::Emv => Self::emv(emv_uid, visa_card()),
            Scenario::BadEmv => Self::emv(emv_uid, MockApduChannel::new()),
            Scenario::LostEmv => Self::emv(emv_uid, visa_card().fail_at_exchange(3)),
            Scenario::Unsupported => Self {
                uid: vec![0x04, 0x52, 0x1A, 0x8B, 0x30, 0x6C, 0x80],
                technologies: vec![TECH_NFC_A, "ndef"],
                factory: MockChannelFactory::new(),
            },
            Scenario::Dual => Self {
                technologies: vec![TECH_NFC_A, TECH_MIFARE_CLASSIC, TECH_ISO_DEP],
                factory: MockChannelFactory::new()
                    .with_block_card(emv_uid.clone(), memory_card())
                    .with_apdu_card(emv_uid.clone(), visa_card()),
                uid: emv_uid,
            },
        }
    }

    fn memory(uid: Vec<u8>, card: MockBlockChannel) -> Self {
        Self {
            technologies: vec![TECH_NFC_A, TECH_MIFARE_CLASSIC],
            factory: MockChannelFactory::new().with_block_card(uid.clone(), card),
            uid,
        }
    }

    fn emv(uid: Vec<u8>, card: MockApduChannel) -> Self {
        Self {
            technologies: vec![TECH_NFC_A, TECH_ISO_DEP],
            factory: MockChannelFactory::new().with_apdu_card(uid.clone(), card),
            uid,
        }
    }
}

fn memory_card() -> MockBlockChannel {
    MockBlockChannel::new(MifareClassicLayout::Classic1K)
        .with_text_block(1, "CARDTAP DEMO")
        .with_text_block(4, "Member: A. Smith")
        .with_text_block(8, "Balance: 12.50")
        .with_text_block(20, "Valid to 2027-06")
}

fn tlv(tag: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    // Short form lengths only; every object below is under 128 bytes.
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    out
}

fn ok(mut data: Vec<u8>) -> Vec<u8> {
    data.extend_from_slice(&[0x90, 0x00]);
    data
}

fn select(name: &[u8]) -> Vec<u8> {
    let mut apdu = vec![0x00, 0xA4, 0x04, 0x00, name.len() as u8];
    apdu.extend_from_slice(name);
    apdu.push(0x00);
    apdu
}

/// Visa test card: PPSE, SELECT, GET PROCESSING OPTIONS (format 1) and two
/// records, the second one holding track 2 only.
fn visa_card() -> MockApduChannel {
    let entry = tlv(&[0x61], &[tlv(&[0x4F], &VISA_AID), tlv(&[0x87], &[0x01])].concat());
    let ppse = tlv(
        &[0x6F],
        &[
            tlv(&[0x84], b"2PAY.SYS.DDF01"),
            tlv(&[0xA5], &tlv(&[0xBF, 0x0C], &entry)),
        ]
        .concat(),
    );
    let fci = tlv(
        &[0x6F],
        &[tlv(&[0x84], &VISA_AID), tlv(&[0xA5], &tlv(&[0x50], b"VISA DEBIT"))].concat(),
    );

    // AIP 1980, AFL: SFI 1 records 1-2.
    let gpo = tlv(&[0x80], &[0x19, 0x80, 0x08, 0x01, 0x02, 0x00]);
    let record_1 = tlv(&[0x70], &tlv(&[0x5F, 0x24], &[0x29, 0x04, 0x30]));
    let record_2 = tlv(
        &[0x70],
        &tlv(
            &[0x57],
            &[0x47, 0x61, 0x73, 0x90, 0x01, 0x01, 0x00, 0x10, 0xD2, 0x90, 0x42, 0x01, 0x00, 0x0F],
        ),
    );

    MockApduChannel::new()
        .with_historical_bytes(&[0x80, 0x73, 0xC8, 0x21, 0x10])
        .respond(&select(b"2PAY.SYS.DDF01"), &ok(ppse))
        .respond(&select(&VISA_AID), &ok(fci))
        .respond(&[0x80, 0xA8, 0x00, 0x00, 0x02, 0x83, 0x00, 0x00], &ok(gpo))
        .respond(&[0x00, 0xB2, 0x01, 0x0C, 0x00], &ok(record_1))
        .respond(&[0x00, 0xB2, 0x02, 0x0C, 0x00], &ok(record_2))
}
