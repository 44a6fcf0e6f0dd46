//! End-to-end readings against mock channels.
//!
//! Every test drives `ReadingOrchestrator::read_tag` through a mock channel
//! factory and checks both the terminal result and what happened on the
//! channel.

mod common;

use cardtap_core::{AuthResult, ReadingResult, SectorReadOutcome, TagHandle};
use cardtap_hardware::mock::{ChannelCall, MockApduChannel, MockBlockChannel, MockChannelFactory};
use cardtap_hardware::types::MifareClassicLayout;
use cardtap_reader::ReadingOrchestrator;
use chrono::NaiveDate;
use common::*;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_memory_card_outcomes_cover_every_sector_in_order() {
    let card = MockBlockChannel::new(MifareClassicLayout::Classic1K);
    let orchestrator = ReadingOrchestrator::new(block_factory(card));

    let ReadingResult::MemoryCard(reading) = orchestrator.read_tag(&memory_tag()).await else {
        panic!("expected a memory card reading");
    };

    let sectors: Vec<u8> = reading.sectors().iter().map(SectorReadOutcome::sector).collect();
    assert_eq!(sectors, (0..16).collect::<Vec<u8>>());
    assert!(reading.sectors().iter().all(|s| s.blocks().len() == 4));
}

#[tokio::test]
async fn test_locked_sector_does_not_stop_the_others() {
    let card = MockBlockChannel::new(MifareClassicLayout::Mini)
        .with_text_block(13, "AFTER LOCK")
        .lock_sector(2);
    let probe = card.probe();
    let orchestrator = ReadingOrchestrator::new(block_factory(card));

    let ReadingResult::MemoryCard(reading) = orchestrator.read_tag(&memory_tag()).await else {
        panic!("expected a memory card reading");
    };

    assert_eq!(reading.sector_count(), 5);
    assert_eq!(reading.sectors()[2].auth(), AuthResult::AuthFailed);
    assert!(reading.sectors()[2].blocks().is_empty());
    for sector in [0, 1, 3, 4] {
        assert_eq!(reading.sectors()[sector].auth(), AuthResult::Authenticated);
        assert_eq!(reading.sectors()[sector].blocks().len(), 4);
    }
    assert_eq!(reading.sectors()[3].blocks()[1].text(), "AFTER LOCK");
    assert_eq!(reading.locked_sectors().collect::<Vec<_>>(), vec![2]);
    assert_eq!(probe.close_count(), 1);
}

#[tokio::test]
async fn test_memory_card_rendering() {
    let orchestrator = ReadingOrchestrator::new(block_factory(memory_card().lock_sector(4)));

    let result = orchestrator.read_tag(&memory_tag()).await;
    let text = result.to_string();

    assert!(text.starts_with("Card read successfully!"));
    assert!(text.contains("Sector 0, Block 1: SECTOR 0"));
    assert!(text.contains("Sector 3, Block 12: SECTOR 3"));
    assert!(!text.contains("Sector 4,"));
}

#[tokio::test]
async fn test_block_failure_after_auth_is_transport_failure() {
    let card = MockBlockChannel::new(MifareClassicLayout::Mini).fail_read_at(6);
    let probe = card.probe();
    let orchestrator = ReadingOrchestrator::new(block_factory(card));

    let result = orchestrator.read_tag(&memory_tag()).await;

    assert!(matches!(result, ReadingResult::TransportFailure { .. }), "{result:?}");
    assert_eq!(probe.read_blocks(), vec![0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(probe.calls().last(), Some(&ChannelCall::Close));
}

#[tokio::test]
async fn test_emv_card_is_decoded_and_masked() {
    let card = visa_card();
    let probe = card.probe();
    let orchestrator = ReadingOrchestrator::new(apdu_factory(card));

    let result = orchestrator.read_tag(&emv_tag()).await;

    let ReadingResult::Card(summary) = &result else {
        panic!("expected a card summary, got {result:?}");
    };
    assert_eq!(summary.masked_number, "**** **** **** 1111");
    assert_eq!(summary.expiry, NaiveDate::from_ymd_opt(2028, 12, 31));
    assert_eq!(summary.card_type.as_deref(), Some("Visa"));

    assert!(!result.to_string().contains(VISA_PAN));
    assert!(!serde_json::to_string(&result).unwrap().contains(VISA_PAN));
    assert_eq!(probe.commands().first(), Some(&select(b"2PAY.SYS.DDF01")));
    assert_eq!(probe.close_count(), 1);
}

#[tokio::test]
async fn test_emv_card_with_odd_length_pan() {
    // 15 digits padded with F.
    let card = emv_card(&[0x37, 0x14, 0x49, 0x63, 0x53, 0x98, 0x43, 0x1F], &[0x27, 0x02, 0x28]);
    let orchestrator = ReadingOrchestrator::new(apdu_factory(card));

    let ReadingResult::Card(summary) = orchestrator.read_tag(&emv_tag()).await else {
        panic!("expected a card summary");
    };
    assert_eq!(summary.masked_number, "**** **** **** 8431");
    assert_eq!(summary.expiry_display(), "02/27");
}

#[tokio::test]
async fn test_first_exchange_failure_is_transport_failure() {
    let card = visa_card().fail_at_exchange(0);
    let probe = card.probe();
    let orchestrator = ReadingOrchestrator::new(apdu_factory(card));

    let result = orchestrator.read_tag(&emv_tag()).await;

    assert_eq!(result, ReadingResult::transport_failure("Communication error: Tag was lost"));
    assert_eq!(probe.close_count(), 1);
}

#[tokio::test]
async fn test_link_lost_mid_decode_is_transport_failure() {
    let card = visa_card().fail_at_exchange(3);
    let orchestrator = ReadingOrchestrator::new(apdu_factory(card));

    let result = orchestrator.read_tag(&emv_tag()).await;
    assert!(matches!(result, ReadingResult::TransportFailure { .. }), "{result:?}");
}

#[rstest]
#[case::status_word_missing(MockApduChannel::new().with_fallback(&[0x90]))]
#[case::no_payment_application(MockApduChannel::new())]
#[case::no_account_number(emv_card(&[], &[0x28, 0x12, 0x31]))]
#[tokio::test]
async fn test_unparseable_card_is_decode_failure(#[case] card: MockApduChannel) {
    let probe = card.probe();
    let orchestrator = ReadingOrchestrator::new(apdu_factory(card));

    let result = orchestrator.read_tag(&emv_tag()).await;

    assert!(matches!(result, ReadingResult::DecodeFailure { .. }), "{result:?}");
    assert!(result.to_string().starts_with("Could not decode card"));
    assert_eq!(probe.close_count(), 1);
}

#[tokio::test]
async fn test_tag_gone_before_open_is_transport_failure() {
    let mut factory = block_factory(memory_card());
    factory.remove_card(&MEMORY_UID);
    let orchestrator = ReadingOrchestrator::new(factory);

    let result = orchestrator.read_tag(&memory_tag()).await;
    assert!(matches!(result, ReadingResult::TransportFailure { .. }));
    assert!(result.to_string().starts_with("Error reading card"));
}

/// Card scenarios for the close accounting test.
enum Scenario {
    MemorySuccess,
    MemoryLockedSector,
    MemoryBlockFailure,
    MemoryAuthLinkLost,
    MemoryCancelled,
    EmvSuccess,
    EmvTransportFailure,
    EmvDecodeFailure,
    EmvCancelled,
}

#[rstest]
#[case::memory_success(Scenario::MemorySuccess)]
#[case::memory_locked_sector(Scenario::MemoryLockedSector)]
#[case::memory_block_failure(Scenario::MemoryBlockFailure)]
#[case::memory_auth_link_lost(Scenario::MemoryAuthLinkLost)]
#[case::memory_cancelled(Scenario::MemoryCancelled)]
#[case::emv_success(Scenario::EmvSuccess)]
#[case::emv_transport_failure(Scenario::EmvTransportFailure)]
#[case::emv_decode_failure(Scenario::EmvDecodeFailure)]
#[case::emv_cancelled(Scenario::EmvCancelled)]
#[tokio::test]
async fn test_channel_closed_exactly_once(#[case] scenario: Scenario) {
    let cancel = CancellationToken::new();
    let (factory, probe, tag): (MockChannelFactory, _, TagHandle) = match scenario {
        Scenario::MemorySuccess
        | Scenario::MemoryLockedSector
        | Scenario::MemoryBlockFailure
        | Scenario::MemoryAuthLinkLost
        | Scenario::MemoryCancelled => {
            let card = match scenario {
                Scenario::MemoryLockedSector => memory_card().lock_sector(1),
                Scenario::MemoryBlockFailure => memory_card().fail_read_at(17),
                Scenario::MemoryAuthLinkLost => memory_card().fail_auth_at(3),
                Scenario::MemoryCancelled => {
                    cancel.cancel();
                    memory_card()
                }
                _ => memory_card(),
            };
            let probe = card.probe();
            (block_factory(card), probe, memory_tag())
        }
        Scenario::EmvSuccess
        | Scenario::EmvTransportFailure
        | Scenario::EmvDecodeFailure
        | Scenario::EmvCancelled => {
            let card = match scenario {
                Scenario::EmvTransportFailure => visa_card().fail_at_exchange(2),
                Scenario::EmvDecodeFailure => MockApduChannel::new(),
                Scenario::EmvCancelled => {
                    cancel.cancel();
                    visa_card()
                }
                _ => visa_card(),
            };
            let probe = card.probe();
            (apdu_factory(card), probe, emv_tag())
        }
    };

    ReadingOrchestrator::new(factory)
        .read_tag_with_cancel(&tag, &cancel)
        .await;

    assert_eq!(probe.close_count(), 1);
    assert_eq!(probe.calls().last(), Some(&ChannelCall::Close));
}

#[tokio::test]
async fn test_unsupported_tag_never_touches_a_channel() {
    let block = memory_card();
    let apdu = visa_card();
    let (block_probe, apdu_probe) = (block.probe(), apdu.probe());
    let factory = MockChannelFactory::new()
        .with_block_card(MEMORY_UID.to_vec(), block)
        .with_apdu_card(MEMORY_UID.to_vec(), apdu);

    let tag = TagHandle::new(MEMORY_UID.to_vec(), ["nfc-a", "ndef"]).unwrap();
    let result = ReadingOrchestrator::new(factory).read_tag(&tag).await;

    assert_eq!(result, ReadingResult::UnsupportedTag);
    assert_eq!(result.to_string(), "Unsupported card type.");
    assert!(block_probe.calls().is_empty());
    assert!(apdu_probe.calls().is_empty());
}

#[tokio::test]
async fn test_each_presentation_reads_again() {
    let card = memory_card();
    let probe = card.probe();
    let orchestrator = ReadingOrchestrator::new(block_factory(card));

    let first = orchestrator.read_tag(&memory_tag()).await;
    let second = orchestrator.read_tag(&memory_tag()).await;

    assert_eq!(first, second);
    assert_eq!(probe.close_count(), 2);
    assert_eq!(probe.authenticated_sectors().len(), 10);
}
