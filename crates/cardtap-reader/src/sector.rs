//! MIFARE Classic sector reader.

use cardtap_core::constants::KEY_MIFARE_APPLICATION_DIRECTORY;
use cardtap_core::{MemoryCardReading, SectorReadOutcome};
use cardtap_hardware::{BlockChannel, ChannelError, KeyType, Result, SectorKey};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Reads every sector of a memory card with a single key.
///
/// Sectors are visited in ascending order. A sector that rejects the key is
/// recorded as [`AuthFailed`](cardtap_core::AuthResult::AuthFailed) and the
/// loop moves on; any transport error ends the whole reading.
///
/// Opening and closing the channel is the caller's job.
#[derive(Debug, Clone)]
pub struct SectorReader {
    key: SectorKey,
    cancel: CancellationToken,
}

impl SectorReader {
    /// Reader using the MIFARE application directory key A.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            key: KEY_MIFARE_APPLICATION_DIRECTORY,
            cancel,
        }
    }

    /// Read all sectors of the card behind `channel`.
    ///
    /// # Errors
    ///
    /// Returns the channel error of a failed metadata query, authentication
    /// exchange or block read, or [`ChannelError::Cancelled`] if the token
    /// fires between two sectors.
    pub async fn read<C: BlockChannel>(&self, channel: &mut C) -> Result<MemoryCardReading> {
        let sector_count = channel.sector_count()?;
        debug!(sector_count, "Reading memory card");

        let mut outcomes = Vec::with_capacity(usize::from(sector_count));
        for sector in 0..sector_count {
            if self.cancel.is_cancelled() {
                debug!(sector, "Memory card reading cancelled");
                return Err(ChannelError::Cancelled);
            }
            outcomes.push(self.read_sector(channel, sector).await?);
        }

        let reading = MemoryCardReading::new(outcomes);
        debug!(
            sectors = reading.sector_count(),
            authenticated = reading.authenticated_count(),
            "Memory card read"
        );
        Ok(reading)
    }

    async fn read_sector<C: BlockChannel>(
        &self,
        channel: &mut C,
        sector: u8,
    ) -> Result<SectorReadOutcome> {
        if !channel.authenticate(sector, KeyType::A, &self.key).await? {
            debug!(sector, "Sector authentication failed");
            return Ok(SectorReadOutcome::auth_failed(sector));
        }

        let block_count = channel.block_count_in_sector(sector)?;
        let first_block = channel.sector_to_block(sector)?;

        let mut blocks = Vec::with_capacity(usize::from(block_count));
        for block in first_block..first_block + u16::from(block_count) {
            let data = channel.read_block(block).await?;
            trace!(sector, block, data = %hex::encode_upper(&data), "Block read");
            blocks.push(data);
        }

        Ok(SectorReadOutcome::authenticated(sector, first_block, blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtap_core::AuthResult;
    use cardtap_hardware::mock::MockBlockChannel;
    use cardtap_hardware::types::MifareClassicLayout;

    #[tokio::test]
    async fn test_reads_all_sectors_in_order() {
        let mut channel = MockBlockChannel::new(MifareClassicLayout::Mini).with_text_block(4, "HELLO");
        let probe = channel.probe();

        let reading = SectorReader::new(CancellationToken::new())
            .read(&mut channel)
            .await
            .unwrap();

        assert_eq!(reading.sector_count(), 5);
        assert_eq!(probe.authenticated_sectors(), vec![0, 1, 2, 3, 4]);
        assert_eq!(probe.read_blocks(), (0..20).collect::<Vec<u16>>());

        let sector_one = &reading.sectors()[1];
        assert_eq!(sector_one.blocks()[0].index(), 4);
        assert_eq!(sector_one.blocks()[0].text(), "HELLO");

        // The reader leaves the channel open.
        assert_eq!(probe.close_count(), 0);
    }

    #[tokio::test]
    async fn test_locked_sector_is_recorded_and_skipped() {
        let mut channel = MockBlockChannel::new(MifareClassicLayout::Mini).lock_sector(2);
        let probe = channel.probe();

        let reading = SectorReader::new(CancellationToken::new())
            .read(&mut channel)
            .await
            .unwrap();

        let auth: Vec<_> = reading.sectors().iter().map(SectorReadOutcome::auth).collect();
        assert_eq!(
            auth,
            vec![
                AuthResult::Authenticated,
                AuthResult::Authenticated,
                AuthResult::AuthFailed,
                AuthResult::Authenticated,
                AuthResult::Authenticated,
            ]
        );
        assert!(reading.sectors()[2].blocks().is_empty());
        assert!(!probe.read_blocks().contains(&8));
    }

    #[tokio::test]
    async fn test_only_default_key_is_tried() {
        let mut channel = MockBlockChannel::new(MifareClassicLayout::Mini)
            .with_sector_key(1, [0xFF; 6]);
        let probe = channel.probe();

        let reading = SectorReader::new(CancellationToken::new())
            .read(&mut channel)
            .await
            .unwrap();

        assert!(!reading.sectors()[1].is_authenticated());
        assert_eq!(probe.authenticated_sectors(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_block_failure_aborts_reading() {
        let mut channel = MockBlockChannel::new(MifareClassicLayout::Mini).fail_read_at(9);
        let probe = channel.probe();

        let error = SectorReader::new(CancellationToken::new())
            .read(&mut channel)
            .await
            .unwrap_err();

        assert!(matches!(error, ChannelError::CommunicationError { .. }));
        assert_eq!(probe.authenticated_sectors(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_auth_transport_error_aborts_reading() {
        let mut channel = MockBlockChannel::new(MifareClassicLayout::Classic1K).fail_auth_at(3);

        let result = SectorReader::new(CancellationToken::new())
            .read(&mut channel)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_sector() {
        let token = CancellationToken::new();
        token.cancel();

        let mut channel = MockBlockChannel::new(MifareClassicLayout::Mini);
        let probe = channel.probe();

        let error = SectorReader::new(token).read(&mut channel).await.unwrap_err();
        assert!(matches!(error, ChannelError::Cancelled));
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_4k_large_sectors() {
        let mut channel = MockBlockChannel::new(MifareClassicLayout::Classic4K);

        let reading = SectorReader::new(CancellationToken::new())
            .read(&mut channel)
            .await
            .unwrap();

        assert_eq!(reading.sector_count(), 40);
        assert_eq!(reading.sectors()[31].blocks().len(), 4);
        assert_eq!(reading.sectors()[32].blocks().len(), 16);
        assert_eq!(reading.sectors()[32].blocks()[0].index(), 128);
    }
}
