use super::{Connection, GET_UID, SW_SUCCESS, split_status, transmit};
use crate::atr::Atr;
use crate::traits::{ApduChannel, BlockChannel, ChannelFactory};
use crate::types::{KeyType, MifareClassicLayout, SectorKey};
use crate::{ChannelError, Result};
use cardtap_core::TagHandle;
use cardtap_core::constants::{MIFARE_BLOCK_SIZE, TECH_ISO_DEP, TECH_MIFARE_CLASSIC};
use pcsc::{Attribute, Card, Context, Protocols, ShareMode};
use std::ffi::CString;
use tracing::debug;

/// Largest short command APDU accepted by PC/SC part 3 readers.
const MAX_SHORT_APDU: usize = 261;

/// Opens channels on one PC/SC reader.
#[derive(Clone)]
pub struct PcscChannelFactory {
    context: Context,
    reader: CString,
}

impl PcscChannelFactory {
    pub fn new(context: Context, reader: CString) -> Self {
        Self { context, reader }
    }

    /// Connect to the tag in the field and check it is still `tag`.
    async fn connect(&self, tag: &TagHandle, technology: &'static str) -> Result<(Card, Atr)> {
        let context = self.context.clone();
        let reader = self.reader.clone();
        let expected_uid = tag.uid().to_vec();

        tokio::task::spawn_blocking(move || {
            let card = match context.connect(&reader, ShareMode::Shared, Protocols::ANY) {
                Ok(card) => card,
                Err(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard) => {
                    return Err(ChannelError::absent(technology));
                }
                Err(e) => return Err(e.into()),
            };

            let atr = Atr::parse(&card.get_attribute_owned(Attribute::AtrString)?)?;
            let response = transmit(&card, &GET_UID)?;
            match split_status(&response)? {
                (uid, SW_SUCCESS) if uid == expected_uid.as_slice() => Ok((card, atr)),
                _ => Err(ChannelError::absent(technology)),
            }
        })
        .await
        .map_err(|e| ChannelError::other(format!("PC/SC task failed: {e}")))?
    }
}

impl ChannelFactory for PcscChannelFactory {
    type Block = PcscBlockChannel;
    type Apdu = PcscApduChannel;

    async fn open_block_channel(&self, tag: &TagHandle) -> Result<PcscBlockChannel> {
        let (card, atr) = self.connect(tag, TECH_MIFARE_CLASSIC).await?;
        let layout = atr
            .mifare_layout()
            .ok_or_else(|| ChannelError::absent(TECH_MIFARE_CLASSIC))?;

        debug!(uid = %tag.uid_hex(), layout = layout.name(), "Block channel opened");
        Ok(PcscBlockChannel {
            connection: Connection::new(card),
            layout,
        })
    }

    async fn open_apdu_channel(&self, tag: &TagHandle) -> Result<PcscApduChannel> {
        let (card, atr) = self.connect(tag, TECH_ISO_DEP).await?;
        if atr.storage_card_name().is_some() {
            return Err(ChannelError::absent(TECH_ISO_DEP));
        }

        debug!(uid = %tag.uid_hex(), "APDU channel opened");
        Ok(PcscApduChannel {
            connection: Connection::new(card),
            historical_bytes: atr.historical_bytes().to_vec(),
        })
    }
}

/// MIFARE Classic access through the reader's pseudo-APDUs.
pub struct PcscBlockChannel {
    connection: Connection,
    layout: MifareClassicLayout,
}

impl PcscBlockChannel {
    fn out_of_range(sector: u8) -> ChannelError {
        ChannelError::invalid_data(format!("sector {sector} out of range"))
    }
}

impl BlockChannel for PcscBlockChannel {
    fn sector_count(&self) -> Result<u8> {
        Ok(self.layout.sector_count())
    }

    fn block_count_in_sector(&self, sector: u8) -> Result<u8> {
        self.layout
            .blocks_in_sector(sector)
            .ok_or_else(|| Self::out_of_range(sector))
    }

    fn sector_to_block(&self, sector: u8) -> Result<u16> {
        self.layout
            .first_block(sector)
            .ok_or_else(|| Self::out_of_range(sector))
    }

    async fn authenticate(&mut self, sector: u8, key_type: KeyType, key: &SectorKey) -> Result<bool> {
        let block = self.sector_to_block(sector)?;
        let [block_msb, block_lsb] = block.to_be_bytes();

        let mut load_key = vec![0xFF, 0x82, 0x00, 0x00, 0x06];
        load_key.extend_from_slice(key);
        let authenticate = [
            0xFF,
            0x86,
            0x00,
            0x00,
            0x05,
            0x01,
            block_msb,
            block_lsb,
            key_type.auth_code(),
            0x00,
        ];

        self.connection
            .run(move |card| {
                let response = transmit(card, &load_key)?;
                let (_, status) = split_status(&response)?;
                if status != SW_SUCCESS {
                    return Err(ChannelError::communication(format!(
                        "reader rejected key load: {}",
                        hex::encode_upper(status)
                    )));
                }

                let response = transmit(card, &authenticate)?;
                let (_, status) = split_status(&response)?;
                Ok(status == SW_SUCCESS)
            })
            .await
    }

    async fn read_block(&mut self, block: u16) -> Result<Vec<u8>> {
        let [block_msb, block_lsb] = block.to_be_bytes();
        let read = [0xFF, 0xB0, block_msb, block_lsb, MIFARE_BLOCK_SIZE as u8];

        self.connection
            .run(move |card| {
                let response = transmit(card, &read)?;
                match split_status(&response)? {
                    (data, SW_SUCCESS) if data.len() == MIFARE_BLOCK_SIZE => Ok(data.to_vec()),
                    (_, status) => Err(ChannelError::communication(format!(
                        "block {block} read failed: {}",
                        hex::encode_upper(status)
                    ))),
                }
            })
            .await
    }

    async fn close(&mut self) -> Result<()> {
        self.connection.close().await
    }
}

/// ISO-DEP exchange with the tag in the field.
pub struct PcscApduChannel {
    connection: Connection,
    historical_bytes: Vec<u8>,
}

impl ApduChannel for PcscApduChannel {
    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        if command.len() > MAX_SHORT_APDU {
            return Err(ChannelError::invalid_data(format!(
                "command of {} bytes exceeds {MAX_SHORT_APDU} byte limit",
                command.len()
            )));
        }

        let command = command.to_vec();
        self.connection
            .run(move |card| transmit(card, &command))
            .await
    }

    fn historical_bytes(&self) -> Option<&[u8]> {
        Some(&self.historical_bytes)
    }

    // The reader folds the type B higher layer response into the ATR.
    fn hi_layer_response(&self) -> Option<&[u8]> {
        None
    }

    fn max_transceive_length(&self) -> usize {
        MAX_SHORT_APDU
    }

    async fn close(&mut self) -> Result<()> {
        self.connection.close().await
    }
}
