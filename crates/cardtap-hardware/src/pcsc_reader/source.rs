use super::{GET_UID, SW_SUCCESS, split_status, transmit};
use crate::atr::Atr;
use crate::traits::TagSource;
use crate::types::ReaderInfo;
use crate::{ChannelError, Result};
use cardtap_core::TagHandle;
use pcsc::{Attribute, Context, Protocols, ReaderState, Scope, ShareMode, State};
use std::ffi::{CStr, CString};
use std::time::Duration;
use tracing::{debug, info};

/// Size of the buffer receiving the reader list.
const READER_LIST_BUFFER: usize = 2048;

/// What one status poll observed.
enum Poll {
    Idle(State),
    Presented(State, Vec<u8>),
}

/// Tag source watching one PC/SC reader for tag insertions.
pub struct PcscTagSource {
    context: Context,
    reader: CString,
    poll_interval: Duration,
    state: State,
}

impl PcscTagSource {
    /// Open the named reader, or the first one found when `reader` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Disconnected` if the PC/SC service is not
    /// running or no matching reader is connected.
    pub fn open(reader: Option<&str>, poll_interval: Duration) -> Result<Self> {
        let context = Context::establish(Scope::User)?;

        let mut buffer = [0u8; READER_LIST_BUFFER];
        let readers: Vec<&CStr> = context.list_readers(&mut buffer)?.collect();
        let selected = match reader {
            Some(wanted) => readers
                .into_iter()
                .find(|name| name.to_string_lossy() == wanted),
            None => readers.into_iter().next(),
        }
        .ok_or_else(|| ChannelError::disconnected(reader.unwrap_or("any PC/SC reader")))?
        .to_owned();

        info!(reader = %selected.to_string_lossy(), "PC/SC reader opened");
        Ok(Self {
            context,
            reader: selected,
            poll_interval,
            state: State::UNAWARE,
        })
    }

    /// Reader name as reported by PC/SC.
    pub fn reader_name(&self) -> String {
        self.reader.to_string_lossy().into_owned()
    }

    /// Shared PC/SC context, for building a channel factory on the same reader.
    pub fn context(&self) -> Context {
        self.context.clone()
    }

    pub fn reader(&self) -> &CStr {
        &self.reader
    }

    fn poll(context: &Context, reader: &CStr, current: State, timeout: Duration) -> Result<Poll> {
        let mut states = [ReaderState::new(reader.to_owned(), current)];
        match context.get_status_change(timeout, &mut states) {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => return Ok(Poll::Idle(current)),
            Err(e) => return Err(e.into()),
        }

        let mut event = states[0].event_state();
        let arrived = event.contains(State::PRESENT) && !current.contains(State::PRESENT);
        event.remove(State::CHANGED);

        if arrived {
            Ok(Poll::Presented(event, states[0].atr().to_vec()))
        } else {
            Ok(Poll::Idle(event))
        }
    }

    fn identify(context: &Context, reader: &CStr, atr: &[u8]) -> Result<TagHandle> {
        let atr = Atr::parse(atr)?;
        let card = context.connect(reader, ShareMode::Shared, Protocols::ANY)?;
        let atr = match card.get_attribute_owned(Attribute::AtrString) {
            Ok(bytes) => Atr::parse(&bytes)?,
            Err(_) => atr,
        };

        let response = transmit(&card, &GET_UID)?;
        let uid = match split_status(&response)? {
            (uid, SW_SUCCESS) => uid.to_vec(),
            (_, status) => {
                return Err(ChannelError::communication(format!(
                    "reader could not read UID: {}",
                    hex::encode_upper(status)
                )));
            }
        };
        drop(card);

        TagHandle::new(uid, atr.technologies()).map_err(|e| ChannelError::invalid_data(e.to_string()))
    }

    /// Poll once and identify a newly arrived tag.
    ///
    /// Identification errors are returned separately so the caller can keep
    /// polling when a tag is pulled away too quickly.
    fn poll_once(
        context: &Context,
        reader: &CStr,
        current: State,
        timeout: Duration,
    ) -> Result<(State, Option<Result<TagHandle>>)> {
        match Self::poll(context, reader, current, timeout)? {
            Poll::Presented(state, atr) => Ok((state, Some(Self::identify(context, reader, &atr)))),
            Poll::Idle(state) => Ok((state, None)),
        }
    }
}

impl TagSource for PcscTagSource {
    async fn next_tag(&mut self) -> Result<TagHandle> {
        loop {
            let context = self.context.clone();
            let reader = self.reader.clone();
            let current = self.state;
            let timeout = self.poll_interval;

            let poll = tokio::task::spawn_blocking(move || {
                Self::poll_once(&context, &reader, current, timeout)
            })
            .await
            .map_err(|e| ChannelError::other(format!("PC/SC task failed: {e}")))?;

            let (state, presented) = poll?;
            self.state = state;

            match presented {
                Some(Ok(tag)) => {
                    debug!(uid = %tag.uid_hex(), technologies = ?tag.technologies(), "Tag detected");
                    return Ok(tag);
                }
                Some(Err(e)) => debug!(error = %e, "Tag left before it was identified"),
                None => {}
            }
        }
    }

    fn reader_info(&self) -> ReaderInfo {
        ReaderInfo::new(
            self.reader_name(),
            vec!["ISO14443A".to_string(), "ISO14443B".to_string()],
        )
        .with_max_baud_rate(424000)
    }
}
