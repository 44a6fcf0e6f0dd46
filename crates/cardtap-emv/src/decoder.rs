//! Card decoder collaborator.
//!
//! [`CardDecoder`] turns the APDU exchanges offered by an [`ApduProvider`]
//! into a [`DecodedCard`]. [`EmvDecoder`] reads contactless EMV payment
//! cards: it selects a payment application (through the PPSE directory, or
//! by trying known AIDs), sends GET PROCESSING OPTIONS, reads the records
//! listed in the Application File Locator, and extracts the account number,
//! expiry date and card brand.
//!
//! No cryptographic verification is done and no transaction is started.

use crate::aid::{KNOWN_AIDS, PPSE, card_type_for_aid};
use crate::apdu::{ApduCommand, ApduResponse, commands};
use crate::error::{CommunicationError, DecodeError, Result};
use crate::tlv::{find_all, find_tag, parse_dol};
use chrono::{Months, NaiveDate};
use std::fmt;
use std::future::Future;
use tracing::{debug, trace};

/// Responses chained with `61XX` before the card is considered broken.
const MAX_RESPONSE_CHAIN: usize = 8;

const TAG_AID: &[u8] = &[0x4F];
const TAG_APPLICATION_LABEL: &[u8] = &[0x50];
const TAG_TRACK2: &[u8] = &[0x57];
const TAG_PAN: &[u8] = &[0x5A];
const TAG_EXPIRY: &[u8] = &[0x5F, 0x24];
const TAG_GPO_FORMAT_1: &[u8] = &[0x80];
const TAG_DF_NAME: &[u8] = &[0x84];
const TAG_AFL: &[u8] = &[0x94];
const TAG_PDOL: &[u8] = &[0x9F, 0x38];
const TAG_TRACK2_DATA: &[u8] = &[0x9F, 0x6B];

/// Terminal values offered for PDOL objects; anything else is zero-filled.
const TERMINAL_DEFAULTS: &[(&[u8], &[u8])] = &[
    // Terminal Transaction Qualifiers: qVSDC, contact chip, online PIN and
    // signature supported, consumer device CVM supported.
    (&[0x9F, 0x66], &[0x36, 0x00, 0x40, 0x00]),
    // Terminal type: attended, offline with online capability.
    (&[0x9F, 0x35], &[0x22]),
];

/// Exchange capability the decoder needs from a card link.
pub trait ApduProvider: Send {
    /// Send a command APDU and return the full response, status word included.
    fn transceive(
        &mut self,
        command: &[u8],
    ) -> impl Future<Output = std::result::Result<Vec<u8>, CommunicationError>> + Send;

    /// Protocol-layer historical bytes of the card; empty when unavailable.
    fn historical_bytes(&self) -> Vec<u8>;
}

/// Raw card data produced by a decoder.
///
/// Holds the full account number. The `Debug` output shows only its last
/// four digits.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedCard {
    pub pan: String,
    pub expiry: Option<NaiveDate>,
    pub card_type: Option<String>,
    pub aid: Vec<u8>,
}

impl fmt::Debug for DecodedCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible = self.pan.len().saturating_sub(4);
        f.debug_struct("DecodedCard")
            .field("pan", &format_args!("***{}", self.pan.get(visible..).unwrap_or("")))
            .field("expiry", &self.expiry)
            .field("card_type", &self.card_type)
            .field("aid", &hex::encode_upper(&self.aid))
            .finish()
    }
}

/// Reads card data through an [`ApduProvider`].
pub trait CardDecoder: Send + Sync {
    fn read_card<P: ApduProvider>(
        &self,
        provider: &mut P,
    ) -> impl Future<Output = Result<DecodedCard>> + Send;
}

/// Contactless EMV payment card decoder.
///
/// # Examples
///
/// ```no_run
/// use cardtap_emv::{ApduProvider, CardDecoder, EmvDecoder};
///
/// async fn card_brand<P: ApduProvider>(provider: &mut P) -> Option<String> {
///     let card = EmvDecoder::new().read_card(provider).await.ok()?;
///     card.card_type
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EmvDecoder {
    fallback_aids: Vec<Vec<u8>>,
}

impl EmvDecoder {
    /// Decoder trying the well known payment AIDs when the PPSE is missing.
    pub fn new() -> Self {
        Self {
            fallback_aids: KNOWN_AIDS.iter().map(|aid| aid.to_vec()).collect(),
        }
    }

    /// Replace the AIDs tried when the PPSE is missing.
    pub fn with_fallback_aids(mut self, aids: Vec<Vec<u8>>) -> Self {
        self.fallback_aids = aids;
        self
    }

    /// Select a payment application, returning its AID and FCI.
    async fn select_application<P: ApduProvider>(
        &self,
        provider: &mut P,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut candidates: Vec<Vec<u8>> = Vec::new();

        let ppse = exchange(provider, commands::select(PPSE)).await?;
        if ppse.is_success() {
            for aid in find_all(&ppse.data, TAG_AID) {
                if !candidates.iter().any(|c| c.as_slice() == aid) {
                    candidates.push(aid.to_vec());
                }
            }
            debug!(applications = candidates.len(), "PPSE selected");
        } else {
            debug!(sw = %ppse.status_string(), "PPSE not available");
        }

        for aid in &self.fallback_aids {
            if !candidates.contains(aid) {
                candidates.push(aid.clone());
            }
        }

        for aid in candidates {
            let response = exchange(provider, commands::select(&aid)).await?;
            if response.is_success() {
                let selected = find_tag(&response.data, TAG_DF_NAME)
                    .map(<[u8]>::to_vec)
                    .unwrap_or(aid);
                debug!(aid = %hex::encode_upper(&selected), "Application selected");
                return Ok((selected, response.data));
            }
            trace!(aid = %hex::encode_upper(&aid), sw = %response.status_string(), "Application not present");
        }

        Err(DecodeError::unsupported("no supported payment application"))
    }

    /// Read every record the AFL lists. Records the card refuses are skipped.
    async fn read_records<P: ApduProvider>(provider: &mut P, afl: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut records = Vec::new();

        for entry in afl.chunks_exact(4) {
            let sfi = entry[0] >> 3;
            let (first, last) = (entry[1], entry[2]);
            if sfi == 0 || first == 0 || first > last {
                debug!(entry = %hex::encode_upper(entry), "Skipping invalid AFL entry");
                continue;
            }

            for record in first..=last {
                let response = exchange(provider, commands::read_record(record, sfi)).await?;
                if response.is_success() && !response.data.is_empty() {
                    records.push(response.data);
                } else {
                    debug!(sfi, record, sw = %response.status_string(), "Record not readable");
                }
            }
        }

        Ok(records)
    }
}

impl Default for EmvDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CardDecoder for EmvDecoder {
    async fn read_card<P: ApduProvider>(&self, provider: &mut P) -> Result<DecodedCard> {
        let historical = provider.historical_bytes();
        debug!(historical = %hex::encode_upper(&historical), "Decoding EMV card");

        let (aid, fci) = self.select_application(provider).await?;

        let pdol_data = find_tag(&fci, TAG_PDOL).map(pdol_answer).unwrap_or_default();
        let gpo = exchange(provider, commands::get_processing_options(&pdol_data)?).await?;
        if !gpo.is_success() {
            return Err(DecodeError::malformed(format!(
                "GET PROCESSING OPTIONS rejected with {}",
                gpo.status_string()
            )));
        }

        let mut pool = vec![fci, gpo.data.clone()];
        match parse_afl(&gpo.data) {
            Some(afl) => pool.extend(Self::read_records(provider, &afl).await?),
            None => debug!("No AFL in GET PROCESSING OPTIONS response"),
        }

        let card = extract_card(aid, &pool)?;
        debug!(card = ?card, "EMV card decoded");
        Ok(card)
    }
}

/// Send a command, following `61XX` and `6CXX` status words.
async fn exchange<P: ApduProvider>(provider: &mut P, command: ApduCommand) -> Result<ApduResponse> {
    let mut bytes = command.build()?;
    let mut data = Vec::new();

    for _ in 0..MAX_RESPONSE_CHAIN {
        trace!(command = %hex::encode_upper(&bytes), "C-APDU");
        let raw = provider.transceive(&bytes).await?;
        let response = ApduResponse::from_bytes(&raw)?;
        trace!(sw = %response.status_string(), length = response.data.len(), "R-APDU");

        match response.sw1 {
            0x61 => {
                data.extend_from_slice(&response.data);
                bytes = commands::get_response(response.sw2).build()?;
            }
            0x6C => {
                if let Some(le) = bytes.last_mut() {
                    *le = response.sw2;
                }
            }
            _ => {
                data.extend_from_slice(&response.data);
                return Ok(ApduResponse {
                    data,
                    sw1: response.sw1,
                    sw2: response.sw2,
                });
            }
        }
    }

    Err(DecodeError::malformed("card kept chaining responses"))
}

/// PDOL answer in the order the card asked for it.
///
/// Known objects get the terminal default, cut or zero-padded on the right to
/// the requested length. Unknown objects are zeros.
fn pdol_answer(pdol: &[u8]) -> Vec<u8> {
    let mut answer = Vec::new();
    for (tag, len) in parse_dol(pdol) {
        let default = TERMINAL_DEFAULTS
            .iter()
            .find(|(known, _)| *known == tag)
            .map_or(&[][..], |(_, value)| *value);
        let start = answer.len();
        answer.extend(default.iter().take(len));
        answer.resize(start + len, 0);
    }
    answer
}

/// Application File Locator from a GET PROCESSING OPTIONS response.
fn parse_afl(gpo: &[u8]) -> Option<Vec<u8>> {
    // Format 2: template 77 holding tag 94.
    if let Some(afl) = find_tag(gpo, TAG_AFL) {
        return (afl.len() % 4 == 0).then(|| afl.to_vec());
    }

    // Format 1: tag 80 holding AIP (2 bytes) then the AFL.
    let template = find_tag(gpo, TAG_GPO_FORMAT_1)?;
    let afl = template.get(2..)?;
    (!afl.is_empty() && afl.len() % 4 == 0).then(|| afl.to_vec())
}

fn extract_card(aid: Vec<u8>, pool: &[Vec<u8>]) -> Result<DecodedCard> {
    let first = |tag: &[u8]| pool.iter().find_map(|data| find_tag(data, tag));

    let track2 = first(TAG_TRACK2)
        .or_else(|| first(TAG_TRACK2_DATA))
        .map(hex::encode_upper);
    let track2_fields = track2.as_deref().and_then(|t| t.split_once('D'));

    let pan = first(TAG_PAN)
        .map(|bcd| hex::encode_upper(bcd).trim_end_matches('F').to_string())
        .or_else(|| track2_fields.map(|(pan, _)| pan.to_string()))
        .filter(|pan| !pan.is_empty())
        .ok_or_else(|| DecodeError::malformed("no account number in card records"))?;

    if !pan.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::malformed("account number is not numeric"));
    }

    let expiry = first(TAG_EXPIRY)
        .and_then(parse_expiry_date)
        .or_else(|| track2_fields.and_then(|(_, rest)| parse_track2_expiry(rest)));

    let card_type = card_type_for_aid(&aid).map(str::to_string).or_else(|| {
        first(TAG_APPLICATION_LABEL)
            .map(|label| String::from_utf8_lossy(label).trim().to_string())
            .filter(|label| !label.is_empty())
    });

    Ok(DecodedCard {
        pan,
        expiry,
        card_type,
        aid,
    })
}

fn bcd_pair(digits: &str) -> Option<u32> {
    digits.parse().ok()
}

/// Tag `5F24`: YYMMDD in BCD.
fn parse_expiry_date(value: &[u8]) -> Option<NaiveDate> {
    let digits = hex::encode(value);
    if digits.len() != 6 {
        return None;
    }
    let year = bcd_pair(&digits[0..2])?;
    let month = bcd_pair(&digits[2..4])?;
    let day = bcd_pair(&digits[4..6])?;
    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
}

/// Track 2 expiry (YYMM after the separator), as the month's last day.
fn parse_track2_expiry(after_separator: &str) -> Option<NaiveDate> {
    let year = bcd_pair(after_separator.get(0..2)?)?;
    let month = bcd_pair(after_separator.get(2..4)?)?;
    NaiveDate::from_ymd_opt(2000 + year as i32, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}
