//! XMLTV programme normalizer
//!
//! Reads `<tv><programme channel=".." start=".." stop=".."><title/><desc/></programme></tv>`
//! into [`Programme`] records with UTC instants. A document that is not
//! well-formed, or whose root is not `tv`, fails as a whole; a single
//! programme with bad timestamps is dropped and the rest are kept.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::models::{Programme, ProgrammeRaw, TvDocument};

/// Length of the `YYYYMMDDHHMMSS` prefix
const XMLTV_DATE_LEN: usize = 14;

#[derive(Debug, Error)]
pub enum XmltvError {
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("document has no root element")]
    MissingRoot,
    #[error("unexpected root element '{0}', expected 'tv'")]
    UnexpectedRoot(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp '{0}' is shorter than 14 characters")]
    TooShort(String),
    #[error("timestamp '{0}' does not start with 14 digits")]
    InvalidDigits(String),
    #[error("timestamp '{0}' is not a valid calendar date")]
    InvalidDate(String),
    #[error("timestamp '{0}' has a malformed offset")]
    InvalidOffset(String),
}

/// Parse an XMLTV timestamp (`YYYYMMDDHHMMSS[ ±HHMM]`).
///
/// The 14 digits are always read as a UTC wall clock; an offset suffix is
/// then applied as a correction (`+` subtracts, `-` adds). Existing clients
/// depend on this two-step order.
pub fn parse_xmltv_date(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let value = value.trim();
    if value.len() < XMLTV_DATE_LEN {
        return Err(TimestampError::TooShort(value.to_string()));
    }

    let digits = value
        .get(..XMLTV_DATE_LEN)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| TimestampError::InvalidDigits(value.to_string()))?;

    // All ASCII digits, so these slices and parses cannot fail
    let field = |range: std::ops::Range<usize>| digits[range].parse::<u32>().unwrap_or_default();
    let year = field(0..4) as i32;
    let naive = NaiveDate::from_ymd_opt(year, field(4..6), field(6..8))
        .and_then(|date| date.and_hms_opt(field(8..10), field(10..12), field(12..14)))
        .ok_or_else(|| TimestampError::InvalidDate(value.to_string()))?;
    let instant = Utc.from_utc_datetime(&naive);

    let suffix = value[XMLTV_DATE_LEN..].trim_start();
    if suffix.is_empty() {
        return Ok(instant);
    }

    let offset_minutes = parse_offset_minutes(suffix)
        .ok_or_else(|| TimestampError::InvalidOffset(value.to_string()))?;
    Ok(instant - Duration::minutes(offset_minutes))
}

/// `+HHMM` / `-HHMM` to signed minutes
fn parse_offset_minutes(suffix: &str) -> Option<i64> {
    let bytes = suffix.as_bytes();
    if bytes.len() != 5 || !bytes[1..].iter().all(u8::is_ascii_digit) {
        return None;
    }

    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i64 = suffix[1..3].parse().ok()?;
    let minutes: i64 = suffix[3..5].parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    Some(sign * (hours * 60 + minutes))
}

/// Name of the document's root element
fn root_element_name(xml: &str) -> Result<String, XmltvError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err(XmltvError::MissingRoot),
            Err(e) => return Err(XmltvError::Xml(e.to_string())),
            _ => {}
        }
    }
}

fn to_programme(raw: ProgrammeRaw) -> Option<Programme> {
    let parse = |label: &str, value: Option<&str>| -> Option<DateTime<Utc>> {
        let Some(value) = value else {
            tracing::debug!(channel = %raw.channel, "programme without {} dropped", label);
            return None;
        };
        parse_xmltv_date(value)
            .map_err(|e| tracing::debug!(channel = %raw.channel, "programme dropped: {}", e))
            .ok()
    };

    let start = parse("start", raw.start.as_deref())?;
    let stop = parse("stop", raw.stop.as_deref())?;
    if stop <= start {
        tracing::debug!(channel = %raw.channel, %start, %stop, "programme with non-positive duration dropped");
        return None;
    }

    Some(Programme {
        title: raw.title().to_string(),
        description: raw.description().to_string(),
        channel: raw.channel,
        start,
        stop,
    })
}

/// Normalize an XMLTV document into programmes, in document order
pub fn normalize(xml: &str) -> Result<Vec<Programme>, XmltvError> {
    let root = root_element_name(xml)?;
    if root != "tv" {
        return Err(XmltvError::UnexpectedRoot(root));
    }

    let document: TvDocument =
        quick_xml::de::from_str(xml).map_err(|e| XmltvError::Xml(e.to_string()))?;

    let total = document.programmes.len();
    let programmes: Vec<Programme> = document
        .programmes
        .into_iter()
        .filter_map(to_programme)
        .collect();

    if programmes.len() < total {
        tracing::info!(
            total,
            kept = programmes.len(),
            "dropped programmes with invalid timestamps"
        );
    }

    Ok(programmes)
}

/// Normalize raw document bytes (decoded as UTF-8, invalid sequences replaced)
pub fn normalize_bytes(xml: &[u8]) -> Result<Vec<Programme>, XmltvError> {
    normalize(&String::from_utf8_lossy(xml))
}
