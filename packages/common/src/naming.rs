//! Deterministic asset names.
//!
//! Originals are named `{stem}-{owner}-{stamp}.{ext}` and derived assets
//! `{stem}-{owner}-{stamp}-{label}.{ext}`. The two shapes differ by one
//! `-` segment, so a derived name never decodes as an original.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the seconds part of a [`NameTimestamp`].
const SECONDS_WIDTH: usize = 10;
/// Width of the nanoseconds part of a [`NameTimestamp`].
const NANOS_WIDTH: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("Malformed asset name: {0}")]
    MalformedName(String),

    #[error("Invalid filename '{filename}': {reason}")]
    InvalidFilename {
        filename: String,
        reason: &'static str,
    },

    #[error("Timestamp {0} cannot be encoded in an asset name")]
    InvalidTimestamp(DateTime<Utc>),
}

/// Decimal digits of the encoding instant, without separators.
///
/// Freshly encoded stamps are `SECONDS_WIDTH + NANOS_WIDTH` digits wide, so
/// they sort in time order. Decoding accepts any non-empty digit run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameTimestamp(String);

impl NameTimestamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Result<Self, NamingError> {
        let secs = at.timestamp();
        if secs < 0 || secs >= 10_i64.pow(SECONDS_WIDTH as u32) {
            return Err(NamingError::InvalidTimestamp(at));
        }
        // Leap-second nanos can exceed 999_999_999; clamp to keep the width.
        let nanos = at.timestamp_subsec_nanos().min(999_999_999);
        Ok(Self(format!(
            "{secs:0sw$}{nanos:0nw$}",
            sw = SECONDS_WIDTH,
            nw = NANOS_WIDTH
        )))
    }

    /// Parse a digit run taken from an asset name.
    pub fn from_digits(digits: &str) -> Result<Self, NamingError> {
        if is_digits(digits) {
            Ok(Self(digits.to_string()))
        } else {
            Err(NamingError::MalformedName(digits.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The instant this stamp encodes, if it has the fixed width.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.0.len() != SECONDS_WIDTH + NANOS_WIDTH {
            return None;
        }
        let (secs, nanos) = self.0.split_at(SECONDS_WIDTH);
        let secs: i64 = secs.parse().ok()?;
        let nanos: u32 = nanos.parse().ok()?;
        Utc.timestamp_opt(secs, nanos).single()
    }
}

impl fmt::Display for NameTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Components recovered from an original asset name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub stem: String,
    pub owner_id: u64,
    pub timestamp: NameTimestamp,
    pub ext: String,
}

impl DecodedName {
    /// Re-assemble the original name.
    pub fn name(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.stem, self.owner_id, self.timestamp, self.ext
        )
    }

    /// Name of the derived asset for `label`.
    pub fn derived(&self, label: &str) -> String {
        format!(
            "{}-{}-{}-{}.{}",
            self.stem, self.owner_id, self.timestamp, label, self.ext
        )
    }
}

/// Split a filename into stem and final extension segment.
pub fn split_filename(original_filename: &str) -> Result<(&str, &str), NamingError> {
    let invalid = |reason| NamingError::InvalidFilename {
        filename: original_filename.to_string(),
        reason,
    };

    let basename = Path::new(original_filename)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("no file name"))?;

    let (stem, ext) = basename
        .rsplit_once('.')
        .ok_or_else(|| invalid("missing extension"))?;

    if stem.is_empty() {
        return Err(invalid("empty stem"));
    }
    if ext.is_empty() {
        return Err(invalid("empty extension"));
    }
    if ext.contains('-') {
        return Err(invalid("extension contains '-'"));
    }
    Ok((stem, ext))
}

/// Build the deterministic name for a freshly uploaded original.
pub fn encode(
    original_filename: &str,
    owner_id: u64,
    at: DateTime<Utc>,
) -> Result<String, NamingError> {
    let (stem, ext) = split_filename(original_filename)?;
    let timestamp = NameTimestamp::from_datetime(at)?;
    Ok(format!("{stem}-{owner_id}-{timestamp}.{ext}"))
}

/// Parse an original asset name.
///
/// The name must be `stem-digits-digits.ext` with a non-empty stem and
/// extension; the two digit runs are the last two `-` segments before the
/// final `.`.
pub fn decode(name: &str) -> Result<DecodedName, NamingError> {
    let malformed = || NamingError::MalformedName(name.to_string());

    let (base, ext) = name.rsplit_once('.').ok_or_else(malformed)?;
    if ext.is_empty() || ext.contains('-') {
        return Err(malformed());
    }

    let mut parts = base.rsplitn(3, '-');
    let (Some(stamp), Some(owner), Some(stem)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };

    if stem.is_empty() || !is_digits(owner) || !is_digits(stamp) {
        return Err(malformed());
    }
    let owner_id = owner.parse::<u64>().map_err(|_| malformed())?;

    Ok(DecodedName {
        stem: stem.to_string(),
        owner_id,
        timestamp: NameTimestamp(stamp.to_string()),
        ext: ext.to_string(),
    })
}

/// Name of the derived asset for `label`, built from an original name.
pub fn derived_name(name: &str, label: &str) -> Result<String, NamingError> {
    Ok(decode(name)?.derived(label))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> DateTime<Utc> {
        Utc.timestamp_opt(1_709_769_600, 123_456_789).unwrap()
    }

    #[test]
    fn encode_embeds_owner_and_stamp() {
        let name = encode("me.jpg", 7, instant()).unwrap();
        assert_eq!(name, "me-7-1709769600123456789.jpg");
    }

    #[test]
    fn decode_recovers_encoded_components() {
        for filename in ["me.jpg", "holiday.photo.png", "a-b-c.gif", "x-1-2.jpeg"] {
            let (stem, ext) = split_filename(filename).unwrap();
            let name = encode(filename, 42, instant()).unwrap();
            let decoded = decode(&name).unwrap();

            assert_eq!(decoded.stem, stem);
            assert_eq!(decoded.owner_id, 42);
            assert_eq!(decoded.timestamp.to_datetime(), Some(instant()));
            assert_eq!(decoded.ext, ext);
            assert_eq!(decoded.name(), name);
        }
    }

    #[test]
    fn stamp_is_fixed_width() {
        let early = Utc.timestamp_opt(5, 7).unwrap();
        let stamp = NameTimestamp::from_datetime(early).unwrap();
        assert_eq!(stamp.as_str(), "0000000005000000007");
        assert!(stamp < NameTimestamp::from_datetime(instant()).unwrap());
    }

    #[test]
    fn negative_timestamp_rejected() {
        let before_epoch = Utc.timestamp_opt(-1, 0).unwrap();
        assert!(matches!(
            encode("me.jpg", 1, before_epoch),
            Err(NamingError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn decode_rejects_bare_word() {
        assert!(matches!(
            decode("noextensionordashes"),
            Err(NamingError::MalformedName(_))
        ));
    }

    #[test]
    fn decode_rejects_shapes_other_than_original() {
        for name in [
            "me.jpg",
            "me-7.jpg",
            "-7-123.jpg",
            "me-7-123.",
            "me-x-123.jpg",
            "me-7-12a.jpg",
            "me-7-123",
            "me-99999999999999999999999-1.jpg",
        ] {
            assert!(decode(name).is_err(), "{name} should not decode");
        }
    }

    #[test]
    fn derived_name_does_not_decode() {
        let name = encode("me.jpg", 7, instant()).unwrap();
        let derived = derived_name(&name, "thumbnail").unwrap();
        assert_eq!(derived, "me-7-1709769600123456789-thumbnail.jpg");
        assert!(decode(&derived).is_err());
    }

    #[test]
    fn encode_rejects_filename_without_extension() {
        assert!(matches!(
            encode("README", 1, instant()),
            Err(NamingError::InvalidFilename { .. })
        ));
        assert!(matches!(
            encode(".bashrc", 1, instant()),
            Err(NamingError::InvalidFilename { .. })
        ));
    }

    #[test]
    fn encode_uses_basename_only() {
        let name = encode("uploads/tmp/me.jpg", 3, instant()).unwrap();
        assert!(name.starts_with("me-3-"));
    }

    #[test]
    fn legacy_stamp_still_decodes() {
        let decoded = decode("me-7-14170000001234567890.jpg").unwrap();
        assert_eq!(decoded.timestamp.as_str(), "14170000001234567890");
        assert_eq!(decoded.timestamp.to_datetime(), None);
    }
}
