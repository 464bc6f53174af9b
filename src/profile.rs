//! Profile records and their persisted wire shape.
//!
//! A [`Profile`] is keyed by the barcode that identifies it. On disk the
//! whole collection is one JSON object mapping barcode to a
//! [`ProfileRecord`]: `{ "<barcode>": { "nom", "prenom", "photo", "scans" } }`.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Encoded still image, stored as a `data:` URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Photo(String);

impl Photo {
    pub const JPEG_PREFIX: &'static str = "data:image/jpeg;base64,";

    pub fn from_data_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    pub fn is_jpeg(&self) -> bool {
        self.0.starts_with(Self::JPEG_PREFIX)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A registered person, identified by the barcode printed on their card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    barcode: String,
    pub first_name: String,
    pub last_name: String,
    pub photo: Option<Photo>,
    scans: Vec<DateTime<Utc>>,
}

impl Profile {
    /// Create a freshly registered profile. The registration itself counts as
    /// the first scan.
    pub fn register(
        barcode: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        photo: Option<Photo>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            barcode: barcode.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            photo,
            scans: vec![truncate_to_millis(at)],
        }
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Scan history, oldest first
    pub fn scans(&self) -> &[DateTime<Utc>] {
        &self.scans
    }

    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.scans.last().copied()
    }

    /// Append a scan and return the timestamp actually stored.
    ///
    /// Entries are stored at millisecond precision and stay strictly
    /// increasing: a clock reading not after the previous entry is bumped to
    /// one millisecond past it.
    pub fn record_scan(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        let mut at = truncate_to_millis(at);
        if let Some(last) = self.scans.last() {
            if at <= *last {
                at = *last + ChronoDuration::milliseconds(1);
            }
        }
        self.scans.push(at);
        at
    }

    pub fn from_record(barcode: impl Into<String>, record: ProfileRecord) -> Self {
        Self {
            barcode: barcode.into(),
            first_name: record.prenom,
            last_name: record.nom,
            photo: if record.photo.is_empty() {
                None
            } else {
                Some(Photo::from_data_url(record.photo))
            },
            scans: record.scans,
        }
    }

    pub fn to_record(&self) -> ProfileRecord {
        ProfileRecord {
            nom: self.last_name.clone(),
            prenom: self.first_name.clone(),
            photo: self
                .photo
                .as_ref()
                .map(|p| p.as_data_url().to_string())
                .unwrap_or_default(),
            scans: self.scans.clone(),
        }
    }
}

/// Persisted form of one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Last name
    pub nom: String,
    /// First name
    pub prenom: String,
    /// Data URL, empty when no photo was taken
    #[serde(default)]
    pub photo: String,
    #[serde(default, with = "iso_millis")]
    pub scans: Vec<DateTime<Utc>>,
}

/// The full persisted map, ordered by barcode
pub type ProfileMap = BTreeMap<String, ProfileRecord>;

fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

/// `2024-01-01T10:00:00.000Z`, the format browsers produce for ISO dates
pub(crate) mod iso_millis {
    use super::*;

    pub fn serialize<S>(scans: &[DateTime<Utc>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(
            scans
                .iter()
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        )
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Vec<String> = Vec::deserialize(deserializer)?;
        raw.iter()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_register_creates_single_scan() {
        let profile = Profile::register("1234567890123", "Ana", "Silva", None, t(0));

        assert_eq!(profile.barcode(), "1234567890123");
        assert_eq!(profile.display_name(), "Ana Silva");
        assert_eq!(profile.scans(), &[t(0)]);
        assert_eq!(profile.scan_count(), 1);
    }

    #[test]
    fn test_record_scan_appends_in_order() {
        let mut profile = Profile::register("42", "Ana", "Silva", None, t(0));
        profile.record_scan(t(10));
        profile.record_scan(t(20));

        assert_eq!(profile.scans(), &[t(0), t(10), t(20)]);
        assert_eq!(profile.last_scan(), Some(t(20)));
    }

    #[test]
    fn test_record_scan_never_goes_backwards() {
        let mut profile = Profile::register("42", "Ana", "Silva", None, t(10));

        let same = profile.record_scan(t(10));
        let earlier = profile.record_scan(t(5));

        assert_eq!(same, t(10) + ChronoDuration::milliseconds(1));
        assert_eq!(earlier, t(10) + ChronoDuration::milliseconds(2));
        assert!(profile.scans().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_record_uses_wire_field_names() {
        let profile = Profile::register(
            "42",
            "Ana",
            "Silva",
            Some(Photo::from_data_url("data:image/jpeg;base64,AAAA")),
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        );

        let json = serde_json::to_value(profile.to_record()).unwrap();

        assert_eq!(json["nom"], "Silva");
        assert_eq!(json["prenom"], "Ana");
        assert_eq!(json["photo"], "data:image/jpeg;base64,AAAA");
        assert_eq!(json["scans"][0], "2024-03-01T09:30:00.000Z");
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let record: ProfileRecord =
            serde_json::from_str(r#"{ "nom": "Silva", "prenom": "Ana" }"#).unwrap();
        let profile = Profile::from_record("42", record);

        assert!(profile.photo.is_none());
        assert!(profile.scans().is_empty());
    }

    #[test]
    fn test_record_parses_browser_timestamps() {
        let record: ProfileRecord = serde_json::from_str(
            r#"{ "nom": "Silva", "prenom": "Ana", "photo": "",
                 "scans": ["2024-03-01T09:30:00.000Z", "2024-03-02T10:00:00.250Z"] }"#,
        )
        .unwrap();

        assert_eq!(record.scans.len(), 2);
        assert_eq!(
            record.scans[1],
            Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap() + ChronoDuration::milliseconds(250)
        );
    }

    #[test]
    fn test_empty_photo_is_absent() {
        let profile = Profile::register("42", "Ana", "Silva", None, t(0));
        assert_eq!(profile.to_record().photo, "");

        let photo = Photo::from_data_url("data:image/jpeg;base64,AAAA");
        assert!(photo.is_jpeg());
        assert!(!photo.is_empty());
    }
}
