use serde::{Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Deserialize an RFC 3339 formatted string into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// Format an OffsetDateTime as RFC 3339 for display, falling back to Debug
/// formatting when the timestamp cannot be rendered.
pub fn format_rfc3339(datetime: &OffsetDateTime) -> String {
    datetime
        .format(&Rfc3339)
        .unwrap_or_else(|_| format!("{datetime:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn format_round_trip() {
        let ts = datetime!(2024-05-01 12:30:00 UTC);
        let rendered = format_rfc3339(&ts);
        assert_eq!(rendered, "2024-05-01T12:30:00Z");
        let parsed = OffsetDateTime::parse(&rendered, &Rfc3339).unwrap();
        assert_eq!(parsed, ts);
    }
}
