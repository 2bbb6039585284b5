use chrono::{SecondsFormat, Utc};

/// RFC 3339 UTC with millisecond precision and a `Z` suffix. The fixed
/// width makes lexicographic comparison agree with chronological order,
/// which is what the watermark queries rely on.
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
