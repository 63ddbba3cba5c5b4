//! Time-warped registry proxy URL construction
//!
//! The proxy serves registry metadata and artifacts as they existed at a
//! pinned instant; routing the package manager through it is the only
//! supported way to get reproducible dependency resolution. The URL
//! format is `http://<ecosystem>:<RFC3339 timestamp>@<host>` and is used
//! verbatim as the registry URL handed to the package manager.

use crate::Ecosystem;
use chrono::{DateTime, SecondsFormat, Utc};

/// Build the date-pinned registry URL for one ecosystem.
#[must_use]
pub fn timewarp_url(ecosystem: Ecosystem, at: DateTime<Utc>, host: &str) -> String {
    format!(
        "http://{}:{}@{}",
        ecosystem,
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        host
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_format_is_verbatim() {
        let at: DateTime<Utc> = "2023-02-10T10:00:00Z".parse().unwrap();
        assert_eq!(
            timewarp_url(Ecosystem::Npm, at, "timewarp:8081"),
            "http://npm:2023-02-10T10:00:00Z@timewarp:8081"
        );
    }
}
