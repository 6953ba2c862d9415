/// What a response body of the monitoring service contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    /// No records for the window.
    Empty,
    /// The service does not know the requested station.
    StationNotFound,
    /// The service rejected the station code.
    InvalidCode,
    /// Anything else, to be normalized.
    Payload(&'a str),
}

impl Classification<'_> {
    pub fn is_payload(&self) -> bool {
        matches!(self, Classification::Payload(_))
    }
}

const EMPTY_BODY: &str = "[]";
const INVALID_CODE_BODY: &str = r#"[{"error":"Incorrect code"}]"#;

/// Matches `body` exactly (ignoring surrounding whitespace) against the known non-data bodies.
pub fn classify<'a>(body: &'a str, station_code: &str) -> Classification<'a> {
    let trimmed = body.trim();
    if trimmed == EMPTY_BODY {
        Classification::Empty
    } else if trimmed == INVALID_CODE_BODY {
        Classification::InvalidCode
    } else if trimmed == format!(r#"[{{"error":"code '{station_code}' not found"}}]"#) {
        Classification::StationNotFound
    } else {
        Classification::Payload(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_bodies() {
        assert_eq!(classify("[]", "acnj"), Classification::Empty);
        assert_eq!(classify(" []\n", "acnj"), Classification::Empty);
        assert_eq!(
            classify(r#"[{"error":"code 'acnj' not found"}]"#, "acnj"),
            Classification::StationNotFound
        );
        assert_eq!(
            classify(r#"[{"error":"Incorrect code"}]"#, "acnj"),
            Classification::InvalidCode
        );
    }

    #[test]
    fn test_everything_else_is_payload() {
        // Not-found envelope for a different station is not a known shape for this one.
        let other = r#"[{"error":"code 'blri' not found"}]"#;
        assert_eq!(classify(other, "acnj"), Classification::Payload(other));

        let records = r#"[{"slevel":0.9,"stime":"2022-03-12 11:04:00","sensor":"wls"}]"#;
        assert!(classify(records, "acnj").is_payload());
        assert!(classify("", "acnj").is_payload());
        assert!(classify("<html>oops</html>", "acnj").is_payload());
    }
}
