use crate::dataset::RawRecord;
use crate::error::FetchError;
use serde::Deserialize;
use serde_json::Value;

/// CKAN `datastore_search` response wrapper.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub result: Option<ResultBody>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ResultBody {
    pub total: u64,
    pub records: Vec<RawRecord>,
}

/// One page of records plus the server's total count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub total: u64,
    pub records: Vec<RawRecord>,
}

impl Envelope {
    pub fn into_page(self, url: &str) -> Result<Page, FetchError> {
        if !self.success {
            let detail = match self.error {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "no error detail".to_string(),
            };
            return Err(FetchError::Api(detail));
        }
        let body = self.result.ok_or_else(|| FetchError::Malformed {
            url: url.to_string(),
            reason: "envelope has no `result`".to_string(),
        })?;
        Ok(Page {
            total: body.total,
            records: body.records,
        })
    }
}

/// Parse a response body; any deviation from the envelope shape is a fetch failure.
pub fn parse_envelope(body: &str, url: &str) -> Result<Page, FetchError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    envelope.into_page(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_envelope() {
        let body = r#"{
            "success": true,
            "result": {
                "total": 2,
                "records": [
                    {"_id": 1, "Survey_Date": "01/01/2020", "Kinneret_Level": -211.0},
                    {"_id": 2, "Survey_Date": "02/01/2020", "Kinneret_Level": "-210.95"}
                ]
            }
        }"#;
        let page = parse_envelope(body, "http://x").unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.records.len(), 2);
        let keys: Vec<&String> = page.records[0].keys().collect();
        assert_eq!(keys, vec!["_id", "Survey_Date", "Kinneret_Level"]);
    }

    #[test]
    fn success_false_is_api_error() {
        let body = r#"{"success": false, "error": {"message": "Not found"}}"#;
        match parse_envelope(body, "http://x") {
            Err(FetchError::Api(msg)) => assert!(msg.contains("Not found")),
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn missing_result_is_malformed() {
        let body = r#"{"success": true}"#;
        assert!(matches!(
            parse_envelope(body, "http://x"),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn non_object_records_are_malformed() {
        let body = r#"{"success": true, "result": {"total": 1, "records": [1, 2]}}"#;
        assert!(matches!(
            parse_envelope(body, "http://x"),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn html_body_is_malformed() {
        assert!(matches!(
            parse_envelope("<html>busy</html>", "http://x"),
            Err(FetchError::Malformed { .. })
        ));
    }
}
