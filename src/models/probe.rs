use serde_json::Value;

/// Metadata captured for one probed URL: the fields the scoring engine
/// understands, extracted up front, plus the verbatim probe object retained
/// for audit and display.
#[derive(Debug, Clone)]
pub struct ProbeMeta {
    pub url: String,
    pub status_code: Option<i64>,
    pub content_length: Option<i64>,
    pub title: Option<String>,
    pub webserver: Option<String>,
    pub tech: Vec<String>,
    pub raw: Value,
}

fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .map(|s| s.to_string())
}

fn int_field(v: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| v.get(*k).and_then(Value::as_i64))
}

impl ProbeMeta {
    /// Extract known fields from one probe output object. Field names vary
    /// across probe tool versions, so both spellings are accepted.
    pub fn from_json(raw: Value) -> Option<Self> {
        let url = str_field(&raw, &["url"])?;
        let tech = raw
            .get("tech")
            .or_else(|| raw.get("technologies"))
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            status_code: int_field(&raw, &["status_code", "status-code"]),
            content_length: int_field(&raw, &["content_length", "content-length"]),
            title: str_field(&raw, &["title"]),
            webserver: str_field(&raw, &["webserver", "server"]),
            tech,
            url,
            raw,
        })
    }
}
