use super::{
    dto::CreateHistoryRequest,
    repo_types::{NewHistoryEntry, SearchMode, UnknownMode},
};
use crate::error::ApiError;

/// Turn a create request into a store-ready entry, rejecting it before
/// persistence when a required field is missing or malformed.
pub fn validate_new_entry(req: CreateHistoryRequest) -> Result<NewHistoryEntry, ApiError> {
    let title = match req.title {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ApiError::Validation("title is required".into())),
    };
    let jd = match req.jd {
        Some(jd) if !jd.trim().is_empty() => jd,
        _ => return Err(ApiError::Validation("jd is required".into())),
    };
    let mode: SearchMode = req
        .mode
        .ok_or_else(|| ApiError::Validation("mode is required".into()))?
        .parse()
        .map_err(|e: UnknownMode| ApiError::Validation(e.to_string()))?;
    let results = match req.results {
        Some(v) if !v.is_null() => v,
        _ => return Err(ApiError::Validation("results is required".into())),
    };
    Ok(NewHistoryEntry {
        title,
        jd,
        mode,
        results,
        timestamp: req.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_request() -> CreateHistoryRequest {
        CreateHistoryRequest {
            title: Some("React Search".into()),
            jd: Some("Looking for a React engineer".into()),
            mode: Some("full".into()),
            results: Some(json!({ "candidates": [] })),
            timestamp: None,
        }
    }

    #[test]
    fn accepts_complete_request() {
        let entry = validate_new_entry(full_request()).unwrap();
        assert_eq!(entry.title, "React Search");
        assert_eq!(entry.mode, SearchMode::Full);
        assert_eq!(entry.results, json!({ "candidates": [] }));
    }

    #[test]
    fn rejects_each_missing_field() {
        let cases = [
            CreateHistoryRequest { title: None, ..full_request() },
            CreateHistoryRequest { title: Some("   ".into()), ..full_request() },
            CreateHistoryRequest { jd: None, ..full_request() },
            CreateHistoryRequest { jd: Some(String::new()), ..full_request() },
            CreateHistoryRequest { mode: None, ..full_request() },
            CreateHistoryRequest { mode: Some("deep".into()), ..full_request() },
            CreateHistoryRequest { results: None, ..full_request() },
            CreateHistoryRequest { results: Some(serde_json::Value::Null), ..full_request() },
        ];
        for req in cases {
            let err = validate_new_entry(req).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{err}");
        }
    }

    #[test]
    fn supplied_timestamp_is_kept() {
        let ts = time::macros::datetime!(2024-06-01 08:00:00 UTC);
        let req = CreateHistoryRequest { timestamp: Some(ts), ..full_request() };
        assert_eq!(validate_new_entry(req).unwrap().timestamp, Some(ts));
    }
}
