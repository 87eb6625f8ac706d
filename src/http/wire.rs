//! JSON wire format for remote runs

use serde::{Deserialize, Serialize};

use crate::models::FailureKind;

/// Position and name of a unit inside a remote request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub index: usize,
    pub name: String,
}

/// Body POSTed to `{endpoint}/runs`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRunRequest {
    pub run_id: String,
    pub units: Vec<UnitDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Passed,
    Failed,
}

/// One unit's result as reported by the remote executor
///
/// `index` is optional; results without one are matched by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteUnitResult {
    #[serde(default)]
    pub index: Option<usize>,
    pub name: String,
    pub status: RemoteStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub kind: Option<FailureKind>,
    #[serde(default)]
    pub duration_ms: f64,
}

impl RemoteUnitResult {
    pub fn passed(index: usize, name: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            index: Some(index),
            name: name.into(),
            status: RemoteStatus::Passed,
            message: None,
            kind: None,
            duration_ms,
        }
    }

    pub fn failed(
        index: usize,
        name: impl Into<String>,
        duration_ms: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            index: Some(index),
            name: name.into(),
            status: RemoteStatus::Failed,
            message: Some(message.into()),
            kind: None,
            duration_ms,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRunResponse {
    #[serde(default)]
    pub results: Vec<RemoteUnitResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_missing_timeout() {
        let request = RemoteRunRequest {
            run_id: "r1".to_string(),
            units: vec![UnitDescriptor {
                index: 0,
                name: "A".to_string(),
            }],
            timeout_ms: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"run_id":"r1","units":[{"index":0,"name":"A"}]}"#);
    }

    #[test]
    fn test_response_defaults() {
        let response: RemoteRunResponse = serde_json::from_str(
            r#"{"results":[{"name":"B","status":"failed","message":"boom"}]}"#,
        )
        .unwrap();

        let result = &response.results[0];
        assert_eq!(result.index, None);
        assert_eq!(result.status, RemoteStatus::Failed);
        assert_eq!(result.message.as_deref(), Some("boom"));
        assert_eq!(result.duration_ms, 0.0);
    }
}
