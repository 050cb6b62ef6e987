//! Mapping of FHIR error responses.

use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationOutcome {
    resource_type: String,
    #[serde(default)]
    issue: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    code: Option<String>,
    diagnostics: Option<String>,
    details: Option<CodeableConcept>,
}

#[derive(Debug, Deserialize)]
struct CodeableConcept {
    text: Option<String>,
}

/// Pass successful responses through; turn anything else into [`Error::Api`].
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

pub(crate) fn api_error(status: u16, body: &str) -> Error {
    let outcome = serde_json::from_str::<OperationOutcome>(body)
        .ok()
        .filter(|o| o.resource_type == "OperationOutcome");

    let Some(outcome) = outcome else {
        return Error::Api {
            message: body.to_string(),
            status: Some(status),
            error_type: None,
        };
    };

    let messages: Vec<&str> = outcome
        .issue
        .iter()
        .filter_map(|i| {
            i.diagnostics
                .as_deref()
                .or_else(|| i.details.as_ref().and_then(|d| d.text.as_deref()))
        })
        .collect();

    Error::Api {
        message: if messages.is_empty() {
            body.to_string()
        } else {
            messages.join("; ")
        },
        status: Some(status),
        error_type: outcome.issue.iter().find_map(|i| i.code.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_outcome_diagnostics() {
        let body = serde_json::json!({
            "resourceType": "OperationOutcome",
            "issue": [
                {"severity": "error", "code": "not-found", "diagnostics": "Patient/42 is not known"},
                {"severity": "error", "code": "processing", "details": {"text": "second issue"}}
            ]
        })
        .to_string();

        match api_error(404, &body) {
            Error::Api {
                message,
                status,
                error_type,
            } => {
                assert_eq!(message, "Patient/42 is not known; second issue");
                assert_eq!(status, Some(404));
                assert_eq!(error_type.as_deref(), Some("not-found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_body() {
        match api_error(502, "upstream down") {
            Error::Api {
                message,
                error_type,
                ..
            } => {
                assert_eq!(message, "upstream down");
                assert!(error_type.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_resource_is_not_an_outcome() {
        let body = r#"{"resourceType":"Patient","id":"1"}"#;
        assert!(matches!(
            api_error(409, body),
            Error::Api { error_type: None, .. }
        ));
    }
}
