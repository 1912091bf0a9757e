use serde::Serialize;
use serde_json::Value;
use sop_catalog::CatalogError;
use sop_router::RouterError;

/// JSON document printed on stdout for every command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    pub data: Value,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: None,
            error: None,
            data,
        }
    }

    pub fn error(err: &anyhow::Error) -> Self {
        Self {
            status: CommandStatus::Error,
            message: Some(format!("{err:#}")),
            error: Some(classify_error(err)),
            data: Value::Null,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }
}

/// Map the first typed error in the chain to a stable code.
pub fn classify_error(err: &anyhow::Error) -> ErrorEnvelope {
    for cause in err.chain() {
        if let Some(catalog) = cause.downcast_ref::<CatalogError>() {
            return classify_catalog(catalog);
        }
        if let Some(router) = cause.downcast_ref::<RouterError>() {
            return match router {
                RouterError::Catalog(inner) => classify_catalog(inner),
                RouterError::Gather(_) | RouterError::Match(_) | RouterError::Config(_) => {
                    envelope(
                        "invalid_config",
                        Some("Fix the configuration file or flag named in the message."),
                    )
                }
                RouterError::Environment(_) => envelope(
                    "invalid_environment",
                    Some("The --environment file must be a JSON object with a `services` map."),
                ),
            };
        }
    }
    envelope("command_failed", None)
}

fn classify_catalog(err: &CatalogError) -> ErrorEnvelope {
    match err {
        CatalogError::NotFound(_) => envelope(
            "not_found",
            Some("Run `sop-router catalog list` to see the known procedure ids."),
        ),
        CatalogError::AlreadyExists(_) => envelope("already_exists", None),
        CatalogError::Validation { .. } => envelope("invalid_procedure", None),
        CatalogError::Io(_) | CatalogError::Serialization(_) | CatalogError::Backend(_) => {
            envelope(
                "catalog_unavailable",
                Some("Check the --catalog path; `sop-router catalog init` creates a catalog."),
            )
        }
    }
}

fn envelope(code: &str, hint: Option<&str>) -> ErrorEnvelope {
    ErrorEnvelope {
        code: code.to_string(),
        hint: hint.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn catalog_errors_keep_their_code_through_context() {
        let err = Err::<(), _>(CatalogError::NotFound("x".into()))
            .context("Failed to load procedure")
            .unwrap_err();
        assert_eq!(classify_error(&err).code, "not_found");

        let response = CommandResponse::error(&err);
        assert!(response.is_error());
        assert_eq!(
            response.message.as_deref(),
            Some("Failed to load procedure: Procedure not found: x")
        );
    }

    #[test]
    fn router_wrapped_catalog_errors_are_unwrapped() {
        let err = anyhow::Error::new(RouterError::Catalog(CatalogError::validation(
            "a",
            "name must not be empty",
        )));
        assert_eq!(classify_error(&err).code, "invalid_procedure");

        let err = anyhow::Error::new(RouterError::Config("weights.keyword".into()));
        assert_eq!(classify_error(&err).code, "invalid_config");
    }

    #[test]
    fn untyped_errors_fall_back() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(
            classify_error(&err),
            ErrorEnvelope {
                code: "command_failed".into(),
                hint: None
            }
        );
    }

    #[test]
    fn ok_envelope_has_no_error_fields() {
        let json = serde_json::to_value(CommandResponse::ok(serde_json::json!({"n": 1}))).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok", "data": {"n": 1}}));
    }
}
