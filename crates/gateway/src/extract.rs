//! Extraction Engine: generate → parse → validate, with an optional
//! repair round when the first attempt fails.

use std::future::Future;
use std::sync::Arc;

use infergate_core::GatewayError;
use infergate_schema::SchemaRegistry;
use serde_json::Value;

const JSON_BEGIN: &str = "<<<JSON>>>";
const JSON_END: &str = "<<<END>>>";

/// Which step of the state machine produced a terminal failure, emitted
/// alongside the HTTP error for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Parse,
    Validate,
    RepairParse,
    RepairValidate,
}

impl FailureStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Validate => "validate",
            Self::RepairParse => "repair_parse",
            Self::RepairValidate => "repair_validate",
        }
    }
}

/// A terminal extraction failure: the HTTP-facing error plus the stage that
/// produced it.
#[derive(Debug)]
pub struct ExtractionFailure {
    pub error: GatewayError,
    pub stage: FailureStage,
}

/// The result of a successful extraction attempt.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub data: Value,
    pub repair_attempted: bool,
}

/// Runs the generate → parse → validate → repair state machine against one
/// schema for one request. Holds no model/backend state of its own: the
/// caller supplies a `generate` closure per call so the engine stays
/// agnostic to which backend is bound for the request's model.
pub struct ExtractionEngine {
    schemas: Arc<SchemaRegistry>,
}

impl ExtractionEngine {
    #[must_use]
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self { schemas }
    }

    /// Run one extraction attempt for `schema_id` against `prompt`, calling
    /// `generate(prompt)` for the initial attempt and, if it fails and
    /// `repair` is set, once more with a synthesized repair prompt.
    ///
    /// # Errors
    ///
    /// [`GatewayError::SchemaNotFound`] / [`GatewayError::SchemaLoadFailed`]
    /// if the schema itself cannot be resolved; otherwise an
    /// [`ExtractionFailure`] wrapping [`GatewayError::InvalidJson`] or
    /// [`GatewayError::SchemaValidationFailed`] once generate/repair are
    /// exhausted.
    pub async fn run<F, Fut>(
        &self,
        schema_id: &str,
        prompt: &str,
        repair: bool,
        generate: F,
    ) -> Result<ExtractionOutcome, ExtractionFailure>
    where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String, GatewayError>>,
    {
        // Schema ambiguity policy is checked once, up front, regardless of
        // what the model produces.
        self.schemas
            .document(schema_id)
            .map_err(|e| ExtractionFailure {
                error: map_schema_error(e),
                stage: FailureStage::Parse,
        })?;

        let raw = generate(prompt.to_owned())
            .await
            .map_err(|error| ExtractionFailure {
                error,
                stage: FailureStage::Parse,
        })?;

        match self.parse_and_validate(schema_id, &raw) {
            Ok(data) => {
                return Ok(ExtractionOutcome {
                        data,
                        repair_attempted: false,
                });
            }
            Err(first) if !repair => {
                return Err(ExtractionFailure {
                        stage: escalate(is_validation_failure(&first), false),
                        error: first,
                });
            }
            Err(first) => {
                let repair_prompt = build_repair_prompt(prompt, schema_id, &first);
                let raw = generate(repair_prompt)
                    .await
                    .map_err(|error| ExtractionFailure {
                        error,
                        stage: FailureStage::RepairParse,
                })?;
                match self.parse_and_validate(schema_id, &raw) {
                    Ok(data) => Ok(ExtractionOutcome {
                            data,
                            repair_attempted: true,
                    }),
                    Err(second) => {
                        let stage = escalate(is_validation_failure(&second), true);
                        Err(ExtractionFailure {
                                error: second,
                                stage,
                        })
                    }
                }
            }
        }
    }

    fn parse_and_validate(&self, schema_id: &str, raw: &str) -> Result<Value, GatewayError> {
        let candidates = json_object_candidates(raw);
        let mut parsed_any = false;
        let mut last_errors: Vec<String> = Vec::new();

        for candidate in candidates {
            let Ok(value) = serde_json::from_str::<Value>(candidate) else {
                continue;
            };
            if !value.is_object() {
                continue;
            }
            parsed_any = true;
            match self.schemas.validate(schema_id, &value) {
                Ok(errors) if errors.is_empty() => return Ok(value),
                Ok(errors) => last_errors = errors,
                Err(e) => return Err(map_schema_error(e)),
            }
        }

        if parsed_any {
            Err(GatewayError::SchemaValidationFailed {
                    errors: serde_json::json!(last_errors),
            })
        } else {
            Err(GatewayError::InvalidJson {
                    reason: "no JSON object found in model output".to_owned(),
            })
        }
    }
}

fn is_validation_failure(error: &GatewayError) -> bool {
    matches!(error, GatewayError::SchemaValidationFailed {.. })
}

fn escalate(was_validation: bool, is_repair: bool) -> FailureStage {
    match (was_validation, is_repair) {
        (false, false) => FailureStage::Parse,
        (true, false) => FailureStage::Validate,
        (false, true) => FailureStage::RepairParse,
        (true, true) => FailureStage::RepairValidate,
    }
}

fn map_schema_error(e: infergate_schema::SchemaError) -> GatewayError {
    match e {
        infergate_schema::SchemaError::NotFound(schema_id) => {
            GatewayError::SchemaNotFound { schema_id }
        }
        infergate_schema::SchemaError::LoadFailed { schema_id, reason } => {
            GatewayError::SchemaLoadFailed { schema_id, reason }
        }
    }
}

fn build_repair_prompt(original_prompt: &str, schema_id: &str, failure: &GatewayError) -> String {
    format!(
        "The previous response could not be used.\n\
        Original request: {original_prompt}\n\
        Required schema: {schema_id}\n\
        Problem: {failure}\n\
        Respond again with a single JSON object wrapped in {JSON_BEGIN} and {JSON_END} that satisfies the schema."
    )
}

/// Finds candidate JSON objects in `raw`. The delimited form is tried first
/// if present; then every brace-balanced substring, in order of
/// appearance. Arrays and scalars are never returned — only object
/// candidates, since the caller discards non-objects anyway, but producing
/// them here would let a scalar "validate" against an object schema by
/// accident in a permissive validator.
fn json_object_candidates(raw: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    if let Some(delimited) = delimited_candidate(raw) {
        candidates.push(delimited);
    }
    candidates.extend(brace_balanced_candidates(raw));
    candidates
}

fn delimited_candidate(raw: &str) -> Option<&str> {
    let begin = raw.find(JSON_BEGIN)? + JSON_BEGIN.len();
    let rest = &raw[begin..];
    let end = rest.find(JSON_END)?;
    Some(rest[..end].trim())
}

fn brace_balanced_candidates(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = raw.as_bytes();
    let mut depth: i32 = 0;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        out.push(&raw[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Strict-JSON validator used by callers that demand raw JSON rather than a
/// schema-shaped object. Rejects empty/whitespace input,
/// code-fenced input, trailing non-whitespace after the value, the
/// out-of-spec literals `NaN`/`Infinity`/`-Infinity`, and non-object
/// top-level values. All failures share the `invalid_json` code.
///
/// # Errors
///
/// [`GatewayError::InvalidJson`] on any of the above.
pub fn strict_json_object(raw: &str) -> Result<Value, GatewayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty input"));
    }
    if trimmed.starts_with("```") {
        return Err(invalid("code-fenced input is not raw JSON"));
    }
    if trimmed.contains("NaN") || trimmed.contains("Infinity") {
        return Err(invalid("NaN/Infinity are not valid JSON"));
    }

    let mut de = serde_json::Deserializer::from_str(trimmed);
    let value: Value = Value::deserialize(&mut de).map_err(|e| invalid(&e.to_string()))?;
    de.end().map_err(|_| invalid("trailing data after JSON value"))?;

    if !value.is_object() {
        return Err(invalid("top-level value must be a JSON object"));
    }
    Ok(value)
}

fn invalid(reason: &str) -> GatewayError {
    GatewayError::InvalidJson {
        reason: reason.to_owned(),
    }
}

use serde::Deserialize;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with_ticket_schema() -> Arc<SchemaRegistry> {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("ticket_v1.json")).unwrap();
        f.write_all(
            br#"{"type":"object","properties":{"id":{"type":"string"}},"required":["id"]}"#,
        )
            .unwrap();
        Arc::new(SchemaRegistry::new(dir.keep()))
    }

    #[tokio::test]
    async fn delimited_json_parses_on_first_try() {
        let engine = ExtractionEngine::new(registry_with_ticket_schema());
        let outcome = engine
            .run("ticket_v1", "extract", false, |_| async {
                Ok("<<<JSON>>>{\"id\":\"abc\"}<<<END>>>".to_owned())
        })
            .await
            .unwrap();
        assert_eq!(outcome.data["id"], "abc");
        assert!(!outcome.repair_attempted);
    }

    #[tokio::test]
    async fn repair_succeeds_after_initial_non_json_output() {
        let engine = ExtractionEngine::new(registry_with_ticket_schema());
        let calls = AtomicUsize::new(0);
        let outcome = engine
            .run("ticket_v1", "extract", true, |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok("not json".to_owned())
                    } else {
                        Ok("<<<JSON>>>{\"id\":\"repaired\"}<<<END>>>".to_owned())
                    }
                }
        })
            .await
            .unwrap();
        assert_eq!(outcome.data["id"], "repaired");
        assert!(outcome.repair_attempted);
    }

    #[tokio::test]
    async fn no_repair_surfaces_invalid_json() {
        let engine = ExtractionEngine::new(registry_with_ticket_schema());
        let failure = engine
            .run("ticket_v1", "extract", false, |_| async {
                Ok("not json".to_owned())
        })
            .await
            .unwrap_err();
        assert_eq!(failure.error.code(), "invalid_json");
        assert_eq!(failure.stage.as_str(), "parse");
    }

    #[tokio::test]
    async fn parses_but_fails_schema_validation() {
        let engine = ExtractionEngine::new(registry_with_ticket_schema());
        let failure = engine
            .run("ticket_v1", "extract", false, |_| async {
                Ok("{\"wrong_field\":1}".to_owned())
        })
            .await
            .unwrap_err();
        assert_eq!(failure.error.code(), "schema_validation_failed");
        assert_eq!(failure.stage.as_str(), "validate");
    }

    #[tokio::test]
    async fn missing_schema_is_checked_before_any_generate_call() {
        let engine = ExtractionEngine::new(registry_with_ticket_schema());
        let calls = AtomicUsize::new(0);
        let failure = engine
            .run("does_not_exist", "extract", false, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(String::new()) }
        })
            .await
            .unwrap_err();
        assert_eq!(failure.error.code(), "schema_not_found");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn strict_validator_rejects_code_fence() {
        assert!(strict_json_object("```{\"a\":1}```").is_err());
    }

    #[test]
    fn strict_validator_rejects_trailing_data() {
        assert!(strict_json_object("{\"a\":1} garbage").is_err());
    }

    #[test]
    fn strict_validator_rejects_non_object_top_level() {
        assert!(strict_json_object("[1,2,3]").is_err());
        assert!(strict_json_object("\"just a string\"").is_err());
    }

    #[test]
    fn strict_validator_rejects_nan_and_infinity() {
        assert!(strict_json_object("{\"a\":NaN}").is_err());
        assert!(strict_json_object("{\"a\":Infinity}").is_err());
    }

    #[test]
    fn strict_validator_accepts_plain_object() {
        let value = strict_json_object(r#"{"a":1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn brace_balanced_scan_ignores_arrays_and_scalars() {
        let candidates = json_object_candidates(r#"here is [1,2,3] and 42 and {"id":"x"} done"#);
        assert_eq!(candidates, vec![r#"{"id":"x"}"#]);
    }
}
