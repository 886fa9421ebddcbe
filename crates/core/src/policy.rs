use serde::{Deserialize, Serialize};

/// The current state of the externally supplied policy decision artifact.
/// Read from a JSON file at `POLICY_DECISION_PATH`.
///
/// Fail-closed: a missing or malformed file is represented the same as an
/// explicit `ok=false` snapshot, never as "no opinion".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PolicySnapshot {
    pub ok: bool,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub enable_extract: Option<bool>,
    pub source_path: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// The raw on-disk shape of the policy decision file. `status`
/// and `contract_errors` exist only to be folded into `enable_extract` at
/// load time; the resolved snapshot never carries them forward.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDecisionFile {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub enable_extract: Option<bool>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub contract_errors: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl PolicySnapshot {
    /// Fail-closed snapshot for a missing or unreadable file.
    #[must_use]
    pub fn fail_closed(source_path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            model_id: None,
            enable_extract: Some(false),
            source_path: source_path.into(),
            error: Some(error.into()),
        }
    }

    /// Resolve a parsed decision file into a snapshot. Denies extract when
    /// `ok=false`, `status="deny"`, `contract_errors>0`, or
    /// `enable_extract=false` are present in the file.
    #[must_use]
    pub fn from_file(source_path: impl Into<String>, file: PolicyDecisionFile) -> Self {
        let denied_by_status = file.status.as_deref() == Some("deny");
        let denied_by_contract_errors = file.contract_errors.unwrap_or(0) > 0;
        let denied_explicitly = file.enable_extract == Some(false);
        let ok = file.ok && !denied_by_status && !denied_by_contract_errors;

        let enable_extract = if !ok || denied_explicitly {
            Some(false)
        } else {
            file.enable_extract.or(Some(true))
        };

        Self {
            ok,
            model_id: file.model_id,
            enable_extract,
            source_path: source_path.into(),
            error: None,
        }
    }

    /// Whether this snapshot applies to `model_id`: model-agnostic snapshots
    /// (no `model_id`) apply to every model.
    #[must_use]
    pub fn applies_to(&self, model_id: &str) -> bool {
        self.model_id.as_deref().is_none_or(|m| m == model_id)
    }

    /// The policy's contribution to the `extract` capability for `model_id`.
    /// Policy is AND-only: it can only revoke, never grant, so a snapshot
    /// that doesn't apply or doesn't mention `extract` contributes `true`.
    #[must_use]
    pub fn extract_allowed_for(&self, model_id: &str) -> bool {
        if !self.applies_to(model_id) {
            return true;
        }
        self.enable_extract.unwrap_or(true) && self.ok
    }
}
