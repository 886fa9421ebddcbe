use std::collections::HashMap;

use infergate_core::{GatewayError, PolicySnapshot};

/// Computes the effective capability set for a (deployment, model, policy)
/// triple: `effective = deployment AND model_spec AND
/// policy`. A pure function of its inputs; the only I/O involved is the
/// policy snapshot read, which the caller performs beforehand.
pub struct CapabilityResolver;

impl CapabilityResolver {
    /// Check one `capability` (`"generate"` or `"extract"`) for `model_id`.
    ///
    /// `deployment_capabilities` are the process-wide flags (`ENABLE_GENERATE`
    /// / `ENABLE_EXTRACT`); `model_capabilities` is the merged per-model
    /// capability map from [`infergate_core::ModelsConfig::merged_capabilities`].
    /// Missing entries default to `true` for both. The policy snapshot only
    /// constrains `extract` and only when it applies to this model.
    ///
    /// # Errors
    ///
    /// [`GatewayError::CapabilityDisabled`] (HTTP 501) if the deployment
    /// gate denies it; [`GatewayError::CapabilityNotSupported`] (HTTP 400,
    /// `extra.model_capabilities`) if the model or policy gate denies it.
    pub fn check(
        capability: &str,
        deployment_capabilities: &HashMap<String, bool>,
        model_capabilities: &HashMap<String, bool>,
        policy: Option<&PolicySnapshot>,
        model_id: &str,
    ) -> Result<(), GatewayError> {
        let deployment_allows = deployment_capabilities
            .get(capability)
            .copied()
            .unwrap_or(true);
        if !deployment_allows {
            return Err(GatewayError::CapabilityDisabled {
                    capability: capability.to_owned(),
            });
        }

        let model_allows = model_capabilities.get(capability).copied().unwrap_or(true);
        let policy_allows = policy_allows(capability, policy, model_id);

        if !model_allows || !policy_allows {
            return Err(GatewayError::CapabilityNotSupported {
                    capability: capability.to_owned(),
                    model_capabilities: serde_json::to_value(effective_map(
                            model_capabilities,
                            policy,
                            model_id,
                    ))
                        .unwrap_or_default(),
            });
        }

        Ok(())
    }

    /// The merged capability map for `/v1/models`: model capabilities overlaid with the policy's `extract` denial,
    /// reflecting the same computation the live request path uses.
    #[must_use]
    pub fn merged(
        model_capabilities: &HashMap<String, bool>,
        policy: Option<&PolicySnapshot>,
        model_id: &str,
    ) -> HashMap<String, bool> {
        effective_map(model_capabilities, policy, model_id)
    }
}

fn policy_allows(capability: &str, policy: Option<&PolicySnapshot>, model_id: &str) -> bool {
    match (capability, policy) {
        ("extract", Some(snapshot)) => snapshot.extract_allowed_for(model_id),
        _ => true,
    }
}

fn effective_map(
    model_capabilities: &HashMap<String, bool>,
    policy: Option<&PolicySnapshot>,
    model_id: &str,
) -> HashMap<String, bool> {
    let mut merged = model_capabilities.clone();
    let extract_allowed = merged.get("extract").copied().unwrap_or(true)
    && policy_allows("extract", policy, model_id);
    merged.insert("extract".to_owned(), extract_allowed);
    merged
}
