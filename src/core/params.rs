//! Binding integration instance parameters from the secret conf

use crate::core::config::SecretIntegration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Placeholder replaced by the server URL in secret params
pub const SERVER_HOST_PLACEHOLDER: &str = "%%SERVER_HOST%%";

/// Integration that gets built-in params when the secret conf has none
pub const DEMISTO_REST_API: &str = "Demisto REST API";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error(
        "{playbook_id} Failed to run.\n There are {count} instances of {integration}, please select one of them by using the instance_name argument in conf.json. The options are:\n{options}"
    )]
    AmbiguousInstance {
        playbook_id: String,
        integration: String,
        count: usize,
        options: String,
    },
}

/// An integration with its resolved instance parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundIntegration {
    pub name: String,
    pub params: Map<String, Value>,
    pub byoi: bool,
    pub instance_name: String,
    pub validate_test: bool,
}

impl BoundIntegration {
    fn unbound(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Map::new(),
            byoi: true,
            instance_name: name.to_string(),
            validate_test: true,
        }
    }

    fn from_secret(name: &str, secret: SecretIntegration) -> Self {
        Self {
            name: name.to_string(),
            params: secret.params,
            byoi: secret.byoi.unwrap_or(true),
            instance_name: secret.instance_name.unwrap_or_else(|| name.to_string()),
            validate_test: secret.validate_test.unwrap_or(true),
        }
    }
}

/// Placeholder -> value substitutions applied to secret params
#[derive(Debug, Clone, Default)]
pub struct Placeholders(BTreeMap<String, String>);

impl Placeholders {
    pub fn for_server(server_url: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert(SERVER_HOST_PLACEHOLDER.to_string(), server_url.to_string());
        Self(map)
    }

    fn apply_str(&self, input: &str) -> String {
        self.0
            .iter()
            .fold(input.to_string(), |acc, (key, value)| acc.replace(key, value))
    }

    fn apply(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.apply_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (self.apply_str(k), self.apply(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn apply_integration(&self, integration: &SecretIntegration) -> SecretIntegration {
        SecretIntegration {
            name: integration.name.clone(),
            instance_name: integration.instance_name.as_deref().map(|s| self.apply_str(s)),
            params: integration
                .params
                .iter()
                .map(|(k, v)| (self.apply_str(k), self.apply(v)))
                .collect(),
            byoi: integration.byoi,
            validate_test: integration.validate_test,
        }
    }
}

/// Resolve instance params for every integration a test needs
///
/// When the secret conf has several instances of one integration, the
/// test's `instance_names` decide which one is used; no match is an error.
pub fn bind_integration_params(
    api_key: &str,
    integrations: &[String],
    secret_params: &[SecretIntegration],
    instance_names: &[String],
    playbook_id: &str,
    placeholders: &Placeholders,
) -> Result<Vec<BoundIntegration>, ParamsError> {
    let mut bound = Vec::with_capacity(integrations.len());

    for name in integrations {
        let candidates: Vec<SecretIntegration> = secret_params
            .iter()
            .filter(|item| &item.name == name)
            .map(|item| placeholders.apply_integration(item))
            .collect();

        let integration = match candidates.len() {
            0 if name == DEMISTO_REST_API => {
                let mut integration = BoundIntegration::unbound(name);
                integration.params.insert("url".into(), Value::from("https://localhost"));
                integration.params.insert("apikey".into(), Value::from(api_key));
                integration.params.insert("insecure".into(), Value::Bool(true));
                integration
            }
            0 => BoundIntegration::unbound(name),
            1 => {
                let secret = candidates.into_iter().next().unwrap_or_default();
                BoundIntegration::from_secret(name, secret)
            }
            count => {
                // Last match wins when several instance names are listed
                let matched = candidates
                    .iter()
                    .rev()
                    .find(|item| {
                        item.instance_name
                            .as_ref()
                            .is_some_and(|instance| instance_names.contains(instance))
                    })
                    .cloned();

                match matched {
                    Some(secret) => BoundIntegration::from_secret(name, secret),
                    None => {
                        let options = candidates
                            .iter()
                            .map(|item| item.instance_name.as_deref().unwrap_or("None"))
                            .collect::<Vec<_>>()
                            .join("\n");
                        return Err(ParamsError::AmbiguousInstance {
                            playbook_id: playbook_id.to_string(),
                            integration: name.clone(),
                            count,
                            options,
                        });
                    }
                }
            }
        };

        bound.push(integration);
    }

    Ok(bound)
}

/// Append integration names to a test message
pub fn update_test_msg(integrations: &[BoundIntegration], test_message: &str) -> String {
    if integrations.is_empty() {
        return test_message.to_string();
    }
    let names: Vec<&str> = integrations.iter().map(|i| i.name.as_str()).collect();
    format!("{} with integration(s): {}", test_message, names.join(","))
}
