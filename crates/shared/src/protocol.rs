use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::{
    domain::{Scope, TransitionGraph},
    error::BackendError,
};

/// Body of the transitions metadata endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionsMetaResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<TransitionGraph>,
}

impl TransitionsMetaResponse {
    /// The graph, only when the envelope reports success and actually carries one.
    pub fn into_graph(self) -> Option<TransitionGraph> {
        if self.ok {
            self.transitions
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStateRequest {
    pub scope: Scope,
    pub action: String,
}

/// Body of the set-state endpoint. Every field is optional on the wire, and a
/// field of the wrong type reads as absent instead of failing the whole body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStateResponse {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub ok: bool,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub order_state: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_state: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub shipping_state: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<BackendError>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::<D, bool>(deserializer)?.unwrap_or(false))
}

impl SetStateResponse {
    /// Authoritative state reported for `scope`; blank values count as absent.
    pub fn state_for(&self, scope: Scope) -> Option<&str> {
        let raw = match scope {
            Scope::Order => self.order_state.as_deref(),
            Scope::Payment => self.payment_state.as_deref(),
            Scope::Delivery => self.shipping_state.as_deref(),
        };
        raw.map(str::trim).filter(|state| !state.is_empty())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(BackendError::message)
    }
}
