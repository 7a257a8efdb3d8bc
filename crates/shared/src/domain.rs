use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownScope;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three independent state machines attached to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Order,
    Payment,
    Delivery,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Order, Scope::Payment, Scope::Delivery];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Order => "order",
            Scope::Payment => "payment",
            Scope::Delivery => "delivery",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(Scope::Order),
            "payment" => Ok(Scope::Payment),
            "delivery" => Ok(Scope::Delivery),
            _ => Err(UnknownScope(raw.to_string())),
        }
    }
}

/// Mirror of the backend state machines: scope key -> state -> ordered actions.
///
/// Scope keys stay plain strings so a graph carrying a scope this client does not
/// know about is still usable for the scopes it does know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionGraph(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actions<I, S>(mut self, scope: Scope, state: &str, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(scope.as_str().to_string())
            .or_default()
            .insert(
                state.to_string(),
                actions.into_iter().map(Into::into).collect(),
            );
        self
    }

    /// Actions permitted from `state`, in presentation order.
    ///
    /// Exact key match wins; otherwise the scope's keys are compared
    /// case-insensitively. An unknown scope or state yields an empty slice.
    pub fn actions_for(&self, scope: Scope, state: &str) -> &[String] {
        let Some(states) = self.0.get(scope.as_str()) else {
            return &[];
        };
        if let Some(actions) = states.get(state) {
            return actions;
        }
        if state.is_empty() {
            return &[];
        }

        let lower = state.to_lowercase();
        states
            .iter()
            .find(|(key, _)| key.to_lowercase() == lower)
            .map(|(_, actions)| actions.as_slice())
            .unwrap_or(&[])
    }

    /// Standard Shopware 6 state machines, used until a cached or remote graph is known.
    pub fn shopware_default() -> Self {
        Self::new()
            .with_actions(Scope::Order, "open", ["process", "cancel"])
            .with_actions(Scope::Order, "in_progress", ["complete", "cancel"])
            .with_actions(Scope::Order, "completed", ["reopen"])
            .with_actions(Scope::Order, "cancelled", ["reopen"])
            .with_actions(Scope::Delivery, "open", ["ship", "ship_partially", "cancel"])
            .with_actions(
                Scope::Delivery,
                "shipped",
                ["retour", "retour_partially", "reopen"],
            )
            .with_actions(
                Scope::Delivery,
                "shipped_partially",
                ["ship", "retour", "retour_partially", "reopen"],
            )
            .with_actions(Scope::Delivery, "returned", ["reopen"])
            .with_actions(
                Scope::Delivery,
                "returned_partially",
                ["retour", "retour_partially", "reopen"],
            )
            .with_actions(Scope::Delivery, "cancelled", ["reopen"])
            .with_actions(
                Scope::Payment,
                "open",
                [
                    "do_pay",
                    "paid",
                    "paid_partially",
                    "authorize",
                    "remind",
                    "cancel",
                    "fail",
                ],
            )
            .with_actions(
                Scope::Payment,
                "in_progress",
                ["paid", "paid_partially", "remind", "cancel", "fail"],
            )
            .with_actions(
                Scope::Payment,
                "authorized",
                ["paid", "paid_partially", "refund", "refund_partially", "cancel"],
            )
            .with_actions(
                Scope::Payment,
                "paid",
                ["refund", "refund_partially", "reopen"],
            )
            .with_actions(
                Scope::Payment,
                "paid_partially",
                ["paid", "paid_partially", "refund", "refund_partially", "reopen"],
            )
            .with_actions(Scope::Payment, "refunded", ["reopen"])
            .with_actions(
                Scope::Payment,
                "refunded_partially",
                ["paid", "paid_partially", "refund", "refund_partially", "reopen"],
            )
            .with_actions(Scope::Payment, "cancelled", ["reopen"])
            .with_actions(Scope::Payment, "failed", ["reopen"])
            .with_actions(
                Scope::Payment,
                "reminded",
                ["paid", "paid_partially", "cancel", "fail"],
            )
            .with_actions(Scope::Payment, "chargeback", ["reopen"])
    }
}
