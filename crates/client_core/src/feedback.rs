//! Operator-facing feedback texts shown next to a control.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub text: String,
    pub kind: FeedbackKind,
}

impl Feedback {
    pub fn new(text: impl Into<String>, kind: FeedbackKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, FeedbackKind::Info)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, FeedbackKind::Success)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, FeedbackKind::Error)
    }
}

pub const READY: &str = "Bereit. Status wählen.";
pub const NOT_BOUND: &str = "Keine API-ID vorhanden.";
pub const NO_OPTIONS: &str = "Keine Optionen verfügbar";
pub const CHOOSE_STATE: &str = "Status wählen…";
pub const SAVE_STARTED: &str = "Speichern gestartet…";
pub const SAVED: &str = "Status erfolgreich gespeichert.";
pub const SIBLING_UPDATED: &str = "Status aktualisiert.";
pub const SET_FAILED: &str = "Status konnte nicht gesetzt werden.";
pub const NETWORK_FAILURE: &str = "Netzwerkfehler beim Speichern.";

pub const REFRESH_LOADING: &str = "Wird geladen…";
pub const REFRESH_DONE: &str = "Übergänge aktualisiert ✓";
pub const REFRESH_FAILED: &str = "Fehler beim Laden";

/// Rejection text listing the raw identifiers that are valid right now.
pub fn unavailable_transition(available: &[String]) -> String {
    let listed = if available.is_empty() {
        "keine".to_string()
    } else {
        available.join(", ")
    };
    format!("Nicht möglich. Verfügbare Übergänge: {listed}")
}
