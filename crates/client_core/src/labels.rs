//! Display labels for state and action identifiers.
//!
//! Actions are named after the state they lead to, so one dictionary serves both.

fn known_label(identifier: &str) -> Option<&'static str> {
    let label = match identifier {
        "open" => "Offen",
        "in_progress" => "In Bearbeitung",
        "completed" => "Abgeschlossen",
        "cancelled" => "Storniert",
        "shipped" => "Versendet",
        "shipped_partially" => "Teilw. versendet",
        "returned" => "Retourniert",
        "returned_partially" => "Teilw. retourniert",
        "paid" => "Bezahlt",
        "paid_partially" => "Teilzahlung",
        "authorized" => "Autorisiert",
        "refunded" => "Erstattet",
        "refunded_partially" => "Teilerstattung",
        "failed" => "Fehlgeschlagen",
        "reminded" => "Gemahnt",
        "chargeback" => "Rückbuchung",
        "process" => "In Bearbeitung",
        "complete" => "Abschließen",
        "cancel" => "Stornieren",
        "reopen" => "Wieder öffnen",
        "ship" => "Versenden",
        "ship_partially" => "Teilversand",
        "retour" => "Retoure",
        "retour_partially" => "Teilretoure",
        "do_pay" => "Bezahlen",
        "authorize" => "Autorisieren",
        "remind" => "Mahnen",
        "refund" => "Erstatten",
        "refund_partially" => "Teilerstattung",
        "fail" => "Fehlgeschlagen",
        _ => return None,
    };
    Some(label)
}

pub fn label_of(identifier: &str) -> String {
    match known_label(identifier) {
        Some(label) => label.to_string(),
        None => identifier.replace('_', " "),
    }
}
