use crate::patient::PatientRecord;

pub const SEVERE_RENAL_EGFR: f64 = 30.0;
pub const MODERATE_RENAL_EGFR: f64 = 60.0;
pub const ELDERLY_AGE: u32 = 65;
pub const POOR_CONTROL_HBA1C: f64 = 9.0;

pub const SEVERE_RENAL_CLAUSE: &str = "severe renal impairment medication adjustments";
pub const MODERATE_RENAL_CLAUSE: &str = "moderate renal impairment dosing";
pub const ELDERLY_CLAUSE: &str = "elderly diabetes management";
pub const POOR_CONTROL_CLAUSE: &str = "poor glycemic control intensification";

/// Clauses derived from the record, in a fixed order.
pub fn derived_clauses(record: &PatientRecord) -> Vec<String> {
    let mut clauses = Vec::new();

    if let Some(kind) = record.diabetes_type.as_deref().map(diabetes_kind) {
        if !kind.is_empty() {
            clauses.push(format!("{kind} diabetes treatment guidelines"));
        }
    }

    match record.egfr {
        Some(egfr) if egfr < SEVERE_RENAL_EGFR => clauses.push(SEVERE_RENAL_CLAUSE.to_string()),
        Some(egfr) if egfr < MODERATE_RENAL_EGFR => {
            clauses.push(MODERATE_RENAL_CLAUSE.to_string())
        }
        _ => {}
    }

    if record.age.is_some_and(|age| age >= ELDERLY_AGE) {
        clauses.push(ELDERLY_CLAUSE.to_string());
    }

    if record.latest_hba1c.is_some_and(|a1c| a1c > POOR_CONTROL_HBA1C) {
        clauses.push(POOR_CONTROL_CLAUSE.to_string());
    }

    clauses
}

/// Free-text query followed by the derived clauses.
pub fn build_query(record: &PatientRecord, free_text: &str) -> String {
    std::iter::once(free_text.trim().to_string())
        .chain(derived_clauses(record))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// "Type 2 diabetes" -> "Type 2"
fn diabetes_kind(raw: &str) -> &str {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.strip_suffix("diabetes") {
        Some(rest) if lower.is_char_boundary(rest.len()) => trimmed[..rest.len()].trim_end(),
        _ => trimmed,
    }
}
