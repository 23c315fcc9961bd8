//! Patient record model.
//!
//! Records arrive from forms, the patient table or model extraction, so every
//! field is optional and parsing is lenient: nulls, blanks and values that do
//! not parse are treated as absent.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A standalone number; digits inside a label such as "HbA1c" do not count.
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.])(-?\d+(?:\.\d+)?)").expect("valid number pattern")
});

/// A single structured medication entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

impl Medication {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dose: None,
            frequency: None,
        }
    }
}

/// Current medications, either as free text or as a structured list.
///
/// Serialized in the same shape it is read from: a string or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Medications {
    Text(String),
    List(Vec<Medication>),
}

impl Medications {
    pub fn is_empty(&self) -> bool {
        match self {
            Medications::Text(text) => text.trim().is_empty(),
            Medications::List(items) => items.is_empty(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let medications = match value {
            Value::String(text) => Medications::Text(text.trim().to_string()),
            Value::Array(items) => Medications::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(name) => Some(Medication::named(name.trim())),
                        Value::Object(fields) => {
                            let name = text_field(fields.get("name"))?;
                            Some(Medication {
                                name,
                                dose: text_field(fields.get("dose").or(fields.get("dosage"))),
                                frequency: text_field(fields.get("frequency")),
                            })
                        }
                        _ => None,
                    })
                    .filter(|medication| !medication.name.is_empty())
                    .collect(),
            ),
            _ => return None,
        };
        (!medications.is_empty()).then_some(medications)
    }
}

impl std::fmt::Display for Medications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Medications::Text(text) => f.write_str(text),
            Medications::List(items) => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|m| {
                        [Some(m.name.as_str()), m.dose.as_deref(), m.frequency.as_deref()]
                            .into_iter()
                            .flatten()
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .collect();
                f.write_str(&rendered.join(", "))
            }
        }
    }
}

/// Normalized clinical attributes for one consult.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: Option<String>,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub diabetes_type: Option<String>,
    pub duration_years: Option<f64>,
    pub comorbidities: Option<String>,
    pub latest_hba1c: Option<f64>,
    pub blood_glucose: Option<String>,
    pub blood_pressure: Option<String>,
    pub egfr: Option<f64>,
    pub lipid_panel: Option<String>,
    pub current_meds: Option<Medications>,
    pub allergies: Option<String>,
    pub symptoms_notes: Option<String>,
    pub treatment_adjustments: Option<String>,
}

impl PatientRecord {
    /// Build a record from a loosely-typed mapping. Unknown keys are ignored.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let field = |aliases: &[&str]| -> Option<&Value> {
            map.iter()
                .find(|(key, value)| {
                    !value.is_null()
                        && aliases
                            .iter()
                            .any(|alias| key.trim().eq_ignore_ascii_case(alias))
                })
                .map(|(_, value)| value)
        };

        Self {
            patient_id: text_field(field(&["patient_id", "id"])),
            name: text_field(field(&["name"])),
            age: number_field(field(&["age"]))
                .filter(|age| (0.0..=150.0).contains(age))
                .map(|age| age.round() as u32),
            gender: text_field(field(&["gender", "sex"])),
            height_cm: number_field(field(&["height_cm", "height"])),
            weight_kg: number_field(field(&["weight_kg", "weight"])),
            diabetes_type: text_field(field(&["diabetes_type"])),
            duration_years: number_field(field(&["duration_years", "duration"])),
            comorbidities: text_field(field(&["comorbidities"])),
            latest_hba1c: number_field(field(&["latest_hba1c", "hba1c"])),
            blood_glucose: text_field(field(&["blood_glucose"])),
            blood_pressure: text_field(field(&["blood_pressure"])),
            egfr: number_field(field(&["egfr", "egfr_ml_min"])),
            lipid_panel: text_field(field(&["lipid_panel"])),
            current_meds: field(&["current_meds", "medications", "current_medications"])
                .and_then(Medications::from_value),
            allergies: text_field(field(&["allergies"])),
            symptoms_notes: text_field(field(&["symptoms_notes", "recent_symptoms", "notes"])),
            treatment_adjustments: text_field(field(&["treatment_adjustments"])),
        }
    }

    /// Like [`PatientRecord::from_map`] for any JSON value; non-objects give an empty record.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    /// Record holding only free-text notes.
    pub fn from_notes(notes: &str) -> Self {
        Self {
            symptoms_notes: Some(notes.trim().to_string()).filter(|n| !n.is_empty()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn has_medications(&self) -> bool {
        self.current_meds.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// Patient information as handed to the pipeline, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PatientInput {
    Raw(String),
    Structured(Map<String, Value>),
}

impl PatientInput {
    pub fn is_empty(&self) -> bool {
        match self {
            PatientInput::Raw(text) => text.trim().is_empty(),
            PatientInput::Structured(map) => PatientRecord::from_map(map).is_empty(),
        }
    }
}

impl From<PatientRecord> for PatientInput {
    fn from(record: PatientRecord) -> Self {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => PatientInput::Structured(map),
            _ => PatientInput::Structured(Map::new()),
        }
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn number_field(value: Option<&Value>) -> Option<f64> {
    let number: Option<f64> = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => NUMBER
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Render the record as labeled sections for a prompt. Sections whose fields
/// are all empty are left out.
pub fn format_patient_sections(record: &PatientRecord) -> String {
    let num = |value: Option<f64>, unit: &str| value.map(|v| format!("{v}{unit}"));

    let sections: [(&str, Vec<(&str, Option<String>)>); 7] = [
        (
            "Demographics",
            vec![
                ("Name", record.name.clone()),
                ("Patient ID", record.patient_id.clone()),
                ("Age", record.age.map(|a| format!("{a} years"))),
                ("Gender", record.gender.clone()),
                ("Height", num(record.height_cm, " cm")),
                ("Weight", num(record.weight_kg, " kg")),
            ],
        ),
        (
            "Diabetes Profile",
            vec![
                ("Diabetes type", record.diabetes_type.clone()),
                ("Duration", num(record.duration_years, " years")),
            ],
        ),
        (
            "Glycemic Control",
            vec![
                ("Latest HbA1c", num(record.latest_hba1c, "%")),
                ("Blood glucose", record.blood_glucose.clone()),
            ],
        ),
        (
            "Cardiovascular",
            vec![
                ("Blood pressure", record.blood_pressure.clone()),
                ("Lipid panel", record.lipid_panel.clone()),
            ],
        ),
        (
            "Renal Function",
            vec![("eGFR", num(record.egfr, " ml/min/1.73m²"))],
        ),
        (
            "Current Treatment",
            vec![
                (
                    "Current medications",
                    record
                        .current_meds
                        .as_ref()
                        .filter(|m| !m.is_empty())
                        .map(ToString::to_string),
                ),
                ("Treatment adjustments", record.treatment_adjustments.clone()),
                ("Allergies", record.allergies.clone()),
            ],
        ),
        (
            "Clinical Notes",
            vec![
                ("Comorbidities", record.comorbidities.clone()),
                ("Symptoms & notes", record.symptoms_notes.clone()),
            ],
        ),
    ];

    let mut out = String::new();
    for (title, fields) in sections {
        let present: Vec<_> = fields
            .into_iter()
            .filter_map(|(label, value)| value.map(|v| (label, v)))
            .collect();
        if present.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "### {title}");
        for (label, value) in present {
            let _ = writeln!(out, "- {label}: {value}");
        }
    }

    if out.is_empty() {
        "No structured patient data provided.".to_string()
    } else {
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> PatientRecord {
        PatientRecord::from_value(&value)
    }

    #[test]
    fn numeric_strings_with_units_are_parsed() {
        let r = record(json!({
            "age": "70 years",
            "eGFR_ml_min": "25 ml/min",
            "latest_hba1c": "9.5%",
            "weight": 82,
        }));

        assert_eq!(r.age, Some(70));
        assert_eq!(r.egfr, Some(25.0));
        assert_eq!(r.latest_hba1c, Some(9.5));
        assert_eq!(r.weight_kg, Some(82.0));
    }

    #[test]
    fn nulls_blanks_and_garbage_are_absent() {
        let r = record(json!({
            "age": "unknown",
            "egfr": null,
            "gender": "  ",
            "latest_hba1c": {"value": 7},
            "name": "Amal",
        }));

        assert_eq!(r.age, None);
        assert_eq!(r.egfr, None);
        assert_eq!(r.gender, None);
        assert_eq!(r.latest_hba1c, None);
        assert_eq!(r.name.as_deref(), Some("Amal"));
    }

    #[test]
    fn medications_accept_text_strings_and_objects() {
        let text = record(json!({"current_meds": "Metformin 500mg BID"}));
        assert_eq!(
            text.current_meds,
            Some(Medications::Text("Metformin 500mg BID".into()))
        );

        let names = record(json!({"medications": ["Metformin", " "]}));
        assert_eq!(
            names.current_meds,
            Some(Medications::List(vec![Medication::named("Metformin")]))
        );

        let objects = record(json!({"current_meds": [{"name": "Insulin glargine", "dose": "10 units"}]}));
        let Some(Medications::List(items)) = objects.current_meds else {
            panic!("expected structured list");
        };
        assert_eq!(items[0].name, "Insulin glargine");
        assert_eq!(items[0].dose.as_deref(), Some("10 units"));
    }

    #[test]
    fn empty_medications_are_absent() {
        let r = record(json!({"current_meds": ""}));
        assert!(r.current_meds.is_none());
        assert!(!r.has_medications());
        assert!(r.is_empty());
    }

    #[test]
    fn structured_input_with_only_blanks_is_empty() {
        let Value::Object(map) = json!({"name": "", "age": null}) else {
            unreachable!()
        };
        assert!(PatientInput::Structured(map).is_empty());
        assert!(PatientInput::Raw("  ".into()).is_empty());
        assert!(!PatientInput::Raw("age 70".into()).is_empty());
    }

    #[test]
    fn sections_omit_empty_groups() {
        let r = PatientRecord {
            age: Some(70),
            egfr: Some(25.0),
            current_meds: Some(Medications::Text("Metformin".into())),
            ..Default::default()
        };

        let text = format_patient_sections(&r);

        assert!(text.contains("### Demographics\n- Age: 70 years"));
        assert!(text.contains("### Renal Function\n- eGFR: 25 ml/min/1.73m²"));
        assert!(text.contains("### Current Treatment\n- Current medications: Metformin"));
        assert!(!text.contains("Cardiovascular"));
        assert!(!text.contains("Glycemic Control"));
        assert!(!text.contains("Clinical Notes"));
    }

    #[test]
    fn empty_record_renders_placeholder() {
        assert_eq!(
            format_patient_sections(&PatientRecord::default()),
            "No structured patient data provided."
        );
    }

    #[test]
    fn record_round_trips_through_input() {
        let r = PatientRecord {
            name: Some("Omar".into()),
            latest_hba1c: Some(8.1),
            current_meds: Some(Medications::Text("Metformin 500mg".into())),
            ..Default::default()
        };
        let PatientInput::Structured(map) = PatientInput::from(r.clone()) else {
            panic!("expected structured input");
        };
        assert_eq!(map["current_meds"], json!("Metformin 500mg"));
        assert_eq!(PatientRecord::from_map(&map), r);
    }

    #[test]
    fn medication_list_survives_report_json() {
        let r = PatientRecord {
            current_meds: Some(Medications::List(vec![
                Medication {
                    name: "Metformin".into(),
                    dose: Some("500mg".into()),
                    frequency: Some("twice daily".into()),
                },
                Medication::named("Empagliflozin"),
            ])),
            ..Default::default()
        };

        let stored = serde_json::to_value(&r).unwrap();
        let reread = PatientRecord::from_value(&stored);

        assert_eq!(reread.current_meds, r.current_meds);
        assert!(reread.has_medications());
    }

    #[test]
    fn lab_values_written_with_their_label() {
        let map = json!({
            "latest_hba1c": "HbA1c 9.5%",
            "egfr": "eGFR: 25 mL/min",
        });
        let r = PatientRecord::from_value(&map);
        assert_eq!(r.latest_hba1c, Some(9.5));
        assert_eq!(r.egfr, Some(25.0));

        let r = PatientRecord::from_value(&json!({"hba1c": "A1c: 8.2"}));
        assert_eq!(r.latest_hba1c, Some(8.2));
    }
}
