use crate::patient::Medications;

/// Guess medication names from a patient's medication list.
///
/// Structured entries contribute their `name`. Free text is scanned for
/// capitalised words longer than three characters. Names are returned in
/// first-seen order without duplicates (case-insensitive).
pub fn extract_medication_names(medications: &Medications) -> Vec<String> {
    let candidates: Vec<String> = match medications {
        Medications::List(items) => items
            .iter()
            .map(|m| m.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect(),
        Medications::Text(text) => text
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .map(|word| word.trim_matches('-'))
            .filter(|word| word.chars().count() > 3)
            .filter(|word| word.chars().next().is_some_and(char::is_uppercase))
            .filter(|word| word.chars().any(char::is_alphabetic))
            .map(str::to_string)
            .collect(),
    };

    let mut names: Vec<String> = Vec::new();
    for candidate in candidates {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(&candidate)) {
            names.push(candidate);
        }
    }
    names
}
