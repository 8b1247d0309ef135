//! Reads the line-oriented question layout the generation prompt asks for.
//!
//! Each line is trimmed and matched against a fixed prefix table. Fields may
//! come in any order, unknown lines are skipped, and a repeated field keeps
//! its last value. Completeness is checked later by `Question::try_from`.

use std::collections::BTreeMap;

use super::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Stem,
    Option(Label),
    CorrectAnswer,
    Explanation,
}

const PREFIXES: [(&str, Field); 7] = [
    ("Question:", Field::Stem),
    ("A)", Field::Option(Label::A)),
    ("B)", Field::Option(Label::B)),
    ("C)", Field::Option(Label::C)),
    ("D)", Field::Option(Label::D)),
    ("Correct Answer:", Field::CorrectAnswer),
    ("Explanation:", Field::Explanation),
];

/// Whatever subset of the question fields was found in the raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub stem: String,
    pub options: BTreeMap<Label, String>,
    pub correct_answer: String,
    pub explanation: String,
}

pub fn parse_question(raw: &str) -> ParsedQuestion {
    let mut parsed = ParsedQuestion::default();

    for line in raw.lines().map(str::trim) {
        let Some((field, value)) = PREFIXES
            .iter()
            .find_map(|(prefix, field)| line.strip_prefix(prefix).map(|rest| (*field, rest.trim())))
        else {
            continue;
        };

        let value = value.to_string();
        match field {
            Field::Stem => parsed.stem = value,
            Field::Option(label) => {
                parsed.options.insert(label, value);
            }
            Field::CorrectAnswer => parsed.correct_answer = value,
            Field::Explanation => parsed.explanation = value,
        }
    }

    parsed
}
