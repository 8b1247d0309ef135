pub mod ai_helper;
pub mod flow;
pub mod parser;
pub mod session;

use std::{collections::BTreeMap, fmt, str::FromStr};

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use parser::ParsedQuestion;

/// One of the four option labels a generated question carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    A,
    B,
    C,
    D,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::A, Label::B, Label::C, Label::D];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::A => "A",
            Label::B => "B",
            Label::C => "C",
            Label::D => "D",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionError {
    #[error("question text is missing")]
    MissingStem,
    #[error("no answer options were found")]
    NoOptions,
    #[error("correct answer is missing")]
    MissingCorrectAnswer,
    #[error("correct answer {0:?} is not one of the offered options")]
    UnknownCorrectAnswer(String),
}

/// A generated question that passed the completeness check and can be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub stem: String,
    pub options: BTreeMap<Label, String>,
    pub correct: Label,
    pub explanation: String,
}

impl TryFrom<ParsedQuestion> for Question {
    type Error = QuestionError;

    fn try_from(parsed: ParsedQuestion) -> Result<Self, Self::Error> {
        if parsed.stem.is_empty() {
            return Err(QuestionError::MissingStem);
        }
        if parsed.options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        if parsed.correct_answer.is_empty() {
            return Err(QuestionError::MissingCorrectAnswer);
        }
        let correct = parsed
            .correct_answer
            .parse::<Label>()
            .ok()
            .filter(|label| parsed.options.contains_key(label))
            .ok_or(QuestionError::UnknownCorrectAnswer(parsed.correct_answer))?;

        Ok(Self {
            stem: parsed.stem,
            options: parsed.options,
            correct,
            explanation: parsed.explanation,
        })
    }
}

impl Question {
    /// `"B) option text"`, or just the label if the option wasn't generated.
    pub fn choice(&self, label: Label) -> String {
        match self.options.get(&label) {
            Some(text) => format!("{}) {}", label, text),
            None => format!("{})", label),
        }
    }

    pub fn grade(&self, selected: Label) -> Verdict {
        if selected == self.correct {
            Verdict::Correct
        } else {
            Verdict::Incorrect {
                chosen: selected,
                correct: self.correct,
            }
        }
    }

    fn options_block(&self) -> String {
        self.options
            .iter()
            .map(|(label, text)| format!("{}) {}\n", label, text))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect { chosen: Label, correct: Label },
}

/// The question a user is currently expected to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveQuiz {
    pub topic: String,
    pub question: Question,
}

impl ActiveQuiz {
    pub fn render(&self) -> String {
        format!(
            "❓ Question about {}:\n\n{}\n\n{}",
            self.topic,
            self.question.stem,
            self.question.options_block()
        )
    }

    pub fn render_daily(&self) -> String {
        format!(
            "🌅 Good Morning! Daily Quiz Time! 🌅\n\n{}\nThink you know the answer? 🤔",
            self.render()
        )
    }

    pub fn render_verdict(&self, selected: Label) -> String {
        let question = &self.question;
        match question.grade(selected) {
            Verdict::Correct => format!(
                "🎉 Correct!\n\n✅ {}\n\n💭 {}\n\nGreat job! Use /quiz for another question! 🎯",
                question.choice(selected),
                question.explanation
            ),
            Verdict::Incorrect { chosen, correct } => format!(
                "❌ Incorrect\n\nYour answer: {}\nCorrect answer: {}\n\n💭 {}\n\nDon't worry, keep practicing! Use /quiz for another question! 💪",
                question.choice(chosen),
                question.choice(correct),
                question.explanation
            ),
        }
    }

    pub fn render_explanation(&self, detailed: &str) -> String {
        format!(
            "💡 Detailed Explanation:\n\nCorrect Answer: {}\n\n{}\n\nUse /quiz for another question! 🎯",
            self.question.choice(self.question.correct),
            detailed
        )
    }
}

/// Payload of an inline button under a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizAction {
    Answer(Label),
    Explain,
}

const EXPLAIN_PAYLOAD: &str = "explain";
const ANSWER_PREFIX: &str = "answer_";

impl QuizAction {
    pub fn payload(self) -> String {
        match self {
            QuizAction::Answer(label) => format!("{}{}", ANSWER_PREFIX, label),
            QuizAction::Explain => EXPLAIN_PAYLOAD.to_string(),
        }
    }
}

impl FromStr for QuizAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == EXPLAIN_PAYLOAD {
            return Ok(QuizAction::Explain);
        }
        s.strip_prefix(ANSWER_PREFIX)
            .and_then(|label| label.parse().ok())
            .map(QuizAction::Answer)
            .ok_or_else(|| s.to_string())
    }
}

pub fn answer_keyboard() -> InlineKeyboardMarkup {
    let button = |label: Label| {
        InlineKeyboardButton::callback(label.as_str(), QuizAction::Answer(label).payload())
    };

    InlineKeyboardMarkup::new(vec![
        vec![button(Label::A), button(Label::B)],
        vec![button(Label::C), button(Label::D)],
        vec![InlineKeyboardButton::callback(
            "🤷‍♂️ No Idea / Explain",
            QuizAction::Explain.payload(),
        )],
    ])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_question(correct: Label) -> Question {
        Question {
            stem: "Which keyword declares an immutable binding?".to_string(),
            options: BTreeMap::from([
                (Label::A, "var".to_string()),
                (Label::B, "let".to_string()),
                (Label::C, "mut".to_string()),
                (Label::D, "static mut".to_string()),
            ]),
            correct,
            explanation: "Bindings are immutable unless marked mut.".to_string(),
        }
    }

    fn parsed(correct_answer: &str) -> ParsedQuestion {
        let question = sample_question(Label::B);
        ParsedQuestion {
            stem: question.stem,
            options: question.options,
            correct_answer: correct_answer.to_string(),
            explanation: question.explanation,
        }
    }

    #[test]
    fn complete_question_validates() {
        let question = Question::try_from(parsed("B")).unwrap();
        assert_eq!(question, sample_question(Label::B));
    }

    #[test]
    fn incomplete_questions_are_rejected() {
        let mut no_stem = parsed("B");
        no_stem.stem.clear();
        assert_eq!(Question::try_from(no_stem), Err(QuestionError::MissingStem));

        let mut no_options = parsed("B");
        no_options.options.clear();
        assert_eq!(Question::try_from(no_options), Err(QuestionError::NoOptions));

        assert_eq!(
            Question::try_from(parsed("")),
            Err(QuestionError::MissingCorrectAnswer)
        );
    }

    #[test]
    fn correct_answer_must_name_a_present_option() {
        assert_eq!(
            Question::try_from(parsed("E")),
            Err(QuestionError::UnknownCorrectAnswer("E".to_string()))
        );

        let mut missing_d = parsed("D");
        missing_d.options.remove(&Label::D);
        assert_eq!(
            Question::try_from(missing_d),
            Err(QuestionError::UnknownCorrectAnswer("D".to_string()))
        );
    }

    #[test]
    fn grading_names_both_choices_on_a_miss() {
        let quiz = ActiveQuiz {
            topic: "Rust".to_string(),
            question: sample_question(Label::B),
        };

        assert_eq!(quiz.question.grade(Label::B), Verdict::Correct);
        assert!(quiz.render_verdict(Label::B).starts_with("🎉 Correct!"));

        for chosen in [Label::A, Label::C, Label::D] {
            assert_eq!(
                quiz.question.grade(chosen),
                Verdict::Incorrect {
                    chosen,
                    correct: Label::B
                }
            );
            let text = quiz.render_verdict(chosen);
            assert!(text.contains(&format!("Your answer: {}", quiz.question.choice(chosen))));
            assert!(text.contains("Correct answer: B) let"));
            assert!(text.contains("Bindings are immutable"));
        }
    }

    #[test]
    fn rendering_lists_options_in_label_order() {
        let quiz = ActiveQuiz {
            topic: "Rust".to_string(),
            question: sample_question(Label::B),
        };
        let text = quiz.render();
        assert!(text.starts_with("❓ Question about Rust:"));
        assert!(text.contains("A) var\nB) let\nC) mut\nD) static mut\n"));
        assert!(quiz.render_daily().contains("Daily Quiz Time"));
    }

    #[test]
    fn missing_option_renders_label_only() {
        let mut question = sample_question(Label::B);
        question.options.remove(&Label::C);
        assert_eq!(question.choice(Label::C), "C)");
    }

    #[test]
    fn payloads_round_trip_through_the_keyboard() {
        let keyboard = answer_keyboard();
        let payloads: Vec<String> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(
            payloads,
            ["answer_A", "answer_B", "answer_C", "answer_D", "explain"]
        );
        assert_eq!("answer_C".parse::<QuizAction>(), Ok(QuizAction::Answer(Label::C)));
        assert_eq!("explain".parse::<QuizAction>(), Ok(QuizAction::Explain));
        assert!("answer_E".parse::<QuizAction>().is_err());
        assert!("answer_".parse::<QuizAction>().is_err());
    }
}
