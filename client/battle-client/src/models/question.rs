use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::OpaqueId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    FillInBlank,
    TrueFalse,
}

impl QuestionType {
    /// Maps a backend type tag onto a known variant. Unknown or missing tags
    /// are shown as single choice.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("multiple_choice") => QuestionType::MultipleChoice,
            Some("fill_in_blank") | Some("fill_in_the_blank") => QuestionType::FillInBlank,
            Some("true_false") => QuestionType::TrueFalse,
            _ => QuestionType::SingleChoice,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::FillInBlank => "fill_in_blank",
            QuestionType::TrueFalse => "true_false",
        }
    }

    /// Heading shown above the question.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "SINGLE CHOICE",
            QuestionType::MultipleChoice => "MULTIPLE CHOICE",
            QuestionType::FillInBlank => "FILL IN BLANK",
            QuestionType::TrueFalse => "TRUE FALSE",
        }
    }

    /// Typed answers rather than a picked choice.
    pub fn collects_text(&self) -> bool {
        matches!(self, QuestionType::FillInBlank)
    }

    pub fn requires_choices(&self) -> bool {
        !self.collects_text()
    }

    /// Feedback line used when the backend sends none. Choice questions only
    /// mark the picked button.
    pub fn default_feedback(&self, correct: bool) -> Option<&'static str> {
        match (self, correct) {
            (QuestionType::FillInBlank, true) => Some("Correct! Well done!"),
            (QuestionType::FillInBlank, false) => Some("Incorrect."),
            _ => None,
        }
    }
}

/// Sentence pieces around the blank of a fill-in question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlankParts {
    pub instruction: String,
    pub sentence_before: String,
    pub sentence_after: String,
}

lazy_static! {
    // "He ___ a doctor", "He ( ) a doctor", "He [ ] a doctor"
    static ref BLANK_MARKER: Regex =
        Regex::new(r"(?s)^(.*?)\s*(?:_{2,}|\(\s*\)|\[\s*\])\s*(.*)$").unwrap();
}

impl BlankParts {
    pub const DEFAULT_INSTRUCTION: &'static str = "Complete the sentence:";

    /// Splits a sentence around its first blank marker. Without a marker the
    /// whole sentence goes before the input.
    pub fn from_sentence(text: &str, instruction: Option<String>) -> Self {
        let instruction = instruction
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_INSTRUCTION.to_string());

        match BLANK_MARKER.captures(text.trim()) {
            Some(caps) => Self {
                instruction,
                sentence_before: caps[1].trim().to_string(),
                sentence_after: caps[2].trim().to_string(),
            },
            None => Self {
                instruction,
                sentence_before: text.trim().to_string(),
                sentence_after: String::new(),
            },
        }
    }
}

/// The prompt of one round. Replaced wholesale each round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: Option<OpaqueId>,
    pub kind: QuestionType,
    pub text: String,
    pub choices: Vec<String>,
    pub hint: Option<String>,
    pub blank: Option<BlankParts>,
}

impl Question {
    pub fn choice(&self, index: usize) -> Option<&str> {
        self.choices.get(index).map(String::as_str)
    }

    pub fn has_hint(&self) -> bool {
        self.hint.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_are_normalized() {
        assert_eq!(
            QuestionType::from_tag(Some("fill_in_the_blank")),
            QuestionType::FillInBlank
        );
        assert_eq!(QuestionType::from_tag(Some("TRUE_FALSE")), QuestionType::TrueFalse);
        assert_eq!(QuestionType::from_tag(Some("essay")), QuestionType::SingleChoice);
        assert_eq!(QuestionType::from_tag(None), QuestionType::SingleChoice);
    }

    #[test]
    fn only_fill_in_blank_collects_text() {
        assert!(QuestionType::FillInBlank.collects_text());
        assert!(!QuestionType::TrueFalse.collects_text());
        assert!(QuestionType::MultipleChoice.requires_choices());
    }

    #[test]
    fn sentences_split_around_the_blank() {
        let parts = BlankParts::from_sentence("He ____ a doctor.", None);
        assert_eq!(parts.instruction, BlankParts::DEFAULT_INSTRUCTION);
        assert_eq!(parts.sentence_before, "He");
        assert_eq!(parts.sentence_after, "a doctor.");

        let parts = BlankParts::from_sentence("She [ ] happy", Some("Fill in:".to_string()));
        assert_eq!(parts.instruction, "Fill in:");
        assert_eq!(parts.sentence_before, "She");
        assert_eq!(parts.sentence_after, "happy");
    }

    #[test]
    fn sentence_without_marker_goes_before_the_input() {
        let parts = BlankParts::from_sentence("Capital of France?", Some("  ".to_string()));
        assert_eq!(parts.instruction, BlankParts::DEFAULT_INSTRUCTION);
        assert_eq!(parts.sentence_before, "Capital of France?");
        assert!(parts.sentence_after.is_empty());
    }

    #[test]
    fn blank_hint_counts_as_missing() {
        let question = Question {
            id: None,
            kind: QuestionType::FillInBlank,
            text: "The cat ___ on the mat".to_string(),
            choices: Vec::new(),
            hint: Some("   ".to_string()),
            blank: None,
        };
        assert!(!question.has_hint());
        assert_eq!(question.choice(0), None);
    }
}
