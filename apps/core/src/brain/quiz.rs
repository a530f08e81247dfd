//! Quiz generation and grading.
//!
//! Questions are fill-in-the-blank: a sentence of the answer that contains a bold term,
//! with the term blanked out.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_QUESTIONS: usize = 5;
pub const BLANK: &str = "_____";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("Invalid regex: bold term"));

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("Invalid regex: fenced code"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    /// The sentence with the term replaced by a blank.
    pub prompt: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub correct: bool,
    pub expected: String,
    pub given: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizGrade {
    /// Percentage of correct answers, 0 to 100.
    pub score: u8,
    pub correct: usize,
    pub total: usize,
    pub results: Vec<QuestionResult>,
}

/// Lowercase, collapse whitespace, strip surrounding punctuation.
pub fn normalize_answer(answer: &str) -> String {
    answer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Builds up to [`MAX_QUESTIONS`] questions from the bold terms of an answer.
pub fn build_quiz(answer_markdown: &str) -> Quiz {
    let prose = FENCED_CODE.replace_all(answer_markdown, "");
    let mut questions: Vec<QuizQuestion> = Vec::new();

    'sentences: for sentence in sentences(&prose) {
        // Headers make poor questions
        if sentence.starts_with('#') {
            continue;
        }
        for caps in BOLD.captures_iter(sentence) {
            if questions.len() >= MAX_QUESTIONS {
                break 'sentences;
            }
            let term = caps[1].trim();
            if normalize_answer(term).is_empty()
                || questions
                    .iter()
                    .any(|q| normalize_answer(&q.answer) == normalize_answer(term))
            {
                continue;
            }

            let blanked = sentence.replacen(&caps[0], BLANK, 1);
            let prompt = blanked.replace("**", "");
            // Leave the term visible elsewhere in the sentence and the blank gives nothing away
            if prompt.to_lowercase().contains(&term.to_lowercase()) {
                continue;
            }

            questions.push(QuizQuestion {
                id: Uuid::new_v4().to_string(),
                prompt,
                answer: term.to_string(),
            });
            // One question per sentence
            continue 'sentences;
        }
    }

    Quiz {
        id: Uuid::new_v4().to_string(),
        questions,
        created_at: Utc::now(),
    }
}

/// Grades `responses` against `quiz`, in question order.
///
/// A response count that does not match the question count is rejected rather than
/// scored, so a client bug cannot silently turn into a zero.
pub fn grade_quiz(quiz: &Quiz, responses: &[String]) -> Result<QuizGrade, AppError> {
    if responses.len() != quiz.questions.len() {
        return Err(AppError::Validation(format!(
            "expected {} answers, got {}",
            quiz.questions.len(),
            responses.len()
        )));
    }

    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .zip(responses)
        .map(|(question, given)| QuestionResult {
            question_id: question.id.clone(),
            correct: normalize_answer(given) == normalize_answer(&question.answer),
            expected: question.answer.clone(),
            given: given.clone(),
        })
        .collect();

    let total = results.len();
    let correct = results.iter().filter(|r| r.correct).count();
    let score = if total == 0 {
        0
    } else {
        ((correct * 100) as f32 / total as f32).round() as u8
    };

    Ok(QuizGrade {
        score,
        correct,
        total,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = "# Closures\nA **closure** is a function bundled with its **lexical environment**. \
                          Closures are created every time a function is created.";

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("  Lexical   Environment. "), "lexical environment");
        assert_eq!(normalize_answer("`x`"), "x");
    }

    #[test]
    fn test_build_quiz_blanks_terms() {
        let quiz = build_quiz(ANSWER);
        assert_eq!(quiz.questions.len(), 1);
        let question = &quiz.questions[0];
        assert_eq!(question.answer, "closure");
        assert!(question.prompt.contains(BLANK));
        assert!(!question.prompt.contains("**"));
    }

    #[test]
    fn test_grade_quiz() {
        let quiz = build_quiz("A **closure** captures scope.\nThe **event loop** runs callbacks.");
        assert_eq!(quiz.questions.len(), 2);

        let grade = grade_quiz(&quiz, &["Closure".to_string(), "call stack".to_string()]).unwrap();
        assert_eq!(grade.correct, 1);
        assert_eq!(grade.total, 2);
        assert_eq!(grade.score, 50);
        assert!(grade.results[0].correct);
        assert!(!grade.results[1].correct);
    }

    #[test]
    fn test_grade_rejects_mismatched_answers() {
        let quiz = build_quiz("A **closure** captures scope.");
        let result = grade_quiz(&quiz, &[]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
