//! # Brain Module
//!
//! Fast, non-LLM analysis for GyaanForge. Everything here is a pure function of its input.
//!
//! ## Components
//! - `stuck`: rule-based stuck scoring from interaction signals
//! - `stack_parser`: error message and stack trace parsing with canned fixes
//! - `concepts`: concept-graph extraction from markdown answers
//! - `keywords`: TF-IDF keyword extraction
//! - `intent`: intent classification using regex patterns
//! - `quiz`: fill-in-the-blank quiz generation and grading

pub mod concepts;
pub mod intent;
pub mod keywords;
pub mod quiz;
pub mod stack_parser;
pub mod stuck;

pub use concepts::extract_concepts_from_text;
pub use intent::{Intent, IntentClassifier, IntentResult};
pub use keywords::{KeywordExtractor, KeywordResult};
pub use quiz::{build_quiz, grade_quiz, Quiz, QuizGrade};
pub use stack_parser::parse_error_stack;
pub use stuck::{StuckAnalysis, StuckDetector};
