//! System prompt composition.

use crate::models::{CognitiveLoad, ExplainMode, Perspective};

const BASE_PROMPT: &str = "You are GyaanForge, a patient programming tutor. \
Answer in GitHub-flavored markdown. Use `##` headers for the main ideas, **bold** the key terms \
and wrap code identifiers in backticks so the learner can review them later.";

const FUTURE_YOU_DIRECTIVE: &str = "Close with a short note from the learner's future self, \
a sentence on why understanding this today will pay off later.";

fn mode_directive(mode: ExplainMode) -> &'static str {
    match mode {
        ExplainMode::Beginner => {
            "The learner is a beginner. Avoid jargon, define every new term and prefer small, complete examples."
        }
        ExplainMode::Student => {
            "The learner is a student. Build intuition first, then show how the idea is used in practice."
        }
        ExplainMode::Pro => {
            "The learner is an experienced developer. Be precise and concise, skip the basics and mention pitfalls."
        }
    }
}

/// Everything that shapes how an answer is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptOptions {
    pub mode: ExplainMode,
    pub cognitive_load: CognitiveLoad,
    pub perspective: Perspective,
    pub future_you: bool,
}

pub fn build_system_prompt(options: &PromptOptions) -> String {
    let mut sections = vec![
        BASE_PROMPT.to_string(),
        mode_directive(options.mode).to_string(),
        format!(
            "{} Stay under {} words.",
            options.cognitive_load.directive(),
            options.cognitive_load.word_budget()
        ),
    ];

    if let Some(directive) = options.perspective.directive() {
        sections.push(directive.to_string());
    }
    if options.future_you {
        sections.push(FUTURE_YOU_DIRECTIVE.to_string());
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PromptOptions {
        PromptOptions {
            mode: ExplainMode::Student,
            cognitive_load: CognitiveLoad::Steady,
            perspective: Perspective::Default,
            future_you: false,
        }
    }

    #[test]
    fn test_default_prompt_has_mode_and_budget() {
        let prompt = build_system_prompt(&options());
        assert!(prompt.contains("The learner is a student"));
        assert!(prompt.contains("Stay under 350 words"));
        assert!(!prompt.contains("future self"));
    }

    #[test]
    fn test_optional_directives() {
        let prompt = build_system_prompt(&PromptOptions {
            mode: ExplainMode::Beginner,
            cognitive_load: CognitiveLoad::Overwhelmed,
            perspective: Perspective::Analogy,
            future_you: true,
        });
        assert!(prompt.contains("beginner"));
        assert!(prompt.contains("Stay under 150 words"));
        assert!(prompt.contains("everyday analogy"));
        assert!(prompt.contains("future self"));
    }
}
