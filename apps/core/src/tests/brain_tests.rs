//! Brain Module Tests
//!
//! Property-style checks over the pure analysis functions.

use crate::brain::concepts::{extract_concepts_from_text, MIN_CONCEPTS};
use crate::brain::stack_parser::parse_error_stack;
use crate::brain::stuck::{StuckDetector, STUCK_THRESHOLD};
use crate::models::{CognitiveLoad, InteractionSignal, NodeType, Severity, SignalKind, SourceLanguage};
use serde_json::{json, Value};

#[cfg(test)]
mod stuck_tests {
    use super::*;

    #[test]
    fn test_score_stays_in_range_for_all_combinations() {
        let detector = StuckDetector::new();
        let severities = [Severity::Low, Severity::Medium, Severity::High];
        let kinds = [SignalKind::Reread, SignalKind::WrongAnswer, SignalKind::Overwhelmed];

        for count in [0usize, 1, 5, 10, 30] {
            for severity in severities {
                for kind in kinds {
                    let signals = vec![InteractionSignal::new(kind, severity); count];
                    let loads = vec![CognitiveLoad::Overwhelmed; count.min(5)];
                    let questions: Vec<String> = vec!["what is a closure".to_string(); count.min(3)];

                    let result = detector.analyze(&signals, &loads, &questions);
                    assert!(result.score <= 100, "score {} out of range", result.score);
                    assert_eq!(result.is_stuck, result.score >= STUCK_THRESHOLD);
                    if result.score == 0 {
                        assert!(result.suggestions.is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn test_every_bonus_at_once_clamps_to_100() {
        let detector = StuckDetector::new();
        let signals = vec![InteractionSignal::new(SignalKind::Reread, Severity::High); 10];
        let loads = vec![CognitiveLoad::Overwhelmed; 5];
        let questions = vec![
            "how do closures work".to_string(),
            "how do closures work in js".to_string(),
            "how do closures work".to_string(),
        ];

        let result = detector.analyze(&signals, &loads, &questions);
        assert_eq!(result.score, 100);
        assert!(result.is_stuck);
        assert!(result.suggestions.len() >= 4);
    }

    #[test]
    fn test_bonuses_from_raw_json() {
        let detector = StuckDetector::new();
        let signals = json!([
            {"type": "reread", "severity": "low"},
            {"type": "reread", "severity": "low"},
        ]);
        let loads = json!(["overwhelmed", {"mode": "Overwhelmed"}, "steady"]);
        let questions = json!([
            {"question": "what is recursion"},
            "what is recursion exactly",
        ]);

        let result = detector.analyze_raw(&signals, &loads, &questions);
        // 5 + 5 signals, +25 similar questions, +20 overwhelmed, +15 rereads
        assert_eq!(result.score, 70);
        assert!(result.is_stuck);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let detector = StuckDetector::new();
        let signals = json!([
            42,
            null,
            {"type": "reread"},
            {"severity": "extreme", "type": "reread"},
            {"type": "long_pause", "severity": "medium"},
        ]);
        let loads = json!([1, true, {"nope": "overwhelmed"}, "sideways"]);
        let questions = json!([[], {"q": 1}, ""]);

        let result = detector.analyze_raw(&signals, &loads, &questions);
        assert_eq!(result.score, 10);
        assert_eq!(result.signals.len(), 1);
    }

    #[test]
    fn test_everything_malformed_is_neutral() {
        let detector = StuckDetector::new();
        for garbage in [Value::Null, json!(7), json!("x"), json!({"signals": []}), json!([null, 1, "a"])] {
            let result = detector.analyze_raw(&garbage, &garbage, &garbage);
            assert_eq!(result.score, 0);
            assert!(!result.is_stuck);
            assert!(result.suggestions.is_empty());
        }
    }
}

#[cfg(test)]
mod stack_parser_tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        let analysis =
            parse_error_stack("TypeError: Cannot read property 'x' of undefined\n  at f (a.js:1:1)");
        assert_eq!(analysis.error_type, "TypeError");
        assert_eq!(analysis.stack.len(), 1);
        assert_eq!(analysis.stack[0].file.as_deref(), Some("a.js"));
        assert_eq!(analysis.stack[0].line, Some(1));
        assert!(analysis.suggested_fixes.iter().any(|f| f.title.to_lowercase().contains("undefined")
            || f.description.to_lowercase().contains("undefined")));
    }

    #[test]
    fn test_root_location_skips_library_frames() {
        let analysis = parse_error_stack(
            "Uncaught TypeError: handler is not a function\n\
             \x20   at Module._compile (node:internal/modules/cjs/loader:1105:14)\n\
             \x20   at next (/app/node_modules/express/lib/router/route.js:144:13)\n\
             \x20   at main (/app/src/index.js:42:7)",
        );
        assert_eq!(analysis.error_type, "TypeError");
        assert_eq!(analysis.stack.len(), 3);
        let root = analysis.root_location.expect("root location");
        assert_eq!(root.file.as_deref(), Some("/app/src/index.js"));
        assert_eq!(root.line, Some(42));
        assert_eq!(root.function.as_deref(), Some("main"));
    }

    #[test]
    fn test_python_traceback() {
        let analysis = parse_error_stack(
            "Traceback (most recent call last):\n\
             \x20 File \"main.py\", line 10, in <module>\n\
             \x20   run()\n\
             \x20 File \"/usr/lib/python3/site-packages/lib.py\", line 3, in run\n\
             \x20   data[\"k\"]\n\
             KeyError: 'k'",
        );
        assert_eq!(analysis.error_type, "KeyError");
        assert_eq!(analysis.message, "'k'");
        assert_eq!(analysis.language, SourceLanguage::Python);
        assert_eq!(analysis.stack.len(), 2);
        assert_eq!(analysis.stack[0].function.as_deref(), Some("<module>"));
        assert_eq!(
            analysis.root_location.and_then(|f| f.file),
            Some("main.py".to_string())
        );
    }

    #[test]
    fn test_firefox_frames() {
        let analysis = parse_error_stack(
            "ReferenceError: count is not defined\n\
             increment@http://localhost:3000/app.js:10:5\n\
             @http://localhost:3000/app.js:20:1",
        );
        assert_eq!(analysis.error_type, "ReferenceError");
        assert_eq!(analysis.stack.len(), 2);
        assert_eq!(analysis.stack[0].function.as_deref(), Some("increment"));
        assert_eq!(analysis.stack[0].file.as_deref(), Some("http://localhost:3000/app.js"));
        assert_eq!(analysis.stack[1].function, None);
        assert_eq!(analysis.stack[1].line, Some(20));
    }
}

#[cfg(test)]
mod concept_tests {
    use super::*;

    #[test]
    fn test_plain_text_never_empty_with_query() {
        let texts = ["", "plain words only", "12345", "```\n# hidden\n```", "a b c"];
        let queries = ["Explain closures", "x", "How does git rebase work?", "日本語"];

        for text in texts {
            for query in queries {
                let graph = extract_concepts_from_text(text, query);
                assert!(
                    !graph.nodes.is_empty(),
                    "empty graph for text {:?} / query {:?}",
                    text,
                    query
                );
                assert!(graph.nodes.len() >= MIN_CONCEPTS);
            }
        }
    }

    #[test]
    fn test_links_reference_known_nodes_and_valid_strengths() {
        let text = "# Recursion\n## Base Case\nRecursion **requires** a **base case**. \
                    The **call stack** grows with each `factorial(n - 1)` call.";
        let graph = extract_concepts_from_text(text, "recursion");

        assert!(graph.nodes_of(NodeType::Core).count() >= 2);
        for link in &graph.links {
            assert!(graph.node(&link.source).is_some(), "dangling source {}", link.source);
            assert!(graph.node(&link.target).is_some(), "dangling target {}", link.target);
            assert!((0.0..=1.0).contains(&link.strength));
            assert_ne!(link.source, link.target);
        }
    }

    #[test]
    fn test_node_ids_are_unique() {
        let text = "# Closures\n**closures** and **Closures** and `closures`";
        let graph = extract_concepts_from_text(text, "closures");
        let mut ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), graph.nodes.len());
        // First type wins
        assert_eq!(graph.node("closures").map(|n| n.node_type), Some(NodeType::Core));
    }
}
