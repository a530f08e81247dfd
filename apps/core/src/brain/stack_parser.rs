//! Error Stack Parsing.
//!
//! Turns a pasted error (message + stack trace) into an [`ErrorAnalysis`]. Line-oriented
//! regex matching only: for each line the first matching frame pattern wins. Text that
//! matches no pattern at all is kept as one flat frame.

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::models::{ErrorAnalysis, FixSuggestion, SourceLanguage, StackFrame};

// NOTE: expect() is fine here, the patterns are constants.
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Uncaught\s+)?(?:\(in promise\)\s+)?((?:[A-Za-z_$][\w$.]*)?(?:Error|Exception|Warning))\s*(?::\s*(.*))?$")
        .expect("Invalid regex: error header")
});

static PYTHON_TRACEBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Traceback \(most recent call last\):").expect("Invalid regex: python traceback")
});

static V8_WITH_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at\s+(?:async\s+)?(.+?)\s+\((.+?):(\d+):(\d+)\)\s*$").expect("Invalid regex: v8 frame")
});

static V8_ANONYMOUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at\s+(?:async\s+)?(.+?):(\d+):(\d+)\s*$").expect("Invalid regex: v8 anonymous frame")
});

static FIREFOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^@\s]*)@(.+?):(\d+):(\d+)\s*$").expect("Invalid regex: firefox frame")
});

static PYTHON_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*File "(.+?)", line (\d+)(?:, in (.+?))?\s*$"#).expect("Invalid regex: python frame")
});

/// Paths that belong to libraries or the runtime rather than the learner's code.
const LIBRARY_MARKERS: &[&str] = &["node_modules", "node:", "<anonymous>", "site-packages", "internal/"];

/// Parses an error string into a typed analysis with canned remediation.
pub fn parse_error_stack(input: &str) -> ErrorAnalysis {
    let lines: Vec<&str> = input.lines().filter(|l| !l.trim().is_empty()).collect();

    let (error_type, message, header_index) = parse_header(&lines);

    let frame_lines: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != header_index)
        .map(|(_, l)| *l)
        .filter(|l| !PYTHON_TRACEBACK.is_match(l))
        .collect();

    // Lines matching no pattern (Python echoes the source line under each frame) are dropped.
    let mut language = SourceLanguage::Unknown;
    let mut stack = Vec::new();
    for line in &frame_lines {
        if let Some((frame, lang)) = parse_frame(line) {
            if language == SourceLanguage::Unknown {
                language = lang;
            }
            stack.push(frame);
        }
    }

    if stack.is_empty() && !frame_lines.is_empty() {
        let raw = frame_lines
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n");
        stack.push(StackFrame {
            function: None,
            file: None,
            line: None,
            column: None,
            raw,
        });
    }

    let root_location = stack
        .iter()
        .find(|f| f.file.as_deref().is_some_and(|file| !is_library_path(file)))
        .or_else(|| stack.first())
        .cloned();

    let suggested_fixes = suggested_fixes(&error_type, &message);

    ErrorAnalysis {
        id: Uuid::new_v4().to_string(),
        error_type,
        message,
        language,
        stack,
        root_location,
        suggested_fixes,
        created_at: Utc::now(),
    }
}

/// Returns `(type, message, index of the header line)`.
fn parse_header(lines: &[&str]) -> (String, String, Option<usize>) {
    let Some(first) = lines.first() else {
        return ("Error".to_string(), String::new(), None);
    };

    // Python prints the exception last.
    if PYTHON_TRACEBACK.is_match(first) {
        for (i, line) in lines.iter().enumerate().rev() {
            if let Some(caps) = HEADER.captures(line) {
                let message = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
                return (caps[1].to_string(), message.to_string(), Some(i));
            }
        }
        return ("Error".to_string(), first.trim().to_string(), Some(0));
    }

    match HEADER.captures(first) {
        Some(caps) => {
            let message = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            (caps[1].to_string(), message.to_string(), Some(0))
        }
        // A bare stack: the first line belongs to the frames
        None if parse_frame(first).is_some() => ("Error".to_string(), String::new(), None),
        None => ("Error".to_string(), first.trim().to_string(), Some(0)),
    }
}

fn parse_number(s: &str) -> Option<u32> {
    s.parse().ok()
}

fn parse_frame(line: &str) -> Option<(StackFrame, SourceLanguage)> {
    let raw = line.trim().to_string();

    if let Some(caps) = V8_WITH_FN.captures(line) {
        return Some((
            StackFrame {
                function: Some(caps[1].to_string()),
                file: Some(caps[2].to_string()),
                line: parse_number(&caps[3]),
                column: parse_number(&caps[4]),
                raw,
            },
            SourceLanguage::JavaScript,
        ));
    }

    if let Some(caps) = V8_ANONYMOUS.captures(line) {
        return Some((
            StackFrame {
                function: None,
                file: Some(caps[1].to_string()),
                line: parse_number(&caps[2]),
                column: parse_number(&caps[3]),
                raw,
            },
            SourceLanguage::JavaScript,
        ));
    }

    if let Some(caps) = FIREFOX.captures(line) {
        let function = Some(caps[1].to_string()).filter(|f| !f.is_empty());
        return Some((
            StackFrame {
                function,
                file: Some(caps[2].to_string()),
                line: parse_number(&caps[3]),
                column: parse_number(&caps[4]),
                raw,
            },
            SourceLanguage::JavaScript,
        ));
    }

    if let Some(caps) = PYTHON_FRAME.captures(line) {
        return Some((
            StackFrame {
                function: caps.get(3).map(|m| m.as_str().to_string()),
                file: Some(caps[1].to_string()),
                line: parse_number(&caps[2]),
                column: None,
                raw,
            },
            SourceLanguage::Python,
        ));
    }

    None
}

fn is_library_path(file: &str) -> bool {
    LIBRARY_MARKERS.iter().any(|m| file.contains(m))
}

fn fix(title: &str, description: &str) -> FixSuggestion {
    FixSuggestion {
        title: title.to_string(),
        description: description.to_string(),
    }
}

/// Fixed remediation table keyed by error type.
pub fn suggested_fixes(error_type: &str, message: &str) -> Vec<FixSuggestion> {
    let lowered = message.to_lowercase();
    if lowered.contains("failed to fetch") || lowered.contains("network") || error_type == "NetworkError" {
        return vec![
            fix("Check the request URL", "Make sure the endpoint exists and the server is running."),
            fix("Look for CORS errors", "Open the browser console network tab and check the response headers."),
        ];
    }

    match error_type {
        "TypeError" => vec![
            fix(
                "Guard against undefined values",
                "A value was null or undefined when you used it. Check it before use or use optional chaining (?.).",
            ),
            fix(
                "Verify the value's type",
                "Log the value right before the failing line to confirm it has the shape you expect.",
            ),
        ],
        "ReferenceError" => vec![
            fix("Declare the variable", "The name is not defined in this scope. Check spelling and imports."),
            fix("Check the scope", "Variables declared with let/const are not visible outside their block."),
        ],
        "SyntaxError" => vec![
            fix("Look for unbalanced brackets", "A missing bracket, brace or quote is the most common cause."),
            fix("Validate JSON input", "If you are parsing JSON, make sure the text is valid JSON."),
        ],
        "RangeError" => vec![
            fix("Check recursion depth", "\"Maximum call stack size exceeded\" usually means a recursion without a base case."),
            fix("Validate numeric arguments", "Array lengths and precision arguments must be within their allowed range."),
        ],
        "KeyError" => vec![
            fix("Check the key exists", "Use `dict.get(key)` or test `key in dict` before indexing."),
        ],
        "IndexError" => vec![
            fix("Check the index bounds", "Indexes run from 0 to len - 1. Check the list length before indexing."),
        ],
        "AttributeError" => vec![
            fix("Check the object type", "The object does not have that attribute. It may be None or a different type."),
        ],
        "ValueError" => vec![
            fix("Validate the input value", "The type is right but the value is not accepted. Validate input before converting it."),
        ],
        _ => vec![
            fix("Read the first frame in your code", "Start at the root location and inspect the values used on that line."),
            fix("Reproduce with a minimal example", "Strip the code down until the error disappears to isolate the cause."),
        ],
    }
}
