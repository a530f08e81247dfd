//! Concept Graph Extraction.
//!
//! Builds a small [`KnowledgeGraph`] from a markdown answer:
//! - headers become `core` concepts
//! - bold spans become `related` concepts
//! - inline code spans become `example` concepts
//!
//! Edges come from fixed proximity rules (each core concept links to the first few related
//! and example concepts) and from three textual patterns between known concepts
//! ("A depends on B", "A requires B", "A needs B"). When fewer than three concepts are found,
//! filler concepts are taken from a static keyword table so the graph is never empty for a
//! non-empty query. Purely visual data: nothing here checks that the graph is correct.

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

use super::keywords::KeywordExtractor;
use crate::models::{GraphLink, GraphNode, KnowledgeGraph, NodeType};

pub const MAX_NODES: usize = 30;
pub const MIN_CONCEPTS: usize = 3;
const RELATED_PER_CORE: usize = 3;
const EXAMPLES_PER_CORE: usize = 2;
const MAX_LABEL_CHARS: usize = 60;
const QUERY_LABEL_CHARS: usize = 40;

const RELATES_STRENGTH: f32 = 0.7;
const EXAMPLE_STRENGTH: f32 = 0.5;
const DEPENDENCY_STRENGTH: f32 = 0.9;
const FILLER_STRENGTH: f32 = 0.4;

/// Textual dependency patterns and the link type they produce.
const DEPENDENCY_PHRASES: &[(&str, &str)] = &[
    ("depends on", "depends_on"),
    ("requires", "requires"),
    ("needs", "needs"),
];

/// Topic keyword → filler concepts.
const FILLER_TABLE: &[(&str, &[&str])] = &[
    ("closure", &["Lexical Scope", "Functions", "Variables"]),
    ("function", &["Parameters", "Return Values", "Scope"]),
    ("recursion", &["Base Case", "Call Stack", "Recursive Case"]),
    ("async", &["Promises", "Event Loop", "Callbacks"]),
    ("promise", &["Async/Await", "Event Loop", "Error Handling"]),
    ("react", &["Components", "State", "Props"]),
    ("array", &["Indexing", "Iteration", "Length"]),
    ("class", &["Objects", "Inheritance", "Methods"]),
    ("object", &["Properties", "Methods", "Prototypes"]),
    ("loop", &["Iteration", "Conditions", "Counters"]),
    ("pointer", &["Memory", "References", "Addresses"]),
    ("database", &["Tables", "Queries", "Indexes"]),
    ("sql", &["Tables", "Joins", "Queries"]),
    ("api", &["Endpoints", "Requests", "Responses"]),
    ("git", &["Commits", "Branches", "Merging"]),
];

const DEFAULT_FILLERS: &[&str] = &["Fundamentals", "Examples", "Practice"];

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("Invalid regex: fenced code"));

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").expect("Invalid regex: header"));

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*|__([^_\n]+?)__").expect("Invalid regex: bold"));

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("Invalid regex: inline code"));

/// Lowercase slug used as node id: "Lexical Scope" → "lexical-scope".
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut dash = false;
    for c in label.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn clean_label(raw: &str) -> Option<String> {
    let label = raw
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c == '`')
        .trim_end_matches(|c: char| c == ':' || c == '.' || c == ',')
        .trim();
    let len = label.chars().count();
    if len < 2 || len > MAX_LABEL_CHARS {
        return None;
    }
    Some(label.to_string())
}

fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max).collect();
        format!("{}…", cut.trim_end())
    }
}

/// Collects nodes while enforcing id uniqueness and the node cap.
struct NodeSet {
    nodes: Vec<GraphNode>,
}

impl NodeSet {
    fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn insert(&mut self, label: String, node_type: NodeType) -> Option<String> {
        let id = slugify(&label);
        if id.is_empty() {
            return None;
        }
        if self.nodes.iter().any(|n| n.id == id) {
            return Some(id);
        }
        if self.nodes.len() >= MAX_NODES {
            return None;
        }
        self.nodes.push(GraphNode {
            id: id.clone(),
            label,
            node_type,
        });
        Some(id)
    }

    fn ids_of(&self, node_type: NodeType) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == node_type)
            .map(|n| n.id.clone())
            .collect()
    }
}

fn push_link(links: &mut Vec<GraphLink>, source: &str, target: &str, link_type: &str, strength: f32) {
    if source == target {
        return;
    }
    let exists = links
        .iter()
        .any(|l| l.source == source && l.target == target && l.link_type == link_type);
    if !exists {
        links.push(GraphLink {
            source: source.to_string(),
            target: target.to_string(),
            link_type: link_type.to_string(),
            strength,
        });
    }
}

/// Extracts a concept graph from a markdown answer to `query`.
pub fn extract_concepts_from_text(text: &str, query: &str) -> KnowledgeGraph {
    let prose = FENCED_CODE.replace_all(text, "");
    let mut set = NodeSet::new();

    for caps in HEADER.captures_iter(&prose) {
        if let Some(label) = clean_label(&caps[1]) {
            set.insert(label, NodeType::Core);
        }
    }
    for caps in BOLD.captures_iter(&prose) {
        let raw = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
        if let Some(label) = clean_label(raw) {
            set.insert(label, NodeType::Related);
        }
    }
    for caps in INLINE_CODE.captures_iter(&prose) {
        if let Some(label) = clean_label(&caps[1]) {
            set.insert(label, NodeType::Example);
        }
    }

    let mut links = Vec::new();
    let cores = set.ids_of(NodeType::Core);
    let related = set.ids_of(NodeType::Related);
    let examples = set.ids_of(NodeType::Example);

    for core in &cores {
        for target in related.iter().take(RELATED_PER_CORE) {
            push_link(&mut links, core, target, "relates_to", RELATES_STRENGTH);
        }
        for target in examples.iter().take(EXAMPLES_PER_CORE) {
            push_link(&mut links, core, target, "example_of", EXAMPLE_STRENGTH);
        }
    }

    let lowered = prose.replace(['*', '`'], "").to_lowercase();
    for source in &set.nodes {
        for target in &set.nodes {
            if source.id == target.id {
                continue;
            }
            for (phrase, link_type) in DEPENDENCY_PHRASES {
                let pattern = format!(
                    "{} {} {}",
                    source.label.to_lowercase(),
                    phrase,
                    target.label.to_lowercase()
                );
                if lowered.contains(&pattern) {
                    push_link(&mut links, &source.id, &target.id, link_type, DEPENDENCY_STRENGTH);
                }
            }
        }
    }

    if set.nodes.len() < MIN_CONCEPTS && !query.trim().is_empty() {
        inject_fillers(&mut set, &mut links, text, query);
    }

    KnowledgeGraph {
        id: Uuid::new_v4().to_string(),
        query: query.trim().to_string(),
        nodes: set.nodes,
        links,
        created_at: Utc::now(),
    }
}

/// Whole-token match: "api" matches "api" and "rest-api", never "rapid".
fn mentions_topic(keyword: &str, topic: &str) -> bool {
    keyword.split(['-', '_']).any(|part| part == topic)
}

fn filler_labels(text: &str, query: &str) -> Vec<&'static str> {
    let extractor = KeywordExtractor::new();
    let keywords = extractor.extract_keywords(&format!("{} {}", query, text), Some(10));

    let matched = keywords.iter().flat_map(|keyword| {
        FILLER_TABLE
            .iter()
            .filter(move |(topic, _)| mentions_topic(keyword, topic))
            .flat_map(|(_, fillers)| fillers.iter())
    });

    let mut labels: Vec<&'static str> = Vec::new();
    for label in matched.chain(DEFAULT_FILLERS.iter()) {
        if !labels.contains(label) {
            labels.push(*label);
        }
    }
    labels
}

fn inject_fillers(set: &mut NodeSet, links: &mut Vec<GraphLink>, text: &str, query: &str) {
    let anchor = set.insert(truncate_chars(query, QUERY_LABEL_CHARS), NodeType::Core);

    for label in filler_labels(text, query) {
        if set.nodes.len() >= MIN_CONCEPTS {
            break;
        }
        let before = set.nodes.len();
        let Some(id) = set.insert(label.to_string(), NodeType::Filler) else {
            continue;
        };
        if set.nodes.len() == before {
            continue;
        }
        if let Some(anchor) = &anchor {
            push_link(links, anchor, &id, "related", FILLER_STRENGTH);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Lexical Scope"), "lexical-scope");
        assert_eq!(slugify("  Async/Await! "), "async-await");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_harvests_each_markdown_kind() {
        let text = "## Closures\nA closure keeps **lexical scope** alive, e.g. `makeCounter()`.";
        let graph = extract_concepts_from_text(text, "Explain closures");

        assert_eq!(graph.node("closures").map(|n| n.node_type), Some(NodeType::Core));
        assert_eq!(graph.node("lexical-scope").map(|n| n.node_type), Some(NodeType::Related));
        assert_eq!(graph.node("makecounter").map(|n| n.node_type), Some(NodeType::Example));
        assert!(graph
            .links
            .iter()
            .any(|l| l.source == "closures" && l.target == "lexical-scope" && l.link_type == "relates_to"));
        assert!(graph
            .links
            .iter()
            .any(|l| l.source == "closures" && l.target == "makecounter" && l.link_type == "example_of"));
    }

    #[test]
    fn test_dependency_phrases_link_known_concepts() {
        let text = "# Closures\n**Closures** depends on **lexical scope**. A **callback** needs `this`.";
        let graph = extract_concepts_from_text(text, "closures");

        assert!(graph
            .links
            .iter()
            .any(|l| l.source == "closures" && l.target == "lexical-scope" && l.link_type == "depends_on"));
        assert!(graph
            .links
            .iter()
            .any(|l| l.source == "callback" && l.target == "this" && l.link_type == "needs"));
    }

    #[test]
    fn test_filler_topics_match_whole_words() {
        assert_eq!(filler_labels("", "rapid classroom setup"), DEFAULT_FILLERS.to_vec());

        let labels = filler_labels("", "Explain REST APIs and classes");
        assert!(labels.contains(&"Endpoints"));
        assert!(labels.contains(&"Inheritance"));
        assert!(mentions_topic("async-await", "async"));
        assert!(!mentions_topic("asynchronous", "async"));
    }

    #[test]
    fn test_fenced_code_is_ignored() {
        let text = "# Loops\n```js\n// **not a concept**\nconst `x` = 1;\n```\nUse **iteration** and **counters**.";
        let graph = extract_concepts_from_text(text, "loops");
        assert!(graph.node("not-a-concept").is_none());
        assert_eq!(graph.nodes.len(), 3);
    }

    #[test]
    fn test_plain_text_gets_fillers() {
        let graph = extract_concepts_from_text("Just some plain prose.", "Explain closures");
        assert!(graph.nodes.len() >= MIN_CONCEPTS);
        assert!(graph.nodes_of(NodeType::Filler).any(|n| n.label == "Lexical Scope"));
    }

    #[test]
    fn test_empty_query_and_text() {
        let graph = extract_concepts_from_text("", "");
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }
}
