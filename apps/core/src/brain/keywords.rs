//! Keyword Extraction using TF-IDF.
//!
//! Ranks the words of a question or answer by term frequency weighted with a heuristic IDF.
//! Used to pick filler concepts when an answer yields too few of its own.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// English stopwords, plus the filler verbs learners put in front of questions.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "nor", "for", "yet", "so", "i", "you", "he", "she", "it",
    "we", "they", "me", "him", "her", "us", "them", "my", "your", "his", "its", "our", "their",
    "this", "that", "these", "those", "who", "whom", "which", "what", "whose", "is", "am", "are",
    "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "shall", "should", "can", "could", "may", "might", "must", "in", "on", "at", "to",
    "from", "by", "with", "about", "between", "into", "through", "during", "before", "after",
    "up", "down", "out", "off", "over", "under", "again", "here", "there", "where", "when", "why",
    "how", "all", "each", "every", "both", "few", "more", "most", "other", "some", "any", "no",
    "not", "only", "own", "same", "than", "too", "very", "just", "also", "now", "then", "if",
    "because", "as", "until", "while", "of", "explain", "please", "tell", "show", "give", "want",
    "understand", "know", "like", "work", "works", "use", "using",
];

/// Result of keyword extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordResult {
    pub keyword: String,
    /// TF-IDF score
    pub score: f32,
    /// Raw frequency in the text
    pub frequency: usize,
}

/// Keyword extractor using TF-IDF
pub struct KeywordExtractor {
    stopwords: HashSet<&'static str>,
    min_word_length: usize,
    max_keywords: usize,
    /// IDF approximation for terms that are common in programming lessons
    idf_weights: HashMap<&'static str, f32>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordExtractor {
    pub fn new() -> Self {
        Self::with_config(3, 10)
    }

    pub fn with_config(min_word_length: usize, max_keywords: usize) -> Self {
        let mut idf_weights = HashMap::new();

        // Generic words that show up in nearly every lesson get a low weight
        for term in ["code", "example", "value", "thing", "way", "time", "data", "program"] {
            idf_weights.insert(term, 0.8);
        }

        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
            min_word_length,
            max_keywords,
            idf_weights,
        }
    }

    fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    /// Lowercase words, stopwords and numbers removed. Simple plurals are folded ("closures" → "closure").
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
            .map(|w| w.trim_matches('-'))
            .filter(|w| {
                w.chars().count() >= self.min_word_length
                    && !self.is_stopword(w)
                    && !w.chars().all(|c| c.is_numeric())
            })
            .map(singular)
            .collect()
    }

    /// Heuristic IDF: longer and compound words tend to be more specific.
    fn get_idf(&self, word: &str) -> f32 {
        if let Some(&weight) = self.idf_weights.get(word) {
            return weight;
        }

        let length_factor = (word.chars().count() as f32 / 6.0).min(1.5);
        let compound_bonus = if word.contains('_') || word.contains('-') {
            0.5
        } else {
            0.0
        };

        1.0 + length_factor + compound_bonus
    }

    /// Extract the top N keywords from text, best first. Ties break alphabetically.
    pub fn extract(&self, text: &str, top_k: Option<usize>) -> Vec<KeywordResult> {
        let max_results = top_k.unwrap_or(self.max_keywords);
        let words = self.tokenize(text);

        if words.is_empty() {
            return vec![];
        }

        let total = words.len() as f32;
        let mut freq: HashMap<String, usize> = HashMap::new();
        for word in words {
            *freq.entry(word).or_insert(0) += 1;
        }

        let mut scored: Vec<KeywordResult> = freq
            .into_iter()
            .map(|(keyword, frequency)| {
                let tf = frequency as f32 / total;
                let score = tf * self.get_idf(&keyword);
                KeywordResult {
                    keyword,
                    score,
                    frequency,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });

        scored.truncate(max_results);
        scored
    }

    pub fn extract_keywords(&self, text: &str, top_k: Option<usize>) -> Vec<String> {
        self.extract(text, top_k)
            .into_iter()
            .map(|k| k.keyword)
            .collect()
    }
}

fn singular(word: &str) -> String {
    if word.len() > 4 && word.ends_with("sses") {
        word[..word.len() - 2].to_string()
    } else if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}
