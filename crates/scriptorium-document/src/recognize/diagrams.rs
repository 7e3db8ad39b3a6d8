// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Keyword heuristics for diagrams mentioned in recognized text.
//
// When an engine reports no diagram information, the text itself is scanned
// for phrases like "flow chart" or "sequence diagram", and a small Mermaid
// sketch is built from the capitalized words around it.  The sketches are
// deliberately crude: they give the user an editable starting point.

use std::sync::LazyLock;

use regex::Regex;

use scriptorium_core::types::Diagram;

struct Pattern {
    kind: &'static str,
    phrase: Regex,
}

static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    [
        ("flowchart", r"(?i)\b(flowchart|flow\s+chart|flow\s+diagram)\b"),
        ("sequence", r"(?i)\b(sequence\s+diagram|seq\s+diagram)\b"),
        ("classDiagram", r"(?i)\bclass\s+diagram\b"),
    ]
    .into_iter()
    .map(|(kind, pattern)| Pattern {
        kind,
        phrase: Regex::new(pattern).expect("valid diagram pattern"),
    })
    .collect()
});

static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]\w*\b").expect("valid word pattern"));

/// Mermaid sketches for every diagram kind mentioned in `text`.
///
/// Kinds whose sketch needs more words than the text offers are skipped.
pub fn detect_diagrams(text: &str) -> Vec<Diagram> {
    PATTERNS
        .iter()
        .filter(|pattern| pattern.phrase.is_match(text))
        .filter_map(|pattern| {
            sketch(pattern.kind, text).map(|mermaid_code| Diagram {
                kind: pattern.kind.to_owned(),
                mermaid_code,
            })
        })
        .collect()
}

fn sketch(kind: &str, text: &str) -> Option<String> {
    match kind {
        "flowchart" => {
            let nodes = capitalized_words(text, 4, 5);
            if nodes.len() < 2 {
                return None;
            }
            let mut code = String::from("flowchart TD\n");
            for (i, node) in nodes.iter().enumerate() {
                code.push_str(&format!("    A{i}[{node}]\n"));
            }
            for i in 0..nodes.len() - 1 {
                code.push_str(&format!("    A{i} --> A{}\n", i + 1));
            }
            Some(code)
        }
        "sequence" => {
            let actors = capitalized_words(text, 4, 3);
            if actors.len() < 2 {
                return None;
            }
            let mut code = String::from("sequenceDiagram\n");
            for actor in &actors {
                code.push_str(&format!("    participant {actor}\n"));
            }
            for pair in actors.windows(2) {
                code.push_str(&format!("    {}->>+{}: Request\n", pair[0], pair[1]));
                code.push_str(&format!("    {}-->>-{}: Response\n", pair[1], pair[0]));
            }
            Some(code)
        }
        "classDiagram" => {
            let classes = capitalized_words(text, 3, 3);
            if classes.len() < 2 {
                return None;
            }
            let mut code = String::from("classDiagram\n");
            for class in &classes {
                code.push_str(&format!("    class {class}\n"));
            }
            code.push_str(&format!("    {} <|-- {}\n", classes[0], classes[1]));
            Some(code)
        }
        _ => None,
    }
}

/// Distinct capitalized words of at least `min_len` characters, in order of
/// first appearance, at most `limit` of them.
fn capitalized_words(text: &str, min_len: usize, limit: usize) -> Vec<&str> {
    let mut words: Vec<&str> = Vec::with_capacity(limit);
    for found in CAPITALIZED.find_iter(text) {
        let word = found.as_str();
        if word.chars().count() < min_len || words.contains(&word) {
            continue;
        }
        words.push(word);
        if words.len() == limit {
            break;
        }
    }
    words
}

/// Share of alphanumeric and whitespace characters, as a 0–100 score.
///
/// Used when an engine does not report its own confidence.
pub fn estimate_confidence(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let clean = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    clean as f64 / total as f64 * 100.0
}
