// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text layout shared by the PDF and DOCX renderers.
//
// Two modes, chosen by the document's `preserveFormatting` option:
//
// - **preserve** keeps every recognized line as-is (including runs of
//   spaces); lines wider than the page are hard-wrapped.
// - **reflow** treats blank-line separated blocks as paragraphs and
//   word-wraps them to the page width.
//
// Widths are counted in characters, never bytes, so multi-byte text cannot
// be split inside a code point.

/// Paragraphs as the DOCX renderer wants them: word processors wrap by
/// themselves, so only the paragraph boundaries matter.
pub fn paragraphs(text: &str, preserve: bool) -> Vec<String> {
    if preserve {
        return text.lines().map(|line| line.replace('\t', "    ")).collect();
    }

    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        current.extend(line.split_whitespace());
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

/// Physical lines for a fixed-width page.
///
/// In reflow mode paragraphs are separated by one empty line.
pub fn page_lines(text: &str, preserve: bool, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    if preserve {
        for line in paragraphs(text, true) {
            hard_wrap(&line, width, &mut out);
        }
        return out;
    }

    for (index, paragraph) in paragraphs(text, false).iter().enumerate() {
        if index > 0 {
            out.push(String::new());
        }
        wrap_words(paragraph, width, &mut out);
    }
    out
}

/// Split `line` into chunks of at most `width` characters.  An empty line
/// stays one empty line.
pub fn hard_wrap(line: &str, width: usize, out: &mut Vec<String>) {
    let chars: Vec<char> = line.trim_end().chars().collect();
    if chars.is_empty() {
        out.push(String::new());
        return;
    }
    for chunk in chars.chunks(width.max(1)) {
        out.push(chunk.iter().collect());
    }
}

/// Greedy word wrap.  Words longer than `width` are force-broken.
pub fn wrap_words(paragraph: &str, width: usize, out: &mut Vec<String>) {
    let width = width.max(1);
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(width).peekable();
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    out.push(chunk.iter().collect());
                } else {
                    current = chunk.iter().collect();
                    current_len = chunk.len();
                }
            }
        } else if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            out.push(std::mem::replace(&mut current, word.to_owned()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflow_joins_lines_within_a_paragraph() {
        let text = "The quick\nbrown fox\n\njumps over\n";
        assert_eq!(paragraphs(text, false), vec!["The quick brown fox", "jumps over"]);
        assert_eq!(
            page_lines(text, false, 80),
            vec!["The quick brown fox", "", "jumps over"]
        );
    }

    #[test]
    fn preserve_keeps_lines_and_spacing() {
        let text = "Name    Qty\n\nWidget  3";
        assert_eq!(page_lines(text, true, 80), vec!["Name    Qty", "", "Widget  3"]);
    }

    #[test]
    fn preserve_hard_wraps_long_lines() {
        let lines = page_lines("abcdefghij", true, 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_respects_width() {
        let mut out = Vec::new();
        wrap_words("Hello world, this is a test of word wrapping.", 15, &mut out);
        for line in &out {
            assert!(line.chars().count() <= 15, "line too long: {line:?}");
        }
        assert_eq!(out.join(" "), "Hello world, this is a test of word wrapping.");
    }

    #[test]
    fn wrap_breaks_oversized_words_on_char_boundaries() {
        let mut out = Vec::new();
        wrap_words("ééééééé o", 3, &mut out);
        assert_eq!(out, vec!["ééé", "ééé", "é o"]);
    }
}
