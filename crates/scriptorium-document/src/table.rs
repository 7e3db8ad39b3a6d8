// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Table markup -> cell grid.
//
// Recognized tables arrive as small HTML fragments (`<table><tr><td>...`).
// The exporters need plain rows of cell text, so this module pulls the grid
// out with a handful of regexes rather than a full HTML parser.

use std::sync::LazyLock;

use regex::Regex;

static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid row pattern"));

static CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<t([hd])\b[^>]*>(.*?)</t[hd]\s*>").expect("valid cell pattern")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag pattern"));

/// One table as rows of cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,
    /// Whether the first row was made of `<th>` cells.
    pub header: bool,
}

impl Grid {
    /// Widest row; shorter rows are padded to this when rendered as a grid.
    pub fn columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows joined with ` | `, the plain-text rendering used by PDF.
    pub fn pipe_rows(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.join(" | ")).collect()
    }
}

/// Parse a table fragment into a [`Grid`].
///
/// Markup without any `<tr>` falls back to a single cell holding the
/// fragment's text, so nothing the engine reported is silently lost.
pub fn parse_table(html: &str) -> Grid {
    let mut grid = Grid::default();

    for row in ROW.captures_iter(html) {
        let inner = row.get(1).map_or("", |m| m.as_str());
        let mut cells = Vec::new();
        let mut all_header = true;
        for cell in CELL.captures_iter(inner) {
            all_header &= cell.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case("h"));
            cells.push(cell_text(cell.get(2).map_or("", |m| m.as_str())));
        }
        if cells.is_empty() {
            continue;
        }
        if grid.rows.is_empty() {
            grid.header = all_header;
        }
        grid.rows.push(cells);
    }

    if grid.rows.is_empty() {
        let text = cell_text(html);
        if !text.is_empty() {
            grid.rows.push(vec![text]);
        }
    }
    grid
}

/// Strip tags, decode the common entities and collapse whitespace.
fn cell_text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';').filter(|&end| end <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
