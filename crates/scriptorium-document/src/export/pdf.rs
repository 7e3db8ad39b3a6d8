// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF renderer — text and tables on A4 pages, built directly with `lopdf`.
//
// The object graph is assembled by hand (catalog, page tree, one content
// stream per page, two standard Type1 fonts) so the output carries no
// creation date, producer string or random file ID.  Same document in,
// same bytes out.

use lopdf::content::{Content, Operation};
use lopdf::{Document as PdfDocument, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::{debug, instrument};

use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::Document;

use super::layout;
use crate::table::parse_table;

/// A4 in PostScript points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const FONT_SIZE: i64 = 10;
const LEADING: i64 = 13;
/// Conservative Helvetica width at 10 pt across the 483 pt text column.
const CHARS_PER_LINE: usize = 88;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Body(String),
    Heading(String),
}

/// Render a document's text (and tables) as PDF bytes.
#[instrument(skip_all, fields(document_id = %document.id))]
pub fn render(document: &Document) -> Result<Vec<u8>> {
    let lines = compose_lines(document);
    let pages: Vec<&[Line]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut pdf = PdfDocument::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let body_font = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let heading_font = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => body_font,
            "F2" => heading_font,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page_lines in &pages {
        let content = page_content(page_lines)
            .encode()
            .map_err(|e| ScriptoriumError::Export(format!("encode page content: {e}")))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
        }),
    );

    let catalog_id: ObjectId = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes)
        .map_err(|e| ScriptoriumError::Export(format!("write PDF: {e}")))?;

    debug!(pages = page_count, bytes = bytes.len(), "PDF rendered");
    Ok(bytes)
}

/// Lay out the text, then each table under its own heading.
fn compose_lines(document: &Document) -> Vec<Line> {
    let text = document.text.as_deref().unwrap_or_default();
    let mut lines: Vec<Line> =
        layout::page_lines(text, document.options.preserve_formatting, CHARS_PER_LINE)
            .into_iter()
            .map(Line::Body)
            .collect();

    for (index, table) in document.tables.iter().enumerate() {
        if !lines.is_empty() {
            lines.push(Line::Body(String::new()));
        }
        lines.push(Line::Heading(format!("Table {}", index + 1)));

        let grid = parse_table(&table.html);
        if grid.is_empty() {
            lines.push(Line::Body("(empty table)".into()));
            continue;
        }
        let mut wrapped = Vec::new();
        for row in grid.pipe_rows() {
            layout::hard_wrap(&row, CHARS_PER_LINE, &mut wrapped);
        }
        lines.extend(wrapped.into_iter().map(Line::Body));
    }

    lines
}

fn page_content(lines: &[Line]) -> Content {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("TL", vec![Object::Integer(LEADING)]),
        Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN - FONT_SIZE)],
        ),
    ];

    let mut current_font: Option<&'static str> = None;
    for line in lines {
        let (font, text) = match line {
            Line::Body(text) => ("F1", text),
            Line::Heading(text) => ("F2", text),
        };
        if !text.is_empty() {
            if current_font != Some(font) {
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(FONT_SIZE)],
                ));
                current_font = Some(font);
            }
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(text), StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("T*", vec![]));
    }

    ops.push(Operation::new("ET", vec![]));
    Content { operations: ops }
}

/// Encode for the standard fonts' WinAnsi table.  Latin-1 printable
/// characters map 1:1; everything else becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            0x09 => b' ',
            _ => b'?',
        })
        .collect()
}
