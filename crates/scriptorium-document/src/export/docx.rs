// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DOCX renderer — a minimal WordprocessingML package.
//
// Three parts are enough for Word, LibreOffice and Pages to open the file:
// `[Content_Types].xml`, the package relationships and `word/document.xml`.
// Every zip entry is stamped with the DOS epoch so output is reproducible.

use std::io::{Cursor, Write};

use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::Document;

use super::layout;
use crate::table::{Grid, parse_table};

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#,
);

const RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#,
);

/// Text column width of an A4 page with 1440-twip margins, in twips.
const TEXT_WIDTH_TWIPS: usize = 9026;

/// Render a document's text (and tables) as DOCX bytes.
#[instrument(skip_all, fields(document_id = %document.id))]
pub fn render(document: &Document) -> Result<Vec<u8>> {
    let body = document_xml(document);

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", RELS_XML),
        ("word/document.xml", body.as_str()),
    ] {
        zip.start_file(name, options)
            .map_err(|e| ScriptoriumError::Export(format!("start {name}: {e}")))?;
        zip.write_all(contents.as_bytes())
            .map_err(|e| ScriptoriumError::Export(format!("write {name}: {e}")))?;
    }

    let bytes = zip
        .finish()
        .map_err(|e| ScriptoriumError::Export(format!("finish DOCX: {e}")))?
        .into_inner();

    debug!(bytes = bytes.len(), "DOCX rendered");
    Ok(bytes)
}

fn document_xml(document: &Document) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        "<w:body>",
    ));

    let text = document.text.as_deref().unwrap_or_default();
    for paragraph in layout::paragraphs(text, document.options.preserve_formatting) {
        push_paragraph(&mut xml, &paragraph, false);
    }

    for (index, table) in document.tables.iter().enumerate() {
        push_paragraph(&mut xml, &format!("Table {}", index + 1), true);
        push_table(&mut xml, &parse_table(&table.html));
    }

    xml.push_str(concat!(
        r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/>"#,
        r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/>"#,
        "</w:sectPr></w:body></w:document>",
    ));
    xml
}

fn push_paragraph(xml: &mut String, text: &str, bold: bool) {
    xml.push_str("<w:p>");
    if !text.is_empty() {
        xml.push_str("<w:r>");
        if bold {
            xml.push_str("<w:rPr><w:b/></w:rPr>");
        }
        xml.push_str(r#"<w:t xml:space="preserve">"#);
        xml.push_str(&escape_xml(text));
        xml.push_str("</w:t></w:r>");
    }
    xml.push_str("</w:p>");
}

fn push_table(xml: &mut String, grid: &Grid) {
    let columns = grid.columns().max(1);
    let column_width = TEXT_WIDTH_TWIPS / columns;

    xml.push_str(concat!(
        "<w:tbl><w:tblPr>",
        r#"<w:tblW w:w="0" w:type="auto"/>"#,
        "<w:tblBorders>",
        r#"<w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        "</w:tblBorders></w:tblPr><w:tblGrid>",
    ));
    for _ in 0..columns {
        xml.push_str(&format!(r#"<w:gridCol w:w="{column_width}"/>"#));
    }
    xml.push_str("</w:tblGrid>");

    let empty_row = [String::new()];
    let rows: Vec<&[String]> = if grid.is_empty() {
        vec![&empty_row[..]]
    } else {
        grid.rows.iter().map(Vec::as_slice).collect()
    };

    for (row_index, row) in rows.iter().enumerate() {
        let bold = grid.header && row_index == 0;
        xml.push_str("<w:tr>");
        for column in 0..columns {
            let cell = row.get(column).map(String::as_str).unwrap_or_default();
            xml.push_str(&format!(r#"<w:tc><w:tcPr><w:tcW w:w="{column_width}" w:type="dxa"/></w:tcPr>"#));
            push_paragraph(xml, cell, bold);
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
}

/// Escape XML special characters and drop code points XML 1.0 forbids.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || matches!(c, '\u{FFFE}' | '\u{FFFF}') => {}
            c => out.push(c),
        }
    }
    out
}
