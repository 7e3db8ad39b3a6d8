// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the export transformer: a two-page document with
// one table, rendered in every format.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use scriptorium_core::config::Settings;
use scriptorium_core::types::{
    ArtifactKind, Document, DocumentState, ExportFormat, Table, UploadOptions,
};
use scriptorium_document::ExportTransformer;

fn sample_document() -> Document {
    let options = UploadOptions::default().resolve(&Settings::default());
    let mut doc = Document::new("bench.png", ArtifactKind::Png, "0".repeat(64), options);
    doc.state = DocumentState::Ready;
    doc.text = Some(
        (0..100)
            .map(|i| format!("Line {i}: the quick brown fox jumps over the lazy dog."))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    let rows: String = (0..20)
        .map(|i| format!("<tr><td>Item {i}</td><td>{}</td></tr>", i * 3))
        .collect();
    doc.tables.push(Table {
        html: format!("<table><tr><th>Item</th><th>Qty</th></tr>{rows}</table>"),
    });
    doc
}

fn bench_export(c: &mut Criterion) {
    let transformer = ExportTransformer::new();
    let doc = sample_document();

    let mut group = c.benchmark_group("export");
    for format in ExportFormat::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, &format| {
            b.iter(|| black_box(transformer.export(black_box(&doc), format)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_export);
criterion_main!(benches);
