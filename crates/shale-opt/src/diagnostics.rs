//! Optimization remarks rendered with ariadne.
//!
//! Misses are advice, not errors: the program is still correct, it just
//! keeps a generic dispatch where a specialized operation was possible.
//! Output is colorless so it can be compared in tests.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use shale_common::{Miss, MissKind, Span};

fn help(kind: &MissKind) -> Option<&'static str> {
    match kind {
        MissKind::UnresolvedShape => Some("the receiver may be a subtype or a union of shapes"),
        MissKind::UnmatchedCallShape { .. } => None,
        MissKind::VersionUnavailable => Some("the call keeps the generic method dispatch"),
    }
}

fn clamp(span: Span, source_len: usize) -> Range<usize> {
    let start = (span.start as usize).min(source_len);
    let end = (span.end as usize).min(source_len).max(start);
    if start == end {
        start..end.saturating_add(1).min(source_len)
    } else {
        start..end
    }
}

/// Render one missed specialization against the source it points into.
pub fn render_remark(miss: &Miss, source: &str) -> String {
    let config = Config::default().with_color(false);
    let span = clamp(miss.span, source.len());

    let mut builder = Report::build(ReportKind::Advice, span.clone())
        .with_code(miss.kind.code())
        .with_message(format!("'{}' not specialized", miss.attribute))
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(miss.kind.to_string())
                .with_color(Color::Yellow),
        );
    if let Some(help) = help(&miss.kind) {
        builder = builder.with_help(help);
    }

    let mut buf = Vec::new();
    match builder.finish().write(Source::from(source), &mut buf) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => format!("[{}] {miss}", miss.kind.code()),
    }
}

/// Render every remark, in order, separated by blank lines.
pub fn render_remarks(misses: &[Miss], source: &str) -> String {
    misses
        .iter()
        .map(|miss| render_remark(miss, source))
        .collect::<Vec<_>>()
        .join("\n")
}
