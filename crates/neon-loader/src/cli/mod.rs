//! CLI subcommand implementations for the neon-loader binary.

pub mod output;
pub mod scan_cmd;
pub mod simulate_cmd;

use crate::cli::output::Styled;
use crate::config::LoaderConfig;
use crate::dom::html::HtmlDocument;
use crate::report::LoadReport;
use anyhow::{Context, Result};
use std::path::Path;

/// Read and parse a page from disk, laying out the media and widgets
/// recognized by `config`.
pub fn read_page(path: &Path, config: &LoaderConfig) -> Result<HtmlDocument> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    HtmlDocument::parse_with_boxes(&source, &config.box_selector())
        .with_context(|| format!("parsing {}", path.display()))
}

/// Print one line per tracked element plus totals.
pub fn print_report(s: &Styled, report: &LoadReport) {
    for status in &report.elements {
        let resource = status
            .target
            .resource()
            .unwrap_or_else(|| s.dim("(widget)"));
        output::print_check(
            s.state_sym(status.state),
            &format!("{} {}", status.target.label(), status.id),
            &resource,
        );
        if let Some(err) = &status.error {
            output::print_detail(&s.red(err));
        }
    }

    let t = &report.totals;
    eprintln!();
    eprintln!(
        "  {} loaded, {} failed, {} loading, {} waiting",
        s.green(&t.loaded.to_string()),
        s.red(&t.error.to_string()),
        s.yellow(&t.loading.to_string()),
        t.placeholder + t.unloaded
    );
}
