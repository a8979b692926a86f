//! `neon-loader simulate <file>`: run the loader against a page while
//! scrolling through it.

use crate::cli::output::{self, Styled};
use crate::config::LoaderConfig;
use crate::dom::Rect;
use crate::driver::{scroll_steps, Driver};
use crate::fetch::{FileFetcher, HttpFetcher, ResourceFetcher};
use crate::loader::LazyLoader;
use crate::report::LoadReport;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Options for a simulated page visit.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub file: PathBuf,
    /// Fetch resources from a live site.
    pub base_url: Option<String>,
    /// Serve resources from a local directory (defaults to the page's directory).
    pub root: Option<PathBuf>,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Pretend the host lacks visibility observation.
    pub no_observer: bool,
    /// Selectors passed to `force_load` before scrolling.
    pub force: Vec<String>,
    /// Stop after the first screen instead of scrolling to the bottom.
    pub no_scroll: bool,
    /// Write the resulting markup here.
    pub output: Option<PathBuf>,
}

pub async fn run(opts: SimulateOptions, config: LoaderConfig) -> Result<()> {
    let mut doc = super::read_page(&opts.file, &config)?;
    doc.set_viewport(Rect::new(0.0, 0.0, opts.viewport_width, opts.viewport_height));
    doc.set_observation_supported(!opts.no_observer);

    let fetcher: Arc<dyn ResourceFetcher> = match (&opts.base_url, &opts.root) {
        (Some(base), _) => {
            let base = Url::parse(base).with_context(|| format!("invalid base URL {base}"))?;
            Arc::new(HttpFetcher::new(Some(base))?)
        }
        (None, Some(root)) => Arc::new(FileFetcher::new(root.clone())),
        (None, None) => {
            let root = opts
                .file
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            Arc::new(FileFetcher::new(root))
        }
    };

    let driver = Driver::new(fetcher, config.fetch_timeout());
    let mut loader = LazyLoader::new(config)?;
    loader.initialize(&mut doc);

    for selector in &opts.force {
        loader
            .force_load(&mut doc, selector)
            .with_context(|| format!("force load {selector}"))?;
    }

    let steps = if opts.no_scroll {
        Vec::new()
    } else {
        scroll_steps(doc.content_height(), opts.viewport_height)
    };
    let completed = driver.scroll_through(&mut loader, &mut doc, &steps).await;
    info!(completed, steps = steps.len(), "simulation finished");

    if let Some(out) = &opts.output {
        std::fs::write(out, doc.to_html())
            .with_context(|| format!("writing {}", out.display()))?;
    }

    let report = LoadReport::from_loader(&loader);
    if output::is_json() {
        output::print_json(&serde_json::to_value(&report)?);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    let s = Styled::new();
    output::print_header(&s);
    output::print_section(
        &s,
        &format!(
            "{} ({} strategy, {} scroll steps)",
            opts.file.display(),
            report.strategy,
            steps.len()
        ),
    );
    super::print_report(&s, &report);

    let failed = report.totals.error;
    if failed > 0 {
        output::print_status(&s, "degraded", &format!("{failed} element(s) failed to load"));
    } else {
        output::print_status(&s, "ok", "all requested resources loaded");
    }
    if output::is_verbose() {
        if let Some(out) = &opts.output {
            eprintln!("  Wrote {}", out.display());
        }
    }
    Ok(())
}
