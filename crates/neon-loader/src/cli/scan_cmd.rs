//! `neon-loader scan <file>`: list the deferred media on a page.

use crate::cli::output::{self, Styled};
use crate::config::LoaderConfig;
use crate::dom::{DocumentAdapter, ElementId};
use crate::loader::LazyLoader;
use crate::report::LoadReport;
use anyhow::Result;
use std::path::Path;

/// Register every deferred element without loading anything and print them.
pub fn run(path: &Path, config: LoaderConfig) -> Result<()> {
    let mut doc = super::read_page(path, &config)?;
    // Register only; nothing is visible to an observer that never fires.
    let mut loader = LazyLoader::new(config)?;
    loader.register_deferred_elements(&mut doc);
    loader.register_deferred_asset_groups(&mut doc);
    let report = LoadReport::from_loader(&loader);

    if output::is_json() {
        let mut value = serde_json::to_value(&report)?;
        if let Some(elements) = value["elements"].as_array_mut() {
            for element in elements.iter_mut() {
                let rect = element["id"]
                    .as_u64()
                    .and_then(|id| doc.bounding_rect(ElementId(id as usize)));
                element["rect"] = serde_json::to_value(rect)?;
            }
        }
        output::print_json(&value);
        return Ok(());
    }

    if output::is_quiet() {
        return Ok(());
    }

    let s = Styled::new();
    output::print_header(&s);
    output::print_section(&s, &format!("Deferred elements in {}", path.display()));
    if report.elements.is_empty() {
        eprintln!("    Nothing is marked for deferred loading.");
        return Ok(());
    }
    super::print_report(&s, &report);
    Ok(())
}
