//! The `dialang validate` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use dialang_core::ReferenceCatalog;

use crate::config::load_config_from;

pub fn execute(catalog_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let catalog_dir = match catalog_dir {
        Some(dir) => dir,
        None => load_config_from(config_path.as_deref())?.catalog_dir,
    };

    let catalog = ReferenceCatalog::load_dir(&catalog_dir)?;
    let summary = catalog.summary();
    println!("Catalog: {}", catalog_dir.display());

    let mut table = Table::new();
    table.set_header(vec!["Table", "Entries"]);
    for (name, count) in [
        ("items", summary.items),
        ("answers", summary.answers),
        ("baskets", summary.baskets),
        ("booklets", summary.booklets),
        ("punctuation", summary.punctuation),
        ("vspt languages", summary.vspt_languages),
        ("sa skills", summary.sa_skills),
        ("preest keys", summary.preest_keys),
        ("grading tables", summary.grading_tables),
    ] {
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    println!("{table}");

    let warnings = catalog.validate();
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.table, w.message);
    }

    if warnings.is_empty() {
        println!("Catalog valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
