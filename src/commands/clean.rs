//! Clean command
//!
//! Remove a module's workspace, objects, log and link output

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use weld::{BuildLayout, Config, Stats, collect_stats, config, human_bytes, is_identifier};

/// Everything a build leaves under the build directory for one module
fn build_products(layout: &BuildLayout) -> [PathBuf; 4] {
    [
        layout.workspace(),
        layout.objects_dir(),
        layout.log_file(),
        layout.link_output(),
    ]
}

fn remove(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .with_context(|| format!("Failed to remove {}", path.display()))
}

/// Remove build products, returning what was (or would be) freed
pub(crate) fn clean(layout: &BuildLayout, dry_run: bool) -> Result<Stats> {
    let mut freed = Stats::new();

    for path in build_products(layout) {
        if !path.exists() {
            continue;
        }

        let stats = collect_stats(&path);
        if dry_run {
            println!(
                "Would remove: {} ({})",
                path.display(),
                human_bytes(stats.total_size)
            );
        } else {
            weld::debug!("removing {}", path.display());
            remove(&path)?;
        }
        freed = freed.combine(stats);
    }

    Ok(freed)
}

/// Remove build products for `name`; the artifact itself is kept
pub(crate) fn run(
    name: &str,
    build_dir: Option<&Path>,
    dry_run: bool,
    config_path: Option<&Path>,
    norc: bool,
) -> Result<()> {
    if !is_identifier(name) {
        bail!("module name {name:?} is not an identifier");
    }

    let cfg = Config::load_with_options(config_path, norc)?;
    let layout = BuildLayout::new(config::build_dir(build_dir, &cfg), name);

    let freed = clean(&layout, dry_run)?;

    if freed.files == 0 && !dry_run {
        println!("Nothing to clean for {name}");
    } else if dry_run {
        println!("Would free {} in {} file(s)", human_bytes(freed.total_size), freed.files);
    } else {
        println!("Freed {} in {} file(s)", human_bytes(freed.total_size), freed.files);
    }

    Ok(())
}
