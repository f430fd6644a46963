//! Render command
//!
//! Print the code a build would hand to the compiler, without compiling

use anyhow::{Context, Result, bail};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use weld::descriptor::ModuleDescriptor;
use weld::render::numbered;
use weld::{BuildLayout, assemble_source, config, is_identifier, render_fragment, render_module};

/// Render every fragment and the module unit as one listing
pub(crate) fn render_all(name: &str, files: &[PathBuf]) -> Result<String> {
    if !is_identifier(name) {
        bail!("module name {name:?} is not an identifier");
    }

    let layout = BuildLayout::new(config::DEFAULT_BUILD_DIR, name);
    let mut module = ModuleDescriptor::new(name);
    let mut out = String::new();

    for file in files {
        let text = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let assembly = assemble_source(name, &text);
        let written = layout.generated(file);

        let _ = writeln!(out, "==> {} <==", written.display());
        out.push_str(&render_fragment(&text, file, &written, &assembly.module));
        out.push('\n');

        module.merge(assembly.module);
    }

    let _ = writeln!(out, "==> {} <==", layout.module_unit().display());
    out.push_str(&render_module(&module));

    Ok(out)
}

/// Print the generated listing, optionally with line numbers
pub(crate) fn run(name: &str, files: &[PathBuf], numbered_lines: bool) -> Result<()> {
    let listing = render_all(name, files)?;

    if numbered_lines {
        print!("{}", numbered(&listing));
    } else {
        print!("{listing}");
    }

    Ok(())
}
