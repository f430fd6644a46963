//! Scan command
//!
//! Print the descriptors recovered from source files, without compiling

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use weld::descriptor::{ModuleDescriptor, SlotCategory};
use weld::{Diagnostic, assemble_source};

/// Describe one assembled module, one declaration per line
pub(crate) fn describe(module: &ModuleDescriptor) -> String {
    let mut out = String::new();

    for typ in module.types.values() {
        let _ = writeln!(out, "type {} (line {})", typ.name, typ.line);

        for method in typ.methods.values() {
            let _ = writeln!(
                out,
                "  method {} -> {} [{}]",
                method.name,
                method.function,
                method.convention.flag()
            );
        }

        for property in typ.properties.values() {
            let _ = writeln!(
                out,
                "  property {} get={} set={}",
                property.name,
                property.getter.as_deref().unwrap_or("-"),
                property.setter.as_deref().unwrap_or("-")
            );
        }

        for category in SlotCategory::ALL {
            for (spec, function) in category.layout().iter().zip(typ.slots.category(category)) {
                if let (Some(spec), Some(function)) = (spec, function) {
                    let _ = writeln!(
                        out,
                        "  slot {}_{} -> {function}",
                        category.prefix(),
                        spec.name
                    );
                }
            }
        }
    }

    for function in module.functions.values() {
        let _ = writeln!(
            out,
            "function {} -> {} [{}]",
            function.name,
            function.function,
            function.convention.flag()
        );
    }

    out
}

fn describe_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| format!("{diagnostic}\n"))
        .collect()
}

/// Print the recovered declarations and diagnostics of each file
pub(crate) fn run(files: &[PathBuf], name: &str) -> Result<()> {
    for (index, file) in files.iter().enumerate() {
        let text = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let assembly = assemble_source(name, &text);

        if index > 0 {
            println!();
        }
        println!("==> {} <==", file.display());
        print!("{}", describe(&assembly.module));
        if assembly.module.is_empty() {
            println!("(no declarations)");
        }
        eprint!("{}", describe_diagnostics(&assembly.diagnostics));
    }

    Ok(())
}
