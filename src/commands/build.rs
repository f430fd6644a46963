//! Build command
//!
//! Runs the full pipeline and reports what the loaded module publishes

use anyhow::Result;
use std::path::{Path, PathBuf};
use weld::config::{self, Config};
use weld::{
    BuildOptions, CcToolchain, CompileEnv, DylibLoader, Macro, PublishedKind, build_artifact,
    load_artifact,
};

/// Command-line arguments of `weld build`
#[derive(Debug)]
pub(crate) struct BuildFlags {
    pub(crate) name: String,
    pub(crate) source_files: Vec<PathBuf>,
    pub(crate) preprocess: Vec<PathBuf>,
    pub(crate) inline: Option<String>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) build_dir: Option<PathBuf>,
    pub(crate) include_dirs: Vec<PathBuf>,
    pub(crate) library_dirs: Vec<PathBuf>,
    pub(crate) libraries: Vec<String>,
    pub(crate) defines: Vec<String>,
    pub(crate) no_cache: bool,
    pub(crate) no_load: bool,
}

/// Merge flags, environment and config into build options
pub(crate) fn options_from(flags: &BuildFlags, config: &Config) -> BuildOptions {
    let configured_dirs = |dirs: &[String]| dirs.iter().map(PathBuf::from).collect::<Vec<_>>();

    BuildOptions {
        name: flags.name.clone(),
        source: flags.inline.clone(),
        sources: flags.source_files.clone(),
        preprocess: flags.preprocess.clone(),
        output: flags.output.clone(),
        build_dir: config::build_dir(flags.build_dir.as_deref(), config),
        include_dirs: config::merge_list(
            &flags.include_dirs,
            &configured_dirs(&config.include_dirs),
        ),
        library_dirs: config::merge_list(
            &flags.library_dirs,
            &configured_dirs(&config.library_dirs),
        ),
        libraries: config::merge_list(&flags.libraries, &config.libraries),
        macros: flags.defines.iter().map(|define| Macro::parse(define)).collect(),
        cache: config::cache_enabled(flags.no_cache, config),
    }
}

/// Build (or reuse) a module, then load it and list its published names
pub(crate) fn run(flags: &BuildFlags, config_path: Option<&Path>, norc: bool) -> Result<()> {
    let config = Config::load_with_options(config_path, norc)?;
    let options = options_from(flags, &config);
    let toolchain = CcToolchain::new(CompileEnv::detect(config::compiler(&config)));

    let artifact = build_artifact(&options, &toolchain)?;

    for (path, diagnostic) in &artifact.diagnostics {
        eprintln!("{}: {diagnostic}", path.display());
    }

    if artifact.status.is_hit() {
        println!("{} is up to date", artifact.path.display());
    } else {
        println!(
            "Built {} ({}, {} unit(s) compiled)",
            artifact.path.display(),
            artifact.status,
            artifact.compiled
        );
    }

    if flags.no_load {
        return Ok(());
    }

    let module = load_artifact(&artifact, &DylibLoader::detect())?;
    weld::debug!(
        "{}: init at {:#x}, host runtime {}",
        module.name(),
        module.init_address(),
        if module.has_runtime() { "mapped" } else { "not mapped" }
    );
    println!("Loaded {} from {}", module.name(), module.path().display());
    for published in module.names() {
        let kind = match published.kind {
            PublishedKind::Type => "type",
            PublishedKind::Function => "function",
        };
        println!("  {kind} {}", published.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> BuildFlags {
        BuildFlags {
            name: "core".to_string(),
            source_files: Vec::new(),
            preprocess: vec![PathBuf::from("core.cpp")],
            inline: None,
            output: None,
            build_dir: Some(PathBuf::from("out")),
            include_dirs: vec![PathBuf::from("include")],
            library_dirs: Vec::new(),
            libraries: Vec::new(),
            defines: vec!["NDEBUG".to_string(), "LEVEL=2".to_string()],
            no_cache: false,
            no_load: true,
        }
    }

    #[test]
    fn flags_come_before_config() {
        let config = Config {
            build_dir: Some("configured".to_string()),
            include_dirs: vec!["include".to_string(), "/opt/include".to_string()],
            libraries: vec!["m".to_string()],
            ..Config::default()
        };

        let options = options_from(&flags(), &config);

        assert_eq!(options.build_dir, PathBuf::from("out"));
        assert_eq!(
            options.include_dirs,
            [PathBuf::from("include"), PathBuf::from("/opt/include")]
        );
        assert_eq!(options.libraries, ["m"]);
        assert_eq!(
            options.macros,
            [Macro::new("NDEBUG", None), Macro::new("LEVEL", Some("2".to_string()))]
        );
    }

    #[test]
    fn no_cache_flag_disables_cache() {
        let mut flags = flags();
        flags.no_cache = true;
        let options = options_from(&flags, &Config::default());
        assert!(!options.cache);
    }
}
