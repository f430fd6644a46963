//! Build pipeline
//!
//! scan -> assemble -> cache gate -> render -> compile -> install -> load.
//!
//! Everything up to the cache gate is pure apart from reading the input
//! files, so a cache hit never touches the workspace. A miss wipes the
//! workspace and regenerates every file; objects survive the wipe only when
//! the build arguments are unchanged, and then each is reused only if it is
//! newer than its own source. The cache entry is written last, after the
//! artifact is in place.

use crate::build_log::BuildLog;
use crate::cache::{self, CacheEntry, CacheStatus, Fingerprint};
use crate::descriptor::{Assembly, ModuleDescriptor, assemble_source};
use crate::diagnostic::Diagnostic;
use crate::error::{BuildError, IoContext};
use crate::loader::{ArtifactLoader, published_names};
use crate::paths::{self, BuildLayout};
use crate::render::{init_symbol, numbered, render_fragment, render_module};
use crate::toolchain::{CompileRequest, CompileUnit, Macro, Toolchain};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Arguments of one build call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOptions {
    /// Module identifier; must be a bare identifier
    pub name: String,
    /// Inline source text, preprocessed
    pub source: Option<String>,
    /// Files compiled as they are
    pub sources: Vec<PathBuf>,
    /// Files scanned and extended with generated tables
    pub preprocess: Vec<PathBuf>,
    /// Artifact path; defaults to `<name>` plus the platform suffix
    pub output: Option<PathBuf>,
    pub build_dir: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub macros: Vec<Macro>,
    /// Reuse an up-to-date artifact; not part of the fingerprint
    #[serde(skip)]
    pub cache: bool,
}

impl BuildOptions {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            sources: Vec::new(),
            preprocess: Vec::new(),
            output: None,
            build_dir: PathBuf::from(crate::config::DEFAULT_BUILD_DIR),
            include_dirs: Vec::new(),
            library_dirs: Vec::new(),
            libraries: Vec::new(),
            macros: Vec::new(),
            cache: true,
        }
    }

    #[must_use]
    pub fn source(mut self, text: impl Into<String>) -> Self {
        self.source = Some(text.into());
        self
    }

    #[must_use]
    pub fn source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    #[must_use]
    pub fn preprocess(mut self, path: impl Into<PathBuf>) -> Self {
        self.preprocess.push(path.into());
        self
    }

    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    #[must_use]
    pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    #[must_use]
    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn library(mut self, name: impl Into<String>) -> Self {
        self.libraries.push(name.into());
        self
    }

    #[must_use]
    pub fn define(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.macros.push(Macro::new(name, value));
        self
    }

    #[must_use]
    pub const fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Artifact path after applying the default
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| paths::default_output(&self.name))
    }

    /// User files whose modification times gate the cache
    #[must_use]
    pub fn dependencies(&self) -> Vec<PathBuf> {
        self.sources.iter().chain(&self.preprocess).cloned().collect()
    }

    /// Check the arguments and put the file lists in canonical form.
    ///
    /// A file listed both as a source and for preprocessing is only
    /// preprocessed. After that, exactly one of inline source, source files
    /// and preprocess files must be present.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Usage`] without touching the filesystem.
    pub fn validate(&self) -> Result<Self, BuildError> {
        if !is_identifier(&self.name) {
            return Err(BuildError::usage(format!(
                "invalid module name {:?}: expected a bare identifier",
                self.name
            )));
        }

        let mut normalized = self.clone();
        normalized.preprocess = dedup(&self.preprocess);
        normalized.sources = dedup(&self.sources);
        normalized
            .sources
            .retain(|source| !normalized.preprocess.contains(source));

        let given = [
            normalized.source.is_some(),
            !normalized.sources.is_empty(),
            !normalized.preprocess.is_empty(),
        ]
        .into_iter()
        .filter(|given| *given)
        .count();

        match given {
            0 => Err(BuildError::usage(
                "nothing to build: give inline source, source files or preprocess files",
            )),
            1 => Ok(normalized),
            _ => Err(BuildError::usage(
                "inline source, source files and preprocess files are mutually exclusive",
            )),
        }
    }
}

/// Whether `name` is a bare identifier (`[A-Za-z_][A-Za-z0-9_]*`)
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn dedup(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut unique: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for path in paths {
        if !unique.contains(path) {
            unique.push(path.clone());
        }
    }
    unique
}

/// Canonical form of everything that decides what gets built
#[derive(Serialize)]
struct FingerprintInput<'a> {
    options: &'a BuildOptions,
    output: &'a Path,
    toolchain: String,
}

/// A preprocessed input and its descriptors
#[derive(Debug)]
struct Fragment {
    /// File the text came from (the workspace copy for inline source)
    origin: PathBuf,
    text: String,
    assembly: Assembly,
}

/// A built (or reused) artifact and what it publishes
#[derive(Debug)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    /// Descriptors merged across every fragment
    pub module: ModuleDescriptor,
    /// Diagnostics with the file they were found in
    pub diagnostics: Vec<(PathBuf, Diagnostic)>,
    pub status: CacheStatus,
    /// Units compiled by this call; zero on a cache hit
    pub compiled: usize,
    pub log: PathBuf,
}

/// Run the pipeline up to an installed artifact.
///
/// # Errors
///
/// See [`BuildError`]. Diagnostics and cache corruption are not errors.
pub fn build_artifact<T: Toolchain + ?Sized>(
    options: &BuildOptions,
    toolchain: &T,
) -> Result<Artifact, BuildError> {
    let options = options.validate()?;
    let layout = BuildLayout::new(&options.build_dir, &options.name);
    let output = options.output_path();

    let fingerprint = Fingerprint::of(&FingerprintInput {
        options: &options,
        output: &output,
        toolchain: toolchain.identity(),
    })
    .map_err(|e| BuildError::usage(format!("build arguments cannot be fingerprinted: {e}")))?;

    let mut log = BuildLog::open(layout.log_file())
        .io_context(|| format!("Failed to open build log {}", layout.log_file().display()))?;
    let log_path = log.path().to_path_buf();
    let log_err = |source: std::io::Error| {
        BuildError::io(format!("Failed to write {}", log_path.display()), source)
    };
    log.begin(&options.name).map_err(log_err)?;

    let fragments = read_fragments(&options, &layout)?;
    let mut module = ModuleDescriptor::new(&options.name);
    let mut diagnostics = Vec::new();
    for fragment in &fragments {
        log.diagnostics(&fragment.origin, &fragment.assembly.diagnostics)
            .map_err(log_err)?;
        for diagnostic in &fragment.assembly.diagnostics {
            crate::debug!("{}: {diagnostic}", fragment.origin.display());
            diagnostics.push((fragment.origin.clone(), diagnostic.clone()));
        }
        module.merge(fragment.assembly.module.clone());
    }

    let dependencies = options.dependencies();
    let status = cache::check(
        options.cache,
        &layout.cache_entry(),
        &fingerprint,
        &output,
        &dependencies,
    );
    crate::debug!("{}: {status}", options.name);
    log.note(&format!("cache: {status}")).map_err(log_err)?;

    let mut artifact = Artifact {
        name: options.name.clone(),
        path: output.clone(),
        module,
        diagnostics,
        status,
        compiled: 0,
        log: log.path().to_path_buf(),
    };
    if status.is_hit() {
        return Ok(artifact);
    }

    prepare_workspace(&layout, status)?;
    let generated = write_generated(&options, &layout, &fragments, &artifact.module)?;
    let request = compile_request(&options, &layout, &fragments, status);

    let report = toolchain.build(&request).map_err(BuildError::Toolchain)?;
    log.output(&report.output).map_err(log_err)?;

    if !report.success {
        let error = report.error.unwrap_or_default();
        log.note(&format!("failed: {error}")).map_err(log_err)?;
        return Err(BuildError::Compile {
            module: options.name,
            log: format!("{error}\n{}", report.output),
            listing: listing(&generated),
        });
    }

    install(&layout.link_output(), &output, layout.build_dir())?;
    CacheEntry::capture(&fingerprint, &dependencies)
        .and_then(|entry| entry.save(&layout.cache_entry()))
        .io_context(|| format!("Failed to write {}", layout.cache_entry().display()))?;

    log.note(&format!(
        "built {} ({} compiled in {:.2?})",
        output.display(),
        report.compiled,
        report.duration
    ))
    .map_err(log_err)?;

    artifact.compiled = report.compiled;
    Ok(artifact)
}

/// Build an artifact and hand it to `loader`.
///
/// # Errors
///
/// Everything [`build_artifact`] and [`load_artifact`] return.
pub fn build_module<T, L>(
    options: &BuildOptions,
    toolchain: &T,
    loader: &L,
) -> Result<L::Module, BuildError>
where
    T: Toolchain + ?Sized,
    L: ArtifactLoader + ?Sized,
{
    let artifact = build_artifact(options, toolchain)?;
    load_artifact(&artifact, loader)
}

/// Load a built artifact with every name its descriptors publish.
///
/// # Errors
///
/// Returns [`BuildError::Load`] carrying the loader's message verbatim.
pub fn load_artifact<L: ArtifactLoader + ?Sized>(
    artifact: &Artifact,
    loader: &L,
) -> Result<L::Module, BuildError> {
    let published = published_names(&artifact.module);

    loader
        .load(&artifact.path, &artifact.name, &published)
        .map_err(|e| BuildError::Load {
            path: artifact.path.clone(),
            message: format!("{e:#}"),
        })
}

/// Read and assemble every preprocessed input
fn read_fragments(
    options: &BuildOptions,
    layout: &BuildLayout,
) -> Result<Vec<Fragment>, BuildError> {
    let mut fragments = Vec::new();

    if let Some(text) = &options.source {
        fragments.push(Fragment {
            origin: layout.inline_source(),
            assembly: assemble_source(&options.name, text),
            text: text.clone(),
        });
    }

    for path in &options.preprocess {
        let text = fs::read_to_string(path)
            .io_context(|| format!("Failed to read {}", path.display()))?;
        fragments.push(Fragment {
            origin: path.clone(),
            assembly: assemble_source(&options.name, &text),
            text,
        });
    }

    Ok(fragments)
}

/// Wipe the workspace, and the objects too unless they may be reused
fn prepare_workspace(layout: &BuildLayout, status: CacheStatus) -> Result<(), BuildError> {
    let mut wipe = vec![layout.workspace()];
    if !status.allows_object_reuse() {
        wipe.push(layout.objects_dir());
    }

    for dir in wipe {
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .io_context(|| format!("Failed to remove {}", dir.display()))?;
        }
    }

    let generated = layout.workspace().join("gen");
    fs::create_dir_all(&generated)
        .io_context(|| format!("Failed to create {}", generated.display()))
}

/// Write the inline source, every rendered fragment and the module unit
fn write_generated(
    options: &BuildOptions,
    layout: &BuildLayout,
    fragments: &[Fragment],
    module: &ModuleDescriptor,
) -> Result<Vec<(PathBuf, String)>, BuildError> {
    if let Some(text) = &options.source {
        write_file(&layout.inline_source(), text)?;
    }

    let mut generated = Vec::with_capacity(fragments.len() + 1);
    for fragment in fragments {
        let written = layout.generated(&fragment.origin);
        let text = render_fragment(
            &fragment.text,
            &fragment.origin,
            &written,
            &fragment.assembly.module,
        );
        write_file(&written, &text)?;
        generated.push((written, text));
    }

    let unit = layout.module_unit();
    let text = render_module(module);
    write_file(&unit, &text)?;
    generated.push((unit, text));

    Ok(generated)
}

fn write_file(path: &Path, text: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .io_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, text).io_context(|| format!("Failed to write {}", path.display()))
}

/// Units to compile and objects to link.
///
/// A unit is skipped only when the module-level gate allowed object reuse
/// and its object is newer than the file it came from.
fn compile_request(
    options: &BuildOptions,
    layout: &BuildLayout,
    fragments: &[Fragment],
    status: CacheStatus,
) -> CompileRequest {
    let reuse = status.allows_object_reuse();
    let mut units = Vec::new();
    let mut objects = Vec::new();

    let mut add = |source: PathBuf, origin: &Path, include_dirs: Vec<PathBuf>, fresh: bool| {
        let object = layout.object(origin);
        if fresh || !reuse || !cache::is_up_to_date(&object, origin) {
            units.push(CompileUnit {
                source,
                object: object.clone(),
                include_dirs,
            });
        } else {
            crate::debug!("{} is up to date", object.display());
        }
        objects.push(object);
    };

    for source in &options.sources {
        add(source.clone(), source, Vec::new(), false);
    }

    for fragment in fragments {
        let include_dirs = fragment
            .origin
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .into_iter()
            .collect();
        add(
            layout.generated(&fragment.origin),
            &fragment.origin,
            include_dirs,
            false,
        );
    }

    let unit = layout.module_unit();
    add(unit.clone(), &unit, Vec::new(), true);

    CompileRequest {
        module: options.name.clone(),
        units,
        objects,
        include_dirs: options.include_dirs.clone(),
        library_dirs: options.library_dirs.clone(),
        libraries: options.libraries.clone(),
        macros: options.macros.clone(),
        output: layout.link_output(),
        exports: vec![init_symbol(&options.name)],
    }
}

/// Line-numbered listing of every generated file
fn listing(generated: &[(PathBuf, String)]) -> String {
    generated
        .iter()
        .map(|(path, text)| format!("==> {} <==\n{}", path.display(), numbered(text)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Move the linked artifact to `output`.
///
/// An existing artifact that cannot be deleted (still mapped by some
/// process) is moved aside into the build directory first.
fn install(staged: &Path, output: &Path, build_dir: &Path) -> Result<(), BuildError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .io_context(|| format!("Failed to create {}", parent.display()))?;
    }

    if output.exists()
        && let Err(e) = fs::remove_file(output)
    {
        let aside = build_dir.join(aside_name(output));
        crate::debug!(
            "Cannot remove {} ({e}); moving it to {}",
            output.display(),
            aside.display()
        );
        fs::rename(output, &aside)
            .io_context(|| format!("Failed to move {} aside", output.display()))?;
    }

    fs::rename(staged, output)
        .or_else(|_| fs::copy(staged, output).and_then(|_| fs::remove_file(staged)))
        .io_context(|| format!("Failed to install {}", output.display()))
}

/// `_` followed by 16 hex characters, unique per process, time and path
fn aside_name(output: &Path) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let seed = format!("{}:{nanos}:{}", process::id(), output.display());
    let digest = Fingerprint::of(&seed).map_or_else(|_| seed.clone(), |f| f.as_str().to_string());
    format!("_{}", digest.get(..16).unwrap_or(&digest))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{COUNTER_SOURCE, temp_sources, touch};

    #[test]
    fn identifiers() {
        assert!(is_identifier("core"));
        assert!(is_identifier("_private2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("my-module"));
        assert!(!is_identifier("a.b"));
    }

    #[test]
    fn invalid_name_is_a_usage_error() {
        let err = BuildOptions::new("not valid").source("").validate().unwrap_err();
        assert!(matches!(err, BuildError::Usage(_)));
    }

    #[test]
    fn no_inputs_is_a_usage_error() {
        let err = BuildOptions::new("core").validate().unwrap_err();
        assert!(err.to_string().contains("nothing to build"));
    }

    #[test]
    fn inline_source_conflicts_with_files() {
        let err = BuildOptions::new("core")
            .source("int x;")
            .preprocess("a.cpp")
            .validate()
            .unwrap_err();
        assert!(matches!(err, BuildError::Usage(_)));

        let err = BuildOptions::new("core")
            .source("int x;")
            .source_file("b.cpp")
            .validate()
            .unwrap_err();
        assert!(matches!(err, BuildError::Usage(_)));
    }

    #[test]
    fn files_in_both_lists_are_only_preprocessed() {
        let options = BuildOptions::new("core")
            .source_file("a.cpp")
            .preprocess("a.cpp")
            .preprocess("a.cpp")
            .validate()
            .unwrap();
        assert!(options.sources.is_empty());
        assert_eq!(options.preprocess, [PathBuf::from("a.cpp")]);
    }

    #[test]
    fn sources_and_preprocess_conflict() {
        let err = BuildOptions::new("core")
            .source_file("a.cpp")
            .preprocess("b.cpp")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn default_output_follows_name() {
        let options = BuildOptions::new("core");
        assert_eq!(options.output_path(), paths::default_output("core"));
        let options = options.output("lib/core.so");
        assert_eq!(options.output_path(), PathBuf::from("lib/core.so"));
    }

    #[test]
    fn aside_names_are_sixteen_hex_chars() {
        let name = aside_name(Path::new("core.so"));
        let hex = name.strip_prefix('_').unwrap();
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn install_replaces_existing_output() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let staged = tmp_dir.path().join("core.link");
        let output = tmp_dir.path().join("lib/core.so");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&output, b"old").unwrap();
        fs::write(&staged, b"new").unwrap();

        install(&staged, &output, tmp_dir.path()).unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"new");
        assert!(!staged.exists());
    }

    #[test]
    fn listing_numbers_each_file() {
        let text = listing(&[
            (PathBuf::from("gen/a.cpp"), "int a;\n".to_string()),
            (PathBuf::from("gen/__module__.cpp"), "int b;\n".to_string()),
        ]);
        assert!(text.contains("==> gen/a.cpp <=="));
        assert!(text.contains("==> gen/__module__.cpp <=="));
        assert!(text.contains("1 | int a;"));
    }

    #[test]
    fn object_reuse_needs_both_gates() {
        let (dir, paths) = temp_sources(&[("a.cpp", "int a;\n"), ("b.cpp", "int b;\n")]);
        let a = paths.first().unwrap();
        let b = paths.get(1).unwrap();
        let options = BuildOptions::new("core")
            .build_dir(dir.path().join("build"))
            .source_file(a)
            .source_file(b);
        let layout = BuildLayout::new(&options.build_dir, "core");

        touch(a, 1_000);
        touch(b, 1_000);
        touch(&layout.object(a), 2_000);
        touch(&layout.object(b), 500);

        let request = compile_request(&options, &layout, &[], CacheStatus::Stale);
        let compiled: Vec<_> = request.units.iter().map(|unit| unit.source.clone()).collect();
        assert_eq!(compiled, [b.clone(), layout.module_unit()]);
        assert_eq!(request.objects.len(), 3);

        let request = compile_request(&options, &layout, &[], CacheStatus::FingerprintChanged);
        assert_eq!(request.units.len(), 3);
    }

    #[test]
    fn preprocessed_units_search_their_origin_directory() {
        let (dir, paths) = temp_sources(&[("src/counter.cpp", COUNTER_SOURCE)]);
        let origin = paths.first().unwrap();
        let options = BuildOptions::new("core")
            .build_dir(dir.path().join("build"))
            .preprocess(origin);
        let layout = BuildLayout::new(&options.build_dir, "core");

        let fragments = read_fragments(&options, &layout).unwrap();
        let request = compile_request(&options, &layout, &fragments, CacheStatus::Missing);

        let unit = request.units.first().unwrap();
        assert_eq!(unit.source, layout.generated(origin));
        assert_eq!(unit.include_dirs, [dir.path().join("src")]);
        assert_eq!(request.exports, ["PyInit_core"]);
        assert_eq!(request.output, layout.link_output());
    }

    #[test]
    fn generated_files_are_written_into_the_workspace() {
        let (dir, _paths) = temp_sources(&[]);
        let options = BuildOptions::new("core")
            .build_dir(dir.path().join("build"))
            .source(COUNTER_SOURCE);
        let layout = BuildLayout::new(&options.build_dir, "core");

        let fragments = read_fragments(&options, &layout).unwrap();
        prepare_workspace(&layout, CacheStatus::Missing).unwrap();
        let generated = write_generated(
            &options,
            &layout,
            &fragments,
            &fragments.first().unwrap().assembly.module,
        )
        .unwrap();

        assert_eq!(fs::read_to_string(layout.inline_source()).unwrap(), COUNTER_SOURCE);
        let (path, text) = generated.first().unwrap();
        assert_eq!(path, &layout.generated(&layout.inline_source()));
        assert!(text.starts_with("#line 1 "));
        assert!(text.contains("PyTypeObject Counter_Type = {"));
        assert!(layout.module_unit().is_file());
    }

    #[test]
    fn fixture_declares_records_before_use() {
        let declared = COUNTER_SOURCE.find("extern PyTypeObject Counter_Type;").unwrap();
        let used = COUNTER_SOURCE.find("&Counter_Type").unwrap();
        let included = COUNTER_SOURCE.find("#include <Python.h>").unwrap();
        assert!(included < declared && declared < used);
    }
}
