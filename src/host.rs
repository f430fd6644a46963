//! Host runtime discovery
//!
//! Asks the Python interpreter where its headers and libraries live. The
//! answer is computed once per process; if the interpreter cannot be run
//! the build proceeds with no extra directories and the compiler reports
//! the missing header.

use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

/// Prints include dir, library dir, `major.minor` and the shared runtime
/// library name, one per line
const SYSCONFIG_QUERY: &str = "import sysconfig\n\
print(sysconfig.get_paths()['include'])\n\
print(sysconfig.get_config_var('LIBDIR') or '')\n\
print(sysconfig.get_python_version())\n\
print(sysconfig.get_config_var('INSTSONAME') or sysconfig.get_config_var('LDLIBRARY') or '')";

static HOST: LazyLock<HostPaths> = LazyLock::new(|| {
    let python = python_executable();
    discover(&python).unwrap_or_else(|| {
        crate::debug!("Could not query {python}; building without host include paths");
        HostPaths::default()
    })
});

/// Where the host runtime's build inputs live
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPaths {
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    /// Libraries an extension must link against (only on Windows)
    pub libraries: Vec<String>,
    /// `major.minor`, when known
    pub version: Option<String>,
    /// File name of the shared runtime library, e.g. `libpython3.12.so.1.0`.
    /// `None` for interpreters that only ship a static one.
    pub runtime_library: Option<String>,
}

/// Interpreter to query: `PYTHON`, else the platform's usual name
#[must_use]
pub fn python_executable() -> String {
    crate::env_vars::python().unwrap_or_else(|| {
        if cfg!(windows) {
            "python".to_string()
        } else {
            "python3".to_string()
        }
    })
}

/// Host paths for the configured interpreter, discovered once
#[must_use]
pub fn host_paths() -> &'static HostPaths {
    &HOST
}

/// Run `python` and parse its sysconfig answer
#[must_use]
pub fn discover(python: &str) -> Option<HostPaths> {
    let output = Command::new(python)
        .args(["-c", SYSCONFIG_QUERY])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_sysconfig(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the sysconfig answer; the runtime library line is optional
#[must_use]
pub fn parse_sysconfig(stdout: &str) -> Option<HostPaths> {
    let mut lines = stdout.lines().map(str::trim);
    let include = lines.next().filter(|line| !line.is_empty())?;
    let libdir = lines.next().unwrap_or_default();
    let version = lines.next().filter(|line| !line.is_empty());
    let runtime_library = lines
        .next()
        .filter(|line| !line.is_empty() && !line.ends_with(".a"));

    let libraries = match version {
        Some(version) if cfg!(windows) => vec![format!("python{}", version.replace('.', ""))],
        _ => Vec::new(),
    };

    Some(HostPaths {
        include_dirs: vec![PathBuf::from(include)],
        library_dirs: if libdir.is_empty() {
            Vec::new()
        } else {
            vec![PathBuf::from(libdir)]
        },
        libraries,
        version: version.map(str::to_string),
        runtime_library: runtime_library.map(str::to_string),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;

    #[test]
    fn parses_full_answer() {
        let paths =
            parse_sysconfig("/usr/include/python3.12\n/usr/lib/x86_64-linux-gnu\n3.12\n").unwrap();
        assert_eq!(paths.include_dirs, [PathBuf::from("/usr/include/python3.12")]);
        assert_eq!(paths.library_dirs, [PathBuf::from("/usr/lib/x86_64-linux-gnu")]);
        assert_eq!(paths.version.as_deref(), Some("3.12"));
        assert_eq!(paths.runtime_library, None);
    }

    #[test]
    fn parses_shared_runtime_library() {
        let paths = parse_sysconfig(
            "/usr/include/python3.12\n/usr/lib/x86_64-linux-gnu\n3.12\nlibpython3.12.so.1.0\n",
        )
        .unwrap();
        assert_eq!(paths.runtime_library.as_deref(), Some("libpython3.12.so.1.0"));
    }

    #[test]
    fn static_runtime_library_is_skipped() {
        let paths =
            parse_sysconfig("/opt/py/include/python3.12\n/opt/py/lib\n3.12\nlibpython3.12.a\n")
                .unwrap();
        assert_eq!(paths.runtime_library, None);
    }

    #[test]
    fn empty_libdir_is_skipped() {
        let paths = parse_sysconfig("C:\\Python312\\Include\n\n3.12\n").unwrap();
        assert!(paths.library_dirs.is_empty());
    }

    #[test]
    fn empty_answer_is_none() {
        assert!(parse_sysconfig("").is_none());
        assert!(parse_sysconfig("\n").is_none());
    }

    #[test]
    fn missing_interpreter_is_none() {
        assert!(discover("/nonexistent/python-for-weld-tests").is_none());
    }
}
