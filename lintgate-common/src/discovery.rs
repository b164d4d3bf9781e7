//! Project and command discovery.
//!
//! Starting from the directory of the edited file, walk upwards until a
//! directory declares a command for the requested check. Within one
//! directory a `.lintgate.toml` wins over a Makefile target:
//!
//! ```toml
//! lint = ["cargo", "clippy", "--", "-D", "warnings"]
//! test = ["cargo", "test"]
//! ```
//!
//! A Makefile (`GNUmakefile`, `makefile` or `Makefile`, in the order make
//! itself searches) with a `lint:` or `test:` target yields `make lint` /
//! `make test`.

use crate::types::{CheckType, CommandSpec};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PROJECT_FILE: &str = ".lintgate.toml";
const MAKEFILES: [&str; 3] = ["GNUmakefile", "makefile", "Makefile"];

/// Maps a start directory to the command validating its project.
pub trait Discoverer: Send + Sync {
    fn discover(&self, check: CheckType, start_dir: &Path) -> Option<CommandSpec>;
}

/// Commands declared in `.lintgate.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectFile {
    lint: Option<Vec<String>>,
    test: Option<Vec<String>>,
}

impl ProjectFile {
    fn command(self, check: CheckType) -> Option<Vec<String>> {
        let args = match check {
            CheckType::Lint => self.lint,
            CheckType::Test => self.test,
        }?;
        (!args.is_empty()).then_some(args)
    }
}

/// Filesystem-walking discoverer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectDiscoverer;

impl Discoverer for ProjectDiscoverer {
    fn discover(&self, check: CheckType, start_dir: &Path) -> Option<CommandSpec> {
        let start = start_dir
            .canonicalize()
            .unwrap_or_else(|_| start_dir.to_path_buf());

        for dir in start.ancestors() {
            if let Some(args) = project_file_command(dir, check) {
                debug!(%check, root = %dir.display(), "Found command in {}", PROJECT_FILE);
                return Some(CommandSpec::new(check, args, dir));
            }
            if let Some(makefile) = makefile_with_target(dir, check.as_str()) {
                debug!(%check, makefile = %makefile.display(), "Found make target");
                return Some(CommandSpec::new(
                    check,
                    vec!["make".to_string(), check.as_str().to_string()],
                    dir,
                ));
            }
        }

        debug!(%check, start = %start.display(), "No command found");
        None
    }
}

fn project_file_command(dir: &Path, check: CheckType) -> Option<Vec<String>> {
    let path = dir.join(PROJECT_FILE);
    let content = fs::read_to_string(&path).ok()?;
    match parse_project_file(&content) {
        Ok(file) => file.command(check),
        Err(e) => {
            warn!(path = %path.display(), "Ignoring invalid project file: {}", e);
            None
        }
    }
}

fn parse_project_file(content: &str) -> Result<ProjectFile, toml::de::Error> {
    toml::from_str(content)
}

fn makefile_with_target(dir: &Path, target: &str) -> Option<PathBuf> {
    let path = MAKEFILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())?;
    let content = fs::read_to_string(&path).ok()?;
    has_make_target(&content, target).then_some(path)
}

/// Whether `content` defines a rule for `target`.
///
/// Recognizes `target:` and `a target b:` rule lines; ignores recipe lines,
/// comments and variable assignments such as `lint := ...`.
pub fn has_make_target(content: &str, target: &str) -> bool {
    content.lines().any(|line| {
        if line.starts_with('\t') || line.trim_start().starts_with('#') {
            return false;
        }
        let Some((names, rest)) = line.split_once(':') else {
            return false;
        };
        if rest.starts_with('=') || names.contains('=') {
            return false;
        }
        names.split_whitespace().any(|name| name == target)
    })
}
