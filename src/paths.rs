//! Path arithmetic against an explicit project root.
//!
//! Nothing in here reads the process working directory; callers pass the root.
use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;

const SOURCE_EXTENSIONS: &[&str] = &[".d.ts", ".tsx", ".ts", ".mts", ".cts"];

/// Resolve `.` and `..` without touching the file system.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` joined onto `root` unless it is already absolute.
pub fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&root.join(path))
    }
}

/// Relative path from directory `from` to `to`. Both must be absolute (or
/// both relative to the same root).
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = normalize_lexically(from);
    let to = normalize_lexically(to);
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    out
}

/// Strip the TypeScript source extension, if any.
pub fn strip_source_extension(path: &str) -> &str {
    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

/// Module specifier importing `source` from the generated file at `output`.
///
/// `./`-prefixed, `/`-separated and extension-less, e.g. `../src/Example`.
pub fn import_specifier(root: &Path, output: &Path, source: &str) -> String {
    let output = absolutize(root, output);
    let source = absolutize(root, Path::new(strip_source_extension(source)));
    let dir = output.parent().unwrap_or(root);
    let relative = relative_path(dir, &source);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if joined.starts_with("../") || joined == ".." {
        joined
    } else {
        format!("./{joined}")
    }
}

/// `src/Example.ts` → `src/Example.validator.ts`
pub fn default_output(source: &str) -> PathBuf {
    PathBuf::from(format!("{}.validator.ts", strip_source_extension(source)))
}

/// Sibling JSON file holding the schema of the module at `output`.
pub fn schema_file_for(output: &Path) -> PathBuf {
    let stem = output.to_string_lossy();
    PathBuf::from(format!("{}.json", strip_source_extension(&stem)))
}

/// Refuse writes that would land outside `root`.
pub fn ensure_within(root: &Path, path: &Path) -> Result<PathBuf, ConfigError> {
    let root = normalize_lexically(root);
    let target = absolutize(&root, path);
    if target.starts_with(&root) {
        Ok(target)
    } else {
        Err(ConfigError::OutsideProjectRoot { path: target, root })
    }
}
