//! Fixture loader.
//!
//! Reads fixture directories from disk: file trees, per-fixture options and
//! the suite configuration.

use crate::error::ConfigError;
use crate::schema::{FileTree, OsFilter, SuiteConfig, TestOptions};
use serde_json::Value;
use std::path::Path;
use walkdir::WalkDir;

/// Base names of the suite configuration file, tried in order.
pub const SUITE_CONFIG_FILENAMES: [&str; 3] =
    ["binfixture.yaml", "binfixture.yml", "binfixture.toml"];

/// Name of the structured options file inside a fixture directory.
pub const OPTIONS_FILENAME: &str = "options.json";

/// Subdirectory seeded into the sandbox.
pub const IN_FILES_DIR: &str = "in-files";

/// Subdirectory holding the files expected after the run.
pub const OUT_FILES_DIR: &str = "out-files";

/// Options resolved for one fixture, with its platform filter set aside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub options: TestOptions,
    pub os: Option<OsFilter>,
}

/// Read a fixture text file.
///
/// Line endings are normalized to `\n` and trailing whitespace is dropped so
/// fixtures compare the same regardless of how they were checked out.
pub fn read_fixture_text(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).replace("\r\n", "\n");
    Ok(text.trim_end().to_string())
}

/// Read every regular file under `root` into a [`FileTree`].
///
/// Keys are relative paths joined with `/`. Entries whose name matches
/// `ignored` are skipped, along with everything beneath them. A missing root
/// yields an empty tree.
pub fn read_tree(root: &Path, ignored: &dyn Fn(&str) -> bool) -> std::io::Result<FileTree> {
    let mut files = FileTree::new();
    if !root.is_dir() {
        return Ok(files);
    }

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !ignored(&entry.file_name().to_string_lossy())
        });
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        // Symlinks are not followed
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(key, read_fixture_text(entry.path())?);
    }
    Ok(files)
}

/// Resolve the options of the fixture in `dir`.
///
/// Defaults are overlaid with `options.json`, then with the companion
/// `stdin.txt` / `stdout.txt` / `stderr.txt` files, and finally the file
/// trees are read from `in-files/` and `out-files/`.
pub fn resolve_options(dir: &Path, config: &SuiteConfig) -> Result<ResolvedOptions, ConfigError> {
    let options_path = dir.join(OPTIONS_FILENAME);
    let mut os = None;

    let mut options = if options_path.is_file() {
        let contents = std::fs::read_to_string(&options_path).map_err(|source| ConfigError::Io {
            path: options_path.clone(),
            source,
        })?;
        let mut task: Value =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                path: options_path.clone(),
                source,
            })?;
        let Some(fields) = task.as_object_mut() else {
            return Err(ConfigError::NotAnObject { path: options_path });
        };

        // `os` is consumed here and never reaches the options themselves
        if let Some(raw) = fields.remove("os")
            && !raw.is_null()
        {
            os = Some(OsFilter::from_value(&raw)?);
        }

        let mut merged = serde_json::to_value(TestOptions::default()).map_err(|source| {
            ConfigError::Options {
                path: options_path.clone(),
                source,
            }
        })?;
        merge_json(&mut merged, task);
        serde_json::from_value(merged).map_err(|source| ConfigError::Options {
            path: options_path.clone(),
            source,
        })?
    } else {
        TestOptions::default()
    };

    for (role, field) in [
        ("stdin", &mut options.stdin),
        ("stdout", &mut options.stdout),
        ("stderr", &mut options.stderr),
    ] {
        let path = dir.join(format!("{role}.txt"));
        if path.is_file() {
            *field = read_fixture_text(&path).map_err(|source| ConfigError::Io { path, source })?;
        }
    }

    let ignored = |name: &str| config.is_ignored(name);
    for (subdir, tree) in [
        (OUT_FILES_DIR, &mut options.out_files),
        (IN_FILES_DIR, &mut options.in_files),
    ] {
        let path = dir.join(subdir);
        *tree = read_tree(&path, &ignored).map_err(|source| ConfigError::Io { path, source })?;
    }

    let tool_config = dir.join(&config.tool_config.name);
    if tool_config.is_file() {
        let contents = read_fixture_text(&tool_config).map_err(|source| ConfigError::Io {
            path: tool_config.clone(),
            source,
        })?;
        options
            .in_files
            .insert(config.tool_config.name.clone(), contents);
    }

    Ok(ResolvedOptions { options, os })
}

/// Recursively merge `source` into `target`.
///
/// Objects merge key by key; every other value in `source` replaces the one
/// in `target`.
pub fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Load suite configuration from the fixtures root.
///
/// Looks for `binfixture.yaml` (or `.yml` / `.toml`) in the given directory.
/// Returns `None` if no file exists, `Err` if one exists but is invalid.
pub fn load_suite_config(dir: &Path) -> Result<Option<SuiteConfig>, ConfigError> {
    let Some(path) = SUITE_CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
    else {
        return Ok(None);
    };

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let config = match ext {
        "yaml" | "yml" => serde_yaml::from_str(&contents)?,
        "toml" => toml::from_str(&contents)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    Ok(Some(config))
}
