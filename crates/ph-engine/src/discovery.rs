use ph_core::engine::{DEFAULT_METADATA_FILE, Discovery, DiscoveryFailure};
use ph_core::error::EngineError;
use ph_core::types::{Dependency, Labels, SkilletMetadata, SkilletType, Snippet, Variable};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata file names, in the order they are looked for. Only the first
/// one present in a directory is read.
pub const METADATA_FILE_NAMES: [&str; 6] = [
    DEFAULT_METADATA_FILE,
    ".meta-cnc.yml",
    "meta-cnc.yaml",
    "meta-cnc.yml",
    ".skillet.yaml",
    ".skillet.yml",
];

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    variables: Option<Vec<Variable>>,
    #[serde(default)]
    snippets: Option<Vec<Snippet>>,
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    depends: Option<Vec<Dependency>>,
}

/// Walks `root` in entry-name order. A directory holding a metadata file is
/// a skillet root and nothing below it is visited. Hidden directories are
/// skipped.
pub fn discover(root: &Path) -> Result<Discovery, EngineError> {
    if !root.is_dir() {
        return Err(EngineError::Unreadable {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }
    let mut discovery = Discovery::default();
    if metadata_file_in(root).is_some() {
        visit(root, &mut discovery);
        return Ok(discovery);
    }
    let children = sorted_subdirectories(root).map_err(|err| EngineError::Unreadable {
        path: root.to_path_buf(),
        message: err.to_string(),
    })?;
    for path in children {
        visit(&path, &mut discovery);
    }
    Ok(discovery)
}

// Below the root an unreadable directory only makes its own skillets
// indeterminate.
fn visit(dir: &Path, discovery: &mut Discovery) {
    if let Some(file_name) = metadata_file_in(dir) {
        match load_definition(dir, file_name) {
            Ok(definition) => discovery.definitions.push(definition),
            Err(err) => discovery.failures.push(DiscoveryFailure {
                directory: dir.to_path_buf(),
                reason: err.to_string(),
            }),
        }
        return;
    }

    match sorted_subdirectories(dir) {
        Ok(children) => {
            for path in children {
                visit(&path, discovery);
            }
        }
        Err(err) => discovery.failures.push(DiscoveryFailure {
            directory: dir.to_path_buf(),
            reason: err.to_string(),
        }),
    }
}

fn sorted_subdirectories(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'))
        {
            continue;
        }
        if entry.file_type()?.is_dir() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn metadata_file_in(dir: &Path) -> Option<&'static str> {
    METADATA_FILE_NAMES
        .into_iter()
        .find(|name| dir.join(name).is_file())
}

/// Parses the metadata file `file_name` in `dir`.
pub fn load_definition(dir: &Path, file_name: &str) -> Result<SkilletMetadata, EngineError> {
    let path = dir.join(file_name);
    let content = fs::read_to_string(&path).map_err(|err| EngineError::Unreadable {
        path: path.clone(),
        message: err.to_string(),
    })?;
    parse_definition(&content, dir, file_name)
}

/// Parses metadata `content` as if it were the file `file_name` in `dir`.
pub fn parse_definition(
    content: &str,
    dir: &Path,
    file_name: &str,
) -> Result<SkilletMetadata, EngineError> {
    let path = dir.join(file_name);
    let malformed = |message: String| EngineError::Malformed {
        path: path.clone(),
        message,
    };

    let raw: RawDefinition = serde_yaml::from_str(content).map_err(|err| malformed(err.to_string()))?;
    let name = raw
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| malformed("missing name".to_string()))?;
    let kind = match raw.kind.as_deref() {
        Some(kind) => SkilletType::parse(kind)
            .ok_or_else(|| malformed(format!("unknown type {kind:?}")))?,
        None => return Err(malformed("missing type".to_string())),
    };
    let label = raw
        .label
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| name.clone());

    Ok(SkilletMetadata {
        name,
        label,
        description: raw.description.unwrap_or_default(),
        kind,
        variables: raw.variables.unwrap_or_default(),
        snippets: raw.snippets.unwrap_or_default(),
        labels: raw.labels,
        depends: raw.depends.unwrap_or_default(),
        source_path: dir.to_path_buf(),
        metadata_file: file_name.to_string(),
    })
}
