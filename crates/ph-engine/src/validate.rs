use ph_core::types::{SkilletMetadata, SkilletType};
use std::collections::HashSet;
use std::path::{Component, Path};

/// Types whose skillets push configuration and are useless without snippets.
const SNIPPET_TYPES: [SkilletType; 6] = [
    SkilletType::Panos,
    SkilletType::Panorama,
    SkilletType::PanoramaGpcs,
    SkilletType::Template,
    SkilletType::Rest,
    SkilletType::PanValidation,
];

pub fn structural_errors(definition: &SkilletMetadata) -> Vec<String> {
    let mut errors = Vec::new();

    if definition.name.contains('/') {
        errors.push(format!("name {:?} must not contain '/'", definition.name));
    }
    if SNIPPET_TYPES.contains(&definition.kind) && definition.snippets.is_empty() {
        errors.push(format!("{} skillet has no snippets", definition.kind));
    }

    let mut variable_names = HashSet::new();
    for variable in &definition.variables {
        if variable.name.trim().is_empty() {
            errors.push("variable with empty name".to_string());
        } else if !variable_names.insert(variable.name.as_str()) {
            errors.push(format!("variable {} is declared twice", variable.name));
        }
    }

    let mut snippet_names = HashSet::new();
    for snippet in &definition.snippets {
        if snippet.name.trim().is_empty() {
            errors.push("snippet with empty name".to_string());
        } else if !snippet_names.insert(snippet.name.as_str()) {
            errors.push(format!("snippet {} is declared twice", snippet.name));
        }
        if let Some(file) = &snippet.file {
            if !is_contained(Path::new(file)) {
                errors.push(format!(
                    "snippet {} file {file} points outside the skillet",
                    snippet.name
                ));
            } else if !definition.source_path.join(file).is_file() {
                errors.push(format!("snippet {} file {file} does not exist", snippet.name));
            }
        }
    }

    for dependency in &definition.depends {
        if dependency.url.trim().is_empty() {
            errors.push("dependency without url".to_string());
        }
    }

    errors
}

/// True when `path` is relative and never climbs above its base.
pub fn is_contained(path: &Path) -> bool {
    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                let Some(next) = depth.checked_sub(1) else {
                    return false;
                };
                depth = next;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}
