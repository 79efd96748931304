pub mod discovery;
pub mod render;
pub mod validate;

use ph_core::engine::{Discovery, TemplateEngine};
use ph_core::error::EngineError;
use ph_core::types::SkilletMetadata;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub use discovery::{METADATA_FILE_NAMES, parse_definition};

/// Template engine for skillets described by `.meta-cnc.yaml` style files.
#[derive(Debug, Clone, Default)]
pub struct MetaFileEngine;

impl MetaFileEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for MetaFileEngine {
    fn discover(&self, root: &Path) -> Result<Discovery, EngineError> {
        discovery::discover(root)
    }

    fn parse(
        &self,
        contents: &str,
        directory: &Path,
        file_name: &str,
    ) -> Result<SkilletMetadata, EngineError> {
        discovery::parse_definition(contents, directory, file_name)
    }

    fn validate_structure(&self, definition: &SkilletMetadata) -> Vec<String> {
        validate::structural_errors(definition)
    }

    fn render(
        &self,
        definition: &SkilletMetadata,
        context: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, String>, EngineError> {
        render::render_snippets(definition, context)
    }
}
