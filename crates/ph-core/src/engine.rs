use crate::error::EngineError;
use crate::types::SkilletMetadata;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name given to definitions created through the API.
pub const DEFAULT_METADATA_FILE: &str = ".meta-cnc.yaml";

/// A definition the engine found but could not turn into metadata. The
/// directory is reported so the synchronizer can keep whatever it already
/// indexed from there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    pub directory: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub definitions: Vec<SkilletMetadata>,
    pub failures: Vec<DiscoveryFailure>,
}

pub trait TemplateEngine {
    /// Walks `root` and parses every skillet definition under it. Fails only
    /// when `root` itself cannot be read.
    fn discover(&self, root: &Path) -> Result<Discovery, EngineError>;

    /// Parses definition `contents` as the metadata file `file_name` in
    /// `directory`, without touching the filesystem.
    fn parse(
        &self,
        contents: &str,
        directory: &Path,
        file_name: &str,
    ) -> Result<SkilletMetadata, EngineError>;

    /// Structural problems with an otherwise parseable definition. An empty
    /// list means the definition is sound.
    fn validate_structure(&self, definition: &SkilletMetadata) -> Vec<String>;

    /// Renders each snippet of `definition` with `context`, keyed by snippet
    /// name.
    fn render(
        &self,
        definition: &SkilletMetadata,
        context: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, String>, EngineError>;
}
