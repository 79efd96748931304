use crate::error::SkilletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Label used to group skillets into collections.
pub const COLLECTION_LABEL: &str = "collection";
/// Label holding the sort position of a skillet within its collection.
pub const ORDER_LABEL: &str = "order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkilletType {
    #[serde(rename = "panos")]
    Panos,
    #[serde(rename = "panorama")]
    Panorama,
    #[serde(rename = "panorama-gpcs")]
    PanoramaGpcs,
    #[serde(rename = "template")]
    Template,
    #[serde(rename = "python3")]
    Python3,
    #[serde(rename = "rest")]
    Rest,
    #[serde(rename = "workflow")]
    Workflow,
    #[serde(rename = "terraform")]
    Terraform,
    #[serde(rename = "pan_validation")]
    PanValidation,
    #[serde(rename = "app")]
    App,
    #[serde(rename = "docker")]
    Docker,
    #[serde(rename = "ansible")]
    Ansible,
}

impl SkilletType {
    pub const ALL: [SkilletType; 12] = [
        SkilletType::Panos,
        SkilletType::Panorama,
        SkilletType::PanoramaGpcs,
        SkilletType::Template,
        SkilletType::Python3,
        SkilletType::Rest,
        SkilletType::Workflow,
        SkilletType::Terraform,
        SkilletType::PanValidation,
        SkilletType::App,
        SkilletType::Docker,
        SkilletType::Ansible,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkilletType::Panos => "panos",
            SkilletType::Panorama => "panorama",
            SkilletType::PanoramaGpcs => "panorama-gpcs",
            SkilletType::Template => "template",
            SkilletType::Python3 => "python3",
            SkilletType::Rest => "rest",
            SkilletType::Workflow => "workflow",
            SkilletType::Terraform => "terraform",
            SkilletType::PanValidation => "pan_validation",
            SkilletType::App => "app",
            SkilletType::Docker => "docker",
            SkilletType::Ansible => "ansible",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
    }
}

impl fmt::Display for SkilletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default = "default_type_hint")]
    pub type_hint: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

fn default_type_hint() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub fn default_branch() -> String {
    "master".to_string()
}

/// Labels as stored: every value is a list of strings, whatever shape the
/// author wrote. A scalar `collection: Foo` becomes `["Foo"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, Vec<String>>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.0.insert(name.into(), values);
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.values(name).iter().any(|candidate| candidate == value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for Labels {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl LabelScalar {
    fn into_string(self) -> String {
        match self {
            LabelScalar::Bool(value) => value.to_string(),
            LabelScalar::Int(value) => value.to_string(),
            LabelScalar::Float(value) => value.to_string(),
            LabelScalar::Text(value) => value,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelValue {
    Many(Vec<LabelScalar>),
    One(LabelScalar),
}

impl<'de> Deserialize<'de> for Labels {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<BTreeMap<String, Option<LabelValue>>>::deserialize(deserializer)?;
        let labels = raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, value)| {
                let values = match value? {
                    LabelValue::Many(items) => {
                        items.into_iter().map(LabelScalar::into_string).collect()
                    }
                    LabelValue::One(item) => vec![item.into_string()],
                };
                Some((name, values))
            })
            .collect();
        Ok(Self(labels))
    }
}

/// A parsed skillet definition. This is what the index stores (as JSON) and
/// what every query returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkilletMetadata {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: SkilletType,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub depends: Vec<Dependency>,
    pub source_path: PathBuf,
    pub metadata_file: String,
}

impl SkilletMetadata {
    pub fn is_app(&self) -> bool {
        self.kind == SkilletType::App
    }

    pub fn collections(&self) -> &[String] {
        self.labels.values(COLLECTION_LABEL)
    }

    /// First `order` label value that parses as an integer.
    pub fn order(&self) -> Option<i64> {
        self.labels
            .values(ORDER_LABEL)
            .iter()
            .find_map(|value| value.trim().parse().ok())
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.source_path.join(&self.metadata_file)
    }
}

/// An index record. `metadata_json` is kept exactly as written so change
/// detection can compare serialized forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skillet {
    pub name: String,
    pub repository: String,
    pub metadata_json: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skillet {
    pub fn metadata(&self) -> Result<SkilletMetadata, SkilletError> {
        serde_json::from_str(&self.metadata_json).map_err(|err| SkilletError::CorruptRecord {
            name: self.name.clone(),
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    pub fn created(self) -> bool {
        self == UpsertOutcome::Created
    }
}
