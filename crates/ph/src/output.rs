use crate::error::CliError;
use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};
use ph_core::types::{
    Collection, CollectionSummary, DeployKey, Event, ImportOutcome, Reconciliation, Repository,
    RepositoryUpdate, SavedSkillet, SkilletMetadata, SyncWarning, UpdateOutcome,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Writes command results to stdout, either as pretty JSON or as short
/// human-readable listings. Warnings always go to stderr in text mode.
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce(&T)) -> Result<(), CliError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }

    pub fn message(&self, text: &str) -> Result<(), CliError> {
        self.emit(text, |text| {
            println!("{}", text.if_supports_color(Stdout, |t| t.green()));
        })
    }

    pub fn import(&self, outcome: &ImportOutcome) -> Result<(), CliError> {
        self.emit(outcome, |outcome| {
            println!(
                "Imported {} ({} on {})",
                outcome.repository.name.if_supports_color(Stdout, |t| t.bold()),
                outcome.repository.remote_url,
                outcome.repository.details.branch
            );
            print_skillet_names(&outcome.skillets);
            warnings(&outcome.warnings);
        })
    }

    pub fn update(&self, name: &str, outcome: &UpdateOutcome) -> Result<(), CliError> {
        self.emit(outcome, |outcome| {
            println!(
                "{}: {}",
                name.if_supports_color(Stdout, |t| t.bold()),
                outcome.status
            );
            if !outcome.new_branches.is_empty() {
                println!("  new branches: {}", outcome.new_branches.join(", "));
            }
            warnings(&outcome.warnings);
        })
    }

    pub fn update_all(&self, updates: &[RepositoryUpdate]) -> Result<(), CliError> {
        if self.json {
            let entries: Vec<serde_json::Value> = updates
                .iter()
                .map(|update| match &update.result {
                    Ok(outcome) => serde_json::json!({ "name": update.name, "outcome": outcome }),
                    Err(err) => serde_json::json!({ "name": update.name, "error": err.to_string() }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }
        for update in updates {
            match &update.result {
                Ok(outcome) => self.update(&update.name, outcome)?,
                Err(err) => eprintln!(
                    "{}: {}",
                    update.name.if_supports_color(Stderr, |t| t.bold()),
                    err.if_supports_color(Stderr, |t| t.red())
                ),
            }
        }
        Ok(())
    }

    pub fn reconciliation(&self, reconciliation: &Reconciliation) -> Result<(), CliError> {
        self.emit(reconciliation, |reconciliation| {
            println!(
                "{}: {} added, {} updated, {} removed, {} indexed",
                reconciliation
                    .repository
                    .if_supports_color(Stdout, |t| t.bold()),
                reconciliation.added.len(),
                reconciliation.updated.len(),
                reconciliation.removed.len(),
                reconciliation.skillets.len()
            );
            warnings(&reconciliation.warnings);
        })
    }

    pub fn saved_skillet(&self, saved: &SavedSkillet) -> Result<(), CliError> {
        self.emit(saved, |saved| {
            println!(
                "{} {} at {}",
                if saved.created { "Created" } else { "Updated" },
                saved.name.if_supports_color(Stdout, |t| t.bold()),
                saved.path.display()
            );
            match &saved.commit {
                Some(rev) => println!("  committed {rev}"),
                None => println!("  not committed"),
            }
            warnings(&saved.reconciliation.warnings);
        })
    }

    /// The public key goes to stdout alone so it can be piped to the git host.
    pub fn deploy_key(&self, key: &DeployKey) -> Result<(), CliError> {
        self.emit(key, |key| {
            eprintln!(
                "Deploy key for {}: {}",
                key.repository.name.if_supports_color(Stderr, |t| t.bold()),
                key.repository.deploy_key_reference.as_deref().unwrap_or_default()
            );
            println!("{}", key.public_key);
        })
    }

    pub fn repositories(&self, repositories: &[Repository]) -> Result<(), CliError> {
        self.emit(repositories, |repositories| {
            if repositories.is_empty() {
                println!("No repositories imported");
            }
            for repository in repositories {
                println!(
                    "{:<24} {:<12} {}",
                    repository.name.if_supports_color(Stdout, |t| t.bold()),
                    repository.details.branch,
                    repository.remote_url.if_supports_color(Stdout, |t| t.dimmed())
                );
            }
        })
    }

    pub fn repository(&self, repository: &Repository, working_directory: &str) -> Result<(), CliError> {
        self.emit(repository, |repository| {
            println!("{}", repository.name.if_supports_color(Stdout, |t| t.bold()));
            println!("  url:        {}", repository.remote_url);
            println!("  branch:     {}", repository.details.branch);
            println!("  branches:   {}", repository.details.branches.join(", "));
            println!("  status:     {}", repository.details.status);
            println!("  directory:  {working_directory}");
            if let Some(commit) = &repository.details.commit {
                println!(
                    "  commit:     {} {} ({}, {})",
                    commit.id.chars().take(10).collect::<String>(),
                    commit.summary,
                    commit.author,
                    commit.timestamp.format("%Y-%m-%d %H:%M")
                );
            }
            if let Some(reference) = &repository.deploy_key_reference {
                println!("  deploy key: {reference}");
            }
        })
    }

    pub fn skillets(&self, skillets: &[SkilletMetadata]) -> Result<(), CliError> {
        self.emit(skillets, |skillets| {
            if skillets.is_empty() {
                println!("No skillets found");
            }
            for skillet in skillets {
                println!(
                    "{:<32} {:<14} {}",
                    skillet.name.if_supports_color(Stdout, |t| t.bold()),
                    skillet.kind.as_str(),
                    skillet.label
                );
            }
        })
    }

    pub fn skillet(&self, skillet: &SkilletMetadata) -> Result<(), CliError> {
        self.emit(skillet, |skillet| {
            println!(
                "{} ({})",
                skillet.name.if_supports_color(Stdout, |t| t.bold()),
                skillet.kind
            );
            println!("  label:    {}", skillet.label);
            if !skillet.description.is_empty() {
                println!("  about:    {}", skillet.description);
            }
            println!("  source:   {}", skillet.metadata_path().display());
            for (label, values) in skillet.labels.iter() {
                println!("  {label}: {}", values.join(", "));
            }
            for variable in &skillet.variables {
                println!(
                    "  var {} [{}] = {}",
                    variable.name, variable.type_hint, variable.default
                );
            }
            for snippet in &skillet.snippets {
                println!("  snippet {}", snippet.name);
            }
            for dependency in &skillet.depends {
                println!("  depends {} ({})", dependency.url, dependency.branch);
            }
        })
    }

    pub fn values(&self, values: &[String]) -> Result<(), CliError> {
        self.emit(values, |values| {
            for value in values {
                println!("{value}");
            }
        })
    }

    pub fn collection_summary(&self, summary: &[CollectionSummary]) -> Result<(), CliError> {
        self.emit(summary, |summary| {
            for entry in summary {
                println!(
                    "{:<32} {:>4}",
                    entry.name.if_supports_color(Stdout, |t| t.bold()),
                    entry.count
                );
                if !entry.related.is_empty() {
                    println!(
                        "  {}",
                        entry
                            .related
                            .join(", ")
                            .if_supports_color(Stdout, |t| t.dimmed())
                    );
                }
            }
        })
    }

    pub fn favorites(&self, collections: &[Collection]) -> Result<(), CliError> {
        self.emit(collections, |collections| {
            if collections.is_empty() {
                println!("No favorites");
            }
            for collection in collections {
                println!(
                    "{:<24} {:>3} skillets  {}",
                    collection.name.if_supports_color(Stdout, |t| t.bold()),
                    collection.skillets.len(),
                    collection.description
                );
            }
        })
    }

    pub fn favorite(&self, collection: &Collection) -> Result<(), CliError> {
        self.emit(collection, |collection| {
            println!(
                "Created favorites {}",
                collection.name.if_supports_color(Stdout, |t| t.bold())
            );
        })
    }

    pub fn rendered(&self, rendered: &BTreeMap<String, String>) -> Result<(), CliError> {
        self.emit(rendered, |rendered| {
            for (snippet, body) in rendered {
                println!("{}", format!("# {snippet}").if_supports_color(Stdout, |t| t.cyan()));
                println!("{body}");
            }
        })
    }

    pub fn events(&self, events: &[Event]) -> Result<(), CliError> {
        self.emit(events, |events| {
            for event in events {
                let body = serde_json::to_value(&event.body).unwrap_or_default();
                let kind = body
                    .get("type")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown");
                println!(
                    "{:>6} {} {:<26} {}",
                    event.seq,
                    event.at.format("%Y-%m-%d %H:%M:%S"),
                    kind.if_supports_color(Stdout, |t| t.bold()),
                    body.get("payload").map(ToString::to_string).unwrap_or_default()
                );
            }
        })
    }
}

fn print_skillet_names(skillets: &[SkilletMetadata]) {
    if skillets.is_empty() {
        println!("  no skillets found");
        return;
    }
    for skillet in skillets {
        println!("  {} ({})", skillet.name, skillet.kind);
    }
}

fn warnings(warnings: &[SyncWarning]) {
    for warning in warnings {
        eprintln!(
            "{} {warning}",
            "warning:".if_supports_color(Stderr, |t| t.yellow())
        );
    }
}
