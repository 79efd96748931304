mod app;
mod error;
mod logging;
mod output;

use clap::{Args, Parser, Subcommand};
use error::CliError;
use logging::{LogFormat, LogLevel};
use output::Printer;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stderr;
use ph_core::types::CreateCollectionInput;
use ph_core::{RequestContext, Settings};
use ph_events::EventSource;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ph", version, about = "Import, index and query skillet repositories")]
struct Cli {
    /// Config file. Defaults to panhandler.toml in the panhandler home.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Index database, overriding the configured path.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Correlation id recorded on emitted events.
    #[arg(long, global = true)]
    correlation_id: Option<String>,
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plaintext)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage imported repositories.
    #[command(subcommand)]
    Repo(RepoCommand),
    /// Query indexed skillets.
    #[command(subcommand)]
    Skillet(SkilletCommand),
    /// Label-derived collections. Without a name, prints the summary.
    Collections { name: Option<String> },
    /// User-curated favorites.
    #[command(subcommand)]
    Favorite(FavoriteCommand),
    /// Recorded change events.
    Events {
        /// Only events with a sequence number greater than this.
        #[arg(long)]
        after: Option<i64>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum RepoCommand {
    /// Clone a repository and index its skillets.
    Import {
        name: String,
        url: String,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Pull the latest commits and re-index.
    Update {
        name: String,
        /// Switch to this branch first.
        #[arg(long)]
        branch: Option<String>,
    },
    /// Update every imported repository.
    UpdateAll,
    /// Re-index the working directory without contacting the remote.
    Reindex { name: String },
    /// Delete the working directory and every record of the repository.
    Remove { name: String },
    /// Push local commits using the repository's deploy key.
    Push { name: String },
    /// Set or clear the deploy key used for pushes.
    DeployKey(DeployKeyArgs),
    /// Create an SSH key pair for the repository and use it as the deploy key.
    GenerateKey { name: String },
    List,
    Show { name: String },
}

#[derive(Args)]
struct DeployKeyArgs {
    name: String,
    /// Path of the private key file.
    #[arg(required_unless_present = "clear", conflicts_with = "clear")]
    key: Option<String>,
    #[arg(long)]
    clear: bool,
}

#[derive(Subcommand)]
enum SkilletCommand {
    List {
        /// Only skillets carrying LABEL=VALUE.
        #[arg(long, value_parser = parse_key_value)]
        label: Option<(String, String)>,
        /// Rebuild the cached listing from the index.
        #[arg(long)]
        refresh: bool,
    },
    Show { name: String },
    /// Distinct values of a label across all skillets.
    Labels { label: String },
    /// Render a skillet's snippets with variables substituted.
    Render {
        name: String,
        /// Variable override as NAME=VALUE. VALUE is read as JSON when it parses.
        #[arg(long = "var", value_parser = parse_key_value)]
        vars: Vec<(String, String)>,
    },
    /// Write a skillet definition into a repository and commit it.
    Save {
        repository: String,
        /// Definition file to read, or `-` for stdin.
        file: PathBuf,
    },
    /// Remove a skillet definition from its repository and commit the removal.
    Delete { repository: String, name: String },
}

#[derive(Subcommand)]
enum FavoriteCommand {
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    Delete { name: String },
    List,
    /// Skillets in one favorites collection.
    Show { name: String },
    /// Replace the favorites holding a skillet.
    Assign {
        skillet: String,
        collections: Vec<String>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {raw:?}")),
    }
}

fn variable_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn read_definition(file: &Path) -> Result<String, CliError> {
    let read = if file == Path::new("-") {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .map(|_| contents)
    } else {
        std::fs::read_to_string(file)
    };
    read.map_err(|err| CliError::invalid(format!("cannot read {}: {err}", file.display())))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.log_level, cli.log_format) {
        eprintln!("failed to initialize logging: {err}");
    }
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err}", "error:".if_supports_color(Stderr, |t| t.red()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }
    tracing::debug!(
        home = %settings.home.display(),
        database = %settings.database_path.display(),
        "loaded settings"
    );
    let app = app::open(settings)?;
    let ctx = RequestContext::new(EventSource::Cli, cli.correlation_id);
    let printer = Printer::new(cli.json);

    match cli.command {
        Command::Repo(command) => return repo(&app, &ctx, &printer, command),
        Command::Skillet(command) => skillet(&app, &ctx, &printer, command)?,
        Command::Collections { name: None } => {
            printer.collection_summary(&app.skillets().collection_summary()?)?;
        }
        Command::Collections { name: Some(name) } => {
            printer.skillets(&app.skillets().collection(&name)?)?;
        }
        Command::Favorite(command) => favorite(&app, &ctx, &printer, command)?,
        Command::Events { after, limit } => {
            printer.events(&app.events().list(after, limit)?)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn repo(
    app: &app::App,
    ctx: &RequestContext,
    printer: &Printer,
    command: RepoCommand,
) -> Result<ExitCode, CliError> {
    let repositories = app.repositories();
    match command {
        RepoCommand::Import { name, url, branch } => {
            printer.import(&repositories.import(ctx, &name, &url, branch.as_deref())?)?;
        }
        RepoCommand::Update { name, branch } => {
            let outcome = repositories.update(ctx, &name, branch.as_deref())?;
            printer.update(&name, &outcome)?;
        }
        RepoCommand::UpdateAll => {
            let updates = repositories.update_all(ctx)?;
            printer.update_all(&updates)?;
            if updates.iter().any(|update| update.result.is_err()) {
                return Ok(ExitCode::FAILURE);
            }
        }
        RepoCommand::Reindex { name } => {
            printer.reconciliation(&repositories.reindex(ctx, &name)?)?;
        }
        RepoCommand::Remove { name } => {
            repositories.remove(ctx, &name)?;
            printer.message(&format!("Removed {name}"))?;
        }
        RepoCommand::Push { name } => {
            let output = repositories.push(ctx, &name)?;
            printer.message(output.trim())?;
        }
        RepoCommand::DeployKey(args) => {
            let key = if args.clear { None } else { args.key.as_deref() };
            let repository = repositories.set_deploy_key(ctx, &args.name, key)?;
            let dir = repositories.working_directory(&repository.name);
            printer.repository(&repository, &dir.display().to_string())?;
        }
        RepoCommand::GenerateKey { name } => {
            printer.deploy_key(&repositories.generate_deploy_key(ctx, &name)?)?;
        }
        RepoCommand::List => printer.repositories(&repositories.list()?)?,
        RepoCommand::Show { name } => {
            let repository = repositories.get(&name)?;
            let dir = repositories.working_directory(&name);
            printer.repository(&repository, &dir.display().to_string())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn skillet(
    app: &app::App,
    ctx: &RequestContext,
    printer: &Printer,
    command: SkilletCommand,
) -> Result<(), CliError> {
    let skillets = app.skillets();
    match command {
        SkilletCommand::List {
            label: Some((label, value)),
            refresh,
        } => {
            if refresh {
                skillets.list(true)?;
            }
            printer.skillets(&skillets.list_by_label(&label, &value)?)?;
        }
        SkilletCommand::List {
            label: None,
            refresh,
        } => printer.skillets(&skillets.list(refresh)?)?,
        SkilletCommand::Show { name } => printer.skillet(&skillets.get(&name)?)?,
        SkilletCommand::Labels { label } => printer.values(&skillets.label_values(&label)?)?,
        SkilletCommand::Render { name, vars } => {
            if vars.iter().any(|(key, _)| key.contains(char::is_whitespace)) {
                return Err(CliError::invalid("variable names cannot contain whitespace"));
            }
            let context: BTreeMap<String, Value> = vars
                .into_iter()
                .map(|(key, raw)| (key, variable_value(&raw)))
                .collect();
            printer.rendered(&skillets.render(&name, &context)?)?;
        }
        SkilletCommand::Save { repository, file } => {
            let contents = read_definition(&file)?;
            printer.saved_skillet(&skillets.save(ctx, &repository, &contents)?)?;
        }
        SkilletCommand::Delete { repository, name } => {
            printer.reconciliation(&skillets.delete(ctx, &repository, &name)?)?;
        }
    }
    Ok(())
}

fn favorite(
    app: &app::App,
    ctx: &RequestContext,
    printer: &Printer,
    command: FavoriteCommand,
) -> Result<(), CliError> {
    let favorites = app.favorites();
    match command {
        FavoriteCommand::Create {
            name,
            description,
            categories,
        } => {
            let collection = favorites.create(
                ctx,
                CreateCollectionInput {
                    name,
                    description,
                    categories,
                },
            )?;
            printer.favorite(&collection)?;
        }
        FavoriteCommand::Delete { name } => {
            favorites.delete(ctx, &name)?;
            printer.message(&format!("Deleted favorites {name}"))?;
        }
        FavoriteCommand::List => printer.favorites(&favorites.list()?)?,
        FavoriteCommand::Show { name } => printer.skillets(&favorites.skillets(&name)?)?,
        FavoriteCommand::Assign {
            skillet,
            collections,
        } => {
            favorites.set_for_skillet(ctx, &skillet, &collections)?;
            let assigned = favorites.collections_for_skillet(&skillet)?;
            printer.values(&assigned)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_value_arguments() {
        assert_eq!(
            parse_key_value("collection=Foo=Bar").unwrap(),
            ("collection".to_string(), "Foo=Bar".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn variable_values_prefer_json() {
        assert_eq!(variable_value("42"), serde_json::json!(42));
        assert_eq!(variable_value("[\"a\"]"), serde_json::json!(["a"]));
        assert_eq!(variable_value("fw-01"), serde_json::json!("fw-01"));
    }

    #[test]
    fn deploy_key_requires_key_or_clear() {
        assert!(Cli::try_parse_from(["ph", "repo", "deploy-key", "lib"]).is_err());
        assert!(Cli::try_parse_from(["ph", "repo", "deploy-key", "lib", "--clear"]).is_ok());
        assert!(
            Cli::try_parse_from(["ph", "repo", "deploy-key", "lib", "/keys/id", "--clear"]).is_err()
        );
    }

    #[test]
    fn save_reads_definition_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("edge.yaml");
        std::fs::write(&file, "name: edge\ntype: panos\n").unwrap();
        assert_eq!(read_definition(&file).unwrap(), "name: edge\ntype: panos\n");
        assert!(matches!(
            read_definition(&dir.path().join("missing.yaml")),
            Err(CliError::InvalidArgument { .. })
        ));

        let cli = Cli::try_parse_from(["ph", "skillet", "save", "lib", "-"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Skillet(SkilletCommand::Save { file, .. }) if file == Path::new("-")
        ));
    }

    #[test]
    fn label_filter_is_parsed() {
        let cli = Cli::try_parse_from(["ph", "skillet", "list", "--label", "collection=Foo"]).unwrap();
        match cli.command {
            Command::Skillet(SkilletCommand::List { label, refresh }) => {
                assert_eq!(label, Some(("collection".to_string(), "Foo".to_string())));
                assert!(!refresh);
            }
            _ => panic!("unexpected command"),
        }
    }
}
