//! `fundic` command-line entry point.
//!
//! # Responsibility
//! - Open the case store and act on it as an existing user.
//! - Print every result as JSON on stdout; failures as JSON on stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use fundic_core::service::conflict_service::ConflictService;
use fundic_core::{
    core_version, init_from_config, open_db, Actor, CoreConfig, CoreError, SqliteStore,
    UserService,
};
use log::debug;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

/// Fund IC case conflict tooling
#[derive(Parser, Debug)]
#[command(name = "fundic")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database file; overrides `database.path` from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the core version
    Version,

    /// Detect new conflicts between the observations of a case
    Detect {
        #[command(flatten)]
        case: CaseArgs,
    },

    /// Resolve one conflict
    Resolve {
        /// Conflict id
        #[arg(long)]
        conflict: Uuid,

        /// Resolution notes
        #[arg(long)]
        notes: Option<String>,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// List conflicts of a case, newest first, one cursor page at a time
    Conflicts {
        #[command(flatten)]
        case: CaseArgs,

        /// Cursor returned as `next_cursor` by the previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Page size; out-of-range values fall back to the default
        #[arg(long, default_value_t = 20)]
        limit: i64,

        /// Only resolved (`true`) or unresolved (`false`) conflicts
        #[arg(long)]
        resolved: Option<bool>,
    },

    /// Unresolved conflicts at or above a severity threshold
    HighSeverity {
        #[command(flatten)]
        case: CaseArgs,

        /// Minimum severity; defaults to `conflicts.high_severity_threshold`
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Conflict counts and average severity of a case
    Stats {
        #[command(flatten)]
        case: CaseArgs,
    },
}

#[derive(Args, Debug)]
struct ActorArgs {
    /// Id of the acting user; the role is read from the user directory
    #[arg(long = "as", value_name = "USER_ID")]
    user: Uuid,
}

#[derive(Args, Debug)]
struct CaseArgs {
    /// Case id
    #[arg(long = "case", value_name = "CASE_ID")]
    id: Uuid,

    #[command(flatten)]
    actor: ActorArgs,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error_code: &'a str,
    status: u16,
    message: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", render_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<Value> {
    let config = load_config(cli.config.as_deref())?;
    init_from_config(&config.logging).context("failed to initialize logging")?;

    if let Command::Version = cli.command {
        return Ok(version_output());
    }

    let db_path = cli
        .db
        .or_else(|| config.database.path.clone())
        .ok_or_else(|| anyhow!("no database given; pass --db or set database.path"))?;
    let conn = open_db(&db_path)
        .with_context(|| format!("failed to open database `{}`", db_path.display()))?;
    let store = SqliteStore::new(&conn);
    let conflicts = ConflictService::new(store, &config);

    debug!("event=cli_command module=cli status=start command={:?}", cli.command);
    let output = match cli.command {
        Command::Version => version_output(),
        Command::Detect { case } => {
            let actor = resolve_actor(store, &config, &case.actor)?;
            let created = conflicts.detect(case.id, &actor)?;
            json!({ "case_id": case.id, "created": created })
        }
        Command::Resolve {
            conflict,
            notes,
            actor,
        } => {
            let actor = resolve_actor(store, &config, &actor)?;
            serde_json::to_value(conflicts.resolve(conflict, &actor, notes)?)?
        }
        Command::Conflicts {
            case,
            cursor,
            limit,
            resolved,
        } => {
            let actor = resolve_actor(store, &config, &case.actor)?;
            let page =
                conflicts.list_conflicts_page(case.id, &actor, cursor.as_deref(), limit, resolved)?;
            serde_json::to_value(page)?
        }
        Command::HighSeverity { case, threshold } => {
            let actor = resolve_actor(store, &config, &case.actor)?;
            let items = conflicts.high_severity(case.id, &actor, threshold)?;
            json!({ "case_id": case.id, "items": items })
        }
        Command::Stats { case } => {
            let actor = resolve_actor(store, &config, &case.actor)?;
            serde_json::to_value(conflicts.statistics(case.id, &actor)?)?
        }
    };
    Ok(output)
}

fn version_output() -> Value {
    json!({ "core_version": core_version() })
}

fn load_config(path: Option<&std::path::Path>) -> Result<CoreConfig> {
    match path {
        Some(path) => Ok(CoreConfig::from_file(path)?),
        None => Ok(CoreConfig::default()),
    }
}

/// Looks up the acting user; inactive users cannot act.
fn resolve_actor(store: SqliteStore<'_>, config: &CoreConfig, args: &ActorArgs) -> Result<Actor> {
    let user = UserService::new(store, config).get_user(args.user)?;
    if !user.is_active {
        return Err(CoreError::unauthorized("User account is deactivated").into());
    }
    Ok(Actor::new(user.id, user.role))
}

fn render_error(err: &anyhow::Error) -> String {
    let output = match err.downcast_ref::<CoreError>() {
        Some(core) => ErrorOutput {
            error_code: core.error_code(),
            status: core.status_code(),
            message: core.to_string(),
        },
        None => ErrorOutput {
            error_code: "CLI_ERROR",
            status: 1,
            message: format!("{err:#}"),
        },
    };
    serde_json::to_string(&output).unwrap_or_else(|_| output.message.clone())
}

#[cfg(test)]
mod tests {
    use super::{execute, render_error, Cli};
    use clap::Parser;
    use fundic_core::model::observation::Observation;
    use fundic_core::repo::case_repo::CaseRepository;
    use fundic_core::repo::observation_repo::ObservationRepository;
    use fundic_core::repo::user_repo::UserRepository;
    use fundic_core::{open_db, Case, SqliteStore, User, UserRole};
    use std::path::Path;

    struct Seed {
        lead: User,
        analyst: User,
        case: Case,
    }

    fn seed(path: &Path) -> Seed {
        let conn = open_db(path).unwrap();
        let store = SqliteStore::new(&conn);
        let lead = User::new("lead@fund.example", "Lead Partner", UserRole::LeadPartner);
        let analyst = User::new("analyst@fund.example", "Analyst", UserRole::Analyst);
        store.create_user(&lead).unwrap();
        store.create_user(&analyst).unwrap();

        let case = Case::new("Series B review", "Acme Robotics", analyst.id);
        store.create_case(&case).unwrap();
        let mut first = Observation::new(case.id, "Revenue", "Strong growth expected", analyst.id);
        first.created_at = 1_000;
        first.updated_at = 1_000;
        let mut second = Observation::new(
            case.id,
            "Outlook",
            "Significant decline anticipated",
            analyst.id,
        );
        second.created_at = 2_000;
        second.updated_at = 2_000;
        store.create_observation(&first).unwrap();
        store.create_observation(&second).unwrap();

        Seed {
            lead,
            analyst,
            case,
        }
    }

    fn run(args: &[&str]) -> anyhow::Result<serde_json::Value> {
        execute(Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn version_needs_no_database() {
        let output = run(&["fundic", "version"]).unwrap();
        assert_eq!(output["core_version"], fundic_core::core_version());
    }

    #[test]
    fn detect_then_stats_round_trip_through_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ic.sqlite3");
        let seed = seed(&db);
        let db = db.to_str().unwrap();
        let case = seed.case.id.to_string();
        let lead = seed.lead.id.to_string();

        let detected = run(&["fundic", "--db", db, "detect", "--case", &case, "--as", &lead]).unwrap();
        let created = detected["created"].as_array().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["conflict_type"], "data_inconsistency");

        let again = run(&["fundic", "--db", db, "detect", "--case", &case, "--as", &lead]).unwrap();
        assert!(again["created"].as_array().unwrap().is_empty());

        let stats = run(&["fundic", "stats", "--case", &case, "--as", &lead, "--db", db]).unwrap();
        assert_eq!(stats["total_count"], 1);
        assert_eq!(stats["unresolved_count"], 1);
    }

    #[test]
    fn conflicts_lists_one_cursor_page_with_filters() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ic.sqlite3");
        let seed = seed(&db);
        let db = db.to_str().unwrap();
        let case = seed.case.id.to_string();
        let lead = seed.lead.id.to_string();
        run(&["fundic", "--db", db, "detect", "--case", &case, "--as", &lead]).unwrap();

        let page = run(&[
            "fundic", "--db", db, "conflicts", "--case", &case, "--as", &lead, "--limit", "1",
        ])
        .unwrap();
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["has_more"], false);
        assert!(page["next_cursor"].is_null());

        let resolved = run(&[
            "fundic",
            "--db",
            db,
            "conflicts",
            "--case",
            &case,
            "--as",
            &lead,
            "--resolved",
            "true",
        ])
        .unwrap();
        assert!(resolved["items"].as_array().unwrap().is_empty());

        let err = run(&[
            "fundic", "--db", db, "conflicts", "--case", &case, "--as", &lead, "--cursor", "@@@",
        ])
        .unwrap_err();
        let rendered: serde_json::Value = serde_json::from_str(&render_error(&err)).unwrap();
        assert_eq!(rendered["error_code"], "VALIDATION_ERROR");
        assert_eq!(rendered["status"], 400);
    }

    #[test]
    fn analyst_detect_renders_authorization_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ic.sqlite3");
        let seed = seed(&db);
        let case = seed.case.id.to_string();
        let analyst = seed.analyst.id.to_string();

        let err = run(&[
            "fundic",
            "--db",
            db.to_str().unwrap(),
            "detect",
            "--case",
            &case,
            "--as",
            &analyst,
        ])
        .unwrap_err();
        let rendered: serde_json::Value = serde_json::from_str(&render_error(&err)).unwrap();
        assert_eq!(rendered["error_code"], "AUTHORIZATION_ERROR");
        assert_eq!(rendered["status"], 403);
    }

    #[test]
    fn missing_database_path_is_reported() {
        let err = run(&[
            "fundic",
            "stats",
            "--case",
            "00000000-0000-0000-0000-000000000001",
            "--as",
            "00000000-0000-0000-0000-000000000002",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("--db"));
    }
}
