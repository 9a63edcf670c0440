//! Tanda CLI
//!
//! Drives the rotation core against a directory of JSON rotation records.
//! Every command goes through the same JSON routes an HTTP layer would use,
//! and prints the response envelope to stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

use tanda_core::{JsonFileStore, LotteryApi, LotteryCoordinator, SeededDraws, TandaConfig};

#[derive(Parser)]
#[command(name = "tanda")]
#[command(about = "Manage payout rotations for rotating savings groups", long_about = None)]
#[command(version = tanda_core::VERSION)]
struct Cli {
    /// Directory holding one JSON record per group
    #[arg(long, global = true, default_value = "tanda-data")]
    data_dir: PathBuf,

    /// Config file (falls back to TANDA_CONFIG_PATH, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for lottery draws; random when omitted
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Pretty-print the response envelope
    #[arg(long, global = true, default_value = "false")]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a rotation and draw the turn order
    Conduct {
        #[arg(long)]
        group: String,

        /// Member ids in creation order
        #[arg(long, value_delimiter = ',', required = true)]
        members: Vec<String>,

        /// lottery, sequential, contribution_based or needs_based
        #[arg(long, default_value = "lottery")]
        strategy: String,

        /// weekly, biweekly or monthly
        #[arg(long)]
        frequency: Option<String>,

        /// RFC 3339 reference date for payout dates
        #[arg(long)]
        start_date: Option<String>,

        /// Contribution totals as member=amount
        #[arg(long = "contribution", value_parser = parse_score)]
        contributions: Vec<(String, f64)>,

        /// Needs scores as member=score
        #[arg(long = "need", value_parser = parse_score)]
        needs: Vec<(String, f64)>,

        /// Replace an in-progress rotation
        #[arg(long, default_value = "false")]
        force: bool,
    },

    /// Record that a member received their payout
    Complete {
        #[arg(long)]
        group: String,

        #[arg(long)]
        member: String,

        #[arg(long)]
        amount: f64,
    },

    /// Re-draw the order of members not yet paid
    Reconduct {
        #[arg(long)]
        group: String,

        #[arg(long)]
        reason: String,
    },

    /// Show rotation status
    Status {
        #[arg(long)]
        group: String,
    },

    /// Show one member's turn
    Member {
        #[arg(long)]
        group: String,

        #[arg(long)]
        member: String,
    },

    /// Rotation report with statistics
    Report {
        #[arg(long)]
        group: String,
    },

    /// Lottery audit history
    History {
        #[arg(long)]
        group: String,
    },

    /// Send a raw request to a route, e.g. `request GET /turns/next --query group_id=g1`
    Request {
        method: String,
        path: String,

        #[arg(long, default_value = "")]
        query: String,

        /// Inline JSON body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the JSON body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
}

/// One route call derived from a subcommand.
#[derive(Debug, PartialEq)]
struct RouteCall {
    method: &'static str,
    path: String,
    query: String,
    body: String,
}

impl RouteCall {
    fn get(path: &str, params: &[(&str, &str)]) -> Self {
        let query = encode_query(params);
        Self { method: "GET", path: path.to_string(), query, body: String::new() }
    }

    fn post(path: &str, body: Value) -> Self {
        Self {
            method: "POST",
            path: path.to_string(),
            query: String::new(),
            body: body.to_string(),
        }
    }
}

fn main() -> Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let store = JsonFileStore::open(&cli.data_dir)
        .with_context(|| format!("Failed to open data directory {}", cli.data_dir.display()))?;
    tracing::debug!(data_dir = %cli.data_dir.display(), "store opened");

    let mut coordinator =
        LotteryCoordinator::new(store, config).context("Invalid rotation config")?;
    if let Some(seed) = cli.seed {
        coordinator = coordinator.with_draws(Box::new(SeededDraws::from_seed(seed)));
    }
    let api = LotteryApi::new(coordinator);

    let call = route_call(cli.command)?;
    let response = api.dispatch(call.method, &call.path, &call.query, &call.body);

    let envelope: Value =
        serde_json::from_str(&response).context("Core returned a malformed envelope")?;
    if cli.pretty {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{response}");
    }

    if envelope["success"].as_bool() == Some(true) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<TandaConfig> {
    let config = match path {
        Some(path) => TandaConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TandaConfig::from_env().context("Failed to load config from environment")?,
    };
    Ok(config)
}

fn route_call(command: Commands) -> Result<RouteCall> {
    let call = match command {
        Commands::Conduct {
            group,
            members,
            strategy,
            frequency,
            start_date,
            contributions,
            needs,
            force,
        } => {
            let mut options = Map::new();
            options.insert("contributions".into(), score_map(contributions));
            options.insert("needs_scores".into(), score_map(needs));
            if let Some(frequency) = frequency {
                options.insert("frequency".into(), Value::String(frequency));
            }
            if let Some(start_date) = start_date {
                options.insert("start_date".into(), Value::String(start_date));
            }
            options.insert("force".into(), Value::Bool(force));

            RouteCall::post(
                "/lottery/conduct",
                json!({
                    "group_id": group,
                    "members": members,
                    "lottery_type": strategy,
                    "options": options,
                }),
            )
        }
        Commands::Complete { group, member, amount } => RouteCall::post(
            "/turns/complete",
            json!({"group_id": group, "user_id": member, "payout_amount": amount}),
        ),
        Commands::Reconduct { group, reason } => {
            RouteCall::post("/lottery/reconduct", json!({"group_id": group, "reason": reason}))
        }
        Commands::Status { group } => RouteCall::get("/lottery/status", &[("group_id", &group)]),
        Commands::Member { group, member } => RouteCall::get(
            "/turns/member-info",
            &[("group_id", &group), ("user_id", &member)],
        ),
        Commands::Report { group } => RouteCall::get("/lottery/report", &[("group_id", &group)]),
        Commands::History { group } => RouteCall::get("/lottery/history", &[("group_id", &group)]),
        Commands::Request { method, path, query, body, body_file } => {
            let body = match (body, body_file) {
                (Some(body), _) => body,
                (None, Some(file)) => std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read body file {}", file.display()))?,
                (None, None) => String::new(),
            };
            let method = match method.to_ascii_uppercase().as_str() {
                "GET" => "GET",
                "POST" => "POST",
                other => anyhow::bail!("Unsupported method {other}; use GET or POST"),
            };
            RouteCall { method, path, query, body }
        }
    };
    Ok(call)
}

fn score_map(scores: Vec<(String, f64)>) -> Value {
    Value::Object(scores.into_iter().map(|(member, score)| (member, json!(score))).collect())
}

fn encode_query(params: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish()
}

fn parse_score(raw: &str) -> Result<(String, f64), String> {
    let (member, score) =
        raw.split_once('=').ok_or_else(|| format!("expected member=value, got '{raw}'"))?;
    let score: f64 = score.trim().parse().map_err(|e| format!("invalid value in '{raw}': {e}"))?;
    if member.trim().is_empty() {
        return Err(format!("missing member id in '{raw}'"));
    }
    Ok((member.trim().to_string(), score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("ana=120.5").unwrap(), ("ana".to_string(), 120.5));
        assert!(parse_score("ana").is_err());
        assert!(parse_score("=5").is_err());
        assert!(parse_score("ana=lots").is_err());
    }

    #[test]
    fn test_query_encoding() {
        let params = [("group_id", "club 7"), ("user_id", "a&b")];
        let call = RouteCall::get("/turns/member-info", &params);
        assert_eq!(call.query, "group_id=club+7&user_id=a%26b");
    }

    #[test]
    fn test_conduct_arguments_become_request() {
        let cli = Cli::parse_from([
            "tanda",
            "conduct",
            "--group",
            "g1",
            "--members",
            "a,b,c",
            "--strategy",
            "contribution_based",
            "--contribution",
            "a=100",
            "--contribution",
            "c=200",
        ]);
        let call = route_call(cli.command).unwrap();
        assert_eq!(call.method, "POST");
        assert_eq!(call.path, "/lottery/conduct");

        let body: Value = serde_json::from_str(&call.body).unwrap();
        assert_eq!(body["members"], json!(["a", "b", "c"]));
        assert_eq!(body["lottery_type"], "contribution_based");
        assert_eq!(body["options"]["contributions"]["c"], 200.0);
        assert!(body["options"].get("frequency").is_none());
    }

    #[test]
    fn test_commands_round_trip_through_api() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let coordinator = LotteryCoordinator::new(store, TandaConfig::default())
            .unwrap()
            .with_draws(Box::new(SeededDraws::from_seed(7)));
        let api = LotteryApi::new(coordinator);

        let run = |args: &[&str]| -> Value {
            let mut argv = vec!["tanda"];
            argv.extend_from_slice(args);
            let call = route_call(Cli::parse_from(argv).command).unwrap();
            serde_json::from_str(&api.dispatch(call.method, &call.path, &call.query, &call.body))
                .unwrap()
        };

        let created =
            run(&["conduct", "--group", "g1", "--members", "a,b", "--strategy", "sequential"]);
        assert_eq!(created["success"], true);

        let paid = run(&["complete", "--group", "g1", "--member", "a", "--amount", "50"]);
        assert_eq!(paid["data"]["next_recipient"]["member_id"], "b");

        let info = run(&["member", "--group", "g1", "--member", "b"]);
        assert_eq!(info["data"]["is_next"], true);

        let next = run(&["request", "get", "/turns/next", "--query", "group_id=g1"]);
        assert_eq!(next["data"]["member_id"], "b");
    }

    #[test]
    fn test_request_rejects_unknown_method() {
        let cli = Cli::parse_from(["tanda", "request", "PATCH", "/lottery/status"]);
        assert!(route_call(cli.command).is_err());
    }
}
