use crate::api;
use crate::config::{EngineOptions, KindDefaults};
use crate::engine::SnapshotInput;
use crate::services::log::{init_tracing, init_tracing_verbose};
use crate::services::store::{LocalFsStore, ProfileStore};
use crate::tools::fingerprint::fingerprint;
use crate::ApiResponse;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "listwise", version, about = "Listing extraction + learned host profiles (JSON only)")]
pub struct Cli {
    /// Debug-level logs on stderr (RUST_LOG wins when set)
    #[arg(long, global = true)]
    verbose: bool,

    /// Profile store file (defaults to the user data dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract items from a saved, rendered snapshot of <url>
    Extract(ExtractArgs),
    /// Propose listing selectors for a snapshot
    Mine(MineArgs),
    /// Print the template fingerprint of a snapshot
    Fingerprint(HtmlArg),
    #[command(subcommand)]
    Profile(ProfileCmd),
}

#[derive(Subcommand)]
enum ProfileCmd {
    Read(ReadArgs),
    Delete(DeleteArgs),
}

#[derive(Args)]
struct HtmlArg {
    #[arg(long)]
    html: PathBuf,
}

#[derive(Args)]
struct ExtractArgs {
    url: String,
    /// Settled page markup
    #[arg(long)]
    html: PathBuf,
    /// Markup captured before the page settled
    #[arg(long = "early-html")]
    early_html: Option<PathBuf>,
    /// Page kind whose default bundle applies
    #[arg(long, requires = "kinds")]
    kind: Option<String>,
    /// JSON file of per-kind default bundles
    #[arg(long)]
    kinds: Option<PathBuf>,
    /// Do not write feedback into the profile store
    #[arg(long = "no-learn")]
    no_learn: bool,
    #[arg(long = "max-cards", default_value_t = 400)]
    max_cards: usize,
}

#[derive(Args)]
struct MineArgs {
    url: String,
    #[arg(long)]
    html: PathBuf,
}

#[derive(Args)]
struct ReadArgs {
    target: String, // <host> | all
}

#[derive(Args)]
struct DeleteArgs {
    target: String, // <host> | all
    #[arg(long = "yes")]
    yes: bool,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        init_tracing_verbose();
    } else {
        init_tracing();
    }

    match cli.cmd {
        Command::Extract(args) => {
            let mut store = open_store(cli.store.as_deref())?;
            extract_cmd(&mut store, args)
        }
        Command::Mine(MineArgs { url, html }) => {
            let html = read_html(&html)?;
            print_json(ApiResponse::ok(api::mine_candidates(&html, &url)))
        }
        Command::Fingerprint(HtmlArg { html }) => {
            let html = read_html(&html)?;
            print_json(ApiResponse::ok(serde_json::json!({ "fingerprint": fingerprint(&html) })))
        }
        Command::Profile(pc) => {
            let mut store = open_store(cli.store.as_deref())?;
            profile_cmd(&mut store, pc)
        }
    }
}

fn open_store(path: Option<&Path>) -> anyhow::Result<ProfileStore> {
    let store = match path {
        Some(path) => ProfileStore::open(LocalFsStore::with_path(path)),
        None => ProfileStore::open_default(),
    };
    store.context("failed to open profile store")
}

fn read_html(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn extract_cmd(store: &mut ProfileStore, args: ExtractArgs) -> anyhow::Result<()> {
    let mut input = SnapshotInput::new(&args.url, &read_html(&args.html)?);
    if let Some(early) = &args.early_html {
        input.early_html = Some(read_html(early)?);
    }
    let kinds = match &args.kinds {
        Some(path) => Some(KindDefaults::load(path).context("failed to load kinds file")?),
        None => None,
    };
    let input = api::kind_input(input, args.kind.as_deref(), kinds.as_ref());
    let opts = EngineOptions {
        learn: !args.no_learn,
        max_cards: args.max_cards,
        ..EngineOptions::default()
    };
    finish(api::extract_snapshot(store, &input, &opts))
}

fn profile_cmd(store: &mut ProfileStore, pc: ProfileCmd) -> anyhow::Result<()> {
    match pc {
        ProfileCmd::Read(ReadArgs { target }) => {
            if target == "all" {
                print_json(ApiResponse::ok(api::list_hosts(store)))
            } else {
                print_json(ApiResponse::ok(api::read_profiles(store, &target)))
            }
        }
        ProfileCmd::Delete(DeleteArgs { target, yes }) => {
            if !yes {
                return print_json(ApiResponse::<()>::err("refusing to delete without --yes"));
            }
            finish(
                api::delete_profiles(store, &target)
                    .map(|removed| serde_json::json!({ "deleted": target, "removed": removed })),
            )
        }
    }
}

fn finish<T: serde::Serialize>(res: crate::Result<T>) -> anyhow::Result<()> {
    match res {
        Ok(v) => print_json(ApiResponse::ok(v)),
        Err(e) => print_json(ApiResponse::<()>::err(e.to_string())),
    }
}

fn print_json<T: serde::Serialize>(val: T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&val)?);
    Ok(())
}
