use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use fp_core::{
    ArticleRecord, EditorSession, Error, ItemQuery, ListId, ListOptions, ListSync, RawItem, Result, SaveRequest,
    SyncState, VersionGate,
};
use fp_render::{ArticleDefaults, BuiltinTemplates, ListRenderer, RenderContext, VecSource};
use fp_storage::{create_storage, StorageConfig, StorageKind};
use fp_web::{AppState, HttpSyncClient};
use serde::Serialize;
use tracing::{info, warn};

mod logging;

/// Polling interval such as `30s`, `5m` or `1h15m`; a bare number is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total = 0u64;
        let mut digits = String::new();
        let mut seen = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if c.is_whitespace() {
                continue;
            }
            let n: u64 = digits
                .parse()
                .map_err(|_| format!("Missing number before unit {:?}", c))?;
            let scale = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                _ => return Err(format!("Invalid duration unit: {}", c)),
            };
            total = n
                .checked_mul(scale)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(|| format!("Duration too large: {}", s))?;
            digits.clear();
            seen = true;
        }
        if !digits.is_empty() {
            let secs = digits.parse::<u64>().map_err(|e| e.to_string())?;
            total = total
                .checked_add(secs)
                .ok_or_else(|| format!("Duration too large: {}", s))?;
            seen = true;
        }
        if !seen || total == 0 {
            return Err("Duration must be a positive amount".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Article lists: render, serve and sync", long_about = None)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, global = true, env = "FP_STORAGE", default_value = "memory")]
    storage: String,
    #[arg(long, global = true, env = "FP_DB_PATH", default_value = "lists.db")]
    db_path: PathBuf,
    /// Default log filter; RUST_LOG overrides it
    #[arg(long, global = true, env = "FP_LOG", default_value = "info")]
    log_level: String,
    /// Versions a save may lag behind the stored one and still be accepted
    #[arg(long, global = true, default_value_t = 0)]
    tolerance: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the list API
    Serve {
        #[arg(long, env = "FP_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
    /// Render items from a JSON file to stdout
    Render(RenderArgs),
    /// Talk to a running server
    Sync {
        #[arg(long, env = "FP_SERVER", default_value = "http://127.0.0.1:8080")]
        server: String,
        #[arg(long, env = "FP_ACTOR")]
        actor: String,
        #[command(subcommand)]
        command: SyncCommands,
    },
}

#[derive(Args, Debug, Clone)]
struct RenderArgs {
    /// JSON array of items, newest first
    #[arg(long)]
    items: PathBuf,
    #[arg(long, default_value_t = 0)]
    offset: usize,
    #[arg(long)]
    limit: Option<usize>,
    /// Item ids to leave out, comma separated
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<u64>,
    #[arg(long, default_value_t = fp_core::DEFAULT_LIST_WIDTH)]
    width: u32,
    #[arg(long, default_value = "")]
    suffix: String,
    #[arg(long, default_value = fp_core::DEFAULT_TEMPLATE)]
    template: String,
    #[arg(long)]
    no_filters: bool,
    /// Default article size for items that carry none
    #[arg(long)]
    size: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum SyncCommands {
    /// Create an empty list
    Create {
        title: String,
        #[arg(long, default_value = fp_core::DEFAULT_TEMPLATE)]
        template: String,
        #[arg(long, default_value_t = fp_core::DEFAULT_LIST_WIDTH)]
        width: u32,
    },
    /// Print a list, the latest version unless --version is given
    Load {
        id: ListId,
        #[arg(long)]
        version: Option<u64>,
    },
    /// Ask whether the stored list is newer than --version
    Check {
        id: ListId,
        #[arg(long)]
        version: u64,
    },
    /// Save articles read from a JSON file
    Save {
        id: ListId,
        #[arg(long)]
        file: PathBuf,
        /// Version the articles were edited against
        #[arg(long)]
        version: u64,
        #[arg(long)]
        preview: bool,
        /// Overwrite regardless of the stored version
        #[arg(long)]
        force: bool,
    },
    /// Print the latest preview of a list
    Preview { id: ListId },
    /// Print the auto-load lists, or replace them when ids are given
    Setup { ids: Vec<ListId> },
    /// Search the content repository
    Query {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Poll a list until someone else saves a newer version
    Watch {
        id: ListId,
        #[arg(long, default_value = "30s")]
        interval: HumanDuration,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_renderer(args: &RenderArgs) -> ListRenderer {
    let mut renderer = ListRenderer::new(Arc::new(BuiltinTemplates))
        .with_template(args.template.clone())
        .with_list_width(args.width)
        .with_filter_suffix(args.suffix.clone())
        .with_default_properties(ArticleDefaults {
            size: args.size,
            ..Default::default()
        });
    renderer.toggle_filters(!args.no_filters);
    renderer
}

/// Stream the rendered articles into `out`, returning how many were emitted.
fn render_items<W: Write + ?Sized>(items: Vec<RawItem>, args: &RenderArgs, out: &mut W) -> Result<usize> {
    let renderer = build_renderer(args);
    let mut ctx = RenderContext::new()
        .with_offset(args.offset)
        .with_limit(args.limit)
        .excluding(args.exclude.iter().copied());
    let emitted = renderer.render_to(&mut VecSource::new(items), &mut ctx, out)?;
    out.flush()?;
    Ok(emitted)
}

async fn watch(client: Arc<HttpSyncClient>, id: ListId, interval: Duration) -> Result<()> {
    let mut session = EditorSession::open(client, id, None).await?;
    info!("👀 Watching list {} from version {}", id, session.version());
    loop {
        tokio::time::sleep(interval).await;
        match session.poll().await {
            Ok(SyncState::ConflictDetected) => {
                warn!("⚠️ List {} was saved by someone else; reload before saving", id);
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if e.is_recoverable() => warn!("⚠️ Version check failed, retrying: {}", e),
            Err(e) => return Err(e),
        }
    }
}

async fn run_sync(client: HttpSyncClient, command: SyncCommands) -> Result<()> {
    match command {
        SyncCommands::Create { title, template, width } => {
            let options = ListOptions {
                template,
                width,
                ..Default::default()
            };
            print_json(&client.create_list(&title, &options).await?)
        }
        SyncCommands::Load { id, version } => print_json(&client.load_list(id, version).await?),
        SyncCommands::Check { id, version } => {
            let newer = client.check_newer_version(id, version).await?;
            print_json(&serde_json::json!({ "newer": newer }))
        }
        SyncCommands::Save {
            id,
            file,
            version,
            preview,
            force,
        } => {
            let articles: Vec<ArticleRecord> = read_json(&file)?;
            let request = SaveRequest {
                articles,
                version,
                preview,
                force,
            };
            let saved = client.save_list(id, &request).await?;
            info!("💾 List {} saved (version {})", id, saved);
            print_json(&serde_json::json!({ "version": saved }))
        }
        SyncCommands::Preview { id } => print_json(&client.load_preview(id).await?),
        SyncCommands::Setup { ids } if ids.is_empty() => print_json(&client.load_list_setup().await?),
        SyncCommands::Setup { ids } => {
            client.save_list_setup(&ids).await?;
            print_json(&ids)
        }
        SyncCommands::Query { search, author, limit } => {
            let query = ItemQuery {
                search,
                author,
                limit,
                ..Default::default()
            };
            print_json(&client.query_posts(&query).await?)
        }
        SyncCommands::Watch { id, interval } => watch(Arc::new(client), id, interval.0).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match cli.command {
        Commands::Serve { addr } => {
            let config = StorageConfig {
                kind: StorageKind::from_str(&cli.storage)?,
                db_path: cli.db_path,
                gate: VersionGate::new(cli.tolerance),
            };
            let storage = create_storage(&config).await?;
            info!("✨ Starting server (storage {})", cli.storage);
            fp_web::serve(addr, AppState::new(storage)).await
        }
        Commands::Render(args) => {
            let items: Vec<RawItem> = read_json(&args.items)?;
            info!("📰 Rendering {} items with template {}", items.len(), args.template);
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let emitted = render_items(items, &args, &mut out)?;
            info!("✅ {} articles rendered", emitted);
            Ok(())
        }
        Commands::Sync { server, actor, command } => {
            if actor.trim().is_empty() {
                return Err(Error::InvalidInput("--actor must not be empty".to_string()));
            }
            let client = HttpSyncClient::new(&server, actor)?;
            run_sync(client, command).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64) -> RawItem {
        RawItem {
            id,
            title: format!("Story {}", id),
            body: format!("<p>Body {}</p>", id),
            permalink: format!("https://example.com/{}", id),
            date: "2024-06-01".to_string(),
            author: None,
            size: None,
            image: None,
        }
    }

    fn render_args(extra: &[&str]) -> RenderArgs {
        let mut argv = vec!["fp", "render", "--items", "items.json"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Render(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_human_duration() {
        assert_eq!("30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(30));
        assert_eq!("1h15m".parse::<HumanDuration>().unwrap().0, Duration::from_secs(4500));
        assert_eq!("45".parse::<HumanDuration>().unwrap().0, Duration::from_secs(45));
        assert!("".parse::<HumanDuration>().is_err());
        assert!("3d".parse::<HumanDuration>().is_err());
        assert!("m".parse::<HumanDuration>().is_err());
        assert!("99999999999999999h".parse::<HumanDuration>().is_err());
        assert!("18446744073709551615s 1".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_render_defaults() {
        let args = render_args(&[]);
        assert_eq!(args.width, 468);
        assert_eq!(args.template, "article");
        assert!(args.exclude.is_empty());
        assert!(!args.no_filters);
    }

    #[test]
    fn test_render_streams_selected_items() {
        let args = render_args(&["--template", "compact", "--offset", "1", "--limit", "2", "--exclude", "3,9"]);
        let mut out = Vec::new();
        let emitted = render_items((1..=5).map(item).collect(), &args, &mut out).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert_eq!(emitted, 2);
        assert!(html.contains(r#"data-post="2""#));
        assert!(html.contains(r#"data-post="4""#));
        assert!(!html.contains(r#"data-post="3""#));
    }

    #[test]
    fn test_size_default_applies() {
        let args = render_args(&["--size", "40"]);
        let mut out = Vec::new();
        render_items(vec![item(1)], &args, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("fp-size-40"));
    }

    #[test]
    fn test_sync_save_arguments() {
        let cli = Cli::try_parse_from(["fp", "sync", "--actor", "ana", "save", "3", "--file", "a.json", "--version", "5"])
            .unwrap();
        match cli.command {
            Commands::Sync {
                command: SyncCommands::Save { id, version, force, .. },
                ..
            } => {
                assert_eq!((id, version, force), (3, 5, false));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
