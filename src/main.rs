use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::try_join_all;

use meenews_player::config::Config;
use meenews_player::controller::{Capabilities, NullTelemetrySink, PlayerController, TelemetrySink};
use meenews_player::logging;
use meenews_player::model::{
    ApiClient, ContentId, ContentRecord, ContentType, FeedQuery, History, HistoryStore,
    JsonFileHistoryStore, PlaybackState, RepeatMode,
};
use meenews_player::platform::headless::{
    HeadlessAudioEngine, HeadlessViewBridge, RemoteSpeechSynthesizer, StderrNotifier,
};
use meenews_player::view;

const STATUS_REFRESH: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "meenews-player", version, about = "Headless MeeNews media player")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, global = true)]
    token: Option<String>,

    /// Directory holding the play history
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a content feed
    Feed {
        #[arg(long, value_enum, default_value_t = FeedKind::Recommend)]
        kind: FeedKind,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Search content
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one content item and what is related to it
    Show { id: String },
    /// Show or clear the local play history
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Play content items as a queue, in the order given
    Play {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        shuffle: bool,
        #[arg(long, value_parser = parse_repeat)]
        repeat: Option<RepeatMode>,
        /// Read articles aloud
        #[arg(long)]
        tts: bool,
        /// Stop after the first item
        #[arg(long)]
        no_autoplay: bool,
        /// Seed for shuffle order
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FeedKind {
    Recommend,
    Daily,
    Follow,
    News,
    Trending,
}

fn parse_repeat(value: &str) -> std::result::Result<RepeatMode, String> {
    value.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(base_url) = cli.base_url.clone() {
        config.api.base_url = base_url;
    }
    if let Some(token) = cli.token.clone() {
        config.api.token = Some(token);
    }
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
    tracing::info!(base_url = %config.api.base_url, "=== MeeNews player starting ===");

    let client = ApiClient::new(&config.api.base_url, config.api.token.clone(), config.api_timeout())
        .context("building API client")?;

    let result = match cli.command {
        Command::Feed {
            kind,
            category,
            page,
            page_size,
        } => {
            let query = FeedQuery::new()
                .with("category", category.unwrap_or_default())
                .page(page, page_size);
            show_feed(&client, kind, &query).await
        }
        Command::Search { query, page } => {
            let query = FeedQuery::new().with("q", query).page(page, 20);
            let results = client.search(&query).await.context("searching")?;
            print_rows(view::content_rows(&results));
            Ok(())
        }
        Command::Show { id } => show_detail(&client, &ContentId::new(id)).await,
        Command::History { clear } => show_history(&config, clear).await,
        Command::Play {
            ids,
            shuffle,
            repeat,
            tts,
            no_autoplay,
            seed,
        } => {
            let mut options = config.player_options();
            options.settings.shuffle |= shuffle;
            options.settings.tts_enabled |= tts;
            options.settings.autoplay_next &= !no_autoplay;
            if let Some(repeat) = repeat {
                options.settings.repeat = repeat;
            }
            options.shuffle_seed = seed;

            let telemetry: Arc<dyn TelemetrySink> = if config.player.telemetry {
                Arc::new(client.clone())
            } else {
                Arc::new(NullTelemetrySink)
            };
            let caps = Capabilities {
                audio: Arc::new(HeadlessAudioEngine::new()),
                view: Arc::new(HeadlessViewBridge::new()),
                speech: Arc::new(RemoteSpeechSynthesizer::new(client.clone())),
                history: Arc::new(JsonFileHistoryStore::new(&config.data_dir)),
                telemetry,
                notifier: Arc::new(StderrNotifier),
            };
            let ids: Vec<ContentId> = ids.into_iter().map(ContentId::new).collect();
            play(&client, caps, options, &ids).await
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = ?e, "Command failed");
    }
    tracing::info!("MeeNews player shutting down");
    result
}

fn print_rows(rows: Vec<String>) {
    for row in rows {
        println!("{}", row);
    }
}

async fn show_feed(client: &ApiClient, kind: FeedKind, query: &FeedQuery) -> Result<()> {
    let results = match kind {
        FeedKind::Recommend => client.recommend(query).await,
        FeedKind::Daily => client.daily_news(query).await,
        FeedKind::Follow => client.follow_content(query).await,
        FeedKind::News => client.news_content(query).await,
        FeedKind::Trending => client.trending(query).await,
    }
    .with_context(|| format!("loading {:?} feed", kind))?;

    if results.is_empty() {
        println!(" No content");
    } else {
        print_rows(view::content_rows(&results));
    }
    Ok(())
}

async fn show_detail(client: &ApiClient, id: &ContentId) -> Result<()> {
    let record = client
        .content_detail(id)
        .await
        .with_context(|| format!("loading content {}", id))?;
    let content_type = ContentType::resolve(&record);

    println!("{} [{}]", record.title, content_type);
    println!("  id: {}", record.id);
    if let Some(duration) = record.duration {
        println!("  duration: {}", meenews_player::model::format_time(duration));
    }
    match content_type {
        ContentType::Audio => println!("  audio: {}", record.audio_source().unwrap_or("-")),
        ContentType::Video => println!("  video: {}", record.video_source().unwrap_or("-")),
        ContentType::Article => println!("  {} characters", record.body().chars().count()),
    }
    let description = record.display_description();
    if !description.is_empty() {
        println!("\n{}", description);
    }

    match client.related(id, &FeedQuery::new().page(1, 5)).await {
        Ok(related) if !related.is_empty() => {
            println!("\nRelated:");
            print_rows(view::content_rows(&related));
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Related content unavailable"),
    }
    Ok(())
}

async fn show_history(config: &Config, clear: bool) -> Result<()> {
    let store = JsonFileHistoryStore::new(&config.data_dir);
    if clear {
        store.save(&[]).await.context("clearing history")?;
        println!(" History cleared");
        return Ok(());
    }

    let history = History::from_entries(
        store.load().await.context("reading history")?,
        config.player.history_capacity,
    );
    if history.is_empty() {
        println!(" No history yet");
    } else {
        print_rows(view::history_rows(history.entries()));
    }
    Ok(())
}

async fn play(
    client: &ApiClient,
    caps: Capabilities,
    options: meenews_player::PlayerOptions,
    ids: &[ContentId],
) -> Result<()> {
    let queue: Vec<ContentRecord> = try_join_all(ids.iter().map(|id| client.content_detail(id)))
        .await
        .context("loading queue")?;
    let Some(first) = queue.first().cloned() else {
        return Ok(());
    };

    let controller = PlayerController::new(caps, options);
    controller.restore_history().await;
    controller
        .play_content(first, Some(queue), 0)
        .await
        .context("starting playback")?;

    let mut refresh = tokio::time::interval(STATUS_REFRESH);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            _ = &mut interrupted => {
                tracing::info!("Interrupted");
                break;
            }
            _ = refresh.tick() => {
                let snapshot = controller.snapshot().await;
                print!("\r{:<120}", view::status_line(&snapshot));
                std::io::stdout().flush().ok();

                let settled_end = snapshot.state == PlaybackState::Ended
                    && snapshot.settings.repeat != RepeatMode::One
                    && !(snapshot.settings.autoplay_next && snapshot.can_play_next);
                let failed = snapshot.state == PlaybackState::Error
                    || (snapshot.state == PlaybackState::Idle && snapshot.error.is_some());
                if settled_end || failed {
                    break;
                }
            }
        }
    }
    println!();

    controller.shutdown().await;
    Ok(())
}
