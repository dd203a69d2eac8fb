use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{load_settings, FeedClient, FeedEvent, MediaFile, MutationOutcome, NoticeLevel};
use serde_json::json;
use shared::domain::{CommentId, PostId, VoteDirection, VoteTarget};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Vote, share and upload media against a feed API")]
struct Cli {
    /// Overrides the configured API base url.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Vote {
        #[arg(long, conflicts_with = "comment", required_unless_present = "comment")]
        post: Option<i64>,
        #[arg(long)]
        comment: Option<i64>,
        #[arg(long, value_enum)]
        direction: Direction,
    },
    Share {
        #[arg(long)]
        post: i64,
    },
    Upload {
        path: PathBuf,
        /// Media type sent with the file; guessed from the extension if omitted.
        #[arg(long)]
        mime: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for VoteDirection {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Up => VoteDirection::Up,
            Direction::Down => VoteDirection::Down,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    let client = FeedClient::from_settings(&settings)?;
    info!(api = %settings.api_base_url, "feed client ready");

    let mut events = client.subscribe_events();
    let notices = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let FeedEvent::Notice { level, message } = event {
                match level {
                    NoticeLevel::Info | NoticeLevel::Success => info!("{message}"),
                    NoticeLevel::Error => warn!("{message}"),
                }
            }
        }
    });

    let output = match cli.command {
        Command::Vote {
            post,
            comment,
            direction,
        } => {
            let target = match (post, comment) {
                (Some(post), None) => VoteTarget::Post(PostId(post)),
                (None, Some(comment)) => VoteTarget::Comment(CommentId(comment)),
                _ => bail!("pass exactly one of --post or --comment"),
            };
            let outcome = client.vote(target, direction.into()).await;
            let state = client.store().vote(&target.entity());
            json!({
                "entity": target.entity(),
                "outcome": outcome_label(&outcome),
                "state": state,
                "score": state.net(),
            })
        }
        Command::Share { post } => {
            let post_id = PostId(post);
            let outcome = client.share(post_id).await;
            json!({
                "post_id": post_id,
                "outcome": outcome_label(&outcome),
                "state": outcome.state(),
            })
        }
        Command::Upload { path, mime } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());
            let mime_type = mime
                .or_else(|| mime_guess::from_path(&path).first_raw().map(str::to_string))
                .unwrap_or_else(|| "application/octet-stream".to_string());

            match client.upload(MediaFile::new(filename, mime_type, bytes)).await {
                Ok(media) => json!({ "media": media, "state": client.uploads().state() }),
                Err(err) => {
                    error!(error = %err, "upload did not complete");
                    json!({ "error": err.to_string(), "state": client.uploads().state() })
                }
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    // Closing the store ends the notice stream once it is drained.
    drop(client);
    let _ = notices.await;
    Ok(())
}

fn outcome_label<S>(outcome: &MutationOutcome<S>) -> &'static str {
    match outcome {
        MutationOutcome::Confirmed(_) => "confirmed",
        MutationOutcome::RolledBack { .. } => "rolled_back",
        MutationOutcome::Dropped => "dropped",
    }
}
