//! Command-line client for the corkboard relay and whiteboard core.
//!
//! Every command drives the same headless [`Whiteboard`] a browser would,
//! presenting through a [`NullTarget`]. `--channel ws` syncs with a relay,
//! `--channel local` uses an in-process bus and reports what a second
//! session on that bus sees.

mod channel;
mod content;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use canvas::camera::{Point, Viewport};
use canvas::config::BoardConfig;
use canvas::input::{Button, Tool};
use canvas::layout::{Placement, PlacedNote, layout_notes};
use canvas::render::NullTarget;
use canvas::session::{Clock, SystemClock, Whiteboard};
use canvas::sync::{ChannelConfig, LocalBus, SyncError};
use canvas::texture::bake_note_texture;
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};

use crate::channel::WsConnector;

/// How long a session pumps sync before acting, so the relay snapshot is
/// applied first.
const SETTLE: Duration = Duration::from_millis(300);
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("invalid board config: {0}")]
    Config(#[source] serde_json::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope encoding failed: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("sync channel: {0}")]
    Sync(#[from] SyncError),
    #[error("no note with id `{0}`")]
    NoteNotFound(String),
    #[error("stroke was not committed; draw needs at least two points")]
    NothingDrawn,
    #[error("image export failed: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Parser, Debug)]
#[command(name = "corkboard-cli", about = "Corkboard whiteboard client")]
struct Cli {
    /// HTTP base URL of the relay; the websocket URL is derived from it.
    #[arg(long, env = "CORKBOARD_RELAY_URL", default_value = "http://127.0.0.1:3000")]
    relay_url: String,

    /// Content API URL returning a JSON array of note records.
    #[arg(long, env = "CORKBOARD_CONTENT_URL")]
    content_url: Option<String>,

    #[arg(long, default_value = "lobby")]
    board: String,

    #[arg(long, value_enum, default_value_t = ChannelKind::Ws)]
    channel: ChannelKind,

    /// Viewport width in pixels.
    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    /// Viewport height in pixels.
    #[arg(long, default_value_t = 720.0)]
    height: f64,

    /// Partial board config as JSON, e.g. `{"stroke_color": "#ff0000"}`.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ChannelKind {
    Ws,
    Local,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the relay's health endpoint.
    Ping,
    /// Fetch content, lay out the notes, print one JSON line per note.
    Notes {
        /// Seed for placement and tilt; random when absent.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Bake one note's texture to a PNG file.
    Texture {
        /// Note id; the first note when absent.
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Draw one stroke through the input router and publish it.
    Draw {
        /// World-space points, e.g. `"0,0 100,0 100,100"`.
        #[arg(long, value_parser = parse_points)]
        points: PointList,
    },
    /// Clear every committed stroke on the board.
    Clear,
    /// Print incoming envelopes as JSON lines.
    Watch {
        /// Stop after this many envelopes.
        #[arg(long)]
        count: Option<usize>,
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
    },
}

/// World-space points given on the command line.
#[derive(Debug, Clone, PartialEq)]
struct PointList(Vec<Point>);

/// Settings shared by every command.
struct CliContext {
    relay_url: String,
    content_url: Option<String>,
    board: String,
    channel: ChannelKind,
    viewport: Viewport,
    config: BoardConfig,
}

/// A configured medium plus the handle needed to flush or inspect it.
struct Link {
    channel: ChannelConfig,
    ws: Option<WsConnector>,
    bus: Option<LocalBus>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(text) => BoardConfig::from_json(text).map_err(CliError::Config)?,
        None => BoardConfig::default(),
    };
    let ctx = CliContext {
        relay_url: cli.relay_url,
        content_url: cli.content_url,
        board: cli.board,
        channel: cli.channel,
        viewport: Viewport::new(cli.width, cli.height),
        config,
    };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Notes { seed } => run_notes(&ctx, seed).await,
        Command::Texture { id, out, seed } => run_texture(&ctx, id, out, seed).await,
        Command::Draw { points } => run_draw(&ctx, &points.0).await,
        Command::Clear => run_clear(&ctx).await,
        Command::Watch { count, seconds } => run_watch(&ctx, count, seconds).await,
    }
}

// =============================================================================
// CONTENT COMMANDS
// =============================================================================

async fn run_ping(ctx: &CliContext) -> Result<(), CliError> {
    let url = format!("{}/healthz", ctx.relay_url.trim_end_matches('/'));
    let status = reqwest::Client::new().get(url).send().await?.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn laid_out_notes(ctx: &CliContext, seed: Option<u64>) -> Vec<PlacedNote> {
    let client = reqwest::Client::new();
    let records = content::load_records(&client, ctx.content_url.as_deref()).await;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    layout_notes(&records, ctx.viewport, &BTreeMap::new(), &ctx.config.layout, &mut rng)
}

async fn run_notes(ctx: &CliContext, seed: Option<u64>) -> Result<(), CliError> {
    for placed in laid_out_notes(ctx, seed).await {
        println!("{}", serde_json::to_string(&note_json(&placed))?);
    }
    Ok(())
}

async fn run_texture(ctx: &CliContext, id: Option<String>, out: PathBuf, seed: Option<u64>) -> Result<(), CliError> {
    let notes = laid_out_notes(ctx, seed).await;
    let placed = match &id {
        Some(id) => notes.iter().find(|p| &p.note.id == id),
        None => notes.first(),
    }
    .ok_or_else(|| CliError::NoteNotFound(id.clone().unwrap_or_default()))?;

    let texture = bake_note_texture(&placed.note);
    texture.save(&out)?;
    println!(
        "{}",
        json!({ "id": placed.note.id, "path": out.display().to_string(), "width": texture.width(), "height": texture.height() })
    );
    Ok(())
}

fn note_json(placed: &PlacedNote) -> Value {
    let note = &placed.note;
    json!({
        "id": note.id,
        "header": note.header,
        "x": note.position.x,
        "y": note.position.y,
        "width": note.width,
        "height": note.height,
        "rotation_deg": note.rotation_deg,
        "color": note.color.hex(),
        "placement": placement_label(placed.placement),
    })
}

fn placement_label(placement: Placement) -> &'static str {
    match placement {
        Placement::Placed { .. } => "placed",
        Placement::Fallback => "fallback",
        Placement::Cached => "cached",
    }
}

// =============================================================================
// SESSION COMMANDS
// =============================================================================

fn link(ctx: &CliContext) -> Link {
    match ctx.channel {
        ChannelKind::Ws => {
            let connector = WsConnector::new(&ctx.relay_url, &ctx.board);
            Link { channel: ChannelConfig::Custom(Box::new(connector.clone())), ws: Some(connector), bus: None }
        }
        ChannelKind::Local => {
            let bus = LocalBus::new(ctx.config.presence_timeout_ms);
            Link { channel: ChannelConfig::Local(bus.clone()), ws: None, bus: Some(bus) }
        }
    }
}

fn open_session(ctx: &CliContext, link: &Link) -> Whiteboard {
    Whiteboard::new(
        ctx.config.clone(),
        ctx.viewport,
        &link.channel,
        Box::new(NullTarget::default()),
        Box::new(SystemClock),
    )
}

/// Run animation frames for `duration` so inbound sync is applied.
async fn settle(board: &mut Whiteboard, duration: Duration) {
    let mut ticker = tokio::time::interval(FRAME);
    let deadline = tokio::time::Instant::now() + duration;
    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        board.tick(SystemClock.now_ms());
    }
}

/// Close the session and wait for its queued envelopes to reach the medium.
/// On the local bus, report what a late-joining session converges to.
async fn finish(ctx: &CliContext, mut board: Whiteboard, link: &Link) {
    board.teardown();
    if let Some(ws) = &link.ws {
        ws.finish().await;
    }
    if link.bus.is_some() {
        let mut observer = open_session(ctx, link);
        observer.tick(SystemClock.now_ms());
        println!(
            "{}",
            json!({ "observer": observer.session_id(), "strokes": observer.store().len(), "users": observer.connected_users() })
        );
    }
}

/// Drag the draw tool through `points` (world space) as pointer input.
fn trace_stroke(board: &mut Whiteboard, points: &[Point]) {
    board.set_tool(Tool::Draw);
    let screen: Vec<Point> = points
        .iter()
        .map(|p| board.camera().world_to_pointer(*p, board.viewport()))
        .collect();
    if let Some((first, rest)) = screen.split_first() {
        board.pointer_down(*first, Button::Primary);
        for p in rest {
            board.pointer_move(*p);
        }
        board.pointer_up();
    }
}

async fn run_draw(ctx: &CliContext, points: &[Point]) -> Result<(), CliError> {
    let link = link(ctx);
    let mut board = open_session(ctx, &link);
    settle(&mut board, SETTLE).await;

    let before = board.store().len();
    trace_stroke(&mut board, points);
    board.tick(SystemClock.now_ms());

    let committed = (board.store().len() > before)
        .then(|| board.store().list().last())
        .flatten()
        .cloned();
    let Some(stroke) = committed else {
        finish(ctx, board, &link).await;
        return Err(CliError::NothingDrawn);
    };
    println!(
        "{}",
        json!({ "id": stroke.id, "author": stroke.author, "points": stroke.points.len(), "color": stroke.color })
    );
    finish(ctx, board, &link).await;
    Ok(())
}

async fn run_clear(ctx: &CliContext) -> Result<(), CliError> {
    let link = link(ctx);
    let mut board = open_session(ctx, &link);
    settle(&mut board, SETTLE).await;

    let cleared = board.store().len();
    board.clear();
    board.tick(SystemClock.now_ms());
    println!("{}", json!({ "cleared": cleared, "session": board.session_id() }));
    finish(ctx, board, &link).await;
    Ok(())
}

async fn run_watch(ctx: &CliContext, count: Option<usize>, seconds: Option<u64>) -> Result<(), CliError> {
    let link = link(ctx);
    let session = format!("watch-{}", uuid::Uuid::new_v4().simple());
    let Some(mut channel) = link.channel.connect(&session, SystemClock.now_ms())? else {
        return Ok(());
    };

    let limit = count.unwrap_or(usize::MAX);
    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let mut ticker = tokio::time::interval(FRAME);
    let mut seen = 0;

    while seen < limit && deadline.is_none_or(|d| tokio::time::Instant::now() < d) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        for envelope in channel.drain() {
            println!("{}", frames::envelope_to_json(&envelope)?);
            seen += 1;
            if seen >= limit {
                break;
            }
        }
    }

    channel.close();
    if let Some(ws) = &link.ws {
        ws.finish().await;
    }
    Ok(())
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse `"x,y x,y ..."` (whitespace or `;` separated) into world points.
fn parse_points(raw: &str) -> Result<PointList, String> {
    raw.split(|c: char| c.is_whitespace() || c == ';')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (x, y) = pair.split_once(',').ok_or_else(|| format!("`{pair}` is not x,y"))?;
            Ok(Point::new(parse_coord(x)?, parse_coord(y)?))
        })
        .collect::<Result<Vec<_>, String>>()
        .map(PointList)
}

fn parse_coord(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("`{raw}` is not a finite number")),
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
