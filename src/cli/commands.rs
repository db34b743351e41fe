use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use crossbeam_channel::Sender;
use serde::Serialize;
use strum::IntoEnumIterator;
use time::{OffsetDateTime, UtcOffset};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{AppConfig, ConfigPaths};
use crate::dashboard::{aggregate, DashboardSnapshot, TrendPoint};
use crate::error::Error;
use crate::feed::{DashboardFeed, FeedEvent};
use crate::model::{decode_posts, Post};
use crate::schedule::{to_editable, validate_schedule};
use crate::status::{classify, PostStatus};
use crate::timestamp::{format_local, normalize, to_canonical, try_normalize};

const PREVIEW_GRAPHEMES: usize = 48;

#[derive(Args, Debug, Clone, Default)]
pub struct DashboardArgs {
    /// Posts export (JSON array); `-` reads stdin
    #[arg(long)]
    pub posts: Option<PathBuf>,
    /// Evaluate the dashboard at this instant instead of the system clock
    #[arg(long)]
    pub now: Option<String>,
    /// Number of days in the trend series
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=366))]
    pub days: Option<u16>,
    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Posts export (JSON array); `-` reads stdin
    #[arg(long)]
    pub posts: Option<PathBuf>,
    /// Classify against this instant instead of the system clock
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Raw timestamps; values without a zone marker are read as UTC
    #[arg(required = true)]
    pub values: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ScheduleCommand {
    /// Validate wall-clock input and print the instant it schedules
    Check(ScheduleCheckArgs),
    /// Print the editable wall-clock form of an instant (now when omitted)
    Edit(ScheduleEditArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleCheckArgs {
    /// Local wall-clock time, e.g. 2024-01-10T15:30 or "10/01/2024 15:30"
    pub value: String,
    /// Validate against this instant instead of the system clock
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleEditArgs {
    /// Instant to render; unreadable values fall back to now
    pub value: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    pub command: ScheduleCommand,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Posts export to poll (defaults to the data directory export)
    #[arg(long)]
    pub posts: Option<PathBuf>,
    /// Seconds between clock ticks (defaults to the configured interval)
    #[arg(long)]
    pub interval: Option<u64>,
    /// Stop after this many ticks
    #[arg(long)]
    pub ticks: Option<u64>,
}

pub fn show_dashboard(config: Arc<AppConfig>, paths: &ConfigPaths, args: DashboardArgs) -> Result<()> {
    let posts = load_posts(args.posts.as_deref(), paths)?;
    let now = resolve_now(args.now.as_deref())?;
    let zone = config.zone();
    let days = args.days.unwrap_or(config.dashboard.trend_days);
    let snapshot = aggregate(&posts, now, zone, days);

    if args.json {
        let report = DashboardReport::new(&snapshot, now, zone);
        let json = serde_json::to_string_pretty(&report).context("serialising dashboard report")?;
        println!("{json}");
    } else {
        print!("{}", format_dashboard(&snapshot, zone));
    }
    Ok(())
}

pub fn show_status(config: Arc<AppConfig>, paths: &ConfigPaths, args: StatusArgs) -> Result<()> {
    let posts = load_posts(args.posts.as_deref(), paths)?;
    let now = resolve_now(args.now.as_deref())?;
    print!("{}", format_status(&posts, now, config.zone()));
    Ok(())
}

pub fn normalize_timestamps(args: NormalizeArgs) -> Result<()> {
    print!("{}", format_normalized(&args.values));
    Ok(())
}

pub fn handle_schedule_command(config: Arc<AppConfig>, args: ScheduleArgs) -> Result<()> {
    let zone = config.zone();
    match args.command {
        ScheduleCommand::Check(args) => {
            let now = resolve_now(args.now.as_deref())?;
            let message = check_schedule(&args.value, zone, now)?;
            println!("{message}");
        }
        ScheduleCommand::Edit(args) => {
            let instant = args.value.as_deref().and_then(normalize);
            println!("{}", to_editable(instant, zone));
        }
    }
    Ok(())
}

pub fn watch_dashboard(config: Arc<AppConfig>, paths: &ConfigPaths, args: WatchArgs) -> Result<()> {
    let export = args.posts.unwrap_or_else(|| paths.posts_file.clone());
    let interval = args
        .interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.watch.interval());
    let ticks = args.ticks;

    let (tx, rx) = crossbeam_channel::unbounded();
    let producer = thread::Builder::new()
        .name("postdash-watch".into())
        .spawn(move || produce_feed_events(&export, interval, ticks, &tx))
        .context("spawning watch producer")?;

    let mut feed = DashboardFeed::new(config.zone(), config.dashboard.trend_days);
    feed.run(&rx, |snapshot| println!("{}", format_summary(snapshot)));

    producer
        .join()
        .map_err(|_| anyhow!("watch producer panicked"))?
}

fn produce_feed_events(
    export: &Path,
    interval: Duration,
    ticks: Option<u64>,
    tx: &Sender<FeedEvent>,
) -> Result<()> {
    let ticker = crossbeam_channel::tick(interval);
    let mut last_modified: Option<SystemTime> = None;
    let mut sent = 0u64;
    loop {
        let modified = fs::metadata(export).and_then(|meta| meta.modified()).ok();
        if modified.is_some() && modified != last_modified {
            match read_posts_file(export) {
                Ok(posts) => {
                    if tx.send(FeedEvent::Posts(posts)).is_err() {
                        return Ok(());
                    }
                    last_modified = modified;
                }
                Err(err) => tracing::warn!(?err, "failed to reload posts export"),
            }
        }
        if tx.send(FeedEvent::Tick(OffsetDateTime::now_utc())).is_err() {
            return Ok(());
        }
        sent += 1;
        if ticks.is_some_and(|limit| sent >= limit) {
            return Ok(());
        }
        ticker.recv().context("watch ticker stopped")?;
    }
}

fn load_posts(source: Option<&Path>, paths: &ConfigPaths) -> Result<Vec<Post>> {
    match source {
        Some(path) if path == Path::new("-") => {
            let raw = read_stdin()?.context("expected a posts export on stdin")?;
            decode_reporting(&raw)
        }
        Some(path) => read_posts_file(path),
        None => match read_stdin()? {
            Some(raw) => decode_reporting(&raw),
            None => read_posts_file(&paths.posts_file),
        },
    }
}

fn read_posts_file(path: &Path) -> Result<Vec<Post>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading posts export {}", path.display()))?;
    decode_reporting(&raw).with_context(|| format!("decoding posts export {}", path.display()))
}

fn decode_reporting(raw: &str) -> Result<Vec<Post>> {
    let decoded = decode_posts(raw)?;
    if !decoded.rejected.is_empty() {
        tracing::warn!(
            rejected = decoded.rejected.len(),
            accepted = decoded.posts.len(),
            "some post records were skipped"
        );
    }
    Ok(decoded.posts)
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    if buf.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(buf))
}

fn resolve_now(raw: Option<&str>) -> Result<OffsetDateTime> {
    match raw {
        Some(raw) => try_normalize(raw).with_context(|| format!("reading --now {raw}")),
        None => Ok(OffsetDateTime::now_utc()),
    }
}

fn check_schedule(raw: &str, zone: UtcOffset, now: OffsetDateTime) -> Result<String> {
    match validate_schedule(raw, zone, now) {
        Ok(instant) => Ok(format!(
            "Scheduled for {} ({} local)",
            to_canonical(instant),
            to_editable(Some(instant), zone)
        )),
        Err(err @ Error::Validation { .. }) => bail!("cannot schedule in the past: {err}"),
        Err(err) => Err(err).with_context(|| format!("reading schedule '{raw}'")),
    }
}

fn format_dashboard(snapshot: &DashboardSnapshot, zone: UtcOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{:<10} {}", "Posts", snapshot.total);
    for status in PostStatus::iter() {
        let _ = writeln!(&mut out, "{:<10} {}", status.label(), snapshot.count(status));
    }
    let _ = writeln!(&mut out, "{:<10} {}", "Today", snapshot.today_count);

    out.push('\n');
    out.push_str("Upcoming\n");
    write_post_lines(&mut out, &snapshot.upcoming, zone, |post| {
        Some(post.scheduled_time.as_str())
    });
    out.push_str("Recent\n");
    write_post_lines(&mut out, &snapshot.recent, zone, |post| post.posted_at.as_deref());

    out.push('\n');
    let _ = writeln!(
        &mut out,
        "Trend (last {} day{})",
        snapshot.daily_trend.len(),
        if snapshot.daily_trend.len() == 1 { "" } else { "s" }
    );
    for point in &snapshot.daily_trend {
        let _ = write!(&mut out, "  {}  {}", point.label(), point.count);
        if point.count > 0 {
            let _ = write!(&mut out, " {}", "#".repeat(point.count));
        }
        out.push('\n');
    }
    out
}

fn write_post_lines<F>(out: &mut String, posts: &[Post], zone: UtcOffset, when: F)
where
    F: Fn(&Post) -> Option<&str>,
{
    if posts.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    for post in posts {
        let _ = writeln!(
            out,
            "  #{:<4} {}  {}",
            post.id,
            format_local(when(post), zone),
            preview(&post.content)
        );
    }
}

fn format_summary(snapshot: &DashboardSnapshot) -> String {
    format!(
        "total={} scheduled={} posted={} overdue={} unknown={} today={} trend={}",
        snapshot.total,
        snapshot.scheduled_count,
        snapshot.posted_count,
        snapshot.overdue_count,
        snapshot.unknown_count,
        snapshot.today_count,
        snapshot.trend_total()
    )
}

fn format_status(posts: &[Post], now: OffsetDateTime, zone: UtcOffset) -> String {
    if posts.is_empty() {
        return "No posts found.\n".to_string();
    }
    let mut out = String::new();
    for post in posts {
        let status = classify(post, now);
        let _ = write!(
            &mut out,
            "#{:<4} {:<11} scheduled {}",
            post.id,
            format!("[{}]", status.label()),
            format_local(Some(post.scheduled_time.as_str()), zone)
        );
        if let Some(posted_at) = post.posted_at.as_deref() {
            let _ = write!(&mut out, "  posted {}", format_local(Some(posted_at), zone));
        }
        let images = post.sources().count();
        if images > 0 {
            let _ = write!(
                &mut out,
                "  {} image{}",
                images,
                if images == 1 { "" } else { "s" }
            );
        }
        let _ = writeln!(&mut out, "  {}", preview(&post.content));
        if let Err(err) = post.check_consistency() {
            tracing::warn!(%err, "inconsistent post record");
            let _ = writeln!(&mut out, "      ! {err}");
        }
    }
    out
}

fn format_normalized(values: &[String]) -> String {
    let mut out = String::new();
    for raw in values {
        let rendered = normalize(raw)
            .map(to_canonical)
            .unwrap_or_else(|| "unparsable".to_string());
        let _ = writeln!(&mut out, "{raw}\t{rendered}");
    }
    out
}

/// First non-blank line of the content, cut at a grapheme boundary.
fn preview(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("<empty>");
    let mut graphemes = line.graphemes(true);
    let mut cut: String = graphemes.by_ref().take(PREVIEW_GRAPHEMES).collect();
    if graphemes.next().is_some() {
        cut.push('…');
    }
    cut
}

#[derive(Debug, Serialize)]
struct DashboardReport<'a> {
    generated_at: String,
    zone: String,
    total: usize,
    scheduled: usize,
    posted: usize,
    overdue: usize,
    unknown: usize,
    today: usize,
    upcoming: Vec<PostLine<'a>>,
    recent: Vec<PostLine<'a>>,
    daily_trend: Vec<TrendLine>,
}

#[derive(Debug, Serialize)]
struct PostLine<'a> {
    id: i64,
    content: &'a str,
    scheduled_time: Option<String>,
    posted_at: Option<String>,
    facebook_post_id: Option<&'a str>,
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TrendLine {
    date: String,
    label: String,
    count: usize,
}

impl<'a> DashboardReport<'a> {
    fn new(snapshot: &'a DashboardSnapshot, now: OffsetDateTime, zone: UtcOffset) -> Self {
        Self {
            generated_at: to_canonical(now),
            zone: zone.to_string(),
            total: snapshot.total,
            scheduled: snapshot.scheduled_count,
            posted: snapshot.posted_count,
            overdue: snapshot.overdue_count,
            unknown: snapshot.unknown_count,
            today: snapshot.today_count,
            upcoming: snapshot.upcoming.iter().map(PostLine::from).collect(),
            recent: snapshot.recent.iter().map(PostLine::from).collect(),
            daily_trend: snapshot.daily_trend.iter().map(TrendLine::from).collect(),
        }
    }
}

impl<'a> From<&'a Post> for PostLine<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            id: post.id,
            content: &post.content,
            scheduled_time: post.scheduled_instant().map(to_canonical),
            posted_at: post.posted_instant().map(to_canonical),
            facebook_post_id: post.facebook_post_id.as_deref(),
            images: post.sources().map(|source| source.public_url()).collect(),
        }
    }
}

impl From<&TrendPoint> for TrendLine {
    fn from(point: &TrendPoint) -> Self {
        Self {
            date: point.date.to_string(),
            label: point.label(),
            count: point.count,
        }
    }
}
