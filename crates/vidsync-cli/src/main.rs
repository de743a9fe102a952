//! vidsync: end-to-end encrypted sync client
//!
//! Account:
//!   login | register | logout | whoami
//!
//! Entries:
//!   sync                          - full reconciliation pass
//!   get | set | delete | keys     - keyed JSON entries
//!   resolve <key> --use <how>     - settle a sync conflict
//!
//! Stacks and downloads:
//!   stack list|show|delete|activate|move|visit
//!   download request|cancel|list|watch
//!
//!   config show                   - display current configuration

mod page;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use secrecy::SecretString;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use vidsync_core::config::{expand_path, VidsyncConfig};
use vidsync_core::types::{FileType, TagField, TagValue};
use vidsync_crypto::{validate_password, validate_username, Login};
use vidsync_stack::{
    move_items, MoveAction, MoveDirection, Platform, PlayerManager, StackItem, StackManager,
    StackNameWithId, UrlExtractor, WatchStack, STACK_ID_CURRENT,
};
use vidsync_storage::JsonFileStore;
use vidsync_sync::account::{self, restore_login, store_login};
use vidsync_sync::{
    ConflictCoordinator, DownloadJob, DownloadQueue, EntryStore, HttpRemote, LoginSlot,
    PolicyResolver, ProgressListener, Resolution, SyncError, SyncWarnHandler, WarningPublisher,
};

use page::UrlPage;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "vidsync",
    version,
    about = "End-to-end encrypted sync for video front-ends",
    long_about = "vidsync: sync watch stacks and extension data between devices, and queue server-side downloads"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(
        long,
        short = 'c',
        env = "VIDSYNC_CONFIG",
        default_value = "~/.config/vidsync/config.toml"
    )]
    config: PathBuf,

    /// Log level or filter directive (overrides config; RUST_LOG wins over both)
    #[arg(long, env = "VIDSYNC_LOG")]
    log: Option<String>,

    /// Log output format
    #[arg(long, env = "VIDSYNC_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and keep the derived key for later runs
    Login(CredentialArgs),

    /// Create an account on the sync server and log in
    Register(CredentialArgs),

    /// Forget the stored login
    Logout {
        /// Keep locally cached entries
        #[arg(long)]
        keep_data: bool,
    },

    /// Show the logged-in user
    Whoami,

    /// Reconcile all entries with the server
    Sync,

    /// Print an entry
    Get { key: String },

    /// Write an entry
    Set {
        key: String,
        /// JSON value
        value: String,
    },

    /// Delete an entry
    Delete { key: String },

    /// List entry keys
    Keys {
        #[arg(long, short = 'p', default_value = "")]
        prefix: String,
        /// Leave out keys that were only written locally
        #[arg(long)]
        synced_only: bool,
    },

    /// Settle a sync conflict
    Resolve {
        key: String,
        /// local, remote or rename
        #[arg(long = "use")]
        resolution: String,
    },

    /// Watch stacks
    Stack {
        #[command(subcommand)]
        action: StackAction,
    },

    /// Server-side downloads
    Download {
        #[command(subcommand)]
        action: DownloadAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct CredentialArgs {
    #[arg(long, short = 'u', env = "VIDSYNC_USERNAME")]
    username: String,

    /// Prompted for when not set
    #[arg(long, env = "VIDSYNC_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum StackAction {
    /// List named stacks
    List,
    /// Print the items of a stack, top first (`current` for the current stack)
    Show { id: String },
    /// Delete a named stack
    Delete { id: String },
    /// Make a stack the base of the current stack and open its top item
    Activate { id: String },
    /// Move items of a stack (indexes counted from the top)
    Move {
        id: String,
        #[arg(value_enum)]
        direction: MoveArg,
        #[arg(required = true)]
        indexes: Vec<usize>,
    },
    /// Record a visit of a front-end page in the current stack
    Visit {
        url: Url,
        #[arg(long)]
        title: Option<String>,
        /// Watched position in seconds
        #[arg(long)]
        time: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum DownloadAction {
    /// Ask the server to download a video
    Request {
        video_id: String,
        #[arg(long = "type", value_enum, default_value = "video")]
        file_type: FileTypeArg,
        /// File name without extension (default: video id)
        #[arg(long)]
        filename: Option<String>,
        /// Metadata tag as FIELD=VALUE (title, artist, genre, album, album-artist)
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<TagValue>,
    },
    /// Cancel a running download
    Cancel { id: String },
    /// List running downloads
    List,
    /// Poll running downloads until they finish
    Watch,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FileTypeArg {
    Mp3,
    Video,
}

impl From<FileTypeArg> for FileType {
    fn from(arg: FileTypeArg) -> Self {
        match arg {
            FileTypeArg::Mp3 => FileType::Mp3,
            FileTypeArg::Video => FileType::Video,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum MoveArg {
    Top,
    Up,
    Down,
    Bottom,
}

impl From<MoveArg> for MoveDirection {
    fn from(arg: MoveArg) -> Self {
        match arg {
            MoveArg::Top => MoveDirection::Top,
            MoveArg::Up => MoveDirection::Up,
            MoveArg::Down => MoveDirection::Down,
            MoveArg::Bottom => MoveDirection::Bottom,
        }
    }
}

fn parse_tag(s: &str) -> Result<TagValue, String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{s}'"))?;
    let field = match field.to_ascii_lowercase().replace('_', "-").as_str() {
        "title" => TagField::Title,
        "artist" => TagField::Artist,
        "genre" => TagField::Genre,
        "album" => TagField::Album,
        "album-artist" => TagField::AlbumArtist,
        other => return Err(format!("unknown tag field '{other}'")),
    };
    Ok(TagValue {
        field,
        value: value.to_string(),
    })
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_path(&cli.config);
    let (config, from_file) = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_tracing(&level, format);

    if !from_file {
        tracing::warn!(path = %config_path.display(), "config file not found, using defaults");
    }

    if let Commands::Config {
        action: ConfigAction::Show,
    } = &cli.command
    {
        return cmd_config_show(&config, &config_path, from_file);
    }

    let app = App::open(config).await?;

    match cli.command {
        Commands::Login(args) => cmd_login(&app, args).await,
        Commands::Register(args) => cmd_register(&app, args).await,
        Commands::Logout { keep_data } => cmd_logout(&app, keep_data).await,
        Commands::Whoami => cmd_whoami(&app),
        Commands::Sync => cmd_sync(&app).await,
        Commands::Get { key } => cmd_get(&app, &key).await,
        Commands::Set { key, value } => cmd_set(&app, &key, &value).await,
        Commands::Delete { key } => cmd_delete(&app, &key).await,
        Commands::Keys {
            prefix,
            synced_only,
        } => cmd_keys(&app, &prefix, synced_only).await,
        Commands::Resolve { key, resolution } => cmd_resolve(&app, &key, &resolution).await,
        Commands::Stack { action } => cmd_stack(&app, action).await,
        Commands::Download { action } => cmd_download(&app, action).await,
        Commands::Config { .. } => Ok(()),
    }
}

// ── Config and logging ────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<(VidsyncConfig, bool)> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((VidsyncConfig::default(), false))
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Services ──────────────────────────────────────────────────────────────────

/// Background sync failures are shown to the user as warnings.
struct StderrWarnings;

#[async_trait]
impl SyncWarnHandler for StderrWarnings {
    async fn warn(&self, message: &str, error: Option<&SyncError>) -> anyhow::Result<()> {
        match error {
            Some(e) => eprintln!("warning: {message}: {e}"),
            None => eprintln!("warning: {message}"),
        }
        Ok(())
    }
}

struct App {
    config: VidsyncConfig,
    remote: Arc<HttpRemote>,
    local: Arc<JsonFileStore>,
    session: Arc<JsonFileStore>,
    login: LoginSlot,
    store: Arc<EntryStore>,
    sync: Arc<ConflictCoordinator>,
    urls: Arc<dyn UrlExtractor>,
}

impl App {
    async fn open(config: VidsyncConfig) -> Result<Self> {
        let remote = Arc::new(HttpRemote::from_config(&config.server).context("building HTTP client")?);

        let data_file = expand_path(&config.storage.data_file);
        let session_file = expand_path(&config.storage.session_file);
        let local = Arc::new(
            JsonFileStore::open(&data_file)
                .await
                .with_context(|| format!("opening local store: {}", data_file.display()))?,
        );
        let session = Arc::new(
            JsonFileStore::open(&session_file)
                .await
                .with_context(|| format!("opening session store: {}", session_file.display()))?,
        );

        let login = LoginSlot::new(
            restore_login(local.as_ref())
                .await
                .context("restoring stored login")?,
        );

        let warnings = WarningPublisher::new();
        warnings.set_handler(Some(Arc::new(StderrWarnings)));
        let store = Arc::new(EntryStore::new(
            remote.clone(),
            local.clone(),
            login.clone(),
            warnings,
        ));
        let sync = Arc::new(ConflictCoordinator::new(store.clone()));

        let mode: Resolution = config
            .sync
            .conflict_mode
            .parse()
            .context("invalid sync.conflict_mode")?;
        if mode != Resolution::Defer {
            sync.set_resolver(Some(Arc::new(PolicyResolver::new(mode))));
        }

        let platform: Platform = config
            .sync
            .platform
            .parse()
            .context("invalid sync.platform")?;

        Ok(Self {
            config,
            remote,
            local,
            session,
            login,
            store,
            sync,
            urls: platform.url_extractor(),
        })
    }

    fn require_login(&self) -> Result<Arc<Login>> {
        self.login
            .get()
            .context("not logged in; run `vidsync login` first")
    }

    fn front_end(&self) -> Result<Url> {
        let domain = &self.config.sync.domain;
        Url::parse(&format!("https://{domain}/"))
            .with_context(|| format!("invalid sync.domain: {domain}"))
    }

    fn stacks(&self, page: Arc<UrlPage>) -> (Arc<StackManager>, PlayerManager) {
        let stacks = Arc::new(StackManager::new(
            self.sync.clone(),
            self.session.clone(),
            self.urls.clone(),
            page.clone(),
            page.clone(),
        ));
        let player = PlayerManager::new(
            stacks.clone(),
            self.session.clone(),
            self.urls.clone(),
            page.clone(),
            page,
        );
        (stacks, player)
    }

    fn downloads(&self) -> Arc<DownloadQueue> {
        Arc::new(
            DownloadQueue::new(self.remote.clone(), self.local.clone(), self.login.clone())
                .with_max_update_fails(self.config.downloads.max_update_fails),
        )
    }
}

// ── Account ───────────────────────────────────────────────────────────────────

/// Check the credentials and run the key derivation off the async runtime.
async fn derive_login(args: CredentialArgs) -> Result<Login> {
    validate_username(&args.username).context("invalid username")?;

    let password = match args.password {
        Some(p) => SecretString::from(p),
        None => SecretString::from(
            rpassword::prompt_password(format!("Password for {}: ", args.username))
                .context("reading password")?,
        ),
    };
    validate_password(&password).context("invalid password")?;

    let username = args.username;
    let spinner = make_spinner("login");
    spinner.set_message("deriving key");
    let login = tokio::task::spawn_blocking(move || Login::from_credentials(&username, &password, None))
        .await
        .context("key derivation task failed")?
        .context("deriving key")?;
    spinner.finish_and_clear();
    Ok(login)
}

async fn cmd_login(app: &App, args: CredentialArgs) -> Result<()> {
    let login = derive_login(args).await?;

    if !account::test_login(app.remote.as_ref(), &login)
        .await
        .context("checking credentials")?
    {
        bail!("the server rejected the credentials for {}", login.username());
    }

    let switching_user = app
        .login
        .get()
        .is_some_and(|current| current.username() != login.username());
    let username = login.username().to_string();

    store_login(app.local.as_ref(), Some(&login)).await?;
    app.store
        .set_login(Some(login), switching_user)
        .await
        .context("switching login")?;

    println!("logged in as {username}");
    Ok(())
}

async fn cmd_register(app: &App, args: CredentialArgs) -> Result<()> {
    let login = derive_login(args).await?;
    account::register(app.remote.as_ref(), &login)
        .await
        .context("registering account")?;

    let username = login.username().to_string();
    store_login(app.local.as_ref(), Some(&login)).await?;
    app.store.set_login(Some(login), true).await?;

    println!("registered and logged in as {username}");
    Ok(())
}

async fn cmd_logout(app: &App, keep_data: bool) -> Result<()> {
    if !app.store.has_login() {
        println!("not logged in");
        return Ok(());
    }
    store_login(app.local.as_ref(), None).await?;
    app.store.set_login(None, !keep_data).await?;
    println!("logged out");
    Ok(())
}

fn cmd_whoami(app: &App) -> Result<()> {
    let login = app.require_login()?;
    println!("{} @ {}", login.username(), app.remote.base_url());
    Ok(())
}

// ── Entries ───────────────────────────────────────────────────────────────────

async fn cmd_sync(app: &App) -> Result<()> {
    app.require_login()?;

    let spinner = make_spinner("sync");
    let result = app.sync.sync().await;
    spinner.finish_and_clear();

    match result {
        Ok(()) => {
            println!("sync complete");
            Ok(())
        }
        Err(e) => {
            let conflicts: Vec<String> = e.conflicts().iter().map(|c| c.key.clone()).collect();
            if conflicts.is_empty() {
                return Err(e).context("sync failed");
            }
            for key in &conflicts {
                let kind = ConflictCoordinator::item_type_name(key).unwrap_or("Entry");
                println!("conflict: {kind} {key}");
            }
            println!();
            println!("settle each with: vidsync resolve <key> --use local|remote|rename");
            bail!("{} unresolved conflict(s)", conflicts.len())
        }
    }
}

async fn cmd_get(app: &App, key: &str) -> Result<()> {
    let value: Value = app
        .sync
        .get_entry(key)
        .await
        .with_context(|| format!("reading entry {key}"))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn cmd_set(app: &App, key: &str, raw: &str) -> Result<()> {
    let value: Value = serde_json::from_str(raw).context("value is not valid JSON")?;
    app.sync
        .set_entry(key, &value)
        .await
        .with_context(|| format!("writing entry {key}"))?;
    Ok(())
}

async fn cmd_delete(app: &App, key: &str) -> Result<()> {
    app.sync
        .delete_entry(key)
        .await
        .with_context(|| format!("deleting entry {key}"))?;
    Ok(())
}

async fn cmd_keys(app: &App, prefix: &str, synced_only: bool) -> Result<()> {
    let keys = app.store.get_keys(prefix, !synced_only).await?;
    for key in keys {
        match ConflictCoordinator::item_type_name(&key) {
            Some(kind) => println!("{key}\t{kind}"),
            None => println!("{key}"),
        }
    }
    Ok(())
}

async fn cmd_resolve(app: &App, key: &str, how: &str) -> Result<()> {
    let resolution: Resolution = how.parse()?;
    if resolution == Resolution::Defer {
        bail!("nothing to do for 'defer'");
    }
    app.require_login()?;
    app.sync
        .resolve(key, resolution)
        .await
        .with_context(|| format!("resolving {key}"))?;
    println!("resolved {key}");
    Ok(())
}

// ── Stacks ────────────────────────────────────────────────────────────────────

fn stack_id(id: &str) -> &str {
    if id == "current" {
        STACK_ID_CURRENT
    } else {
        id
    }
}

fn print_stack(stack: &WatchStack) {
    println!("{} ({})", stack.name, stack.id);
    for (idx, item) in stack.to_vec().iter().enumerate() {
        let video = item.video();
        let time = video
            .time_current
            .map(|t| format!(" @{}s", t.floor() as i64))
            .unwrap_or_default();
        let playlist = match item {
            StackItem::PlaylistVideo(pl) => format!(" [{} #{}]", pl.playlist_id, pl.playlist_idx),
            StackItem::Video(_) => String::new(),
        };
        println!("{idx:>3}  {}  {}{time}{playlist}", video.id, video.title);
    }
}

async fn cmd_stack(app: &App, action: StackAction) -> Result<()> {
    let page = match &action {
        StackAction::Visit { url, title, time } => Arc::new(UrlPage::visit(
            &app.urls,
            url.clone(),
            title.clone(),
            *time,
        )),
        _ => Arc::new(UrlPage::blank(app.front_end()?)),
    };
    let (stacks, player) = app.stacks(page);

    match action {
        StackAction::List => {
            let active = stacks.get_active_stack().await?.map(|s| s.id);
            for stack in stacks.list_stacks().await? {
                let marker = if active.as_deref() == Some(stack.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}  {}", stack.id, stack.name);
            }
        }
        StackAction::Show { id } => {
            let stack = stacks.load_stack(stack_id(&id)).await?;
            print_stack(&stack);
        }
        StackAction::Delete { id } => {
            stacks.delete_stack(stack_id(&id)).await?;
            println!("deleted {id}");
        }
        StackAction::Activate { id } => {
            let stack = stacks.load_stack(&id).await?;
            stacks
                .set_active_stack(Some(&StackNameWithId::from(&stack)))
                .await?;
            player.open_active_stack().await?;
        }
        StackAction::Move {
            id,
            direction,
            indexes,
        } => {
            let mut stack = stacks.load_stack(stack_id(&id)).await?;
            let items = indexes
                .iter()
                .map(|&idx| {
                    stack
                        .peek(idx)
                        .cloned()
                        .with_context(|| format!("no item at index {idx}"))
                })
                .collect::<Result<Vec<_>>>()?;
            move_items(
                &mut stack,
                &MoveAction {
                    direction: direction.into(),
                    items,
                },
            );
            stacks.save_stack(&stack).await?;
            print_stack(&stack);
        }
        StackAction::Visit { .. } => {
            player.pickup_state().await?;
            let update = player.track_current_video().await?;
            tracing::info!(?update, "current stack updated");
            print_stack(&stacks.load_current_watch_stack().await?);
        }
    }
    Ok(())
}

// ── Downloads ─────────────────────────────────────────────────────────────────

fn job_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .context("progress template")?
        .progress_chars("=>-"))
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// One progress bar per job.
struct JobBars {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl JobBars {
    fn bar(&self, job: &DownloadJob) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        bars.entry(job.id.clone())
            .or_insert_with(|| {
                let pb = self.multi.add(ProgressBar::new(100));
                pb.set_style(self.style.clone());
                pb.set_prefix(job.filename.clone());
                pb
            })
            .clone()
    }
}

impl ProgressListener for JobBars {
    fn on_new_job(&self, job: &DownloadJob) {
        self.bar(job);
    }

    fn on_progress_update(&self, job: &DownloadJob) {
        let pb = self.bar(job);
        pb.set_position((job.progress * 100.0).round() as u64);
        pb.set_message(format!("{:?}", job.state));
        if !job.state.is_running() {
            pb.abandon();
        }
    }

    fn on_job_finished(&self, job: &DownloadJob, extension: &str) {
        let pb = self.bar(job);
        pb.set_position(100);
        pb.finish_with_message(format!("done: {}.{extension}", job.filename));
    }
}

async fn cmd_download(app: &App, action: DownloadAction) -> Result<()> {
    app.require_login()?;
    let queue = app.downloads();

    match action {
        DownloadAction::Request {
            video_id,
            file_type,
            filename,
            tags,
        } => {
            let filename = filename.unwrap_or_else(|| video_id.clone());
            let tags = (!tags.is_empty()).then_some(tags);
            let job = queue
                .request_download(&video_id, file_type.into(), &filename, tags)
                .await
                .context("requesting download")?;
            println!("{}  {:?}", job.id, job.state);
        }
        DownloadAction::Cancel { id } => {
            queue.cancel_download(&id).await?;
            println!("cancelled {id}");
        }
        DownloadAction::List => {
            for job in queue.running_jobs().await? {
                println!(
                    "{}  {:?}  {:>3}%  {}",
                    job.id,
                    job.state,
                    (job.progress * 100.0).round() as u32,
                    job.filename
                );
            }
        }
        DownloadAction::Watch => watch_downloads(app, queue).await?,
    }
    Ok(())
}

async fn watch_downloads(app: &App, queue: Arc<DownloadQueue>) -> Result<()> {
    if queue.running_jobs().await?.is_empty() {
        println!("no running downloads");
        return Ok(());
    }

    let bars = Arc::new(JobBars {
        multi: MultiProgress::new(),
        style: job_style()?,
        bars: Mutex::new(HashMap::new()),
    });
    queue.add_listener(bars.clone());

    let interval = Duration::from_millis(app.config.downloads.poll_interval_ms);
    let cancel = CancellationToken::new();
    let poller = {
        let queue = queue.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { queue.run(interval, cancel).await })
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; downloads keep running on the server");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                if queue.running_jobs().await?.is_empty() {
                    break;
                }
            }
        }
    }

    cancel.cancel();
    poller.await.context("download poller panicked")?;
    Ok(())
}

// ── `vidsync config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &VidsyncConfig, config_path: &Path, from_file: bool) -> Result<()> {
    if from_file {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
