//! CLI binary for docsign.
//!
//! A thin shim over the library: stores the credential, inspects documents,
//! and replays a JSON signing plan through a `SigningSession`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docsign::backend::auth::{FileTokenStore, TokenStore};
use docsign::backend::http::HttpBackend;
use docsign::{
    CaptureMode, FinalizeOutcome, FinalizePhase, PdfDimensions, Point, SessionConfig,
    SessionObserver, SignError, SigningSession, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Busy indicator ───────────────────────────────────────────────────────

/// Spinner shown while the completion request is outstanding.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Signing");
        Arc::new(Self { bar })
    }
}

impl SessionObserver for CliObserver {
    fn on_phase_change(&self, phase: FinalizePhase) {
        if phase == FinalizePhase::Submitting {
            self.bar
                .set_draw_target(indicatif::ProgressDrawTarget::stderr());
            self.bar.enable_steady_tick(Duration::from_millis(80));
        }
    }

    fn on_submit_start(&self, placeholder_count: usize) {
        self.bar
            .set_message(format!("submitting {placeholder_count} signature(s)…"));
    }

    fn on_confirmed(&self, _signed_file_url: Option<&str>) {
        self.bar.finish_and_clear();
    }

    fn on_failed(&self, _error: &SignError) {
        self.bar.finish_and_clear();
    }
}

// ── Signing plan ─────────────────────────────────────────────────────────

/// A scripted signing session, replayed through the engine.
///
/// ```json
/// {
///   "pages": 2,
///   "pdf": { "width": 612, "height": 792 },
///   "viewport": { "width": 600, "height": 776 },
///   "marks": [
///     { "page": 1, "at": { "x": 100, "y": 50 }, "signature": { "text": "Ada" } },
///     { "page": 2, "at": { "x": 80, "y": 400 }, "dragTo": { "x": 120, "y": 420 },
///       "signature": { "image": "sig.png" } }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
struct Plan {
    pages: u32,
    pdf: PdfDimensions,
    viewport: Size,
    marks: Vec<PlannedMark>,
}

#[derive(Debug, Deserialize)]
struct Size {
    width: f64,
    height: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlannedMark {
    page: u32,
    /// Placement click, relative to the rendered page.
    at: Point,
    /// Optional drag from `at` to this pointer position.
    #[serde(default)]
    drag_to: Option<Point>,
    #[serde(default)]
    size: Option<Size>,
    #[serde(default)]
    signature: Option<PlannedSignature>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PlannedSignature {
    Text(String),
    /// Path to a PNG/JPEG file, resolved relative to the plan.
    Image(PathBuf),
    /// Freehand strokes on the drawing surface.
    Strokes(Vec<Vec<Point>>),
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Store the bearer credential
  docsign login --token eyJhbGciOi...

  # Show status, canonical file URLs and stored marks
  docsign inspect 65f0c1

  # Replay a signing plan and finalize
  docsign sign 65f0c1 --plan plan.json

  # Machine-readable outcome
  docsign sign 65f0c1 --plan plan.json --json

ENVIRONMENT VARIABLES:
  DOCSIGN_API_URL      Base URL of the JSON API
  DOCSIGN_FILES_URL    Base URL serving stored files
  DOCSIGN_TOKEN_FILE   Token file location
  DOCSIGN_TIMEOUT      Submission timeout in seconds
  RUST_LOG             Overrides the log filter
"#;

/// Place, sign and finalize document signatures.
#[derive(Parser, Debug)]
#[command(
    name = "docsign",
    version,
    about = "Place, sign and finalize document signatures",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the JSON API.
    #[arg(long, global = true, env = "DOCSIGN_API_URL", default_value = "http://localhost:5000/api")]
    api_url: String,

    /// Base URL serving stored files.
    #[arg(long, global = true, env = "DOCSIGN_FILES_URL", default_value = "http://localhost:5000")]
    files_url: String,

    /// Token file location (default: platform config dir).
    #[arg(long, global = true, env = "DOCSIGN_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Submission timeout in seconds.
    #[arg(long, global = true, env = "DOCSIGN_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSIGN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSIGN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a bearer credential for later commands.
    Login {
        #[arg(long, env = "DOCSIGN_TOKEN")]
        token: String,
    },
    /// Forget the stored credential.
    Logout,
    /// Show a document's status, file URLs and stored marks.
    Inspect {
        doc_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Replay a signing plan and finalize the document.
    Sign {
        doc_id: String,
        /// JSON plan of placements, drags and signatures.
        #[arg(long)]
        plan: PathBuf,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
        /// Disable the spinner.
        #[arg(long)]
        no_progress: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner is the only feedback while signing; keep INFO logs out of it.
    let show_progress = !cli.quiet
        && matches!(
            cli.command,
            Command::Sign {
                json: false,
                no_progress: false,
                ..
            }
        );
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let tokens = Arc::new(FileTokenStore::new(config.resolved_token_path()));

    match &cli.command {
        Command::Login { token } => {
            if token.trim().is_empty() {
                bail!("Token must not be empty");
            }
            tokens.save(token.trim()).context("Failed to store token")?;
            if !cli.quiet {
                eprintln!("{} token stored in {}", green("✔"), tokens.path().display());
            }
        }
        Command::Logout => {
            tokens.clear().context("Failed to remove token")?;
            if !cli.quiet {
                eprintln!("{} signed out", green("✔"));
            }
        }
        Command::Inspect { doc_id, json } => {
            let session = open(&config, tokens, doc_id).await?;
            print_document(&session, *json)?;
        }
        Command::Sign {
            doc_id,
            plan,
            json,
            no_progress,
        } => {
            let plan_dir = plan.parent().map(Path::to_path_buf).unwrap_or_default();
            let raw = tokio::fs::read_to_string(plan)
                .await
                .with_context(|| format!("Failed to read plan from {:?}", plan))?;
            let plan: Plan = serde_json::from_str(&raw).context("Invalid plan")?;

            let mut session = open(&config, tokens, doc_id).await?;
            if !cli.quiet && !*json && !*no_progress {
                session = session.with_observer(CliObserver::new());
            }
            replay(&session, &plan, &plan_dir).await?;

            let outcome = session.finalize().await;
            report(&session, outcome, *json, cli.quiet)?;
        }
    }

    Ok(())
}

/// Map CLI args to `SessionConfig`.
fn build_config(cli: &Cli) -> Result<SessionConfig> {
    let mut builder = SessionConfig::builder()
        .api_base_url(&cli.api_url)
        .file_base_url(&cli.files_url)
        .submit_timeout_secs(cli.timeout);
    if let Some(ref path) = cli.token_file {
        builder = builder.token_path(path);
    }
    builder.build().context("Invalid configuration")
}

async fn open(
    config: &SessionConfig,
    tokens: Arc<FileTokenStore>,
    doc_id: &str,
) -> Result<SigningSession> {
    let backend = Arc::new(HttpBackend::new(config, tokens)?);
    let session = SigningSession::open(config.clone(), backend, doc_id)
        .await
        .map_err(|e| {
            if e.requires_reauth() {
                anyhow::anyhow!("{e}\nRun `docsign login --token <TOKEN>` first.")
            } else {
                anyhow::Error::new(e)
            }
        })
        .with_context(|| format!("Failed to open document {doc_id}"))?;
    Ok(session)
}

/// Drive the engine with the plan's events.
async fn replay(session: &SigningSession, plan: &Plan, plan_dir: &Path) -> Result<()> {
    // Uploads are read before taking the lock.
    let mut uploads = Vec::with_capacity(plan.marks.len());
    for mark in &plan.marks {
        uploads.push(match &mark.signature {
            Some(PlannedSignature::Image(path)) => {
                let path = plan_dir.join(path);
                Some(
                    UploadedFile::from_path(&path)
                        .await
                        .with_context(|| format!("Failed to read {:?}", path))?,
                )
            }
            _ => None,
        });
    }

    let mut c = session.lock();
    c.on_document_loaded(plan.pages, plan.pdf);
    if c.on_render(plan.viewport.width, plan.viewport.height).is_none() {
        bail!(
            "Viewport {}x{} is not a usable render size",
            plan.viewport.width,
            plan.viewport.height
        );
    }

    for (i, (mark, upload)) in plan.marks.iter().zip(uploads).enumerate() {
        let n = i + 1;
        c.enter_placement_mode()
            .with_context(|| format!("Mark {n}: cannot enter placement mode"))?;
        let id = c
            .place(mark.at, mark.page)
            .with_context(|| format!("Mark {n}: placement failed"))?;

        if let Some(to) = mark.drag_to {
            c.begin_drag(&id, mark.at)
                .with_context(|| format!("Mark {n}: drag failed"))?;
            c.drag_to(to)
                .with_context(|| format!("Mark {n}: drag failed"))?;
            c.end_drag();
        }
        if let Some(size) = &mark.size {
            c.resize(&id, size.width, size.height)
                .with_context(|| format!("Mark {n}: resize failed"))?;
        }

        let Some(signature) = &mark.signature else {
            continue;
        };
        match signature {
            PlannedSignature::Text(text) => {
                let cap = c.capture_mut();
                cap.set_mode(CaptureMode::Text);
                cap.set_text(text.as_str());
            }
            PlannedSignature::Strokes(strokes) => {
                let cap = c.capture_mut();
                cap.set_mode(CaptureMode::Draw);
                cap.clear_drawing();
                for stroke in strokes {
                    let mut points = stroke.iter();
                    let Some(first) = points.next() else { continue };
                    cap.begin_stroke(*first);
                    for p in points {
                        cap.extend_stroke(*p);
                    }
                    cap.end_stroke()
                        .with_context(|| format!("Mark {n}: drawing failed"))?;
                }
            }
            PlannedSignature::Image(_) => {
                c.capture_mut().set_mode(CaptureMode::Upload);
                if let Some(file) = upload {
                    c.select_file(file)
                        .with_context(|| format!("Mark {n}: upload rejected"))?;
                }
            }
        }
        c.apply_signature(&id)
            .with_context(|| format!("Mark {n}: signing failed"))?;
    }
    Ok(())
}

fn report(
    session: &SigningSession,
    outcome: Result<FinalizeOutcome, SignError>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let confirmation = match outcome {
        Ok(FinalizeOutcome::Confirmed(c)) => c,
        Ok(FinalizeOutcome::AlreadyInFlight) => bail!("A submission is already in progress"),
        Err(e) => {
            if e.is_retryable() && !quiet {
                eprintln!("{} {}", red("✘"), dim("retrying is safe; no signature was lost"));
            }
            return Err(anyhow::Error::new(e).context("Finalization failed"));
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&confirmation).context("Failed to serialise outcome")?
        );
    } else if !quiet {
        eprintln!(
            "{} {} signature(s) confirmed in {}ms",
            green("✔"),
            bold(&confirmation.signatures.len().to_string()),
            confirmation.duration_ms
        );
        let doc = session.document();
        println!(
            "{}",
            doc.signed_file_url
                .unwrap_or(confirmation.signed_file_path)
        );
    }
    Ok(())
}

fn print_document(session: &SigningSession, json: bool) -> Result<()> {
    let doc = session.document();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialise document")?
        );
        return Ok(());
    }
    println!("Document:     {}", doc.id);
    println!("Status:       {:?}", doc.status);
    println!("File:         {}", doc.file_url);
    if let Some(ref url) = doc.signed_file_url {
        println!("Signed file:  {}", url);
    }
    println!("Marks:        {}", doc.signatures.len());
    for m in &doc.signatures {
        println!(
            "  page {:>3}  ({:>5}, {:>5})  {:?}  {}",
            m.page,
            m.x,
            m.y,
            m.signature_type,
            dim(&preview(&m.signature)),
        );
    }
    Ok(())
}

fn preview(signature: &str) -> String {
    if signature.starts_with("data:") {
        return format!("<image, {} bytes>", signature.len());
    }
    let mut s: String = signature.chars().take(40).collect();
    if signature.chars().count() > 40 {
        s.push('…');
    }
    s
}
