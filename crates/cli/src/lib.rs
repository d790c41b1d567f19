use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_engine::{LopdfEngine, LopdfWriter};
use serde::Serialize;
use stamper_core::{
    export_document, Annotation, AnnotationStore, Editor, ExportWarning, HttpFetcher, LayoutBox,
    PageSize, PixelPoint, StamperConfig, SurfaceExtent,
};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stamper-cli")]
#[command(about = "Place text and image annotations on PDF pages")]
pub struct Cli {
    /// JSON settings file; defaults plus STAMPER_* environment overrides when absent.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the on-screen boxes of a page's annotations.
    Layout {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "FILE")]
        annotations: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
    },
    /// Bake annotations into a copy of the PDF.
    Bake {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "FILE")]
        annotations: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    page_sizes_pt: Vec<PageSize>,
}

#[derive(Debug, Serialize)]
struct LayoutOutput {
    page: u32,
    zoom: f32,
    surface: SurfaceExtent,
    boxes: Vec<LayoutBox>,
}

#[derive(Debug, Serialize)]
struct BakeOutput<'a> {
    output: String,
    placed: usize,
    skipped: Vec<&'a ExportWarning>,
    warnings: Vec<&'a ExportWarning>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Layout { file, annotations, page, zoom } => {
            let config = load_config(cli.config.as_deref())?;
            run_layout(&file, &annotations, page, zoom, &config)
        }
        Commands::Bake { file, annotations, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_bake(&file, &annotations, &output, &config)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<StamperConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            StamperConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => StamperConfig::from_env().context("invalid STAMPER_* environment setting"),
    }
}

fn run_info(file: &Path) -> Result<()> {
    let bytes = read_pdf(file)?;

    let mut engine = LopdfEngine::new();
    let page_sizes = engine.open(bytes).context("failed to open PDF")?.to_vec();

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: page_sizes.len() as u32,
        page_sizes_pt: page_sizes,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_layout(
    file: &Path,
    annotations: &Path,
    page: u32,
    zoom: f32,
    config: &StamperConfig,
) -> Result<()> {
    let bytes = read_pdf(file)?;
    let records = read_annotations(annotations)?;

    let mut engine = LopdfEngine::new();
    let mut editor = Editor::new(config.editor.clone());
    editor.load_document(&mut engine, &bytes).context("failed to open PDF")?;
    for annotation in records {
        editor.add(annotation).context("invalid annotation set")?;
    }
    editor.set_page(page).context("invalid --page")?;
    editor.set_zoom(zoom).context("invalid --zoom")?;
    let surface = editor
        .render_current(&mut engine, PixelPoint::new(0.0, 0.0))
        .with_context(|| format!("failed to render page {page}"))?;

    let payload = LayoutOutput {
        page,
        zoom,
        surface,
        boxes: editor.layout_page(),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_bake(file: &Path, annotations: &Path, output: &Path, config: &StamperConfig) -> Result<()> {
    let bytes = read_pdf(file)?;
    let store = AnnotationStore::from_annotations(read_annotations(annotations)?)
        .context("invalid annotation set")?;

    let mut loader = LopdfEngine::new();
    let writer = LopdfWriter::new(&config.export);
    let fetcher = HttpFetcher::new(Duration::from_secs(config.export.fetch_timeout_secs));

    let report = export_document(&bytes, &store, &mut loader, &writer, &fetcher, &config.export)
        .context("export failed")?;

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &report.bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    let (skipped, warnings): (Vec<_>, Vec<_>) = report.warnings.iter().partition(|warning| warning.skipped());
    tracing::info!(
        output = %output.display(),
        placed = report.placed,
        skipped = skipped.len(),
        "baked annotations"
    );
    let payload = BakeOutput {
        output: output.display().to_string(),
        placed: report.placed,
        skipped,
        warnings,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    ensure_file_exists(path)?;
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_annotations(path: &Path) -> Result<Vec<Annotation>> {
    ensure_file_exists(path)?;
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse annotations in {}", path.display()))
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
