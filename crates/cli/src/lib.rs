use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marginalia_ai::{AiCollaborator, AiConfig, GeminiClient, Unconfigured};
use marginalia_core::{
    export_annotated, import_queue, Annotation, AnnotationSet, Book, ReferenceSize,
};
use marginalia_engine::{default_engine, OpenSource, PdfEngine};
use marginalia_reader::{FrameState, PageView, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "marginalia")]
#[command(about = "Personal ebook library and PDF annotation toolkit")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import PDFs and print their catalogue records.
    Import {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Directory to write each book's synthesized cover PNG into.
        #[arg(long, value_name = "DIR")]
        covers: Option<PathBuf>,
    },
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render one page, annotations composited, to a PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_ZOOM)]
        zoom: f32,
        /// Annotation sidecar (JSON array of records).
        #[arg(long, value_name = "SIDECAR")]
        annotations: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Burn annotations into a copy of the PDF and append the notes summary page.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SIDECAR")]
        annotations: PathBuf,
        /// Directory for the annotated copy (defaults to the source's directory).
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Ask the research collaborator a free-form question.
    Research {
        #[arg(value_name = "QUERY")]
        query: String,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: PageSizeOutput,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Import { files, covers } => run_import(&files, covers.as_deref()),
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, zoom, annotations, output } => {
            run_render(&file, page, zoom, annotations.as_deref(), output.as_deref())
        }
        Commands::Export { file, annotations, output } => {
            run_export(&file, &annotations, output.as_deref())
        }
        Commands::Research { query } => run_research(&query),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_import(files: &[PathBuf], covers: Option<&Path>) -> Result<()> {
    let mut engine = default_engine();
    let collaborator = collaborator();
    let books = import_queue(&mut engine, collaborator.as_ref(), files);

    if let Some(dir) = covers {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        for book in &books {
            let Some(cover) = &book.cover else { continue };
            let path = dir.join(format!("{}.png", book.id));
            cover
                .save_with_format(&path, image::ImageFormat::Png)
                .with_context(|| format!("failed to write cover to {}", path.display()))?;
        }
    }

    let records: Vec<_> = books.iter().map(Book::summary).collect();
    let json = serde_json::to_string_pretty(&records)?;
    println!("{json}");

    Ok(())
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let size = engine.page_size(handle, 0)?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        first_page_size_pt: PageSizeOutput { width: size.width_pt, height: size.height_pt },
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_render(
    file: &Path,
    page: u32,
    zoom: f32,
    annotations: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        anyhow::bail!("--zoom must be between {MIN_ZOOM} and {MAX_ZOOM}");
    }

    let annotations = match annotations {
        Some(path) => load_sidecar(path)?,
        None => AnnotationSet::new(),
    };

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;
    let page_count = engine.page_count(handle)?;
    if page > page_count {
        anyhow::bail!("page {page} out of range (document has {page_count} pages)");
    }

    let mut view = PageView::spawn(engine, handle);
    view.request_render(page, zoom, annotations);

    let frame = match view.wait() {
        FrameState::Composited => view.frame().context("render produced no frame")?,
        state => anyhow::bail!("render did not complete: {state:?}"),
    };

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    frame
        .save_with_format(&output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_export(file: &Path, annotations: &Path, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let set = load_sidecar(annotations)?;

    let source = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    // Reference size is the first page's extent at zoom 1.0, same as import
    // records it.
    let mut engine = default_engine();
    let handle = engine.open(OpenSource::Bytes(source.clone())).context("failed to open PDF")?;
    let reference = ReferenceSize::from(engine.page_size(handle, 0)?);
    engine.close(handle)?;

    let annotated = export_annotated(&source, &set, reference).context("export failed")?;

    let file_name = export_file_name(file);
    let output = match output {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            dir.join(&file_name)
        }
        None => file.with_file_name(&file_name),
    };

    fs::write(&output, annotated)
        .with_context(|| format!("failed to write annotated copy to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_research(query: &str) -> Result<()> {
    let collaborator = collaborator();
    let research = collaborator.research(query).context("research request failed")?;

    println!("{}", research.text);
    for source in &research.sources {
        println!("- {} <{}>", source.title, source.uri);
    }

    Ok(())
}

/// Pick the live Gemini client when an API key is configured, otherwise the
/// offline stand-in whose failures the import pipeline maps to placeholder
/// metadata.
fn collaborator() -> Box<dyn AiCollaborator> {
    match GeminiClient::new(AiConfig::from_env()) {
        Ok(client) => Box::new(client),
        Err(_) => Box::new(Unconfigured),
    }
}

/// A sidecar is a JSON array of annotation records. Records whose geometry
/// does not match their kind are dropped with a warning rather than failing
/// the whole run.
fn load_sidecar(path: &Path) -> Result<AnnotationSet> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read annotations from {}", path.display()))?;
    let records: Vec<Annotation> = serde_json::from_str(&data)
        .with_context(|| format!("invalid annotation sidecar {}", path.display()))?;

    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        if record.geometry_is_valid() {
            kept.push(record);
        } else {
            warn!(id = %record.id, page = record.page, "skipping annotation with invalid geometry");
        }
    }

    Ok(AnnotationSet::from_records(kept))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

fn export_file_name(file: &Path) -> String {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("book");

    format!("{stem}_Annotated.pdf")
}
