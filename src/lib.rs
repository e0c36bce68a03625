//! bbox-editor: the core of a bounding-shape image annotation editor.
//!
//! Images are annotated with boxes and polygons that belong to named,
//! colored categories and can carry nested parts ("wheel" inside "car").
//! The crate provides the annotation model, the category/shape tree the
//! editor displays, and persistence to PASCAL VOC XML and a lossless JSON
//! project format.
//!
//! # Modules
//!
//! - [`model`]: Annotation types (ImageAnnotationData, BoundingShapeData, categories, metadata)
//! - [`tree`]: Category/shape tree kept in sync with an image's shape list
//! - [`io`]: Save/load strategies with progress, cancellation and per-image failures
//! - [`validation`]: Project validation and error reporting
//! - [`error`]: Error types for bbox-editor operations

pub mod error;
pub mod io;
pub mod model;
pub mod tree;
pub mod validation;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::EditorError;
use io::{StrategyFormat, TaskControl};

/// The bbox-editor CLI application.
#[derive(Parser)]
#[command(name = "bbox-editor")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a project between PASCAL VOC and SIMPLE.
    Convert(ConvertArgs),
    /// Validate a project for errors and warnings.
    Validate(ValidateArgs),
    /// Print image header metadata (width, height, channel depth).
    Metadata(MetadataArgs),
    /// Create a SIMPLE project with one empty annotation per image in a folder.
    Init(InitArgs),
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Input format ('pascal-voc' or 'simple').
    #[arg(long, env = "BBOX_EDITOR_FROM")]
    from: String,

    /// Output format ('pascal-voc' or 'simple').
    #[arg(long, env = "BBOX_EDITOR_TO")]
    to: String,

    /// Input directory (PASCAL VOC) or file (SIMPLE).
    input: PathBuf,

    /// Output directory (PASCAL VOC) or file (SIMPLE).
    output: PathBuf,
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Input directory (PASCAL VOC) or file (SIMPLE).
    input: PathBuf,

    /// Input format ('pascal-voc' or 'simple').
    #[arg(long, default_value = "simple")]
    format: String,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the metadata subcommand.
#[derive(clap::Args)]
struct MetadataArgs {
    /// Image files to inspect.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

/// Arguments for the init subcommand.
#[derive(clap::Args)]
struct InitArgs {
    /// Folder containing the images to annotate.
    image_dir: PathBuf,

    /// SIMPLE project file to create.
    output: PathBuf,
}

/// Run the bbox-editor CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), EditorError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Metadata(args)) => run_metadata(args),
        Some(Commands::Init(args)) => run_init(args),
        None => {
            println!("bbox-editor {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Bounding-shape annotation projects in PASCAL VOC and SIMPLE formats.");
            println!();
            println!("Run 'bbox-editor --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), EditorError> {
    // Resolve both formats before touching the filesystem
    let from: StrategyFormat = args.from.parse()?;
    let to: StrategyFormat = args.to.parse()?;

    let imported = io::load(from, &args.input, &TaskControl::none())?;
    println!("Loaded {} ({})", args.input.display(), from);
    print!("{}", imported);

    let exported = io::save(to, &imported.data, &args.output, &TaskControl::none())?;
    println!("Saved {} ({})", args.output.display(), to);
    print!("{}", exported);

    let failed = imported.errors.len() + exported.errors.len();
    if failed > 0 {
        return Err(EditorError::BatchFailed {
            failed,
            total: imported.total_items + exported.total_items,
        });
    }
    Ok(())
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), EditorError> {
    let format: StrategyFormat = args.format.parse()?;
    let imported = io::load(format, &args.input, &TaskControl::none())?;
    for issue in &imported.errors {
        eprintln!("Load error: {}", issue);
    }

    let opts = validation::ValidateOptions {
        strict: args.strict,
    };
    let report = validation::validate(&imported.data);

    match args.output.as_str() {
        "json" => {
            // Simple JSON output for programmatic use
            println!("{{");
            println!("  \"error_count\": {},", report.error_count());
            println!("  \"warning_count\": {},", report.warning_count());
            println!("  \"issues\": [");
            for (i, issue) in report.issues.iter().enumerate() {
                let comma = if i < report.issues.len() - 1 { "," } else { "" };
                println!("    {{");
                println!("      \"severity\": \"{:?}\",", issue.severity);
                println!("      \"code\": \"{:?}\",", issue.code);
                println!("      \"message\": {},", json_string(&issue.message));
                println!("      \"context\": {}", json_string(&issue.context.to_string()));
                println!("    }}{}", comma);
            }
            println!("  ]");
            println!("}}");
        }
        _ => {
            print!("{}", report);
        }
    }

    if !report.passes(&opts) {
        Err(EditorError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else if !imported.errors.is_empty() {
        Err(EditorError::BatchFailed {
            failed: imported.errors.len(),
            total: imported.total_items,
        })
    } else {
        Ok(())
    }
}

/// Execute the metadata subcommand.
///
/// Unreadable images are listed as unknown; this never fails.
fn run_metadata(args: MetadataArgs) -> Result<(), EditorError> {
    for path in &args.images {
        let (metadata, warning) = model::read_image_metadata(path);
        if let Some(warning) = warning {
            log::warn!("{warning}");
        }
        if metadata.has_known_dimensions() {
            println!(
                "{}\t{}x{}x{}",
                path.display(),
                metadata.width,
                metadata.height,
                metadata.depth
            );
        } else {
            println!("{}\tunknown", path.display());
        }
    }
    Ok(())
}

/// Execute the init subcommand.
fn run_init(args: InitArgs) -> Result<(), EditorError> {
    let (data, warnings) = model::scan_image_folder(&args.image_dir)?;
    for warning in &warnings {
        eprintln!("Warning: {}", warning);
    }

    let exported = io::save(StrategyFormat::Simple, &data, &args.output, &TaskControl::none())?;
    println!(
        "Created {} with {} image(s), {} metadata warning(s)",
        args.output.display(),
        exported.processed_items,
        warnings.len()
    );
    if !exported.errors.is_empty() {
        return Err(EditorError::BatchFailed {
            failed: exported.errors.len(),
            total: exported.total_items,
        });
    }
    Ok(())
}

fn json_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}
