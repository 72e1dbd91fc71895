use clap::{Parser, Subcommand};
use image_workflow::config::{self, Backend, WorkflowConfig};
use image_workflow::metadata::MetadataReader;
use image_workflow::transform::{Converter, GraphicsMagickConverter, NativeConverter};
use image_workflow::{batch, gallery, logging, output, provenance};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "image-workflow")]
#[command(about = "Thumbnails, conversion and TIFF compression with chain-of-custody metadata")]
#[command(long_about = "\
Thumbnails, conversion and TIFF compression with chain-of-custody metadata

Every command works on all supported images below --root, one file at a time.
Each output carries a provenance record in its comment/description field:

  {\"created_at\": <epoch seconds>, \"sha1\": \"<hex>\", \"source_file\": \"<abs path>\"}

The record is created from the first file that lacks one and copied forward
unchanged after that, so derivatives always point at the original.

Thumbnails (256x256 JPEG):
  .jpg .jpeg   EXIF thumbnail slot
  .tif .tiff   reduced-resolution sub-image (SubIFDs)
  .png         sidecar file <name>.thumb.jpg

Generated trees (excluded from scanning):
  converted/    convert output, mirroring the source layout
  thumbnails/   extract-thumbnails output, <name>.jpg

Configuration is read from image-workflow.toml in the root when present.")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Directory to work on
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/image-workflow.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed a thumbnail in every image that lacks one
    AddThumbnails,
    /// Write every embedded thumbnail to thumbnails/<name>.jpg
    ExtractThumbnails,
    /// Strip embedded thumbnails (and PNG sidecars)
    RemoveThumbnails,
    /// Convert every image to FORMAT under converted/
    Convert {
        /// Target format extension, e.g. png, jpg, tif
        format: String,
    },
    /// Rewrite every TIFF with lossless LZW compression
    CompressTiffs,
    /// Write an HTML gallery of the tree
    Gallery,
    /// Show the provenance record of a file
    Provenance {
        /// Image to inspect
        file: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<WorkflowConfig, config::ConfigError> {
    match &cli.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(&cli.root),
    }
}

fn metadata_reader(config: &WorkflowConfig) -> MetadataReader {
    match config.tools.backend {
        Backend::GraphicsMagick => MetadataReader::graphicsmagick(&config.tools.gm),
        Backend::Native => MetadataReader::native(),
    }
}

fn converter(config: &WorkflowConfig) -> Box<dyn Converter> {
    match config.tools.backend {
        Backend::GraphicsMagick => Box::new(GraphicsMagickConverter::new(&config.tools.gm)),
        Backend::Native => Box::new(NativeConverter::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);

    let root = &cli.root;
    let out = &config.output;
    tracing::debug!(root = %root.display(), backend = ?config.tools.backend, "starting");

    match &cli.command {
        Command::AddThumbnails => {
            let reports = batch::add_thumbnails(root, out, &metadata_reader(&config))?;
            output::print_batch_output("add-thumbnails", &reports, root);
        }
        Command::ExtractThumbnails => {
            let reports = batch::extract_thumbnails(root, out)?;
            output::print_batch_output("extract-thumbnails", &reports, root);
        }
        Command::RemoveThumbnails => {
            let reports = batch::remove_thumbnails(root, out)?;
            output::print_batch_output("remove-thumbnails", &reports, root);
        }
        Command::Convert { format } => {
            let reports = batch::convert_all(
                root,
                format,
                out,
                converter(&config).as_ref(),
                &metadata_reader(&config),
            )?;
            output::print_batch_output("convert", &reports, root);
        }
        Command::CompressTiffs => {
            let reports = batch::compress_tiffs(root, out, &metadata_reader(&config))?;
            output::print_batch_output("compress-tiffs", &reports, root);
        }
        Command::Gallery => {
            let (path, count) = gallery::write_gallery(
                root,
                &out.converted_dir,
                &out.thumbnails_dir,
                &out.gallery_file,
            )?;
            output::print_gallery_output(&path, count, root);
        }
        Command::Provenance { file } => {
            let inspection = provenance::inspect(file, &metadata_reader(&config))?;
            output::print_provenance(file, &inspection, root);
        }
    }

    Ok(())
}
