//! Annopack: typed geometric annotations with GPU-ready binary packing.
//!
//! Annopack stores points, lines, axis-aligned bounding boxes, and
//! ellipsoids with schema-defined scalar/color properties and
//! relationship links, and packs snapshots of them into a dense binary
//! buffer that a renderer can consume directly. A stable id-to-offset
//! mapping supports reverse lookup (picking) from hit-testing results.
//!
//! # Modules
//!
//! - [`model`]: Annotation records, schemas, and the persisted JSON form
//! - [`layout`]: Packed property layout computation and codecs
//! - [`codec`]: Per-geometry-kind binary codecs
//! - [`store`]: The mutable annotation store and reference handles
//! - [`project`]: Rank migration under dimension-identity changes
//! - [`pack`]: The binary snapshot serializer
//! - [`pick`]: Pick-offset resolution back to annotation identity
//! - [`error`]: Error types for annopack operations

pub mod codec;
pub mod error;
pub mod layout;
pub mod model;
pub mod pack;
pub mod pick;
pub mod project;
pub mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::AnnopackError;

/// The annopack CLI application.
#[derive(Parser)]
#[command(name = "annopack")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate an annotation collection against its schema.
    Validate(ValidateArgs),
    /// Pack an annotation collection into the binary form.
    Pack(PackArgs),
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Annotation collection JSON file to validate.
    input: PathBuf,

    /// Schema JSON file (rank, properties, relationships).
    #[arg(long)]
    schema: PathBuf,
}

/// Arguments for the pack subcommand.
#[derive(clap::Args)]
struct PackArgs {
    /// Annotation collection JSON file to pack.
    input: PathBuf,

    /// Schema JSON file (rank, properties, relationships).
    #[arg(long)]
    schema: PathBuf,

    /// Write the raw packed buffer to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Run the annopack CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnnopackError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Pack(args)) => run_pack(args),
        None => {
            println!("annopack {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Typed geometric annotations with GPU-ready binary packing.");
            println!();
            println!("Run 'annopack --help' for usage information.");
            Ok(())
        }
    }
}

/// Loads a schema and an annotation collection, restoring into a store.
fn load_store(
    schema_path: &PathBuf,
    input: &PathBuf,
) -> Result<store::AnnotationStore, AnnopackError> {
    let schema = model::io_json::read_schema_json(schema_path)?;
    let records = model::io_json::read_annotation_json(input)?;
    let mut store = store::AnnotationStore::new(schema);
    store.restore_state(&records)?;
    Ok(store)
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), AnnopackError> {
    let store = load_store(&args.schema, &args.input)?;
    println!(
        "Validation passed: {} annotation(s), rank {}, {} propert(ies), {} relationship(s)",
        store.len(),
        store.schema().rank,
        store.schema().properties.len(),
        store.schema().relationships.len()
    );
    Ok(())
}

/// Execute the pack subcommand.
fn run_pack(args: PackArgs) -> Result<(), AnnopackError> {
    let store = load_store(&args.schema, &args.input)?;
    let layout = layout::PropertyLayout::new(store.schema());
    let snapshot = pack::serialize_store(&store, &layout, layout::Endianness::NATIVE, None)?;

    println!("Packed {} byte(s)", snapshot.data.len());
    println!("Property block: {} byte(s) per record", layout.serialized_bytes);
    for kind in model::AnnotationKind::ALL {
        println!(
            "  {}: {} record(s) at offset {} (stride {})",
            kind,
            snapshot.count(kind),
            snapshot.type_to_offset[kind.index()],
            snapshot.bytes_per_record(kind)
        );
    }

    if let Some(output) = args.output {
        std::fs::write(&output, &snapshot.data).map_err(AnnopackError::Io)?;
        println!("Wrote buffer to {}", output.display());
    }
    Ok(())
}
