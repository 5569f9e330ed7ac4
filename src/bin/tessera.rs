//! Binary entry point for the Tessera identifier CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tessera::{DecodedId, IdClass, IdConfig, IdLayout, TypeTag};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    version,
    about = "Encode, decode and classify graph element identifiers",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "TESSERA_CONFIG",
        value_name = "FILE",
        help = "TOML identifier config"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack fields into a persisted id.
    Encode {
        #[arg(long, help = "Routing partition")]
        partition: u32,
        #[arg(long = "type", value_enum, help = "Element type tag")]
        type_tag: TypeTagArg,
        #[arg(long, help = "Per-partition sequence count (starts at 1)")]
        sequence: u64,
        #[arg(long, help = "Mark the element invisible")]
        invisible: bool,
    },
    /// Unpack a persisted id.
    Decode {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Report whether an id is temporary, virtual or persisted.
    Classify {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Show the bit layout implied by the configuration.
    Layout,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TypeTagArg {
    Vertex,
    Edge,
    Property,
    Schema,
}

impl From<TypeTagArg> for TypeTag {
    fn from(arg: TypeTagArg) -> Self {
        match arg {
            TypeTagArg::Vertex => TypeTag::Vertex,
            TypeTagArg::Edge => TypeTag::Edge,
            TypeTagArg::Property => TypeTag::Property,
            TypeTagArg::Schema => TypeTag::Schema,
        }
    }
}

#[derive(Serialize)]
struct EncodeReport {
    id: i64,
}

#[derive(Serialize)]
struct DecodeReport {
    id: i64,
    #[serde(flatten)]
    fields: DecodedId,
}

#[derive(Serialize)]
struct ClassifyReport {
    id: i64,
    class: IdClass,
}

#[derive(Serialize)]
struct LayoutReport {
    partition_bits: u8,
    partitions: u64,
    sequence_bits: u32,
    max_partition: u32,
    max_sequence: u64,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => IdConfig::load(path)?,
        None => IdConfig::default(),
    };
    let layout = config.layout()?;

    match cli.command {
        Command::Encode {
            partition,
            type_tag,
            sequence,
            invisible,
        } => {
            let id = layout.encode(partition, type_tag.into(), sequence, invisible)?;
            let report = EncodeReport { id: id.raw() };
            emit(cli.format, &report, || println!("{}", report.id))?;
        }
        Command::Decode { id } => {
            let fields = layout.decode(id)?;
            let report = DecodeReport { id, fields };
            emit(cli.format, &report, || print_decode_text(&report))?;
        }
        Command::Classify { id } => {
            let report = ClassifyReport {
                id,
                class: IdClass::of(id),
            };
            emit(cli.format, &report, || println!("{}", report.class))?;
        }
        Command::Layout => {
            let report = layout_report(&layout);
            emit(cli.format, &report, || {
                println!("{layout}");
                println!("partitions={}", report.partitions);
            })?;
        }
    }
    Ok(())
}

fn layout_report(layout: &IdLayout) -> LayoutReport {
    LayoutReport {
        partition_bits: layout.partition_bits(),
        partitions: layout.partition_count(),
        sequence_bits: layout.sequence_bits(),
        max_partition: layout.max_partition(),
        max_sequence: layout.max_sequence(),
    }
}

fn print_decode_text(report: &DecodeReport) {
    println!("id={}", report.id);
    println!("  partition={}", report.fields.partition);
    println!("  type={}", report.fields.type_tag);
    println!("  sequence={}", report.fields.sequence);
    println!("  invisible={}", report.fields.invisible);
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
