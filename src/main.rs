//! CLI entry point for lyrics-search.
//!
//! Commands: init, config, embed, build, query and inspect. Library errors
//! are mapped to exit codes through `io::ExitCode`.

use anyhow::{Context, anyhow};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use lyrics_search::display::{
    Status, THEME, TableBuilder, create_progress_bar, create_records_table, create_results_table,
    create_schema_table, with_spinner,
};
use lyrics_search::io::{ExitCode, JsonResponse, OutputFormat};
use lyrics_search::pipeline::DEFAULT_TEXT_COLUMN;
use lyrics_search::vector::inspect_index_file;
use lyrics_search::{
    AnnIndex, ColumnSpec, EmbeddingPipeline, FastEmbedGenerator, IndexBuilder, QueryEngine,
    RecordReader, SearchError, Settings, load_corpus,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Level;

/// Container written by `embed` when `-o` is omitted.
const DEFAULT_CONTAINER: &str = "lyrics.vec";
/// Index written by `build` when `-o` is omitted.
const DEFAULT_INDEX: &str = "lyrics.ann";

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic search over song lyrics
#[derive(Parser)]
#[command(
    name = "lyrics-search",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic search over song lyrics",
    long_about = "Embed a lyrics corpus, build an approximate nearest neighbour index and query it with free text.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ lyrics-search init\n  $ lyrics-search embed songs.tsv -o data/songs.vec --meta Artist --meta Year:int\n  $ lyrics-search build data/songs.vec -o data/songs.ann\n  $ lyrics-search query data/songs.ann \"rain on the window\" -k 10"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .lyrics-search directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Display effective settings")]
    Config,

    #[command(about = "Embed a tab-separated lyrics corpus into a vector container")]
    Embed {
        /// Corpus file (TSV with a header row)
        corpus: PathBuf,

        /// Container to write (default: <data_dir>/lyrics.vec)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column holding the lyrics (overrides config)
        #[arg(long)]
        text_column: Option<String>,

        /// Metadata column to keep, as name or name:dtype (int, float, string)
        #[arg(long = "meta", value_name = "NAME[:DTYPE]")]
        meta: Vec<ColumnSpec>,

        /// Texts per embedding call (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Store raw model output without L2 normalization
        #[arg(long)]
        no_normalize: bool,
    },

    #[command(about = "Build an ANN index from one or more containers")]
    Build {
        /// Containers, inserted in the given order
        #[arg(required = true, num_args = 1..)]
        containers: Vec<PathBuf>,

        /// Index file to write (default: <data_dir>/lyrics.ann)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of trees (overrides config)
        #[arg(long)]
        trees: Option<usize>,

        /// Seed for reproducible builds (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    #[command(about = "Find the lyrics closest to a free-text query")]
    Query {
        /// Index file written by `build`
        index: PathBuf,

        /// Query text
        text: String,

        /// Number of results (default from config)
        #[arg(short)]
        k: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Show the schema and first records of a container")]
    Inspect {
        /// Container to inspect
        container: PathBuf,

        /// Records to show
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn output_format(&self) -> OutputFormat {
        match self {
            Commands::Query { json, .. } | Commands::Inspect { json, .. } => {
                OutputFormat::from_json_flag(*json)
            }
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryHit {
    rank: usize,
    id: u32,
    distance: f32,
}

#[derive(Debug, Serialize)]
struct ContainerReport {
    schema: serde_json::Value,
    records: usize,
    preview: Vec<lyrics_search::StoredRecord>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", THEME.status(Status::Failed, &format!("Configuration error: {e:#}")));
            return std::process::ExitCode::from(ExitCode::ConfigError as u8);
        }
    };

    init_tracing(cli.debug || settings.debug);

    let format = cli.command.output_format();
    match run(cli.command, &settings) {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(e) => std::process::ExitCode::from(report_error(&e, format) as u8),
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load_from(path)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("failed to load {}", path.display())),
        None => Settings::load().map_err(|e| anyhow!("{e}")),
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the failure and picks the exit code.
fn report_error(error: &anyhow::Error, format: OutputFormat) -> ExitCode {
    let search_error = error.downcast_ref::<SearchError>();
    let code = search_error.map_or(ExitCode::GeneralError, ExitCode::from_error);

    if let (OutputFormat::Json, Some(search_error)) = (format, search_error) {
        let response = JsonResponse::from_error(search_error);
        if let Ok(json) = serde_json::to_string_pretty(&response) {
            println!("{json}");
            return code;
        }
    }

    eprintln!("{}", THEME.status(Status::Failed, &format!("{error:#}")));
    if code.is_blocking() {
        eprintln!("{}", THEME.hint(code.description()));
    }
    code
}

fn run(command: Commands, settings: &Settings) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Init { force } => run_init(force),
        Commands::Config => {
            println!("{}", THEME.header("Current Configuration:"));
            println!("{}", "=".repeat(50));
            println!("{}", settings.to_toml()?);
            Ok(ExitCode::Success)
        }
        Commands::Embed {
            corpus,
            output,
            text_column,
            meta,
            batch_size,
            no_normalize,
        } => {
            let output = output.unwrap_or_else(|| settings.data_dir.join(DEFAULT_CONTAINER));
            let args = EmbedArgs {
                corpus,
                output,
                text_column,
                meta,
                batch_size,
                no_normalize,
            };
            run_embed(args, settings)
        }
        Commands::Build {
            containers,
            output,
            trees,
            seed,
        } => {
            let output = output.unwrap_or_else(|| settings.data_dir.join(DEFAULT_INDEX));
            run_build(&containers, &output, trees, seed, settings)
        }
        Commands::Query {
            index,
            text,
            k,
            json,
        } => run_query(&index, &text, k, OutputFormat::from_json_flag(json), settings),
        Commands::Inspect {
            container,
            limit,
            json,
        } => run_inspect(&container, limit, OutputFormat::from_json_flag(json)),
    }
}

fn run_init(force: bool) -> anyhow::Result<ExitCode> {
    let path = Settings::init_config_file(force).map_err(|e| anyhow!("{e}"))?;
    println!(
        "{}",
        THEME.status(
            Status::Done,
            &format!("Created configuration file at: {}", THEME.path(&path))
        )
    );
    println!("Edit this file to customize your settings.");
    Ok(ExitCode::Success)
}

struct EmbedArgs {
    corpus: PathBuf,
    output: PathBuf,
    text_column: Option<String>,
    meta: Vec<ColumnSpec>,
    batch_size: Option<usize>,
    no_normalize: bool,
}

fn run_embed(args: EmbedArgs, settings: &Settings) -> anyhow::Result<ExitCode> {
    let start = Instant::now();
    let text_column = args
        .text_column
        .or_else(|| Some(settings.pipeline.text_column.clone()).filter(|c| !c.is_empty()))
        .unwrap_or_else(|| DEFAULT_TEXT_COLUMN.to_string());
    let columns = if args.meta.is_empty() {
        settings.pipeline.metadata_columns.clone()
    } else {
        args.meta
    };

    let mut options = settings.pipeline.options();
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if args.no_normalize {
        options.normalize = false;
    }

    let corpus = with_spinner("Reading corpus...", || {
        load_corpus(&args.corpus, &text_column, &columns)
    })?;
    if corpus.stats.rows_skipped > 0 {
        eprintln!(
            "{}",
            THEME.status(
                Status::Warning,
                &format!("Skipped {} malformed rows", corpus.stats.rows_skipped)
            )
        );
    }

    let generator = with_spinner("Loading embedding model...", || {
        FastEmbedGenerator::from_name(
            &settings.embedding.model,
            settings.embedding.cache_dir.clone(),
            settings.embedding.show_download_progress,
        )
    })?;
    let dimension = generator.dimension();

    let pipeline = EmbeddingPipeline::new(Arc::new(generator), dimension, options)?
        .with_progress(create_progress_bar(corpus.len() as u64, "embedding lyrics"));
    let summary = pipeline.run(&corpus, &args.output)?;

    println!(
        "{}",
        THEME.status(
            Status::Done,
            &format!(
                "Embedded {} records ({}-d) into {} in {:.1}s",
                THEME.count(summary.records),
                summary.dimension,
                THEME.path(&summary.path),
                start.elapsed().as_secs_f64()
            )
        )
    );
    Ok(ExitCode::Success)
}

fn run_build(
    containers: &[PathBuf],
    output: &Path,
    trees: Option<usize>,
    seed: Option<u64>,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    let start = Instant::now();
    let mut index_config = settings.index.clone();
    if let Some(trees) = trees {
        index_config.tree_count = trees;
    }

    let mut builder = IndexBuilder::new(index_config.dimension()?, index_config.tree_count()?);
    if let Some(seed) = seed.or(index_config.seed) {
        builder = builder.with_seed(seed);
    }

    let index = with_spinner(
        &format!("Building {} trees...", index_config.tree_count),
        || builder.build_from_files(containers),
    )?;
    index.save(output)?;

    let info = inspect_index_file(output)?;
    let table = TableBuilder::new()
        .set_headers(vec!["Field", "Value"])
        .add_row(vec!["Items".to_string(), info.item_count.to_string()])
        .add_row(vec!["Trees".to_string(), info.tree_count.to_string()])
        .add_row(vec!["Dimension".to_string(), info.dimension.to_string()])
        .add_row(vec!["Seed".to_string(), info.seed.to_string()])
        .add_row(vec!["File size".to_string(), format!("{} bytes", info.file_size)])
        .build();
    println!("{table}");
    println!(
        "{}",
        THEME.status(
            Status::Done,
            &format!(
                "Index written to {} in {:.1}s",
                THEME.path(output),
                start.elapsed().as_secs_f64()
            )
        )
    );
    Ok(ExitCode::Success)
}

fn run_query(
    index_path: &Path,
    text: &str,
    k: Option<usize>,
    format: OutputFormat,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    let k = k.unwrap_or(settings.query.default_limit);

    let generator = with_spinner("Loading embedding model...", || {
        FastEmbedGenerator::from_name(
            &settings.embedding.model,
            settings.embedding.cache_dir.clone(),
            settings.embedding.show_download_progress,
        )
    })?;
    let index = AnnIndex::load(index_path, generator.dimension())?;

    let engine = QueryEngine::new(Arc::new(index), Arc::new(generator))
        .with_search_k(settings.index.search_k());
    let hits = engine.query_with_distances(text, k)?;
    let code = ExitCode::from_hits(&hits);

    if format.is_json() {
        let data: Vec<QueryHit> = hits
            .iter()
            .enumerate()
            .map(|(rank, (id, distance))| QueryHit {
                rank: rank + 1,
                id: id.get(),
                distance: *distance,
            })
            .collect();
        let response =
            JsonResponse::success(data).with_message(format!("{} results", hits.len()));
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if hits.is_empty() {
        println!("{}", THEME.status(Status::Warning, "No results"));
    } else {
        println!("{}", create_results_table(&hits));
    }
    Ok(code)
}

fn run_inspect(container: &Path, limit: usize, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let reader = RecordReader::open(container)?;
    let schema = reader.schema().clone();

    let mut preview = Vec::with_capacity(limit);
    let mut count = 0;
    for record in reader {
        let record = record?;
        if preview.len() < limit {
            preview.push(record);
        }
        count += 1;
    }

    if format.is_json() {
        let report = ContainerReport {
            schema: schema.to_json(),
            records: count,
            preview,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonResponse::success(report))?
        );
    } else {
        println!("{}", create_schema_table(&schema, count));
        if !preview.is_empty() {
            println!("{}", create_records_table(&schema, &preview));
        }
    }
    Ok(ExitCode::Success)
}
