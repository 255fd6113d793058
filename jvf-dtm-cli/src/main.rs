use anyhow::{Context, Result};
use clap::Parser as _;
use jvf_dtm::{
    finalize, Catalogs, Config, GeoJsonSink, IngestOptions, Parser, TaskResult,
    ZeroDiscriminantPolicy, DEFAULT_CRS,
};
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input XML file, ZIP archive or directory
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// JSON config naming the schema, style and type mapping tables
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// XSD schema with attribute documentation and enumerations
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Style table (key|qgis_symbol)
    #[arg(long, value_name = "FILE")]
    styles: Option<PathBuf>,

    /// Type mapping table (code|attribute;attribute)
    #[arg(long, value_name = "FILE")]
    type_mapping: Option<PathBuf>,

    /// Number of worker threads for directory input (default: CPU count)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Ignore discriminating attributes whose value is "0"
    #[arg(long)]
    skip_zero_discriminant: bool,

    /// Put every file's layers under a group named after the file
    #[arg(long)]
    file_root_group: bool,

    /// Layers and groups written between progress reports
    #[arg(long, default_value_t = 50)]
    yield_interval: usize,

    /// CRS name written into every GeoJSON file and the manifest
    #[arg(long, default_value = DEFAULT_CRS)]
    crs: String,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to read config {:?}", path))?,
            None => Config::default(),
        };
        if let Some(schema) = &self.schema {
            config.xsd_attributes = Some(schema.clone());
        }
        if let Some(styles) = &self.styles {
            config.styles = Some(styles.clone());
        }
        if let Some(type_mapping) = &self.type_mapping {
            config.type_mapping = Some(type_mapping.clone());
        }
        Ok(config)
    }

    fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            zero_discriminant: if self.skip_zero_discriminant {
                ZeroDiscriminantPolicy::Skip
            } else {
                ZeroDiscriminantPolicy::Keep
            },
            file_root_group: self.file_root_group,
            ..IngestOptions::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let start_time = std::time::Instant::now();

    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    fs::create_dir_all(&args.output)?;
    let catalogs = Catalogs::load(&args.config()?);

    if args.input.is_file() {
        match FileType::of(&args.input) {
            Some(file_type) => {
                info!("Processing {:?} file: {:?}", file_type, args.input);
                process_file(&args.input, &args.output, &args, &catalogs)?;
            }
            None => {
                error!("Unsupported file type: {:?}", args.input);
                anyhow::bail!("Input file must be .xml or .zip");
            }
        }
    } else if args.input.is_dir() {
        info!("Processing directory: {:?}", args.input);
        process_directory(&args.input, &args, &catalogs)?;
    } else {
        error!("Invalid input path: {:?}", args.input);
        anyhow::bail!("Input path must be a file or directory");
    }

    info!("Total processing time: {:?}", start_time.elapsed());
    Ok(())
}

/// Parses one input on a worker thread and writes its layers to `output`.
fn process_file(path: &Path, output: &Path, args: &Args, catalogs: &Catalogs) -> Result<()> {
    let parser = Parser::new(catalogs.clone(), args.ingest_options());
    let mut task = parser
        .parse(vec![path.to_path_buf()])
        .with_context(|| format!("Failed to start parsing {:?}", path))?;
    while !task.wait_timeout(Duration::from_millis(200)) {
        debug!("Still parsing {:?}", path);
    }

    let outcome = match task.wait() {
        TaskResult::Completed(outcome) => outcome,
        other => anyhow::bail!("{}: {}", path.display(), other.message()),
    };
    let stats = &outcome.stats;
    info!(
        "Parsed {:?}: {} records processed, {} dropped, {} failed, {} geometry cache hits",
        path,
        stats.processed_records,
        stats.dropped_records,
        stats.failed_records,
        stats.geometry_cache_hits
    );

    let mut sink = GeoJsonSink::new(output)?.with_crs(&args.crs);
    finalize(&outcome, &mut sink, args.yield_interval, |done, total| {
        debug!("Written {}/{} groups and layers", done, total)
    })?;
    let manifest = sink.finish()?;
    info!("Written manifest: {:?}", manifest);
    Ok(())
}

/// One independent session per file, in parallel; each file gets its own
/// output subdirectory.
fn process_directory(dir: &Path, args: &Args, catalogs: &Catalogs) -> Result<()> {
    use rayon::prelude::*;

    let input_files = collect_input_files(dir)?;
    info!("Found {} input files (XML/ZIP)", input_files.len());

    let results: Vec<Result<()>> = input_files
        .par_iter()
        .map(|(path, _)| {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
            process_file(path, &args.output.join(stem), args, catalogs)
        })
        .collect();

    let mut errors = Vec::new();
    for ((path, _), result) in input_files.iter().zip(results) {
        if let Err(e) = result {
            errors.push(format!("{}: {:#}", path.display(), e));
        }
    }

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to process", errors.len());
    }

    Ok(())
}

/// XML and ZIP files below `dir`, recursively, in sorted order.
fn collect_input_files(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            files.extend(collect_input_files(&path)?);
        } else if let Some(file_type) = FileType::of(&path) {
            files.push((path, file_type));
        }
    }
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileType {
    Xml,
    Zip,
}

impl FileType {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => Some(FileType::Xml),
            Some(ext) if ext.eq_ignore_ascii_case("zip") => Some(FileType::Zip),
            _ => None,
        }
    }
}
