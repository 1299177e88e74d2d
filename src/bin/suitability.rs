/// Command-line front end for land suitability analysis:
/// browse the raster catalogue, check AOI files, build and submit requests.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use suitability::aoi::{AoiPipeline, DrawnShape};
use suitability::request::{
    CatalogClient, HttpAnalysisService, HttpResultSource, ResultCache, ResultFetcher,
};
use suitability::{
    ClientConfig, ParameterField, RasterStackModel, RequestBuilder, SubmissionController,
    SuitabilityRequest,
};

#[derive(Parser, Debug)]
#[command(name = "suitability", about = "Land suitability analysis client")]
struct Args {
    /// JSON client configuration; defaults plus environment overrides otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory of the raster catalogue
    Ls { path: String },
    /// Show the initial map view for a data folder
    View { folder: String },
    /// Load an AOI file and report what would be submitted
    Aoi {
        file: PathBuf,
        /// Write the normalized FeatureCollection here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a session file and print the request payload
    Build { session: PathBuf },
    /// Submit a session file for analysis
    Submit {
        session: PathBuf,
        /// Download the result raster to this path
        #[arg(short, long)]
        fetch: Option<PathBuf>,
    },
}

/// A layer as written in a session file
#[derive(Debug, Deserialize)]
struct SessionLayer {
    path: String,
    min_val: f64,
    max_val: f64,
    #[serde(default)]
    opti_from: Option<f64>,
    #[serde(default)]
    opti_to: Option<f64>,
    #[serde(default)]
    combine: bool,
}

/// Stack, AOI and description for one analysis
#[derive(Debug, Deserialize)]
struct Session {
    description: String,
    layers: Vec<SessionLayer>,
    /// AOI file path, or a drawn shape as `s,w,n,e` / `lat,lng;...`
    #[serde(default)]
    aoi: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env()?,
    };

    match args.command {
        Command::Ls { path } => list(&config, &path),
        Command::View { folder } => {
            let view = CatalogClient::new(config)?.folder_configuration(&folder)?;
            println!("center: [{}, {}]  zoom: {}", view.center[0], view.center[1], view.zoom);
            Ok(())
        }
        Command::Aoi { file, output } => check_aoi(&file, output.as_deref()),
        Command::Build { session } => {
            let request = build_request(&config, &session)?;
            println!("{}", request.to_json()?);
            Ok(())
        }
        Command::Submit { session, fetch } => submit(&config, &session, fetch.as_deref()),
    }
}

fn list(config: &ClientConfig, path: &str) -> Result<()> {
    let items = CatalogClient::new(config.clone())?.directory_contents(path)?;
    for item in items {
        match item.bounds() {
            Some((min, max)) => println!("{:<40} [{}, {}]", item.name, min, max),
            None if item.is_raster() => println!("{:<40} (no bounds)", item.name),
            None => println!("{}/", item.name),
        }
    }
    Ok(())
}

fn check_aoi(file: &Path, output: Option<&Path>) -> Result<()> {
    let mut pipeline = AoiPipeline::new();
    let bounds = pipeline.ingest_path(file)?.bounds();

    println!("{}", pipeline.status());
    if let Some(bounds) = bounds {
        println!(
            "bounds: lon [{}, {}], lat [{}, {}]",
            bounds.min_lon, bounds.max_lon, bounds.min_lat, bounds.max_lat
        );
    }
    if let Some(output) = output {
        std::fs::write(output, pipeline.serialized())
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Wrote {}", output.display());
    }
    Ok(())
}

fn build_request(config: &ClientConfig, session_path: &Path) -> Result<SuitabilityRequest> {
    let content = std::fs::read_to_string(session_path)
        .with_context(|| format!("Failed to read session {}", session_path.display()))?;
    let session: Session = serde_json::from_str(&content)
        .with_context(|| format!("Invalid session file {}", session_path.display()))?;

    let mut stack = RasterStackModel::new();
    for layer in &session.layers {
        let name = suitability::stack::display_name_for(&layer.path);
        stack.add(&layer.path, &name, layer.min_val, layer.max_val)?;
        for (field, value) in [
            (ParameterField::OptiFrom, layer.opti_from),
            (ParameterField::OptiTo, layer.opti_to),
        ] {
            if let Some(value) = value {
                let outcome = stack.set_parameter(&layer.path, field, value)?;
                if !outcome.is_committed() {
                    bail!("{}: {} = {} was rejected", layer.path, field, value);
                }
            }
        }
        stack.set_combine(&layer.path, layer.combine)?;
    }

    let mut pipeline = AoiPipeline::new();
    if let Some(aoi) = session.aoi.as_deref() {
        let base = session_path.parent().unwrap_or_else(|| Path::new("."));
        let file = base.join(aoi);
        if file.is_file() {
            pipeline.ingest_path(&file)?;
        } else {
            pipeline.ingest_drawn(&aoi.parse::<DrawnShape>()?)?;
        }
        log::info!("{}", pipeline.status());
    }

    let builder = RequestBuilder::new(config.policy.clone());
    Ok(builder.build(&stack, pipeline.current(), &session.description)?)
}

fn submit(config: &ClientConfig, session_path: &Path, fetch: Option<&Path>) -> Result<()> {
    let request = build_request(config, session_path)?;
    let controller = SubmissionController::new(HttpAnalysisService::new(config)?);

    let reference = controller.submit(&request)?;
    println!("Result: {}", reference.url);

    if let Some(output) = fetch {
        let cache = config.cache_dir.clone().map(ResultCache::new);
        let mut fetcher = ResultFetcher::new(HttpResultSource::new(config.clone())?, cache);
        let bytes = fetcher.open(&reference.url).wait()?;
        std::fs::write(output, bytes.as_slice())
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Saved {} bytes to {}", bytes.len(), output.display());
    }
    Ok(())
}
