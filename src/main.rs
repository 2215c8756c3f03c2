use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use planet_mapgen::builder::{generate_world, GeneratedWorld, GenerationOptions};
use planet_mapgen::cancel::CancelToken;
use planet_mapgen::climate::{LifeLevel, Temperature};
use planet_mapgen::error::Result;
use planet_mapgen::export::{save_png, WorldSummary};
use planet_mapgen::planet::{PlanetFeature, WorldKind, WorldParams};
use planet_mapgen::seeds::derive_indexed;
use planet_mapgen::terrain::TerrainRegistry;

#[derive(Parser, Debug)]
#[command(name = "planet_mapgen")]
#[command(about = "Generate surface maps for planets, moons and gas giants")]
struct Args {
    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// World kind, e.g. Gaian, Selenian, Europan, EuJovian, Cerean, Arean
    #[arg(short, long)]
    kind: Option<WorldKind>,

    /// Width of the map in cells before upscaling (must be even)
    #[arg(short = 'W', long, default_value = "256")]
    width: usize,

    /// Height of the map in cells before upscaling
    #[arg(short = 'H', long, default_value = "128")]
    height: usize,

    /// Target water coverage, percent
    #[arg(long)]
    hydrographics: Option<u8>,

    /// Temperature bucket, e.g. standard, cold, very-hot
    #[arg(short, long)]
    temperature: Option<Temperature>,

    /// Life level, e.g. none, aerobic, extensive
    #[arg(short, long)]
    life: Option<LifeLevel>,

    /// Planet features, repeatable (equatorialridge, polarridge, smooth, heavilycratered, giantcrater)
    #[arg(short, long = "feature")]
    features: Vec<PlanetFeature>,

    /// JSON file with world parameters; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upscale factor applied after generation (power of two)
    #[arg(short, long, default_value = "1")]
    detail: usize,

    /// Re-project the finished map onto the full rectangle
    #[arg(long)]
    stretch: bool,

    /// Output PNG path
    #[arg(short, long, default_value = "world.png")]
    output: PathBuf,

    /// Write a JSON summary of the world to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Generate this many worlds in parallel, seeds derived from the master seed
    #[arg(short, long)]
    batch: Option<usize>,

    /// List the available world kinds and exit
    #[arg(long)]
    list_kinds: bool,

    /// Log stage details
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if args.list_kinds {
        for kind in WorldKind::all() {
            println!("{:<18} {}", kind.name(), kind.description());
        }
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn world_params(args: &Args) -> Result<WorldParams> {
    let mut params = match &args.config {
        Some(path) => WorldParams::load(path)?,
        None => WorldParams::default(),
    };
    if let Some(kind) = args.kind {
        params.kind = kind;
    }
    if let Some(hydrographics) = args.hydrographics {
        params.hydrographics = hydrographics;
    }
    if let Some(temperature) = args.temperature {
        params.temperature = temperature;
    }
    if let Some(life) = args.life {
        params.life = life;
    }
    if !args.features.is_empty() {
        params.features = args.features.clone();
    }
    if args.seed.is_some() {
        params.seed = args.seed;
    }
    params.validate()?;
    Ok(params)
}

fn run(args: &Args) -> Result<()> {
    let mut params = world_params(args)?;
    let master = params.seed.unwrap_or_else(rand::random);
    params.seed = Some(master);

    let options = GenerationOptions {
        width: args.width,
        height: args.height,
        detail: args.detail,
        stretch: args.stretch,
        ..GenerationOptions::default()
    };
    options.validate()?;
    let registry = TerrainRegistry::global();
    let cancel = CancelToken::new();

    println!("Generating {} world with seed: {}", params.kind, master);
    println!("Map size: {}x{} (detail x{})", args.width, args.height, args.detail);

    match args.batch {
        None | Some(0) | Some(1) => {
            let world = generate_world(&params, &options, registry, &cancel)?;
            report(&world);
            write_outputs(&world, &args.output, args.summary.as_deref())?;
        }
        Some(count) => {
            println!("Generating {} worlds in parallel...", count);
            let results: Vec<Result<GeneratedWorld>> = (0..count)
                .into_par_iter()
                .map(|i| {
                    let params = WorldParams {
                        seed: Some(derive_indexed(master, i as u64)),
                        ..params.clone()
                    };
                    generate_world(&params, &options, Arc::clone(&registry), &cancel)
                })
                .collect();

            let failed = save_batch(results, &args.output, args.summary.as_deref());
            if failed > 0 {
                println!("{} of {} worlds failed", failed, count);
            }
        }
    }
    Ok(())
}

/// Report and write every world of a batch. A world that fails to generate
/// or to save is logged and skipped. Returns the number of failures.
fn save_batch(results: Vec<Result<GeneratedWorld>>, output: &Path, summary: Option<&Path>) -> usize {
    let mut failed = 0;
    for (i, result) in results.into_iter().enumerate() {
        let saved = result.and_then(|world| {
            println!("--- World {} (seed {}) ---", i, world.report.seed);
            report(&world);
            let summary = summary.map(|p| numbered(p, i));
            write_outputs(&world, &numbered(output, i), summary.as_deref())
        });
        if let Err(e) = saved {
            eprintln!("World {} failed: {}", i, e);
            failed += 1;
        }
    }
    failed
}

fn report(world: &GeneratedWorld) {
    println!(
        "Water coverage: {:.1}% (target {}%)",
        world.map.water_percentage(),
        world.params.hydrographics
    );
    for deposit in &world.report.resources {
        println!("  {:<18} {:>3}", deposit.name, deposit.density);
    }
    for warning in &world.report.warnings {
        println!("Warning: {}", warning);
    }
}

fn write_outputs(world: &GeneratedWorld, output: &Path, summary: Option<&Path>) -> Result<()> {
    save_png(&world.map, &world.heights, output)?;
    println!("Saved map to {}", output.display());
    if let Some(path) = summary {
        WorldSummary::from_world(world).write_json(path)?;
        println!("Saved summary to {}", path.display());
    }
    Ok(())
}

/// `world.png` -> `world_3.png`
fn numbered(path: &Path, index: usize) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{}", stem, index),
    };
    path.with_file_name(name)
}
