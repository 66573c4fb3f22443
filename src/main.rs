//! cloudstream CLI - Generate point-cloud files and stream them over HTTP.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use cloudstream::{
    format::{RecordReader, RecordStats},
    generate::generate_file,
    schema::{GeneratorConfig, StreamerConfig},
    stream::serve,
};

#[derive(Parser)]
#[command(name = "cloudstream")]
#[command(about = "Synthetic point-cloud generation and streaming")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Gaussian point clouds into a binary file
    Generate {
        /// JSON configuration file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of gaussian clouds
        #[arg(long)]
        count: Option<usize>,

        /// Points per cloud
        #[arg(long)]
        points: Option<usize>,

        /// Output file path
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Random seed (defaults to the current time)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Serve a binary file as a chunked HTTP stream on /stream
    Serve {
        /// JSON configuration file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address to listen on
        #[arg(long)]
        addr: Option<String>,

        /// Binary data file to stream
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Stream chunk size in bytes
        #[arg(long)]
        chunk: Option<usize>,
    },

    /// Print record count, bounds and mean color of a binary file
    Inspect {
        /// Binary data file
        file: PathBuf,
    },

    /// Print example configuration files
    ExampleConfig,
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            count,
            points,
            out,
            seed,
        } => {
            let mut config = match config {
                Some(path) => load_config::<GeneratorConfig>(&path),
                None => GeneratorConfig {
                    output_path: PathBuf::new(),
                    ..Default::default()
                },
            };
            if let Some(count) = count {
                config.cloud_count = count;
            }
            if let Some(points) = points {
                config.points_per_cloud = points;
            }
            if let Some(out) = out {
                config.output_path = out;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            run_generate(&config);
        }
        Commands::Serve {
            config,
            addr,
            file,
            chunk,
        } => {
            let mut config = match config {
                Some(path) => load_config::<StreamerConfig>(&path),
                None => StreamerConfig {
                    source_path: PathBuf::new(),
                    ..Default::default()
                },
            };
            if let Some(addr) = addr {
                config.listen_address = addr;
            }
            if let Some(file) = file {
                config.source_path = file;
            }
            if let Some(chunk) = chunk {
                config.chunk_size = chunk;
            }
            run_serve(config);
        }
        Commands::Inspect { file } => run_inspect(&file),
        Commands::ExampleConfig => print_example_config(),
    }
}

fn load_config<T: DeserializeOwned>(path: &Path) -> T {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn run_generate(config: &GeneratorConfig) {
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let start = Instant::now();
    match generate_file(config) {
        Ok(stats) => {
            println!("Wrote {} to {}", stats, config.output_path.display());
            println!("Time: {:.2}s", start.elapsed().as_secs_f32());
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run_serve(config: StreamerConfig) {
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        });

    if let Err(e) = runtime.block_on(serve(config)) {
        eprintln!("server error: {}", e);
        std::process::exit(1);
    }
}

fn run_inspect(path: &Path) {
    let file = File::open(path).unwrap_or_else(|e| {
        eprintln!("Failed to open {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let mut stats = RecordStats::default();
    for record in RecordReader::new(BufReader::new(file)) {
        match record {
            Ok(record) => stats.accumulate(&record),
            Err(e) => {
                eprintln!("{}: {} (after {} records)", path.display(), e, stats.count);
                std::process::exit(1);
            }
        }
    }

    println!("{}: {}", path.display(), stats);
}

fn print_example_config() {
    let generator = GeneratorConfig {
        cloud_count: 3,
        seed: Some(42),
        ..Default::default()
    };
    let streamer = StreamerConfig::default();

    println!("Example generator configuration (generate.json):");
    println!("{}", serde_json::to_string_pretty(&generator).unwrap());
    println!();
    println!("Example streamer configuration (serve.json):");
    println!("{}", serde_json::to_string_pretty(&streamer).unwrap());
}
