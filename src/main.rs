use clap::{ArgAction, Parser, Subcommand};
use srcsetter::config::{self, Config};
use srcsetter::{output, pipeline, scan};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Exit status for a build stopped by SIGINT/SIGTERM (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Shared flags for commands that process images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore existing derivatives and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "srcsetter")]
#[command(version)]
#[command(about = "Build-time responsive image generator")]
#[command(long_about = "\
Build-time responsive image generator

Finds every PNG and JPEG under the asset root, writes AVIF and WebP copies at
each breakpoint width, and records them in a JSON manifest that maps each
image's public URL to ready-made srcset strings.

Layout with the default paths:

  static/img/                        # Asset root (scanned)
  ├── banner.png
  ├── logo.svg                       # Vector images are left alone
  ├── docs/setup.jpg
  └── generated/                     # Derivatives (never scanned)
      ├── banner-320.avif
      ├── banner-320.webp
      ├── ...
      └── docs/setup-320.avif
  .docusaurus/image-manifest.json    # { \"/img/banner.png\": { avifSrcSet, ... } }

Derivatives are only re-encoded when their source changed. Run
'srcsetter gen-config' to generate a documented srcsetter.toml.")]
struct Cli {
    /// Config file (default: <root>/srcsetter.toml, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root that relative paths resolve against
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Asset root to scan (overrides paths.source)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Directory for derivatives (overrides paths.generated; inside the asset
    /// root the derivative URL prefix follows it)
    #[arg(long, global = true)]
    generated: Option<PathBuf>,

    /// Public URL of the derivatives (overrides paths.generated_url_prefix)
    #[arg(long, global = true)]
    generated_url_prefix: Option<String>,

    /// Manifest file (overrides paths.manifest)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug); RUST_LOG also works
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan, generate variants and write the manifest
    Build(CacheArgs),
    /// List the images that would be processed
    Scan,
    /// Print a stock srcsetter.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build(ref cache_args) => {
            let config = load_config(&cli)?;
            let paths = config.resolve_paths(&cli.root);

            ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst))?;
            init_thread_pool(&config.processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = pipeline::run(
                &config,
                &paths,
                !cache_args.no_cache,
                Some(&INTERRUPTED),
                Some(tx),
            );
            printer
                .join()
                .map_err(|_| "progress printer panicked")?;

            match result {
                Ok(outcome) => output::print_summary(
                    &outcome.stats,
                    outcome.failures.len(),
                    outcome.manifest_entries,
                    &paths.manifest,
                ),
                Err(e) if e.is_interrupted() => {
                    eprintln!("Interrupted: manifest not written");
                    std::process::exit(EXIT_INTERRUPTED);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Scan => {
            let config = load_config(&cli)?;
            let paths = config.resolve_paths(&cli.root);
            let files = scan::scan(&paths.source, Some(paths.generated.as_path()))?;
            output::print_scan_output(&files, &paths.source);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so stdout stays a clean progress log.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Load the config file and apply command-line path overrides.
fn load_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&cli.root)?,
    };
    if let Some(source) = &cli.source {
        config.paths.source = source.clone();
    }
    if let Some(generated) = &cli.generated {
        config.set_generated_dir(generated.clone());
    }
    if let Some(prefix) = &cli.generated_url_prefix {
        config.paths.generated_url_prefix = prefix.clone();
    }
    if let Some(manifest) = &cli.manifest {
        config.paths.manifest = manifest.clone();
    }
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
