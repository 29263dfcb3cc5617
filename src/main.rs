use anyhow::{Context, Result};
use clap::Parser;
use natload::archive::open_archive;
use natload::config::{DistroSource, LoaderConfig};
use natload::loader::SystemLoader;
use natload::runtime::RealRuntime;
use natload::{platform, sweep, variant};
use serde::Serialize;
use std::path::PathBuf;

/// natload - platform-aware native library loader
///
/// Inspect the host platform, resolve library variants inside an archive,
/// and extract and load them the way an embedding application would.
///
/// Archives may be a directory, a .zip/.jar file, or a .tar.gz/.tgz file.
///
/// Examples:
///   natload platform                                # Print the platform tag
///   natload resolve -a natives.zip /vw/libvw_jni .so
///   natload sweep libvw_jni                         # Reclaim stale copies
#[derive(Parser, Debug)]
#[command(author, version = env!("NATLOAD_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for extracted libraries (defaults to the system temp dir)
    #[arg(long, env = "NATLOAD_TMPDIR", value_name = "PATH", global = true)]
    tmpdir: Option<PathBuf>,

    /// How to determine the Linux distribution
    #[arg(long, env = "NATLOAD_DISTRO_SOURCE", value_enum, global = true)]
    distro_source: Option<DistroSource>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the platform tag of this host
    Platform,

    /// Print the resource path that would be loaded for BASE + SUFFIX
    Resolve(ResolveArgs),

    /// Extract and load the resource at exactly PATH
    Load(LoadArgs),

    /// Resolve the platform variant of BASE + SUFFIX, then extract and load it
    LoadPlatform(ResolveArgs),

    /// Remove extracted libraries starting with PREFIX that have no lock file
    Sweep(SweepArgs),
}

#[derive(clap::Args, Debug)]
struct ResolveArgs {
    /// Archive holding the libraries
    #[arg(long, short = 'a', value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Resource path without extension, e.g. /vw/libvw_jni
    #[arg(value_name = "BASE")]
    base: String,

    /// Extension including the dot, e.g. .so
    #[arg(value_name = "SUFFIX", default_value = "")]
    suffix: String,
}

#[derive(clap::Args, Debug)]
struct LoadArgs {
    /// Archive holding the library
    #[arg(long, short = 'a', value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Absolute resource path, e.g. /vw/libvw_jni.so
    #[arg(value_name = "PATH")]
    path: String,
}

#[derive(clap::Args, Debug)]
struct SweepArgs {
    /// File name prefix of the extracted libraries
    #[arg(value_name = "PREFIX")]
    prefix: String,

    /// Directory to sweep (defaults to --tmpdir or the system temp dir)
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,
}

impl Cli {
    fn config(&self, runtime: &RealRuntime) -> LoaderConfig {
        let mut config = LoaderConfig::from_env(runtime);
        if let Some(dir) = &self.tmpdir {
            config.temp_dir = Some(dir.clone());
        }
        if let Some(source) = self.distro_source {
            config.distro_source = source;
        }
        config
    }
}

fn print<T: Serialize + std::fmt::Display>(json: bool, value: &T) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;
    let config = cli.config(&runtime);

    match &cli.command {
        Commands::Platform => {
            let tag = platform::identify(&runtime, &config)?;
            print(cli.json, &tag)?;
        }
        Commands::Resolve(args) => {
            let archive = open_archive(&args.archive)?;
            let path =
                variant::resolve(&runtime, &config, archive.as_ref(), &args.base, &args.suffix)?;
            print(cli.json, &path)?;
        }
        Commands::Load(args) => {
            let archive = open_archive(&args.archive)?;
            let extracted = natload::load_library_from_archive_with(
                &runtime,
                &SystemLoader,
                &config,
                archive.as_ref(),
                &args.path,
            )
            .with_context(|| format!("Failed to load {}", args.path))?;
            report_extracted(cli.json, &extracted)?;
        }
        Commands::LoadPlatform(args) => {
            let archive = open_archive(&args.archive)?;
            let extracted = natload::load_platform_library_with(
                &runtime,
                &SystemLoader,
                &config,
                archive.as_ref(),
                &args.base,
                &args.suffix,
            )
            .with_context(|| format!("Failed to load {}{}", args.base, args.suffix))?;
            report_extracted(cli.json, &extracted)?;
        }
        Commands::Sweep(args) => {
            let dir = args.dir.clone().unwrap_or_else(|| config.temp_dir(&runtime));
            let report = sweep::sweep(&runtime, &args.prefix, &dir);
            if cli.json {
                print_json(&report)?;
            } else {
                for path in &report.removed {
                    println!("removed {}", path.display());
                }
                for failure in &report.failed {
                    println!("failed  {}: {}", failure.path.display(), failure.reason);
                }
            }
        }
    }
    Ok(())
}

fn report_extracted(json: bool, extracted: &natload::ExtractedLibrary) -> Result<()> {
    if json {
        print_json(extracted)
    } else {
        println!("loaded {}", extracted.temp_path.display());
        println!("lock   {}", extracted.lock_path.display());
        Ok(())
    }
}
