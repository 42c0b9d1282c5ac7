#![forbid(unsafe_code)]

use std::error::Error;
use std::process;

use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use gsb_config::BuildConfig;
use gsb_platform::RawOptions;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "gsb", about = "Build a portable git status daemon for any platform")]
#[command(version)]
struct Cli {
    /// Target architecture (defaults to the host's)
    #[arg(short = 'm', long, value_parser = NonEmptyStringValueParser::new())]
    arch: Option<String>,

    /// Compiler CPU baseline (defaults to one inferred from the architecture)
    #[arg(short = 'c', long, value_parser = NonEmptyStringValueParser::new())]
    cpu: Option<String>,

    /// Build inside a container using this command (e.g. `docker`, `sudo docker`)
    #[arg(short = 'd', long, value_parser = NonEmptyStringValueParser::new())]
    docker: Option<String>,

    /// Container image for the delegated build (defaults to one inferred
    /// from the architecture)
    #[arg(short = 'i', long, value_parser = NonEmptyStringValueParser::new())]
    image: Option<String>,

    /// Install missing build tools with the system package manager
    #[arg(short = 's', long)]
    install_tools: bool,

    /// Download the pinned dependency tarball when it is not cached
    #[arg(short = 'w', long)]
    download: bool,
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

fn run() -> CliResult {
    // A signal must release the same resources as a normal exit: work area,
    // fetch temp files, unpublished binaries.
    ctrlc::set_handler(|| {
        gsb_util::cleanup::run_cleanup();
        process::exit(1);
    })?;

    let config = if BuildConfig::is_delegated_invocation() {
        // Inside the container the flags were already resolved by the host;
        // the environment is the only input.
        BuildConfig::from_env()?
    } else {
        let cli = Cli::parse();
        gsb_platform::resolve(&RawOptions {
            arch: cli.arch,
            cpu: cli.cpu,
            kernel: None,
            docker_cmd: cli.docker,
            docker_image: cli.image,
            install_tools: cli.install_tools,
            download_deps: cli.download,
        })?
    };

    let root = std::env::current_dir()?;
    gsb_engine::run(&config, &root)?;
    Ok(())
}
