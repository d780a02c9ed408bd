mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use cafconvert::batch::{convert_directory_with_progress, DirectoryEvent};
use cafconvert::server;
use cafconvert_av::{FfmpegTranscoder, ToolRegistry};
use cafconvert_core::config;
use clap::Parser;
use cli::{Cli, Commands};
use indicatif::{ProgressBar, ProgressStyle};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "cafconvert=trace,cafconvert_av=trace,cafconvert_core=debug,tower_http=debug"
                .to_string()
        } else {
            "cafconvert=debug,cafconvert_av=info,cafconvert_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Convert {
            input_dir,
            output_dir,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_dir(
                &input_dir,
                output_dir.as_deref(),
                cli.config.as_deref(),
            ))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("cafconvert {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    for warning in config.validate() {
        tracing::warn!("{warning}");
    }

    tracing::info!("Starting cafconvert server");
    server::start_server(config).await
}

async fn convert_dir(
    input_dir: &Path,
    output_dir: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let transcoder = FfmpegTranscoder::discover(&tools, &config.conversion);

    let mut bar: Option<ProgressBar> = None;
    let report = convert_directory_with_progress(&transcoder, input_dir, output_dir, |event| {
        match event {
            DirectoryEvent::Found { total } if total > 0 => {
                bar = Some(progress_bar(total as u64));
            }
            DirectoryEvent::Found { .. } => {}
            DirectoryEvent::Started { source } => {
                if let Some(bar) = &bar {
                    let name = source.file_name().unwrap_or_default();
                    bar.set_message(name.to_string_lossy().into_owned());
                }
            }
            DirectoryEvent::Finished { .. } => {
                if let Some(bar) = &bar {
                    bar.inc(1);
                }
            }
        }
    })
    .await
    .with_context(|| format!("Failed to convert {}", input_dir.display()))?;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if report.found == 0 {
        println!("No .caf files found in {}", input_dir.display());
        return Ok(());
    }

    for path in &report.converted {
        println!("Converted: {}", path.display());
    }
    for path in &report.failed {
        eprintln!("Failed: {}", path.display());
    }
    println!("{}", report.summary());

    if !report.is_complete() {
        anyhow::bail!("{} file(s) failed to convert", report.failed.len());
    }

    Ok(())
}

/// Bar drawn on stderr while a directory is converted. Hidden when stderr
/// is not a terminal.
fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("Converting files [{bar:40}] {pos}/{len} {wide_msg}")
    {
        bar.set_style(style.progress_chars("##-"));
    }
    bar
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it to enable conversion.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Upload limit: {} bytes", config.server.max_upload_bytes);
    println!(
        "  Upload dir: {}",
        config.storage.resolved_upload_dir().display()
    );
    println!(
        "  Output dir: {}",
        config.storage.resolved_output_dir().display()
    );
    println!(
        "  Encoding: {} @ {}",
        config.conversion.codec, config.conversion.bitrate
    );
    println!("  Batch policy: {:?}", config.conversion.batch_policy);

    for warning in config.validate() {
        println!("  ! {warning}");
    }

    Ok(())
}
