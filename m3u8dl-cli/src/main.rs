use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use error::AppError;
use m3u8dl_engine::proxy::{ProxyConfig, ProxyType};
use m3u8dl_engine::utils::{ensure_extension, is_playlist_url, is_valid_url};
use m3u8dl_engine::{DownloadCoordinator, DownloadRequest, HlsConfig, ProgressEvent};
use mimalloc::MiMalloc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

mod cli;
mod error;
mod utils;

use cli::CliArgs;
use utils::progress::ProgressManager;
use utils::{available_path, extract_title_from_url, parse_headers};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Exit status when the download ran but produced no usable output.
const EXIT_DOWNLOAD_FAILED: i32 = 2;

fn main() {
    match bootstrap() {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_DOWNLOAD_FAILED),
        Err(e) => {
            eprintln!("Error: {e}");
            // Log the full error for debugging
            error!(error = ?e, "Application failed");
            std::process::exit(1);
        }
    }
}

fn init_logging(args: &CliArgs) -> Result<(), AppError> {
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("m3u8dl.log")?;

    // JSON mode keeps stdout for events only.
    let writer = if args.json {
        BoxMakeWriter::new(MakeWriterExt::and(std::io::stderr, log_file))
    } else {
        BoxMakeWriter::new(MakeWriterExt::and(std::io::stdout, log_file))
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(writer)
        .with_ansi(!args.json)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))
}

fn proxy_settings(args: &CliArgs) -> Result<(Option<ProxyConfig>, bool), AppError> {
    if args.no_proxy {
        // No proxy flag overrides everything else
        info!("All proxy settings disabled (--no-proxy flag)");
        return Ok((None, false));
    }

    let Some(proxy_url) = args.proxy.as_ref() else {
        return Ok((None, true));
    };

    let proxy_type = match args.proxy_type.as_str() {
        "http" => ProxyType::Http,
        "https" => ProxyType::Https,
        "socks5" => ProxyType::Socks5,
        "all" => ProxyType::All,
        other => {
            return Err(AppError::InvalidInput(format!(
                "Invalid proxy type: '{other}'"
            )));
        }
    };

    let mut proxy = ProxyConfig::from_url(proxy_url.clone());
    // socks5:// URLs are detected from the scheme; an explicit type wins otherwise.
    if proxy.proxy_type != ProxyType::Socks5 {
        proxy.proxy_type = proxy_type;
    }
    if let (Some(username), Some(password)) = (&args.proxy_user, &args.proxy_pass) {
        proxy = proxy.with_auth(username.clone(), password.clone());
    }

    info!(
        proxy_url = %proxy.url,
        proxy_type = ?proxy.proxy_type,
        has_auth = proxy.auth.is_some(),
        "Using explicit proxy configuration for downloads"
    );
    Ok((Some(proxy), false))
}

fn build_config(args: &CliArgs) -> Result<HlsConfig, AppError> {
    let (proxy_config, use_system_proxy) = proxy_settings(args)?;

    let mut builder = HlsConfig::builder()
        .connect_timeout(Duration::from_secs(args.connect_timeout))
        .use_system_proxy(use_system_proxy);
    if let Some(user_agent) = &args.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    if let Some(proxy) = proxy_config {
        builder = builder.proxy(proxy);
    }

    Ok(builder
        .playlist_fetch_timeout(Duration::from_secs(args.playlist_timeout))
        .key_download_timeout(Duration::from_secs(args.key_timeout))
        .segment_download_timeout(Duration::from_secs(args.segment_timeout))
        .build())
}

fn output_path(args: &CliArgs, default_extension: &str) -> PathBuf {
    let path = match &args.output {
        Some(path) => ensure_extension(path, default_extension),
        None => {
            let title = extract_title_from_url(&args.url);
            ensure_extension(&args.output_dir.join(title), default_extension)
        }
    };

    if args.overwrite {
        path
    } else {
        available_path(&path)
    }
}

#[tokio::main]
async fn bootstrap() -> Result<bool, AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();
    init_logging(&args)?;

    if !is_valid_url(&args.url) {
        return Err(AppError::InvalidInput(format!(
            "'{}' is not an http(s) URL",
            args.url
        )));
    }
    if !is_playlist_url(&args.url) {
        if !args.no_url_check {
            return Err(AppError::InvalidInput(format!(
                "'{}' does not look like an M3U8 playlist (use --no-url-check to try anyway)",
                args.url
            )));
        }
        warn!(url = %args.url, "URL does not look like an M3U8 playlist");
    }

    let config = build_config(&args)?;
    let output = output_path(&args, &config.output_config.default_output_extension);
    info!(
        url = %args.url,
        output = %output.display(),
        workers = args.workers,
        retries = args.retries,
        "Starting download"
    );

    let coordinator = Arc::new(DownloadCoordinator::new(config));

    let stopper = Arc::clone(&coordinator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight segments");
            stopper.stop();
        }
    });

    let progress_manager = if args.show_progress {
        ProgressManager::new()
    } else {
        ProgressManager::new_disabled()
    };
    let json = args.json;
    let on_progress = Arc::new(move |event: ProgressEvent| {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to serialize progress event"),
            }
        } else {
            progress_manager.handle_event(&event);
        }
    });

    let request = DownloadRequest::new(args.url.clone(), output.clone())
        .with_headers(parse_headers(&args.headers))
        .with_max_workers(usize::from(args.workers))
        .with_max_retries(args.retries);

    let ok = coordinator.run(request, on_progress).await;
    if ok {
        info!(output = %output.display(), "Saved");
    } else {
        error!(url = %args.url, "Download did not produce an output file");
    }
    Ok(ok)
}
