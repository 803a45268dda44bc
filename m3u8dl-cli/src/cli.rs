use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "M3U8 (HLS) playlist downloader",
    long_about = "Downloads every segment of an M3U8 video-on-demand playlist concurrently,\n\
                  decrypts AES-128 segments and joins them into a single file.\n\
                  \n\
                  Master playlists are followed to their first variant. Segments that keep\n\
                  failing are left out of the output and reported as a warning."
)]
pub struct CliArgs {
    /// Playlist URL
    #[arg(required = true, help = "URL of the M3U8 playlist to download")]
    pub url: String,

    /// Output file
    #[arg(
        short,
        long,
        help = "Output file path (default: a name derived from the URL, in --output-dir). \".mp4\" is appended when the path has no extension"
    )]
    pub output: Option<PathBuf>,

    /// Output directory used when no output file is given
    #[arg(
        short = 'd',
        long,
        default_value = ".",
        help = "Directory for the derived output file name"
    )]
    pub output_dir: PathBuf,

    /// Replace an existing output file
    #[arg(
        long,
        help = "Overwrite the output file instead of picking a free name (name_1.mp4, name_2.mp4, ...)"
    )]
    pub overwrite: bool,

    /// Number of concurrent segment downloads
    #[arg(
        short,
        long,
        default_value = "16",
        value_parser = clap::value_parser!(u16).range(1..=32),
        help = "Maximum number of concurrent segment downloads (1-32)"
    )]
    pub workers: u16,

    /// Attempts per segment
    #[arg(
        short,
        long,
        default_value = "3",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Number of attempts for each segment before it is given up"
    )]
    pub retries: u32,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// User agent override
    #[arg(long, help = "User agent sent with every request")]
    pub user_agent: Option<String>,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Playlist timeout in seconds
    #[arg(
        long,
        default_value = "45",
        help = "Timeout for each playlist request in seconds"
    )]
    pub playlist_timeout: u64,

    /// Key timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Timeout for decryption key requests in seconds"
    )]
    pub key_timeout: u64,

    /// Segment timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Timeout for individual segment downloads in seconds"
    )]
    pub segment_timeout: u64,

    /// Proxy URL (e.g., "http://proxy.example.com:8080")
    #[arg(
        long,
        help = "Proxy server URL for downloads (e.g., \"http://proxy.example.com:8080\")"
    )]
    pub proxy: Option<String>,

    /// Proxy type (http, https, socks5, all)
    #[arg(
        long,
        default_value = "all",
        help = "Proxy type (http, https, socks5, all)",
        value_parser = ["http", "https", "socks5", "all"]
    )]
    pub proxy_type: String,

    /// Proxy username
    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    /// Disable all proxy settings for downloads
    #[arg(
        long,
        help = "Disable all proxy settings (including system proxy) for downloads"
    )]
    pub no_proxy: bool,

    /// Accept URLs that do not mention m3u8
    #[arg(
        long,
        help = "Skip the check that the URL looks like an M3U8 playlist"
    )]
    pub no_url_check: bool,

    /// Show progress bar
    #[arg(
        short = 'P',
        long = "progress",
        conflicts_with = "json",
        help = "Show a progress bar for the download"
    )]
    pub show_progress: bool,

    /// Emit progress as JSON lines
    #[arg(long, help = "Print every progress event as a JSON line on stdout")]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}
