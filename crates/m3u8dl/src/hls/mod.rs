// HLS VOD downloader: playlist resolution, segment fetching and merging.

pub mod builder;
pub mod config;
pub mod coordinator;
pub mod decryption;
pub mod events;
pub mod fetcher;
pub mod job;
pub mod merger;
pub mod playlist;
pub mod progress;
pub mod scheduler;

// Re-exports for easier access
pub use builder::HlsConfigBuilder;
pub use config::HlsConfig;
pub use coordinator::{DownloadCoordinator, DownloadRequest};
pub use events::{JobStatus, ProgressCallback, ProgressEvent};
pub use playlist::{EncryptionInfo, EncryptionMethod, Playlist, PlaylistResolver, Segment};
pub use progress::ProgressSnapshot;
