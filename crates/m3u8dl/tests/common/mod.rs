//! In-process CDN used by the end-to-end tests.

#![allow(dead_code)]

use aes::Aes128;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use m3u8dl_engine::hls::decryption::SegmentCipher;
use m3u8dl_engine::{HlsConfig, JobStatus, ProgressCallback, ProgressEvent, ProgressSnapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub const KEY: [u8; 16] = *b"k3y-f0r-t3st1ng!";

#[derive(Default)]
pub struct CdnState {
    pub media_playlist: String,
    pub segments: Vec<Bytes>,
    /// Number of initial requests per segment answered with 500.
    pub fail_first: HashMap<usize, u32>,
    pub delays: HashMap<usize, Duration>,
    pub key: Option<Bytes>,
    pub segment_hits: Mutex<HashMap<usize, u32>>,
    pub key_hits: AtomicUsize,
    pub playlist_headers: Mutex<Vec<HeaderMap>>,
    pub key_headers: Mutex<Vec<HeaderMap>>,
    pub loop_hits: AtomicUsize,
}

impl CdnState {
    pub fn hits(&self, index: usize) -> u32 {
        self.segment_hits.lock().get(&index).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> u32 {
        self.segment_hits.lock().values().sum()
    }
}

/// Serves:
/// - `/vod/index.m3u8` media playlist
/// - `/master.m3u8` master playlist pointing at `vod/index.m3u8`
/// - `/vod/seg/{index}` segment bodies
/// - `/keys/key.bin` the AES key
/// - `/loop.m3u8` a master playlist whose only variant is itself
pub struct TestCdn {
    base_url: Url,
    pub state: Arc<CdnState>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestCdn {
    pub async fn start(state: CdnState) -> Self {
        let state = Arc::new(state);
        let router = Router::new()
            .route("/master.m3u8", get(master_playlist))
            .route("/vod/index.m3u8", get(media_playlist))
            .route("/vod/seg/{index}", get(segment))
            .route("/keys/key.bin", get(key))
            .route("/loop.m3u8", get(looping_master))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test HTTP listener");
        let addr = listener.local_addr().expect("read test listener local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        tokio::spawn(async move {
            server.await.expect("run test HTTP server");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}")).expect("parse base URL"),
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        self.base_url.join(path).expect("join server URL path").to_string()
    }

    pub fn media_url(&self) -> String {
        self.url("/vod/index.m3u8")
    }

    pub fn master_url(&self) -> String {
        self.url("/master.m3u8")
    }
}

impl Drop for TestCdn {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

async fn master_playlist() -> &'static str {
    "#EXTM3U\n\
     #EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\n\
     vod/index.m3u8\n\
     #EXT-X-STREAM-INF:BANDWIDTH=640000,RESOLUTION=640x360\n\
     vod/low.m3u8\n"
}

async fn media_playlist(State(state): State<Arc<CdnState>>, headers: HeaderMap) -> String {
    state.playlist_headers.lock().push(headers);
    state.media_playlist.clone()
}

async fn segment(State(state): State<Arc<CdnState>>, Path(index): Path<usize>) -> Response {
    let hits = {
        let mut hits = state.segment_hits.lock();
        let entry = hits.entry(index).or_default();
        *entry += 1;
        *entry
    };
    if let Some(delay) = state.delays.get(&index) {
        tokio::time::sleep(*delay).await;
    }
    if hits <= state.fail_first.get(&index).copied().unwrap_or(0) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match state.segments.get(index) {
        Some(body) => body.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn looping_master(State(state): State<Arc<CdnState>>) -> &'static str {
    state.loop_hits.fetch_add(1, Ordering::SeqCst);
    "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000\nloop.m3u8\n"
}

async fn key(State(state): State<Arc<CdnState>>, headers: HeaderMap) -> Response {
    state.key_hits.fetch_add(1, Ordering::SeqCst);
    state.key_headers.lock().push(headers);
    match &state.key {
        Some(key) => key.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Distinct, unaligned bodies so ordering and padding mistakes show up.
pub fn segment_bodies(count: usize) -> Vec<Bytes> {
    (0..count)
        .map(|i| Bytes::from(format!("<segment {i:03}>").repeat(i + 3)))
        .collect()
}

pub fn concat(bodies: &[Bytes]) -> Vec<u8> {
    bodies.iter().flat_map(|b| b.iter().copied()).collect()
}

/// Media playlist listing `/vod/seg/0..count`, with an optional key tag first.
pub fn media_playlist_text(count: usize, key_tag: Option<&str>) -> String {
    let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n");
    if let Some(tag) = key_tag {
        text.push_str(tag);
        text.push('\n');
    }
    for i in 0..count {
        text.push_str(&format!("#EXTINF:4.000,\nseg/{i}\n"));
    }
    text.push_str("#EXT-X-ENDLIST\n");
    text
}

pub fn encrypt(plain: &[u8], iv: &[u8; 16]) -> Bytes {
    let encrypted = cbc::Encryptor::<Aes128>::new_from_slices(&KEY, iv)
        .expect("valid key and iv")
        .encrypt_padded_vec_mut::<Pkcs7>(plain);
    Bytes::from(encrypted)
}

/// Encrypts each body with the IV derived from its index.
pub fn encrypt_with_index_iv(bodies: &[Bytes]) -> Vec<Bytes> {
    bodies
        .iter()
        .enumerate()
        .map(|(i, body)| encrypt(body, &SegmentCipher::default_iv(i)))
        .collect()
}

/// Short backoff so retry tests stay fast.
pub fn test_config() -> HlsConfig {
    HlsConfig::builder()
        .segment_retry_delay_base(Duration::from_millis(10))
        .segment_retry_delay_max(Duration::from_millis(40))
        .download_concurrency(4)
        .use_system_proxy(false)
        .build()
}

#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl EventLog {
    pub fn callback(&self) -> ProgressCallback {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: ProgressEvent| events.lock().push(event))
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn statuses(&self) -> Vec<JobStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Status { status, .. } => Some(status),
                ProgressEvent::Progress(_) => None,
            })
            .collect()
    }

    pub fn messages(&self, wanted: JobStatus) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Status { status, message } if status == wanted => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress(snapshot) => Some(snapshot),
                ProgressEvent::Status { .. } => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        self.statuses().last().copied()
    }
}
