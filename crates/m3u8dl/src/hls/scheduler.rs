// HLS Segment Scheduler: runs one fetch per segment with bounded concurrency.

use crate::hls::fetcher::{FetchOutcome, SegmentDownloader};
use crate::hls::playlist::Segment;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct SegmentScheduler {
    segment_fetcher: Arc<dyn SegmentDownloader>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl SegmentScheduler {
    pub fn new(
        segment_fetcher: Arc<dyn SegmentDownloader>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            segment_fetcher,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Dispatches every segment once and hands each outcome to `on_outcome` as
    /// it arrives. Nothing new is dispatched after cancellation; in-flight
    /// fetches are drained. Returns the number of dispatched segments.
    pub async fn run<F>(&self, segments: &[Segment], scratch_dir: &Path, mut on_outcome: F) -> usize
    where
        F: FnMut(&Segment, FetchOutcome),
    {
        let mut pending = segments.iter();
        let mut futures = FuturesUnordered::new();
        let mut dispatched = 0;

        info!(
            segments = segments.len(),
            concurrency = self.concurrency,
            "Segment scheduler started"
        );

        loop {
            while futures.len() < self.concurrency && !self.cancel.is_cancelled() {
                let Some(segment) = pending.next() else {
                    break;
                };
                let fetcher = Arc::clone(&self.segment_fetcher);
                let cancel = self.cancel.clone();
                futures.push(async move {
                    let outcome = fetcher.fetch(segment, scratch_dir, &cancel).await;
                    (segment, outcome)
                });
                dispatched += 1;
            }

            match futures.next().await {
                Some((segment, outcome)) => on_outcome(segment, outcome),
                None => break,
            }
        }

        if self.cancel.is_cancelled() {
            debug!(
                dispatched,
                skipped = segments.len() - dispatched,
                "Segment scheduler stopped early"
            );
        }
        info!(dispatched, "Segment scheduler finished");
        dispatched
    }
}
