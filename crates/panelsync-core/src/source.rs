// ── Frame sources ──
//
// The reconciler pulls frames through these two traits so the loop can be
// driven by the live HTTP feed or by an in-memory script in tests.

use std::future::Future;

use panelsync_api::{FeedClient, FeedReader, Frame};
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// An opened, single-use sequence of frames.
pub trait FrameStream: Send {
    /// Next frame, `Ok(None)` once the sequence has ended.
    fn next_frame(&mut self) -> impl Future<Output = Result<Option<Frame>, CoreError>> + Send;
}

/// Something that can open a fresh [`FrameStream`] on demand.
pub trait FeedSource: Send + Sync {
    type Frames: FrameStream;

    fn open(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Self::Frames, CoreError>> + Send;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

impl FrameStream for FeedReader {
    async fn next_frame(&mut self) -> Result<Option<Frame>, CoreError> {
        Ok(self.next().await?)
    }
}

impl FeedSource for FeedClient {
    type Frames = FeedReader;

    async fn open(&self, cancel: &CancellationToken) -> Result<FeedReader, CoreError> {
        Ok(FeedClient::open(self, cancel).await?)
    }

    fn describe(&self) -> String {
        self.url().to_string()
    }
}
