// panelsync-api: HTTP transport for the counter feed and the light panel controller

pub mod error;
pub mod event_stream;
pub mod feed;
pub mod panel;
pub mod transport;

pub use error::Error;
pub use event_stream::{Frame, FrameDecoder, FrameReader};
pub use feed::{FeedClient, FeedReader};
pub use panel::{Effect, PanelClient, Rgb, TransitionTime};
pub use transport::TransportConfig;
