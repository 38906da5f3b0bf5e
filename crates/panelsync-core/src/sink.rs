// ── Command sinks ──
//
// Where device commands go. The live sink renders the desired state as a
// colour through the configured `Palette` and writes it to the controller.

use std::future::Future;

use panelsync_api::PanelClient;
use tracing::debug;

use crate::config::Palette;
use crate::error::CoreError;
use crate::model::DeviceCommand;

/// Receiver of idempotent device commands.
pub trait CommandSink: Send + Sync {
    fn dispatch(&self, command: &DeviceCommand)
    -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Panel controller sink.
pub struct PanelSink {
    client: PanelClient,
    palette: Palette,
}

impl PanelSink {
    pub fn new(client: PanelClient, palette: Palette) -> Self {
        Self { client, palette }
    }
}

impl CommandSink for PanelSink {
    async fn dispatch(&self, command: &DeviceCommand) -> Result<(), CoreError> {
        let color = self.palette.color_for(command.desired);
        debug!(
            entity = %command.entity,
            panel_id = command.target,
            state = %command.desired,
            %color,
            "writing panel colour"
        );

        self.client
            .set_color(command.target, color)
            .await
            .map_err(|e| CoreError::CommandDispatchFailed {
                entity: command.entity.to_string(),
                reason: e.to_string(),
            })
    }
}
