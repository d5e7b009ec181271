use anyhow::Result;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::domain::message::GatewayEvent;
use crate::server::GatewayServer;

/// 向指定客户端发送事件 / Send an event to a specific client
impl GatewayServer {
    pub async fn emit(&self, client_id: &str, event: &GatewayEvent) -> Result<()> {
        if let Some(connection) = self.connections.get(client_id) {
            let text = serde_json::to_string(event)?;
            connection
                .sender
                .send(Message::Text(text))
                .map_err(|e| anyhow::anyhow!("Failed to send event: {}", e))?;
            debug!("📤 Sent {} to client {}", event.event_type, client_id);
            Ok(())
        } else {
            warn!("⚠️  Client {} not found for event {}", client_id, event.event_type);
            Err(anyhow::anyhow!("Client {} not found", client_id))
        }
    }
}
