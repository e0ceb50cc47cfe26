use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::{Config, DeviceCheckMode};
use crate::error::DeviceError;

const HI_RES_TRAIT: &str = "hi-res-lossless";

/// Source of upgraded manifest URLs
#[async_trait]
pub trait ManifestUpgrader: Send + Sync {
    /// Ask for an upgraded manifest. `Ok(None)` means no upgrade is available.
    async fn upgrade(&self, id: &str) -> Result<Option<String>, DeviceError>;
}

/// Upgrader talking to the device helper over TCP.
///
/// Request: one length byte, then the id. Reply: one line, empty when the
/// helper has no enhanced manifest.
#[derive(Debug, Clone)]
pub struct DeviceUpgrader {
    addr: String,
}

impl DeviceUpgrader {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl ManifestUpgrader for DeviceUpgrader {
    async fn upgrade(&self, id: &str) -> Result<Option<String>, DeviceError> {
        let len = u8::try_from(id.len()).map_err(|_| DeviceError::IdTooLong { id: id.to_string() })?;

        let mut stream =
            TcpStream::connect(&self.addr)
                .await
                .map_err(|e| DeviceError::ConnectFailed {
                    addr: self.addr.clone(),
                    source: e,
                })?;

        let io_err = |e| DeviceError::Io {
            addr: self.addr.clone(),
            source: e,
        };

        stream.write_all(&[len]).await.map_err(io_err)?;
        stream.write_all(id.as_bytes()).await.map_err(io_err)?;
        stream.flush().await.map_err(io_err)?;

        let mut reply = String::new();
        BufReader::new(stream)
            .read_line(&mut reply)
            .await
            .map_err(io_err)?;

        let reply = reply.trim();
        debug!(%id, %reply, "device replied");

        // Anything other than a manifest URL counts as "no upgrade"
        if reply.ends_with(".m3u8") {
            Ok(Some(reply.to_string()))
        } else {
            Ok(None)
        }
    }
}

/// Whether a track with the given audio traits should ask the device
pub fn wants_device_upgrade(config: &Config, audio_traits: &[String]) -> bool {
    if !config.get_m3u8_from_device {
        return false;
    }
    match config.get_m3u8_mode {
        DeviceCheckMode::All => true,
        DeviceCheckMode::Hires => audio_traits.iter().any(|t| t == HI_RES_TRAIT),
        DeviceCheckMode::None => false,
    }
}
