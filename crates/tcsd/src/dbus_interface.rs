use tcs_core::{Command, CommandError};
use tcs_hw::SensorError;
use zbus::interface;

use crate::engine::{EngineError, EngineHandle};

pub const BUS_NAME: &str = "org.freedesktop.ColorSensor1";
pub const OBJECT_PATH: &str = "/org/freedesktop/ColorSensor1";

/// D-Bus interface for the color sensor daemon.
///
/// Bus name: org.freedesktop.ColorSensor1
/// Object path: /org/freedesktop/ColorSensor1
pub struct SensorService {
    engine: EngineHandle,
}

impl SensorService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

#[interface(name = "org.freedesktop.ColorSensor1")]
impl SensorService {
    /// Raw (clear, red, green, blue) counts from a fresh acquisition.
    async fn get_raw_colors(&self) -> zbus::fdo::Result<(u16, u16, u16, u16)> {
        tracing::debug!("get_raw_colors requested");
        let raw = self.engine.raw_colors().await.map_err(to_fdo)?;
        Ok((raw.clear, raw.red, raw.green, raw.blue))
    }

    /// Gamma-corrected (red, green, blue) from a fresh acquisition.
    async fn get_rgb_colors(&self) -> zbus::fdo::Result<(u8, u8, u8)> {
        tracing::debug!("get_rgb_colors requested");
        let color = self.engine.rgb_colors().await.map_err(to_fdo)?;
        Ok((color.red, color.green, color.blue))
    }

    /// Run a query by numeric command code and return its fixed-size
    /// little-endian payload (8 bytes raw, 3 bytes RGB).
    async fn execute(&self, code: u8) -> zbus::fdo::Result<Vec<u8>> {
        let command = Command::try_from(code).map_err(|e: CommandError| {
            tracing::warn!(code, "rejecting unknown command code");
            zbus::fdo::Error::InvalidArgs(e.to_string())
        })?;
        tracing::debug!(?command, "execute requested");
        let reply = self.engine.execute(command).await.map_err(to_fdo)?;
        Ok(reply.to_payload())
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let info = self.engine.status().await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "device": info.device,
            "device_id": info.device_id.map(|id| format!("{id:#04x}")),
            "powered": info.powered,
            "status": info.status,
        })
        .to_string())
    }
}

fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    match err {
        EngineError::Sensor(SensorError::Transport(e)) => {
            zbus::fdo::Error::IOError(e.to_string())
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}
