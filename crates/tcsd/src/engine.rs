use serde::Serialize;
use tcs_core::{Command, NormalizedColor, RawChannels, Reply};
use tcs_hw::registers::SLAVE_ADDRESS;
use tcs_hw::{
    DeviceSession, LinuxI2c, RegisterTransport, SensorError, SensorStatus, TransportError,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to open i2c bus: {0}")]
    Open(#[from] TransportError),
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("unexpected reply to {0:?}")]
    UnexpectedReply(Command),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Snapshot of the sensor for the status call.
#[derive(Debug, Clone, Serialize)]
pub struct SensorInfo {
    pub device: String,
    pub device_id: Option<u8>,
    pub powered: bool,
    pub status: Option<SensorStatus>,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Execute {
        command: Command,
        reply: oneshot::Sender<Result<Reply, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<SensorInfo>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run one query against the sensor.
    pub async fn execute(&self, command: Command) -> Result<Reply, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Execute {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn raw_colors(&self) -> Result<RawChannels, EngineError> {
        match self.execute(Command::GetRawColors).await? {
            Reply::Raw(raw) => Ok(raw),
            other => Err(EngineError::UnexpectedReply(other.command())),
        }
    }

    pub async fn rgb_colors(&self) -> Result<NormalizedColor, EngineError> {
        match self.execute(Command::GetRgbColors).await? {
            Reply::Rgb(color) => Ok(color),
            other => Err(EngineError::UnexpectedReply(other.command())),
        }
    }

    pub async fn status(&self) -> Result<SensorInfo, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Power the sensor down and stop the engine thread.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(EngineRequest::Shutdown { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

/// Open the configured adapter and start the engine on it.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let transport = LinuxI2c::open(&config.i2c_bus, SLAVE_ADDRESS)?;
    let device = format!("{}@{:#04x}", transport.bus_path(), transport.address());
    tracing::info!(device = %device, "i2c device opened");
    start_engine(transport, device, config.verify_identity)
}

/// Spawn the engine on a dedicated OS thread.
///
/// Checks the device ID (a mismatch is only logged), runs the power-on
/// sequence, then enters a request loop. Fails fast if the bus or the
/// power-on sequence fails.
pub fn start_engine<T>(
    transport: T,
    device: String,
    verify_identity: bool,
) -> Result<EngineHandle, EngineError>
where
    T: RegisterTransport + 'static,
{
    let session = DeviceSession::new(transport);

    let device_id = if verify_identity {
        match session.verify_identity() {
            Ok(id) => {
                tracing::info!(id = %format!("{id:#04x}"), "TCS34725 identified");
                Some(id)
            }
            Err(SensorError::IdentityMismatch { expected, found }) => {
                tracing::warn!(
                    expected = %format!("{expected:#04x}"),
                    found = %format!("{found:#04x}"),
                    "unexpected device id; continuing"
                );
                Some(found)
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        tracing::info!("identity check disabled via TCSD_VERIFY_IDENTITY=0");
        None
    };

    session.power_on()?;

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("tcs-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Execute { command, reply } => {
                        let result = run_command(&session, command).map_err(EngineError::from);
                        if let Err(e) = &result {
                            tracing::warn!(?command, error = %e, "command failed");
                        }
                        let _ = reply.send(result);
                    }
                    EngineRequest::Status { reply } => {
                        let _ = reply.send(sensor_info(&session, &device, device_id));
                    }
                    EngineRequest::Shutdown { reply } => {
                        power_down(&session);
                        let _ = reply.send(());
                        tracing::info!("engine thread exiting");
                        return;
                    }
                }
            }
            // Every handle dropped without an explicit shutdown.
            power_down(&session);
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn run_command<T: RegisterTransport>(
    session: &DeviceSession<T>,
    command: Command,
) -> Result<Reply, SensorError> {
    match command {
        Command::GetRawColors => session.read_raw_channels().map(Reply::Raw),
        Command::GetRgbColors => session.read_normalized().map(Reply::Rgb),
    }
}

fn sensor_info<T: RegisterTransport>(
    session: &DeviceSession<T>,
    device: &str,
    device_id: Option<u8>,
) -> SensorInfo {
    let status = match session.read_status() {
        Ok(status) => Some(status),
        Err(SensorError::NotReady) => None,
        Err(e) => {
            tracing::warn!(error = %e, "status read failed");
            None
        }
    };
    SensorInfo {
        device: device.to_string(),
        device_id,
        powered: session.is_powered(),
        status,
    }
}

fn power_down<T: RegisterTransport>(session: &DeviceSession<T>) {
    if let Err(e) = session.power_off() {
        tracing::warn!(error = %e, "sensor power off failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcs_hw::mock::MockTransport;

    fn started(mock: &MockTransport) -> EngineHandle {
        mock.push_read(&[0x44]);
        start_engine(mock.clone(), "mock".into(), true).unwrap()
    }

    #[tokio::test]
    async fn test_raw_and_rgb_colors() {
        let mock = MockTransport::new();
        let engine = started(&mock);

        mock.push_read(&[100, 0, 50, 0, 100, 0, 200, 0]);
        let raw = engine.raw_colors().await.unwrap();
        assert_eq!(
            raw,
            RawChannels {
                clear: 100,
                red: 50,
                green: 100,
                blue: 200
            }
        );

        mock.push_read(&[100, 0, 50, 0, 100, 0, 200, 0]);
        let color = engine.rgb_colors().await.unwrap();
        assert_eq!(color.to_bytes(), [193, 255, 255]);
    }

    #[tokio::test]
    async fn test_execute_payloads() {
        let mock = MockTransport::new();
        let engine = started(&mock);

        mock.push_read(&[0x10, 0x00, 0x20, 0x00, 0x30, 0x00, 0x40, 0x00]);
        let reply = engine.execute(Command::GetRawColors).await.unwrap();
        assert_eq!(
            reply.to_payload(),
            vec![0x10, 0x00, 0x20, 0x00, 0x30, 0x00, 0x40, 0x00]
        );
    }

    #[tokio::test]
    async fn test_short_read_surfaces_as_error() {
        let mock = MockTransport::new();
        let engine = started(&mock);

        mock.push_read(&[1, 2, 3, 4, 5, 6]);
        let err = engine.raw_colors().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Sensor(SensorError::Transport(TransportError::ShortRead { .. }))
        ));

        // The engine keeps serving after a failed read.
        mock.push_read(&[0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(engine.rgb_colors().await.unwrap(), NormalizedColor::BLACK);
    }

    #[tokio::test]
    async fn test_identity_mismatch_is_advisory() {
        let mock = MockTransport::new();
        mock.push_read(&[0x4d]);
        let engine = start_engine(mock.clone(), "mock".into(), true).unwrap();

        let info = engine.status().await.unwrap();
        assert_eq!(info.device_id, Some(0x4d));
        assert!(info.powered);
    }

    #[tokio::test]
    async fn test_power_on_failure_is_fatal() {
        let mock = MockTransport::new();
        mock.fail_send(1);
        let result = start_engine(mock.clone(), "mock".into(), false);
        assert!(matches!(
            result,
            Err(EngineError::Sensor(SensorError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn test_id_read_failure_is_fatal() {
        let mock = MockTransport::new();
        mock.disconnect();
        assert!(start_engine(mock, "mock".into(), true).is_err());
    }

    #[tokio::test]
    async fn test_status() {
        let mock = MockTransport::new();
        let engine = started(&mock);

        mock.push_read(&[0x11]);
        let info = engine.status().await.unwrap();
        assert_eq!(info.device, "mock");
        assert_eq!(info.device_id, Some(0x44));
        assert!(info.powered);
        assert_eq!(info.status.map(|s| s.rgbc_valid), Some(true));
    }

    #[tokio::test]
    async fn test_shutdown_powers_off() {
        let mock = MockTransport::new();
        let engine = started(&mock);

        engine.shutdown().await;

        let sends = mock.sends();
        assert_eq!(sends.last(), Some(&vec![0x80, 0x00]));
        assert!(matches!(
            engine.raw_colors().await,
            Err(EngineError::ChannelClosed)
        ));
    }
}
