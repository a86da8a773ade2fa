use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tcs_core::{normalize, NormalizedColor, RawChannels};
use tcs_hw::registers::SLAVE_ADDRESS;
use tcs_hw::{DeviceSession, LinuxI2c, RegisterTransport, SensorError};

// D-Bus proxy — `#[zbus::proxy]` generates `ColorSensorProxy` (async) and
// `ColorSensorProxyBlocking`. Only the async variant is used here.
#[zbus::proxy(
    interface = "org.freedesktop.ColorSensor1",
    default_service = "org.freedesktop.ColorSensor1",
    default_path = "/org/freedesktop/ColorSensor1"
)]
trait ColorSensor {
    async fn get_raw_colors(&self) -> zbus::Result<(u16, u16, u16, u16)>;
    async fn get_rgb_colors(&self) -> zbus::Result<(u8, u8, u8)>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "tcs", about = "TCS34725 color sensor CLI")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read raw clear/red/green/blue counts
    Raw {
        #[arg(long)]
        json: bool,
    },
    /// Read gamma-corrected RGB
    Rgb {
        #[arg(long)]
        json: bool,
    },
    /// Show daemon status
    Status,
    /// Probe the sensor directly, bypassing the daemon
    Probe {
        /// I2C adapter device path
        #[arg(long, default_value = "/dev/i2c-1")]
        bus: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Raw { json } => {
            let proxy = connect(cli.session).await?;
            let (clear, red, green, blue) = proxy.get_raw_colors().await?;
            print_raw(
                &RawChannels {
                    clear,
                    red,
                    green,
                    blue,
                },
                json,
            )?;
        }
        Commands::Rgb { json } => {
            let proxy = connect(cli.session).await?;
            let (red, green, blue) = proxy.get_rgb_colors().await?;
            print_rgb(&NormalizedColor { red, green, blue }, json)?;
        }
        Commands::Status => match connect(cli.session).await {
            Ok(proxy) => println!("{}", proxy.status().await?),
            Err(e) => {
                tracing::debug!(error = %e, "daemon connection failed");
                println!("tcsd: not connected");
            }
        },
        Commands::Probe { bus } => {
            // Blocking bus I/O with settling sleeps; keep it off the runtime.
            tokio::task::spawn_blocking(move || probe(&bus))
                .await
                .context("probe task panicked")??;
        }
    }

    Ok(())
}

async fn connect(session: bool) -> Result<ColorSensorProxy<'static>> {
    let connection = if session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    };
    let connection = connection.context("failed to connect to D-Bus")?;

    ColorSensorProxy::new(&connection)
        .await
        .context("failed to reach tcsd")
}

fn print_raw(raw: &RawChannels, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(raw)?);
    } else {
        println!("Clear: {}", raw.clear);
        println!("Red:   {}", raw.red);
        println!("Green: {}", raw.green);
        println!("Blue:  {}", raw.blue);
    }
    Ok(())
}

fn print_rgb(color: &NormalizedColor, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(color)?);
    } else {
        println!(
            "R={} G={} B={} ({})",
            color.red,
            color.green,
            color.blue,
            color.hex()
        );
    }
    Ok(())
}

fn probe(bus: &str) -> Result<()> {
    println!("Probing TCS34725 on {bus} at {SLAVE_ADDRESS:#04x}...");

    let transport =
        LinuxI2c::open(bus, SLAVE_ADDRESS).with_context(|| format!("failed to open {bus}"))?;
    println!("Opened {} (address {:#04x})", transport.bus_path(), transport.address());
    let session = DeviceSession::new(transport);

    match session.verify_identity() {
        Ok(id) => println!("Device ID: {id:#04x} (TCS34725)"),
        Err(SensorError::IdentityMismatch { expected, found }) => {
            println!("Device ID: {found:#04x} (expected {expected:#04x}, continuing)");
        }
        Err(e) => return Err(e).context("failed to read device id"),
    }

    session.power_on().context("power-on sequence failed")?;
    println!("Powered on");

    powered_sample(&session, |raw| {
        print_raw(raw, false)?;
        print_rgb(&normalize(raw), false)
    })
}

/// Take one sample from a powered session, then power it off whatever the outcome.
///
/// An acquisition error takes precedence over a power-off error.
fn powered_sample<T, F>(session: &DeviceSession<T>, report: F) -> Result<()>
where
    T: RegisterTransport,
    F: FnOnce(&RawChannels) -> Result<()>,
{
    let sampled = session
        .read_raw_channels()
        .context("failed to read channels")
        .and_then(|raw| report(&raw));
    let powered_off = session.power_off().context("failed to power off");
    sampled.and(powered_off)
}
