use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "msface", about = "msface face identification CLI")]
struct Cli {
    /// Talk to msfaced on the system bus instead of the session bus
    #[arg(long, env = "MSFACE_SYSTEM_BUS")]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count faces in a device's current image
    Detect {
        /// Camera entity id or device name
        device: String,
    },
    /// Identify faces in a device's current image
    Identify { device: String },
    /// Capture a frame from a camera and store it on its device
    Snapshot {
        /// Camera entity id (e.g. "camera.front_door")
        camera: String,
    },
    /// Snapshot followed by identify
    Scan { device: String },
    /// Identify faces in a local image file
    Process {
        device: String,
        /// JPEG or PNG file to submit
        image: PathBuf,
    },
    /// Create or replace a person group
    CreateGroup { name: String },
    /// Reload the enrolled identities of a device
    Reload { device: String },
    /// Show the current face state of a device
    Faces { device: String },
    /// Show daemon status
    Status,
}

// `#[zbus::proxy]` generates `IdentifyProxy` (async) and `IdentifyProxyBlocking`.
#[zbus::proxy(
    interface = "org.msface.Identify1",
    default_service = "org.msface.Identify1",
    default_path = "/org/msface/Identify1"
)]
trait Identify {
    async fn detect(&self, device: &str) -> zbus::Result<()>;
    async fn identify(&self, device: &str) -> zbus::Result<()>;
    async fn snapshot(&self, camera_entity: &str) -> zbus::Result<()>;
    async fn scan(&self, device: &str) -> zbus::Result<()>;
    async fn process_image(&self, device: &str, image: Vec<u8>) -> zbus::Result<()>;
    async fn create_group(&self, name: &str) -> zbus::Result<()>;
    async fn reload_identities(&self, device: &str) -> zbus::Result<()>;
    async fn faces(&self, device: &str) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

/// Re-indent a JSON document returned by the daemon.
fn pretty(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| raw.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    };
    let conn = conn.context("connecting to D-Bus")?;
    let proxy = IdentifyProxy::new(&conn).await?;

    match cli.command {
        Commands::Detect { device } => {
            proxy.detect(&device).await?;
            println!("{}", pretty(&proxy.faces(&device).await?));
        }
        Commands::Identify { device } => {
            proxy.identify(&device).await?;
            println!("{}", pretty(&proxy.faces(&device).await?));
        }
        Commands::Snapshot { camera } => {
            proxy.snapshot(&camera).await?;
            println!("Snapshot requested for {camera}");
        }
        Commands::Scan { device } => {
            proxy.scan(&device).await?;
            println!("{}", pretty(&proxy.faces(&device).await?));
        }
        Commands::Process { device, image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            tracing::debug!(bytes = bytes.len(), "submitting image");
            proxy.process_image(&device, bytes).await?;
            println!("{}", pretty(&proxy.faces(&device).await?));
        }
        Commands::CreateGroup { name } => {
            proxy.create_group(&name).await?;
            println!("Create group requested: {name}");
        }
        Commands::Reload { device } => {
            proxy.reload_identities(&device).await?;
            println!("{}", pretty(&proxy.faces(&device).await?));
        }
        Commands::Faces { device } => {
            println!("{}", pretty(&proxy.faces(&device).await?));
        }
        Commands::Status => {
            println!("{}", pretty(&proxy.status().await?));
        }
    }

    Ok(())
}
