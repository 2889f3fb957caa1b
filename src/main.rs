//! Shotrial Node - peer-review coordination service
//!
//! Runs the trusted review service: clients connect over TCP, and all
//! claim/outcome/arbitration state lives here, snapshotted to sled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use shotrial::review::ReviewConfig;
use shotrial::service::{ReviewService, ServiceConfig, ServiceEvent};
use shotrial::store::Persistence;

/// Node configuration
#[derive(Clone, Debug)]
struct NodeConfig {
    /// Service listen address
    listen_addr: String,
    /// Sled database directory
    data_dir: PathBuf,
    /// Claim lease in hours
    claim_lease_hours: i64,
    /// Seconds between store snapshots
    snapshot_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shotrial");

        Self {
            listen_addr: "127.0.0.1:7420".to_string(),
            data_dir,
            claim_lease_hours: 24,
            snapshot_interval_secs: 30,
        }
    }
}

fn parse_args() -> NodeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = NodeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--listen" | "-l" => {
                i += 1;
                if i < args.len() {
                    config.listen_addr = args[i].clone();
                }
            }
            "--data-dir" | "-d" => {
                i += 1;
                if i < args.len() {
                    config.data_dir = PathBuf::from(&args[i]);
                }
            }
            "--claim-lease-hours" => {
                i += 1;
                if i < args.len() {
                    config.claim_lease_hours = args[i].parse().unwrap_or(24);
                }
            }
            "--snapshot-interval" => {
                i += 1;
                if i < args.len() {
                    config.snapshot_interval_secs = args[i].parse().unwrap_or(30);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!("Shotrial Node");
    println!();
    println!("USAGE:");
    println!("    shotrial-node [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -l, --listen <ADDR>           Listen address (default: 127.0.0.1:7420)");
    println!("    -d, --data-dir <DIR>          Database directory");
    println!("    --claim-lease-hours <HOURS>   Stale-claim lease (default: 24)");
    println!("    --snapshot-interval <SECS>    Snapshot cadence (default: 30)");
    println!("    -h, --help                    Print help");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = parse_args();

    println!("Shotrial Node v{}", shotrial::VERSION);
    println!("Peer-review coordination service");
    println!();

    let persistence = Persistence::open(&config.data_dir)?;
    let store = persistence.load()?;
    info!(
        users = store.users().count(),
        videos = store.videos().count(),
        disputes = store.disputes().len(),
        "store loaded from {}",
        config.data_dir.display()
    );

    let store = Arc::new(RwLock::new(store));

    let service_config = ServiceConfig {
        listen_addr: config.listen_addr.clone(),
        review: ReviewConfig {
            claim_lease_ms: config.claim_lease_hours * 60 * 60 * 1000,
        },
    };

    let (service, mut event_rx) = ReviewService::new(Arc::clone(&store), &service_config);

    let listener = TcpListener::bind(&service_config.listen_addr).await?;
    info!("listening on {}", service_config.listen_addr);

    let server = service.clone();
    tokio::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            warn!("service stopped: {e}");
        }
    });

    let mut snapshot_timer =
        tokio::time::interval(Duration::from_secs(config.snapshot_interval_secs.max(1)));
    snapshot_timer.tick().await; // first tick fires immediately

    // Main loop: surface collaborator events, snapshot on a timer, flush on
    // shutdown
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    ServiceEvent::VideoCompleted { video_id, country } => {
                        info!(video = %video_id, country = %country, "video entered review pool");
                    }
                    ServiceEvent::DisputeCreated { video_id } => {
                        info!(video = %video_id, "dispute raised - admin attention needed");
                    }
                    ServiceEvent::DisputeResolved { video_id } => {
                        info!(video = %video_id, "dispute resolved");
                    }
                }
            }

            _ = snapshot_timer.tick() => {
                let store = store.read().await;
                if let Err(e) = persistence.snapshot(&store) {
                    warn!("snapshot failed: {e}");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                let store = store.read().await;
                persistence.snapshot(&store)?;
                break;
            }
        }
    }

    Ok(())
}
