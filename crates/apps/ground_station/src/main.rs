use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backend::{BackendClient, EventStream, StreamEnd};
use clap::Parser;
use foundation::FileUpload;
use link::{DEFAULT_UDP_PORT, LinkConfig, LinkRequest};
use runtime::NotificationBus;
use scene::RecordingSurface;
use station::{Station, StationConfig, StationServices};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless ground station: fleet telemetry and mission control")]
struct Args {
    /// Backend base URL (default: GCS_BACKEND_URL or http://127.0.0.1:8000)
    #[arg(long)]
    backend_url: Option<String>,

    /// Event stream URL (default: GCS_EVENTS_URL)
    #[arg(long)]
    events_url: Option<String>,

    /// Vehicle link as JSON, e.g. '{"protocol":"UDP","port":14550}'.
    /// Repeat for fleet mode.
    #[arg(long = "link", value_parser = parse_link)]
    links: Vec<LinkConfig>,

    /// Do not subscribe to the backend event stream
    #[arg(long)]
    no_events: bool,

    /// Geofile (KML or GeoJSON) to load and plan a coverage path over
    #[arg(long)]
    geofile: Option<PathBuf>,

    /// Seconds between fleet status log lines
    #[arg(long, default_value_t = 5)]
    report_every: u64,
}

fn parse_link(raw: &str) -> Result<LinkConfig, String> {
    let config: LinkConfig = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn link_request(mut links: Vec<LinkConfig>) -> LinkRequest {
    match links.len() {
        0 => LinkConfig::udp("127.0.0.1", DEFAULT_UDP_PORT).into(),
        1 => links.remove(0).into(),
        _ => LinkRequest::multi(links),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = StationConfig::from_env();
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }
    if let Some(url) = args.events_url {
        config.events_url = url;
    }

    let client = Arc::new(BackendClient::new(config.backend_url.clone())?);
    let surface = Arc::new(RecordingSurface::new());
    let mut station = Station::mount(
        config.clone(),
        StationServices::from_backend(client),
        surface.clone(),
        NotificationBus::new(),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let events = (!args.no_events).then(|| {
        let stream = EventStream::new(config.events_url.clone(), station.events().clone());
        tokio::spawn(async move {
            match stream.run(stop_rx).await {
                Ok(StreamEnd::Closed) => warn!(url = stream.url(), "event stream closed by server"),
                Ok(StreamEnd::Stopped) => {}
                Err(e) => error!(url = stream.url(), "event stream failed: {e}"),
            }
        })
    });

    station.connect(link_request(args.links)).await?;

    if let Some(path) = args.geofile {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "geofile".to_string());
        let bytes = tokio::fs::read(&path).await?;
        let geometry = station.geofile().load(FileUpload::new(name, bytes))?;
        info!(features = geometry.feature_count(), "geofile loaded");
        match station.geofile().generate_coverage(None).await {
            Ok(path) => info!(
                waypoints = path.stats.total_waypoints,
                length_km = path.stats.path_length_km,
                coverage = path.stats.coverage_ratio,
                "coverage planned"
            ),
            Err(e) => warn!("coverage planning failed: {e}"),
        }
    }

    let mut report = tokio::time::interval(Duration::from_secs(args.report_every.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                if let Some(message) = station.status().take() {
                    info!(%message, "status");
                }
                let fleet = station.fleet().fleet();
                let selected = station.fleet().selected();
                for (id, vehicle) in fleet.iter() {
                    info!(
                        vehicle = %id,
                        selected = selected == Some(id),
                        mode = vehicle.flight_mode.as_deref().unwrap_or("--"),
                        armed = ?vehicle.armed,
                        battery = ?vehicle.battery_remaining,
                        lat = ?vehicle.latitude_deg,
                        lon = ?vehicle.longitude_deg,
                        "vehicle"
                    );
                }
                if let Some((target, telemetry)) = station.fleet().telemetry() {
                    info!(target = ?target, missing = ?telemetry.missing_sections(), "telemetry");
                }
                if let Some(event) = station.events().lock().latest() {
                    info!(at = %event.timestamp, "{}", event.message);
                }
            }
        }
    }

    info!("shutting down");
    let _ = stop_tx.send(true);
    if let Some(handle) = events {
        let _ = handle.await;
    }
    if let Err(e) = station.disconnect().await {
        warn!("disconnect failed: {e}");
    }
    let removed = station.unmount();
    info!(removed, entities = surface.entity_count(), "station unmounted");
    Ok(())
}
