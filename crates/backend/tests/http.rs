use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use backend::BackendClient;
use foundation::{FileUpload, GeoPoint, VehicleId};
use geofile::{CoveragePlanner, CoverageRequest, GeofileError};
use link::{LinkConfig, LinkError, LinkManager, LinkState};
use mission::{GeofileMissionRequest, MissionService, SubmitError, TerminalAction, WaypointStore};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use runtime::NotificationBus;
use serde_json::{Value, json};
use telemetry::{TelemetryError, TelemetrySource};

async fn serve(app: Router) -> BackendClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    BackendClient::new(format!("http://{addr}")).unwrap()
}

async fn field_names(mut multipart: Multipart) -> Vec<String> {
    let mut names = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        names.push(field.name().unwrap_or_default().to_string());
        let _ = field.bytes().await.unwrap();
    }
    names
}

#[tokio::test]
async fn connect_and_disconnect_through_link_manager() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
    let record = seen.clone();
    let app = Router::new()
        .route(
            "/telemetry/connect",
            post(move |Json(body): Json<Value>| {
                let record = record.clone();
                async move {
                    record.lock().push(body);
                    Json(json!({
                        "message": "Connected",
                        "connections": ["udp:127.0.0.1:14550"],
                        "count": 1
                    }))
                }
            }),
        )
        .route(
            "/telemetry/disconnect",
            post(|| async { Json(json!({"message": "Disconnected"})) }),
        );
    let client = serve(app).await;
    let manager = LinkManager::new(Arc::new(client), NotificationBus::new());

    let ack = manager.connect(LinkConfig::udp("127.0.0.1", 14550)).await.unwrap();
    assert_eq!(ack.connections, vec!["udp:127.0.0.1:14550".to_string()]);
    assert_eq!(manager.state(), LinkState::Connected);
    assert_eq!(
        seen.lock().as_slice(),
        &[json!({"protocol": "UDP", "host": "127.0.0.1", "port": 14550})]
    );

    manager.disconnect().await.unwrap();
    assert_eq!(manager.state(), LinkState::Disconnected);
}

#[tokio::test]
async fn busy_serial_port_is_reported_as_device_busy() {
    let app = Router::new().route(
        "/telemetry/connect",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "could not open port /dev/ttyUSB0: Device or resource busy"})),
            )
        }),
    );
    let manager = LinkManager::new(Arc::new(serve(app).await), NotificationBus::new());

    let err = manager
        .connect(LinkConfig::serial("/dev/ttyUSB0", 57600))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::DeviceBusy(_)));
    let status = manager.status();
    assert_eq!(status.state, LinkState::Disconnected);
    assert!(status.last_error.unwrap().contains("busy"));
}

#[tokio::test]
async fn fleet_status_parses_sparse_summaries() {
    let app = Router::new().route(
        "/fleet/status",
        get(|| async {
            Json(json!({
                "fleet": {
                    "1": {"flight_mode": "GUIDED", "armed": true, "latitude_deg": 19.0, "longitude_deg": 72.8},
                    "3": {"connected": true}
                },
                "count": 2,
                "timestamp": 1700000000.5
            }))
        }),
    );
    let client = serve(app).await;

    let fleet = client.fleet_status().await.unwrap();
    assert_eq!(fleet.ids().collect::<Vec<_>>(), vec![VehicleId(1), VehicleId(3)]);
    let one = fleet.get(VehicleId(1)).unwrap();
    assert_eq!(one.flight_mode.as_deref(), Some("GUIDED"));
    assert!(one.position().is_some());
    assert!(fleet.get(VehicleId(3)).unwrap().position().is_none());
}

#[tokio::test]
async fn sensors_by_vehicle_and_unknown_vehicle() {
    let app = Router::new().route(
        "/telemetry/sensors",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            match q.get("sys_id").map(String::as_str) {
                Some("2") => (
                    StatusCode::OK,
                    Json(json!({
                        "gps": {"latitude": 19.2, "longitude": 72.9, "altitude": 41.0},
                        "battery": {"voltage": "--", "current": "--", "remaining": "--"},
                        "status": {"armed": true, "mode": "AUTO"},
                        "timestamp": "t1"
                    })),
                ),
                _ => (
                    StatusCode::NOT_FOUND,
                    Json(json!({"detail": "Drone not found"})),
                ),
            }
        }),
    );
    let client = serve(app).await;

    let snap = client.telemetry(Some(VehicleId(2))).await.unwrap();
    assert_eq!(snap.position.unwrap().alt_m, Some(41.0));
    assert_eq!(snap.power, None, "placeholder-only section is absent");
    assert_eq!(snap.mode.as_deref(), Some("AUTO"));

    assert_eq!(
        client.telemetry(Some(VehicleId(9))).await.unwrap_err(),
        TelemetryError::NotFound(VehicleId(9))
    );
}

#[tokio::test]
async fn manual_mission_success_and_rejection_detail() {
    let app = Router::new().route(
        "/mission/manual",
        post(|Json(body): Json<Value>| async move {
            if body["waypoints"].as_array().is_some_and(|w| w.len() > 1) {
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Mission uploaded",
                        "summary": {"auto_started": body["auto_start"], "waypoint_count": 2}
                    })),
                )
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"detail": "Mission needs at least two waypoints"})),
                )
            }
        }),
    );
    let client = serve(app).await;

    let mut store = WaypointStore::new();
    store.add(72.0, 19.0, Some(30.0), None).unwrap();
    let one = store.mission(None).to_manual_request(false).unwrap();
    assert_eq!(
        client.start_manual_mission(&one).await.unwrap_err(),
        SubmitError::Rejected("Mission needs at least two waypoints".to_string())
    );

    store.add(72.01, 19.01, Some(30.0), None).unwrap();
    let two = store.mission(None).to_manual_request(false).unwrap();
    let summary = client.start_manual_mission(&two).await.unwrap();
    assert!(summary.auto_started);
    assert_eq!(summary.extra["waypoint_count"], json!(2));
}

#[tokio::test]
async fn geofile_mission_is_sent_as_multipart() {
    let app = Router::new().route(
        "/mission/start",
        post(|multipart: Multipart| async move {
            let names = field_names(multipart).await;
            Json(json!({"message": "ok", "summary": {"auto_started": false, "fields": names}}))
        }),
    );
    let client = serve(app).await;

    let request = GeofileMissionRequest {
        file: FileUpload::from_text("area.kml", "<kml/>"),
        start: None,
        altitude_m: 30.0,
        speed_m_s: 5.0,
        sensor_width_m: 30.0,
        overlap: 0.2,
        connection_string: "udp:127.0.0.1:14550".to_string(),
        auto_start: false,
        end_action: TerminalAction::Rtl,
        sys_id: Some(VehicleId(1)),
    };
    let summary = client.start_geofile_mission(&request).await.unwrap();
    assert_eq!(
        summary.extra["fields"],
        json!([
            "kml_file",
            "use_drone_position",
            "altitude",
            "speed",
            "sensor_width",
            "overlap",
            "connection_string",
            "auto_start",
            "end_action",
            "sys_id"
        ])
    );
}

#[tokio::test]
async fn coverage_path_from_backend_planner() {
    let app = Router::new().route(
        "/path/generate",
        post(|multipart: Multipart| async move {
            let names = field_names(multipart).await;
            if !names.iter().any(|n| n == "uav_start_lat") {
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": [{"msg": "field required"}]})));
            }
            (
                StatusCode::OK,
                Json(json!({
                    "waypoints": [
                        {"longitude": 72.0, "latitude": 19.0, "altitude": 0.0},
                        {"longitude": 72.01, "latitude": 19.0, "altitude": 0.0}
                    ],
                    "statistics": {
                        "total_waypoints": 2,
                        "path_length_km": 1.05,
                        "coverage_ratio": 0.9,
                        "geofence_bounds": {"west": 72.0, "south": 19.0, "east": 72.01, "north": 19.01}
                    }
                })),
            )
        }),
    );
    let client = serve(app).await;

    let request = CoverageRequest {
        file: FileUpload::from_text("area.kml", "<kml/>"),
        start: GeoPoint::new(72.0, 19.0, 0.0),
        sensor_width_m: 30.0,
        overlap: 0.2,
    };
    let path = client.plan(&request).await.unwrap();
    assert_eq!(path.waypoints.len(), 2);
    assert_eq!(path.stats.total_waypoints, 2);
    assert_eq!(path.stats.bounds.map(|b| b.north), Some(19.01));

    let bad = CoverageRequest {
        overlap: 1.5,
        ..request
    };
    assert!(matches!(
        client.plan(&bad).await,
        Err(GeofileError::InvalidRequest(_))
    ));
}
