use foundation::{Timestamp, VehicleId};
use geofile::{CoveragePath, CoveragePlanner, CoverageRequest, GeofileError};
use link::{LinkAck, LinkBackend, LinkError, LinkRequest};
use mission::{
    GeofileMissionRequest, ManualMissionRequest, MissionService, MissionSummary, SubmitError,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use runtime::BoxFuture;
use serde::de::DeserializeOwned;
use telemetry::{FleetSnapshot, TelemetryError, TelemetrySnapshot, TelemetrySource};
use tracing::{debug, info, warn};

use crate::error::{BackendError, detail_text};
use crate::wire::{
    ConnectResponse, FleetStatusResponse, MessageResponse, MissionResponse, PathResponse,
    SensorsResponse, connect_body,
};

/// HTTP client for the ground-station backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BackendError::Url(base_url));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn connect_links(&self, request: &LinkRequest) -> Result<LinkAck, BackendError> {
        let body = connect_body(request);
        let resp: ConnectResponse =
            read_json(self.http.post(self.url("/telemetry/connect")).json(&body)).await?;
        info!(count = resp.count, message = %resp.message, "backend opened links");
        Ok(resp.into())
    }

    pub async fn disconnect_links(&self) -> Result<String, BackendError> {
        let resp: MessageResponse =
            read_json(self.http.post(self.url("/telemetry/disconnect"))).await?;
        Ok(resp.message)
    }

    pub async fn fleet(&self) -> Result<FleetSnapshot, BackendError> {
        let resp: FleetStatusResponse = read_json(self.http.get(self.url("/fleet/status"))).await?;
        Ok(resp.into_snapshot())
    }

    pub async fn sensors(&self, target: Option<VehicleId>) -> Result<TelemetrySnapshot, BackendError> {
        let mut req = self.http.get(self.url("/telemetry/sensors"));
        if let Some(id) = target {
            req = req.query(&[("sys_id", id.0)]);
        }
        let resp: SensorsResponse = read_json(req).await?;
        Ok(resp.into_snapshot(Timestamp::now()))
    }

    pub async fn manual_mission(
        &self,
        request: &ManualMissionRequest,
    ) -> Result<MissionSummary, BackendError> {
        let resp: MissionResponse =
            read_json(self.http.post(self.url("/mission/manual")).json(request)).await?;
        debug!(message = %resp.message, "manual mission accepted");
        Ok(resp.summary)
    }

    pub async fn geofile_mission(
        &self,
        request: &GeofileMissionRequest,
    ) -> Result<MissionSummary, BackendError> {
        let form = request
            .form_fields()
            .into_iter()
            .fold(file_form(&request.file), |form, (k, v)| form.text(k, v));
        let resp: MissionResponse =
            read_json(self.http.post(self.url("/mission/start")).multipart(form)).await?;
        debug!(message = %resp.message, "geofile mission accepted");
        Ok(resp.summary)
    }

    pub async fn generate_path(&self, request: &CoverageRequest) -> Result<CoveragePath, BackendError> {
        let form = file_form(&request.file)
            .text("uav_start_lat", request.start.lat_deg.to_string())
            .text("uav_start_lon", request.start.lon_deg.to_string())
            .text("sensor_width", request.sensor_width_m.to_string())
            .text("overlap", request.overlap.to_string());
        let resp: PathResponse =
            read_json(self.http.post(self.url("/path/generate")).multipart(form)).await?;
        Ok(resp.into())
    }
}

fn file_form(file: &foundation::FileUpload) -> Form {
    let part = Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
    Form::new().part("kml_file", part)
}

/// Sends the request and decodes a 2xx JSON body; anything else becomes
/// [`BackendError::Status`] with the backend's detail text.
async fn read_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, BackendError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            detail: detail_text(&body, status),
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

impl LinkBackend for BackendClient {
    fn connect<'a>(&'a self, request: &'a LinkRequest) -> BoxFuture<'a, Result<LinkAck, LinkError>> {
        Box::pin(async move { Ok(self.connect_links(request).await?) })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<(), LinkError>> {
        Box::pin(async move {
            self.disconnect_links().await?;
            Ok(())
        })
    }
}

impl TelemetrySource for BackendClient {
    fn fleet_status(&self) -> BoxFuture<'_, Result<FleetSnapshot, TelemetryError>> {
        Box::pin(async move { Ok(self.fleet().await?) })
    }

    fn telemetry(
        &self,
        target: Option<VehicleId>,
    ) -> BoxFuture<'_, Result<TelemetrySnapshot, TelemetryError>> {
        Box::pin(async move {
            match self.sensors(target).await {
                Ok(snapshot) => Ok(snapshot),
                Err(BackendError::Status { status, .. })
                    if status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    match target {
                        Some(id) => Err(TelemetryError::NotFound(id)),
                        None => Err(TelemetryError::Backend {
                            status,
                            detail: "no vehicle connected".to_string(),
                        }),
                    }
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}

impl MissionService for BackendClient {
    fn start_manual_mission<'a>(
        &'a self,
        request: &'a ManualMissionRequest,
    ) -> BoxFuture<'a, Result<MissionSummary, SubmitError>> {
        Box::pin(async move {
            let summary = self.manual_mission(request).await.inspect_err(|e| {
                warn!(error = %e, "manual mission rejected");
            })?;
            Ok(summary)
        })
    }

    fn start_geofile_mission<'a>(
        &'a self,
        request: &'a GeofileMissionRequest,
    ) -> BoxFuture<'a, Result<MissionSummary, SubmitError>> {
        Box::pin(async move {
            let summary = self.geofile_mission(request).await.inspect_err(|e| {
                warn!(error = %e, "geofile mission rejected");
            })?;
            Ok(summary)
        })
    }
}

impl CoveragePlanner for BackendClient {
    fn plan<'a>(
        &'a self,
        request: &'a CoverageRequest,
    ) -> BoxFuture<'a, Result<CoveragePath, GeofileError>> {
        Box::pin(async move {
            request.validate()?;
            Ok(self.generate_path(request).await?)
        })
    }
}
