use std::sync::Arc;

use foundation::{FileUpload, GeoPoint};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::coverage::{CoveragePath, CoveragePlanner, CoverageRequest};
use crate::error::GeofileError;
use crate::geometry::GeofileGeometry;
use crate::parser::GeofileParser;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedGeofile {
    pub file: FileUpload,
    pub geometry: GeofileGeometry,
}

#[derive(Default)]
struct State {
    loaded: Option<LoadedGeofile>,
    coverage: Option<CoveragePath>,
    // Bumped whenever the loaded file changes or is cleared.
    epoch: u64,
}

/// Loads geofiles and asks the planning service for coverage paths.
///
/// Holds the current geofile and the last coverage path. A failed load
/// leaves both untouched. A coverage result that arrives after the file was
/// replaced or cleared is dropped.
pub struct GeofileClient {
    parser: Arc<dyn GeofileParser>,
    planner: Arc<dyn CoveragePlanner>,
    state: Mutex<State>,
}

impl GeofileClient {
    pub fn new(parser: Arc<dyn GeofileParser>, planner: Arc<dyn CoveragePlanner>) -> Self {
        Self {
            parser,
            planner,
            state: Mutex::new(State::default()),
        }
    }

    pub fn load(&self, file: FileUpload) -> Result<GeofileGeometry, GeofileError> {
        let geometry = match self.parser.parse(&file) {
            Ok(g) => g,
            Err(e) => {
                warn!(file = %file.name, error = %e, "geofile rejected");
                return Err(e);
            }
        };
        info!(
            file = %file.name,
            features = geometry.feature_count(),
            "geofile loaded"
        );
        let mut state = self.state.lock();
        state.loaded = Some(LoadedGeofile {
            file,
            geometry: geometry.clone(),
        });
        state.coverage = None;
        state.epoch += 1;
        Ok(geometry)
    }

    /// Plans a sweep over the loaded geofile's polygon and keeps the result.
    pub async fn generate_coverage_path(
        &self,
        start: GeoPoint,
        sensor_width_m: f64,
        overlap: f64,
    ) -> Result<CoveragePath, GeofileError> {
        let (request, epoch) = {
            let state = self.state.lock();
            let loaded = state.loaded.as_ref().ok_or(GeofileError::NotLoaded)?;
            (
                CoverageRequest {
                    file: loaded.file.clone(),
                    start,
                    sensor_width_m,
                    overlap,
                },
                state.epoch,
            )
        };
        request.validate()?;

        let path = self.planner.plan(&request).await?;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Err(GeofileError::Superseded);
        }
        info!(
            waypoints = path.stats.total_waypoints,
            length_km = path.stats.path_length_km,
            coverage = path.stats.coverage_ratio,
            "coverage path ready"
        );
        state.coverage = Some(path.clone());
        Ok(path)
    }

    /// Drops the geofile and any coverage path. Returns whether anything was held.
    pub fn clear(&self) -> bool {
        let mut state = self.state.lock();
        let had = state.loaded.is_some() || state.coverage.is_some();
        state.loaded = None;
        state.coverage = None;
        state.epoch += 1;
        had
    }

    /// Applies one altitude to the stored coverage path.
    pub fn set_coverage_altitude(&self, alt_m: f64) -> Option<CoveragePath> {
        let mut state = self.state.lock();
        let path = state.coverage.as_mut()?;
        path.set_altitude(alt_m);
        Some(path.clone())
    }

    pub fn loaded(&self) -> Option<LoadedGeofile> {
        self.state.lock().loaded.clone()
    }

    pub fn coverage(&self) -> Option<CoveragePath> {
        self.state.lock().coverage.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded.is_some()
    }
}
