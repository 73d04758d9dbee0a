use crate::types::{Error, LocationData};
use crate::workflow::Camera;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::PathBuf;

const DEFAULT_SNAPSHOT_PATH: &str = "snapshot.jpg";
const DEFAULT_GPS_ACCURACY_M: f64 = 5.0;

/// Camera port backed by the JPEG snapshot the kiosk webcam utility keeps
/// refreshed on disk.
pub struct SnapshotCamera {
    path: PathBuf,
}

impl SnapshotCamera {
    pub fn from_env() -> Self {
        let path = std::env::var("CAMERA_SNAPSHOT_PATH")
            .unwrap_or_else(|_| DEFAULT_SNAPSHOT_PATH.to_string());
        SnapshotCamera {
            path: PathBuf::from(path),
        }
    }

    pub fn ready(&self) -> bool {
        self.path.exists()
    }
}

impl Camera for SnapshotCamera {
    async fn capture_jpeg(&mut self) -> Result<String, Error> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(STANDARD.encode(bytes))
    }
}

/// The site's fixed GPS position, read from the environment. An unset or
/// unparseable position behaves like a denied geolocation permission: no
/// fix, and the clock actions stay blocked.
pub struct SiteLocation;

impl SiteLocation {
    pub fn current_fix() -> Result<LocationData, Error> {
        let latitude: f64 = std::env::var("SITE_LATITUDE")?.parse()?;
        let longitude: f64 = std::env::var("SITE_LONGITUDE")?.parse()?;
        let accuracy = std::env::var("SITE_GPS_ACCURACY")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_GPS_ACCURACY_M);
        Ok(LocationData {
            latitude,
            longitude,
            accuracy,
        })
    }
}
