use async_trait::async_trait;
use imhere_config::GeoSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::dao::base::DaoError;
use crate::dao::room::RoomDao;
use crate::geo::{FallbackFix, GeoError, LocationFix};
use crate::store::Subscription;

/// Accuracy hint passed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    Highest,
    Balanced,
    Low,
}

/// A source of device position readings.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// `false` when the user declined location access.
    async fn request_permission(&self) -> Result<bool, GeoError>;

    async fn current_fix(&self, accuracy: Accuracy) -> Result<LocationFix, GeoError>;

    /// Fixes at most every `interval`, and only after moving `min_distance_m`.
    async fn watch(
        &self,
        interval: Duration,
        min_distance_m: f64,
    ) -> Result<Subscription<LocationFix>, GeoError>;
}

/// Best available position: a plausible high-accuracy fix, then a plausible
/// balanced one, then the fallback. Never fails.
pub async fn resolve_current_location(
    provider: &dyn LocationProvider,
    fallback: &FallbackFix,
) -> LocationFix {
    match provider.request_permission().await {
        Ok(true) => {}
        Ok(false) => {
            info!("Location permission denied, using fallback");
            return fallback.fix();
        }
        Err(e) => {
            warn!(error = %e, "Permission request failed, using fallback");
            return fallback.fix();
        }
    }

    for accuracy in [Accuracy::Highest, Accuracy::Balanced] {
        match provider.current_fix(accuracy).await {
            Ok(fix) if fix.is_valid() => return fix,
            Ok(fix) => debug!(?accuracy, lat = fix.point.lat, lng = fix.point.lng, "Implausible fix"),
            Err(e) => debug!(?accuracy, error = %e, "No fix"),
        }
    }

    info!("No plausible fix, using fallback");
    fallback.fix()
}

/// Streams device fixes into a room membership. Dropping the tracker stops it.
pub struct LocationTracker {
    task: JoinHandle<()>,
}

impl LocationTracker {
    pub async fn spawn(
        provider: Arc<dyn LocationProvider>,
        rooms: Arc<RoomDao>,
        session: Session,
        code: String,
        interval: Duration,
        min_distance_m: f64,
    ) -> Result<Self, GeoError> {
        if !provider.request_permission().await? {
            return Err(GeoError::PermissionDenied);
        }
        let mut fixes = provider.watch(interval, min_distance_m).await?;

        let task = tokio::spawn(async move {
            while let Some(fix) = fixes.next().await {
                if !fix.is_valid() {
                    debug!(%code, lat = fix.point.lat, lng = fix.point.lng, "Skipping implausible fix");
                    continue;
                }
                match rooms.update_location(&session, &code, fix.point).await {
                    Ok(()) => {}
                    Err(e @ (DaoError::Forbidden(_) | DaoError::NotFound)) => {
                        info!(%code, user_id = %session.user_id, reason = %e, "Stopping location tracking");
                        return;
                    }
                    Err(e) => warn!(%code, error = %e, "Failed to publish location"),
                }
            }
            debug!(%code, "Location feed ended");
        });

        Ok(Self { task })
    }

    /// Tracks with the configured interval and minimum distance.
    pub async fn spawn_with_settings(
        provider: Arc<dyn LocationProvider>,
        rooms: Arc<RoomDao>,
        session: Session,
        code: String,
        settings: &GeoSettings,
    ) -> Result<Self, GeoError> {
        Self::spawn(
            provider,
            rooms,
            session,
            code,
            Duration::from_secs(settings.tracking_interval_secs),
            settings.tracking_distance_m,
        )
        .await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {}
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
