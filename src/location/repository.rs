use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{Geocoder, LocationError, LocationSource, LocationUpdates, PermissionCheck, UpdateRequest};
use crate::weather::Coordinate;

/// Where the device is, and what the place is called
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Last cached fix, or a fresh one-shot fix within the configured wait
    async fn current_location(&self) -> Result<Coordinate, LocationError>;

    /// Best place name for a coordinate; `None` when the address has no usable field
    async fn city_name(&self, coordinate: &Coordinate) -> Result<Option<String>, LocationError>;

    fn start_tracking(&self);

    /// Cancel the outstanding update subscription, if any. Safe to call repeatedly.
    fn stop_tracking(&self);
}

struct Subscription {
    id: u64,
    cancel: CancellationToken,
}

/// Cancels a one-shot subscription when the awaiting future finishes or is dropped
struct SubscriptionGuard<'a> {
    repository: &'a DeviceLocationRepository,
    id: u64,
    cancel: CancellationToken,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.repository.release(self.id);
    }
}

/// [`LocationProvider`] over a device location source and a reverse geocoder.
/// Holds at most one update subscription at a time.
pub struct DeviceLocationRepository {
    source: Arc<dyn LocationSource>,
    geocoder: Arc<dyn Geocoder>,
    permissions: Arc<dyn PermissionCheck>,
    request: UpdateRequest,
    fix_timeout: Duration,
    subscription: Mutex<Option<Subscription>>,
    next_subscription_id: AtomicU64,
    last_fix: Mutex<Option<Coordinate>>,
}

impl DeviceLocationRepository {
    pub fn new(
        source: Arc<dyn LocationSource>,
        geocoder: Arc<dyn Geocoder>,
        permissions: Arc<dyn PermissionCheck>,
        request: UpdateRequest,
        fix_timeout: Duration,
    ) -> Self {
        Self {
            source,
            geocoder,
            permissions,
            request,
            fix_timeout,
            subscription: Mutex::new(None),
            next_subscription_id: AtomicU64::new(0),
            last_fix: Mutex::new(None),
        }
    }

    /// Most recent fix this repository handed out
    pub fn last_fix(&self) -> Option<Coordinate> {
        self.last_fix.lock().clone()
    }

    #[cfg(test)]
    fn has_active_subscription(&self) -> bool {
        self.subscription.lock().is_some()
    }

    fn remember(&self, fix: &Coordinate) {
        *self.last_fix.lock() = Some(fix.clone());
    }

    /// Clear the slot only if it still holds subscription `id`
    fn release(&self, id: u64) {
        let mut slot = self.subscription.lock();
        if slot.as_ref().is_some_and(|s| s.id == id) {
            *slot = None;
        }
    }

    async fn request_fresh_fix(&self) -> Result<Coordinate, LocationError> {
        // Never leave an earlier subscription running
        self.stop_tracking();

        let LocationUpdates { mut fixes, cancel } =
            self.source.request_updates(self.request.clone())?;

        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        *self.subscription.lock() = Some(Subscription {
            id,
            cancel: cancel.clone(),
        });
        let _guard = SubscriptionGuard {
            repository: self,
            id,
            cancel,
        };

        tracing::debug!(
            subscription = id,
            timeout_secs = self.fix_timeout.as_secs(),
            "Requesting fresh location fix"
        );

        let fix = tokio::time::timeout(self.fix_timeout, fixes.recv())
            .await
            .map_err(|_| {
                LocationError::Unavailable(format!(
                    "no fix within {}s",
                    self.fix_timeout.as_secs()
                ))
            })?
            .ok_or_else(|| {
                LocationError::Unavailable("location updates ended without a fix".to_string())
            })?;

        self.remember(&fix);
        Ok(fix)
    }
}

#[async_trait]
impl LocationProvider for DeviceLocationRepository {
    async fn current_location(&self) -> Result<Coordinate, LocationError> {
        if !self.permissions.location_permissions().is_granted() {
            tracing::error!("Location permission not granted");
            return Err(LocationError::PermissionDenied);
        }

        match self.source.last_known().await {
            Ok(Some(fix)) => {
                tracing::debug!(lat = %fix.latitude, lon = %fix.longitude, "Using last known location");
                self.remember(&fix);
                Ok(fix)
            }
            Ok(None) => self.request_fresh_fix().await,
            Err(e) => {
                tracing::error!(error = %e, "Error getting location");
                Err(e)
            }
        }
    }

    async fn city_name(&self, coordinate: &Coordinate) -> Result<Option<String>, LocationError> {
        let addresses = self.geocoder.reverse(coordinate).await.inspect_err(|e| {
            tracing::error!(error = %e, "Error getting city name");
        })?;

        let address = addresses.into_iter().next().ok_or_else(|| {
            LocationError::GeocodingFailed("no address candidates".to_string())
        })?;

        Ok(address.place_name())
    }

    fn start_tracking(&self) {
        // TODO: continuous tracking needs a consumer for the update stream before it can do anything useful
        tracing::warn!("Continuous location tracking is not supported; ignoring start request");
    }

    fn stop_tracking(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel.cancel();
            tracing::debug!(subscription = subscription.id, "Location updates cancelled");
        }
    }
}
