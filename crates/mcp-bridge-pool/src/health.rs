//! Shared upstream health checking.
//!
//! One [`HealthChecker`] is created per pool and shared by every client the
//! pool hands out. It probes the standard `grpc.health.v1.Health/Check`
//! endpoint over a borrowed channel. Stopping is idempotent and happens
//! exactly once when the owning pool closes.

use std::sync::atomic::{AtomicBool, Ordering};

use tonic::transport::Channel;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::error::{Error, Result};

/// Health prober shared across all clients of one pool.
#[derive(Debug)]
pub struct HealthChecker {
    service: String,
    stopped: AtomicBool,
}

impl HealthChecker {
    /// A checker probing the named service (empty string probes overall
    /// server health).
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Stop the checker. Returns `true` only for the first call.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    /// Whether the checker has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Probe upstream health over the given channel.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolClosed`] if the checker was stopped;
    /// - [`Error::HealthProbe`] if the RPC itself fails;
    /// - [`Error::Unhealthy`] if the upstream reports any status other
    ///   than `SERVING`, with a diagnostic rendering of the status.
    pub async fn check(&self, channel: Channel) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::PoolClosed);
        }

        let mut client = HealthClient::new(channel);
        let response = client
            .check(HealthCheckRequest {
                service: self.service.clone(),
            })
            .await?;

        let status = response.into_inner().status;
        if status == ServingStatus::Serving as i32 {
            Ok(())
        } else {
            let rendered = ServingStatus::try_from(status)
                .map_or_else(|_| format!("UNKNOWN({status})"), |s| format!("{s:?}"));
            Err(Error::Unhealthy { status: rendered })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent_and_reports_first_call() {
        let checker = HealthChecker::new("");
        assert!(!checker.is_stopped());
        assert!(checker.stop());
        assert!(!checker.stop());
        assert!(checker.is_stopped());
    }
}
