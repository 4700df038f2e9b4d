use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

/// Recording cannot begin. Checked before any attempt, so no retry is spent.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PreconditionFailure {
    #[error("microphone permission is required to record")]
    MicrophonePermissionDenied,
    #[error("no network connection")]
    Offline,
}

/// Device checks run before a recording attempt starts.
#[async_trait]
pub trait RecordingGate: Send + Sync {
    async fn check(&self) -> Result<(), PreconditionFailure>;
}

/// Gate for environments without permissions or connectivity to check.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

#[async_trait]
impl RecordingGate for AlwaysReady {
    async fn check(&self) -> Result<(), PreconditionFailure> {
        Ok(())
    }
}

/// Gate fed by platform callbacks (permission prompt result, reachability).
#[derive(Debug)]
pub struct DeviceGate {
    microphone_granted: AtomicBool,
    online: AtomicBool,
}

impl DeviceGate {
    #[must_use]
    pub fn new(microphone_granted: bool, online: bool) -> Self {
        Self {
            microphone_granted: AtomicBool::new(microphone_granted),
            online: AtomicBool::new(online),
        }
    }

    pub fn set_microphone_granted(&self, granted: bool) {
        self.microphone_granted.store(granted, Ordering::Release);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

#[async_trait]
impl RecordingGate for DeviceGate {
    async fn check(&self) -> Result<(), PreconditionFailure> {
        if !self.microphone_granted.load(Ordering::Acquire) {
            return Err(PreconditionFailure::MicrophonePermissionDenied);
        }
        if !self.online.load(Ordering::Acquire) {
            return Err(PreconditionFailure::Offline);
        }
        Ok(())
    }
}
