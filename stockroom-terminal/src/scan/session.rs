//! Scan session state machine
//!
//! | State | Event | Effect |
//! |-------|-------|--------|
//! | Idle | `start` | acquire device, go Active |
//! | Active | `start` | restart device |
//! | Active | `stop` | release device, go Idle |
//! | Active | decoded barcode | resolve once, release device, go Idle |
//! | Active | decode error / noise | logged at trace, stay Active |
//! | Idle | any decode event | ignored |
//!
//! Every activation reports into its own channel, so events the device
//! emitted before a stop are never seen after the next start.

use super::device::{
    DecodeEvent, DecodeEvents, DeviceLease, ScanConfig, ScanResult, SharedDevice,
};
use crate::inventory::SharedInventory;
use crate::resolver::{BarcodeResolver, ResolverResult};
use shared::models::Barcode;
use std::future;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Active,
}

pub struct ScanSession {
    device: SharedDevice,
    lease: Option<DeviceLease>,
    resolver: Arc<BarcodeResolver>,
    inventory: SharedInventory,
    config: ScanConfig,
    events: Option<DecodeEvents>,
}

impl ScanSession {
    /// Create an idle session
    pub fn new(
        device: SharedDevice,
        resolver: Arc<BarcodeResolver>,
        inventory: SharedInventory,
        config: ScanConfig,
    ) -> Self {
        Self {
            device,
            lease: None,
            resolver,
            inventory,
            config,
            events: None,
        }
    }

    pub fn state(&self) -> ScanState {
        if self.lease.is_some() {
            ScanState::Active
        } else {
            ScanState::Idle
        }
    }

    /// Acquire the device; an active session restarts it
    pub fn start(&mut self) -> ScanResult<()> {
        if self.lease.take().is_some() {
            tracing::debug!("Restarting decode device");
        }
        self.events = None;

        let (sink, events) = mpsc::unbounded_channel();
        self.lease = Some(DeviceLease::acquire(&self.device, &self.config, sink)?);
        self.events = Some(events);
        tracing::debug!("Scan session active");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.events = None;
        if self.lease.take().is_some() {
            tracing::debug!("Scan session stopped");
        }
    }

    /// Next event of the current activation; never resolves while idle
    pub async fn next_event(&mut self) -> DecodeEvent {
        let Some(events) = self.events.as_mut() else {
            return future::pending().await;
        };
        match events.recv().await {
            Some(event) => event,
            // Device let go of its sink; wait for the next start
            None => future::pending().await,
        }
    }

    /// Feed one device event through the state machine
    ///
    /// Returns the resolution for the first valid barcode decoded while
    /// active. The resolution runs as its own task: dropping this future
    /// (or stopping the session) does not cancel it.
    pub async fn handle_event(&mut self, event: DecodeEvent) -> Option<ResolverResult> {
        if self.state() == ScanState::Idle {
            tracing::trace!(?event, "Decode event while idle, ignored");
            return None;
        }

        let raw = match event {
            DecodeEvent::Decoded(raw) => raw,
            DecodeEvent::DecodeError(details) => {
                tracing::trace!(details = %details, "Decode error");
                return None;
            }
        };

        let barcode = match Barcode::parse(&raw) {
            Ok(barcode) => barcode,
            Err(_) => {
                tracing::trace!(raw = %raw, "Ignoring non-numeric decode");
                return None;
            }
        };

        let resolver = self.resolver.clone();
        let month = self.inventory.month();
        let known = self.inventory.products();
        let task_barcode = barcode.clone();
        let resolution = tokio::spawn(async move {
            resolver.resolve(&task_barcode, &month, &known).await
        });

        self.stop();
        tracing::debug!(barcode = %barcode, "Barcode decoded");

        match resolution.await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::error!(barcode = %barcode, error = %e, "Resolution task failed");
                None
            }
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop();
    }
}
