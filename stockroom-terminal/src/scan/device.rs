//! Decode device abstraction

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Decode device unavailable: {0}")]
    Unavailable(String),

    #[error("Decode device failed to start: {0}")]
    Start(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Barcode symbologies a device may be asked to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code128,
}

/// Target area of the camera frame, as fractions of width and height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for DecodeRegion {
    /// Centered band, wider than tall
    fn default() -> Self {
        Self {
            x: 0.1,
            y: 0.35,
            width: 0.8,
            height: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub symbologies: Vec<Symbology>,
    pub region: DecodeRegion,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            symbologies: vec![
                Symbology::Ean13,
                Symbology::Ean8,
                Symbology::UpcA,
                Symbology::UpcE,
                Symbology::Code128,
            ],
            region: DecodeRegion::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Decoded(String),
    DecodeError(String),
}

pub type DecodeSink = mpsc::UnboundedSender<DecodeEvent>;
pub type DecodeEvents = mpsc::UnboundedReceiver<DecodeEvent>;

/// Camera or scanner producing decode events
pub trait DecodeDevice: Send + 'static {
    fn start(&mut self, config: &ScanConfig, sink: DecodeSink) -> ScanResult<()>;
    fn stop(&mut self);
}

/// Device shared between a session and its lease
pub type SharedDevice = Arc<Mutex<Box<dyn DecodeDevice>>>;

pub fn shared_device(device: impl DecodeDevice) -> SharedDevice {
    Arc::new(Mutex::new(Box::new(device)))
}

/// Running device; stopped when dropped
pub struct DeviceLease {
    device: SharedDevice,
}

impl DeviceLease {
    pub fn acquire(device: &SharedDevice, config: &ScanConfig, sink: DecodeSink) -> ScanResult<Self> {
        device.lock().start(config, sink)?;
        Ok(Self {
            device: device.clone(),
        })
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.device.lock().stop();
    }
}
