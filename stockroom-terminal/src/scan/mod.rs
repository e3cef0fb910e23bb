//! Barcode scanning: decode devices and the scan session

mod device;
mod session;
mod wedge;

pub use device::{
    DecodeDevice, DecodeEvent, DecodeEvents, DecodeRegion, DecodeSink, DeviceLease, ScanConfig,
    ScanError, ScanResult, SharedDevice, Symbology, shared_device,
};
pub use session::{ScanSession, ScanState};
pub use wedge::KeyboardWedge;
