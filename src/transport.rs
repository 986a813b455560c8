//! Packet sources feeding the acquisition loop
//!
//! A [`PacketSource`] hands out raw 64-byte transfers; decoding happens in
//! the monitor so a malformed transfer never reaches session state.

use crate::config::Config;
use crate::decoder::Framing;
use crate::error::AcquisitionError;
use async_trait::async_trait;
use bytes::Bytes;

#[cfg(feature = "usb")]
pub mod fnb58;
pub mod simulated;

#[cfg(feature = "usb")]
pub use fnb58::Fnb58Source;
pub use simulated::SimulatedSource;

/// Transport the monitor reads transfers from
#[async_trait]
pub trait PacketSource: Send {
    /// Acquire the device (or restart the stream); called again after a disconnect
    async fn open(&mut self) -> Result<(), AcquisitionError>;

    /// Wait for the next transfer
    async fn next_packet(&mut self) -> Result<Bytes, AcquisitionError>;

    /// Release the device handle
    async fn close(&mut self);

    /// Layout of the transfers this source produces
    fn framing(&self) -> Framing;

    /// Human-readable identification for logs
    fn describe(&self) -> String;
}

/// Pick the source the configuration asks for.
///
/// Without the `usb` feature only the simulator is available.
pub fn source_from_config(config: &Config) -> Box<dyn PacketSource> {
    #[cfg(feature = "usb")]
    if !config.simulate {
        return Box::new(Fnb58Source::new(config.device.clone()));
    }
    Box::new(SimulatedSource::new(
        config.simulation.clone(),
        config.session.sample_interval(),
    ))
}
