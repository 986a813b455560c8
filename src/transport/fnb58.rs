//! FNB58 USB tester transport (nusb)
//!
//! The tester exposes its stream on HID interface 3 with a pair of interrupt
//! endpoints. Every command is a 64-byte frame `AA <cmd> 00.. <check>`; the
//! device answers each request-data command with one 64-byte frame.

use super::PacketSource;
use crate::config::DeviceConfig;
use crate::decoder::{FRAME_SYNC, Framing, PACKET_LEN};
use crate::error::{AcquisitionError, MonitorError};
use crate::logging::{StructuredLogger, get_logger};
use async_trait::async_trait;
use bytes::Bytes;
use nusb::Interface;
use nusb::transfer::RequestBuffer;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Commands understood by the tester
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Start,
    RequestData,
}

impl Command {
    fn code(self) -> u8 {
        match self {
            Command::Connect => 0x81,
            Command::Start => 0x82,
            Command::RequestData => 0x83,
        }
    }

    fn check(self) -> u8 {
        match self {
            Command::Connect => 0x8E,
            Command::Start => 0x96,
            Command::RequestData => 0x9E,
        }
    }

    /// The full 64-byte frame
    pub fn frame(self) -> [u8; PACKET_LEN] {
        let mut frame = [0u8; PACKET_LEN];
        frame[0] = FRAME_SYNC;
        frame[1] = self.code();
        frame[PACKET_LEN - 1] = self.check();
        frame
    }
}

/// Gap the tester needs between a command and its reply during the handshake
const HANDSHAKE_SETTLE: Duration = Duration::from_millis(50);

pub struct Fnb58Source {
    config: DeviceConfig,
    interface: Option<Interface>,
    logger: StructuredLogger,
}

impl Fnb58Source {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            interface: None,
            logger: get_logger("fnb58"),
        }
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.config.read_timeout_ms)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, AcquisitionError>
    where
        F: Future<Output = T>,
    {
        timeout(self.read_timeout(), fut)
            .await
            .map_err(|_| AcquisitionError::Timeout {
                after_ms: self.config.read_timeout_ms,
            })
    }

    async fn send(&self, interface: &Interface, cmd: Command) -> Result<(), AcquisitionError> {
        let completion = self
            .bounded(interface.interrupt_out(self.config.endpoint_out, cmd.frame().to_vec()))
            .await?;
        completion
            .into_result()
            .map_err(|e| AcquisitionError::gone(format!("{:?} write failed: {}", cmd, e)))?;
        Ok(())
    }

    async fn receive(&self, interface: &Interface) -> Result<Bytes, AcquisitionError> {
        let completion = self
            .bounded(interface.interrupt_in(self.config.endpoint_in, RequestBuffer::new(PACKET_LEN)))
            .await?;
        let data = completion
            .into_result()
            .map_err(|e| AcquisitionError::gone(format!("read failed: {}", e)))?;
        Ok(Bytes::from(data))
    }

    /// Find the tester on the bus and claim its streaming interface
    fn claim(&self) -> crate::Result<Interface> {
        let (vid, pid) = (self.config.vendor_id, self.config.product_id);
        let device_info = nusb::list_devices()
            .map_err(|e| MonitorError::usb(format!("listing devices: {}", e)))?
            .find(|d| d.vendor_id() == vid && d.product_id() == pid)
            .ok_or_else(|| MonitorError::usb(format!("no device {:04x}:{:04x}", vid, pid)))?;

        self.logger.info(&format!(
            "Found FNB58 on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        ));

        let device = device_info
            .open()
            .map_err(|e| MonitorError::usb(format!("opening device: {}", e)))?;
        device
            .detach_and_claim_interface(self.config.interface)
            .map_err(|e| {
                MonitorError::usb(format!(
                    "claiming interface {}: {}",
                    self.config.interface, e
                ))
            })
    }

    async fn handshake(&self, interface: &Interface) -> Result<(), AcquisitionError> {
        for cmd in [Command::Connect, Command::Start] {
            self.send(interface, cmd).await?;
            tokio::time::sleep(HANDSHAKE_SETTLE).await;
            let reply = self.receive(interface).await?;
            self.logger.debug(&format!(
                "{:?} reply: {:02X?}",
                cmd,
                &reply[..reply.len().min(4)]
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PacketSource for Fnb58Source {
    async fn open(&mut self) -> Result<(), AcquisitionError> {
        self.interface = None;
        let interface = self
            .claim()
            .map_err(|e| AcquisitionError::gone(e.to_string()))?;

        self.handshake(&interface).await?;
        self.logger.info("FNB58 handshake complete");
        self.interface = Some(interface);
        Ok(())
    }

    async fn next_packet(&mut self) -> Result<Bytes, AcquisitionError> {
        let interface = self
            .interface
            .clone()
            .ok_or_else(|| AcquisitionError::gone("device not open"))?;
        self.send(&interface, Command::RequestData).await?;
        self.receive(&interface).await
    }

    async fn close(&mut self) {
        if self.interface.take().is_some() {
            self.logger.info("FNB58 interface released");
        }
    }

    fn framing(&self) -> Framing {
        Framing::Fnb58
    }

    fn describe(&self) -> String {
        format!(
            "FNB58 {:04x}:{:04x} if{}",
            self.config.vendor_id, self.config.product_id, self.config.interface
        )
    }
}
