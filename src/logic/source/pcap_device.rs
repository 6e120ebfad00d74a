//! libpcap-backed capture device

use chrono::{DateTime, Utc};
use pcap::{Active, Capture, Device};

use crate::error::SourceError;

use super::capture::{CaptureDevice, CapturedFrame, LinkType};

const SNAPLEN: i32 = 65_535;

pub struct PcapDevice {
    name: String,
    link: LinkType,
    capture: Option<Capture<Active>>,
}

impl PcapDevice {
    /// Open `interface` (or the system default device) in promiscuous mode and
    /// install `filter`. The filter is fixed for the life of the device.
    pub fn open(interface: Option<&str>, filter: &str, timeout_ms: u32) -> Result<Self, SourceError> {
        let device = match interface {
            Some(name) => Device::from(name),
            None => Device::lookup()
                .map_err(|e| SourceError::Device(e.to_string()))?
                .ok_or_else(|| SourceError::Device("no capture device found".to_string()))?,
        };
        let name = device.name.clone();

        let mut capture = Capture::from_device(device)
            .map_err(|e| SourceError::Device(e.to_string()))?
            .promisc(true)
            .snaplen(SNAPLEN)
            .timeout(i32::try_from(timeout_ms).unwrap_or(i32::MAX))
            .immediate_mode(true)
            .open()
            .map_err(|e| SourceError::Device(format!("{}: {}", name, e)))?;

        capture
            .filter(filter, true)
            .map_err(|e| SourceError::Device(format!("invalid capture filter '{}': {}", filter, e)))?;

        let link = match capture.get_datalink().0 {
            1 => LinkType::Ethernet,
            // DLT_RAW variants and LINKTYPE_IPV4/IPV6
            12 | 14 | 101 | 228 | 229 => LinkType::RawIp,
            other => {
                return Err(SourceError::Device(format!(
                    "unsupported link type {:?} on {}",
                    other, name
                )))
            }
        };

        tracing::info!(device = %name, filter, ?link, "Capture device opened");
        Ok(Self { name, link, capture: Some(capture) })
    }
}

impl CaptureDevice for PcapDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<CapturedFrame>, SourceError> {
        let capture = self.capture.as_mut().ok_or(SourceError::Closed)?;

        match capture.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts;
                let timestamp = DateTime::<Utc>::from_timestamp(
                    ts.tv_sec as i64,
                    (ts.tv_usec as u32).saturating_mul(1_000),
                )
                .unwrap_or_else(Utc::now);

                Ok(Some(CapturedFrame {
                    timestamp,
                    link: self.link,
                    data: packet.data.to_vec(),
                    wire_len: packet.header.len,
                }))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(SourceError::Device(e.to_string())),
        }
    }

    fn close(&mut self) {
        if self.capture.take().is_some() {
            tracing::info!(device = %self.name, "Capture device closed");
        }
    }
}
