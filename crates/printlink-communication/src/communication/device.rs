//! Device link
//!
//! Opens the single upstream byte stream to the printer firmware and exposes
//! it as independent async read and write halves.
//!
//! Supports:
//! - File-like endpoints such as the pseudo terminal Klipper creates at
//!   `/tmp/printer` (separate read and write handles, so a blocked read never
//!   holds up a write)
//! - Serial ports (USB or RS-232) at a fixed baud rate, 8N1, no flow control,
//!   bridged into tokio by two blocking pump threads

use printlink_core::{ConnectionError, Result};
use printlink_settings::DeviceSettings;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read half of a device link
pub type DeviceReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a device link
pub type DeviceWriter = Box<dyn AsyncWrite + Send + Unpin>;

const SERIAL_BRIDGE_CAPACITY: usize = 16 * 1024;
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// An open connection to the device
pub struct DeviceLink {
    name: String,
    reader: DeviceReader,
    writer: DeviceWriter,
}

impl DeviceLink {
    /// Build a link from existing halves
    pub fn new<R, W>(name: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            name: name.into(),
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Build a link from a single duplex stream
    pub fn from_stream<S>(name: impl Into<String>, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(name, reader, writer)
    }

    /// Open the device described by `settings`
    pub async fn open(settings: &DeviceSettings) -> Result<Self> {
        match settings.baud_rate {
            Some(baud_rate) => Self::open_serial(&settings.path, baud_rate),
            None => Self::open_file(&settings.path).await,
        }
    }

    /// Open a file-like endpoint with independent read and write handles
    pub async fn open_file(path: &Path) -> Result<Self> {
        let open_error = |e: io::Error| ConnectionError::DeviceOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let reader = tokio::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .await
            .map_err(open_error)?;
        let writer = tokio::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(open_error)?;

        tracing::info!("Opened device {}", path.display());
        Ok(Self::new(path.display().to_string(), reader, writer))
    }

    /// Open a serial port and bridge it into tokio
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_serial(path: &Path, baud_rate: u32) -> Result<Self> {
        let name = path.display().to_string();
        let open_error = |reason: String| ConnectionError::DeviceOpen {
            path: name.clone(),
            reason,
        };

        let port = serialport::new(name.as_str(), baud_rate)
            .timeout(SERIAL_READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| open_error(e.to_string()))?;
        let reader_port = port.try_clone().map_err(|e| open_error(e.to_string()))?;

        let (local, remote) = tokio::io::duplex(SERIAL_BRIDGE_CAPACITY);
        spawn_serial_bridge(&name, reader_port, port, remote)
            .map_err(|e| open_error(e.to_string()))?;

        tracing::info!("Opened serial device {} at {} baud", name, baud_rate);
        Ok(Self::from_stream(name.clone(), local))
    }

    /// Display name of the device
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into read and write halves
    pub fn into_split(self) -> (DeviceReader, DeviceWriter) {
        (self.reader, self.writer)
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink").field("name", &self.name).finish()
    }
}

/// Pump bytes between a blocking serial port and one end of a duplex pipe
fn spawn_serial_bridge(
    name: &str,
    mut reader_port: Box<dyn serialport::SerialPort>,
    mut writer_port: Box<dyn serialport::SerialPort>,
    remote: tokio::io::DuplexStream,
) -> io::Result<()> {
    let handle = tokio::runtime::Handle::current();
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);
    let closed = Arc::new(AtomicBool::new(false));

    // device -> tokio
    {
        let handle = handle.clone();
        let closed = closed.clone();
        let name = name.to_string();
        std::thread::Builder::new()
            .name("serial-read".to_string())
            .spawn(move || {
                let mut buf = [0u8; 1024];
                while !closed.load(Ordering::Relaxed) {
                    match reader_port.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if handle.block_on(remote_write.write_all(&buf[..n])).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                        Err(e) => {
                            tracing::warn!("Serial read from {} failed: {}", name, e);
                            break;
                        }
                    }
                }
                closed.store(true, Ordering::Relaxed);
                let _ = handle.block_on(remote_write.shutdown());
            })?;
    }

    // tokio -> device
    {
        let name = name.to_string();
        std::thread::Builder::new()
            .name("serial-write".to_string())
            .spawn(move || {
                let mut buf = [0u8; 1024];
                loop {
                    match handle.block_on(remote_read.read(&mut buf)) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if let Err(e) = writer_port
                                .write_all(&buf[..n])
                                .and_then(|_| writer_port.flush())
                            {
                                tracing::warn!("Serial write to {} failed: {}", name, e);
                                break;
                            }
                        }
                    }
                }
                closed.store(true, Ordering::Relaxed);
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_file_reports_path() {
        let err = DeviceLink::open_file(Path::new("/nonexistent/printlink/device"))
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
        assert!(err.to_string().contains("/nonexistent/printlink/device"));
    }

    #[tokio::test]
    async fn test_from_stream_halves_are_connected() {
        let (ours, mut theirs) = tokio::io::duplex(64);
        let link = DeviceLink::from_stream("memory", ours);
        assert_eq!(link.name(), "memory");

        let (mut reader, mut writer) = link.into_split();
        writer.write_all(b"M105\n").await.unwrap();
        let mut buf = [0u8; 5];
        theirs.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"M105\n");

        theirs.write_all(b"ok\n").await.unwrap();
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ok\n");
    }
}
