use async_trait::async_trait;
use log::{debug, error, info};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::config::DeviceConfig;
use crate::protocol::GET_CPM_COMMAND;
use crate::utils::error::{BridgeError, DecodeError};

/// Driver-level read timeout. Long enough that reads are blocking in practice.
pub const BLOCKING_READ_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of raw `<GETCPM>>` answers for the poll loop.
#[async_trait]
pub trait CounterLink: Send {
    async fn send_query(&mut self) -> Result<(), BridgeError>;
    async fn read_response(&mut self) -> Result<Vec<u8>, BridgeError>;
    fn response_width(&self) -> usize;
}

/// Byte stream plus the input-buffer state the transport inspects.
pub trait SerialLink: Read + Write + Send {
    fn bytes_pending(&self) -> io::Result<u32>;
    fn discard_input(&mut self) -> io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn bytes_pending(&self) -> io::Result<u32> {
        self.bytes_to_read().map_err(io::Error::from)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::Input).map_err(io::Error::from)
    }
}

pub struct SerialTransport<P: SerialLink = Box<dyn SerialPort>> {
    port: P,
    width: usize,
}

impl SerialTransport {
    /// Opens the configured port 8-N-1 at the validated baud rate.
    pub fn open(config: &DeviceConfig) -> Result<Self, BridgeError> {
        info!("🔌 Connecting to Geiger counter on port: {}", config.serial_port);
        info!("⚙️  Configuration: {} baud, 8 data bits, no parity, 1 stop bit", config.baud_rate);

        let port = serialport::new(&config.serial_port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(BLOCKING_READ_TIMEOUT)
            .open()
            .map_err(|e| {
                error!("❌ Failed to open serial port {}: {}", config.serial_port, e);
                BridgeError::Connectivity(format!("Failed to open port {}: {}", config.serial_port, e))
            })?;

        let transport = Self::attach(port, config.response_width()).map_err(|e| {
            BridgeError::Connectivity(format!("Failed to clear input of port {}: {}", config.serial_port, e))
        })?;

        info!("✅ Serial connection established ({} {})", config.model, width_label(config.response_width()));
        Ok(transport)
    }
}

impl<P: SerialLink> SerialTransport<P> {
    pub fn from_port(port: P, width: usize) -> Self {
        Self { port, width }
    }

    /// Takes over a freshly opened port. Bytes the device queued before
    /// this session are dropped, so the pending check before each query
    /// only sees leftovers of our own answers.
    pub fn attach(mut port: P, width: usize) -> io::Result<Self> {
        let stale = port.bytes_pending()?;
        if stale > 0 {
            debug!("🧹 Discarding {} byte(s) queued before startup", stale);
        }
        port.discard_input()?;
        Ok(Self::from_port(port, width))
    }

    pub fn send_query_blocking(&mut self) -> Result<(), BridgeError> {
        // Leftovers from the previous answer mean the device sends wider
        // responses than the configured model does.
        let pending = self.port.bytes_pending()?;
        if pending > 0 {
            return Err(DecodeError::StaleBytes(pending).into());
        }

        self.port.write_all(GET_CPM_COMMAND)?;
        self.port.flush()?;
        Ok(())
    }

    pub fn read_response_blocking(&mut self) -> Result<Vec<u8>, BridgeError> {
        let mut response = vec![0u8; self.width];
        let received = self.port.read(&mut response)?;
        if received < self.width.saturating_sub(1) {
            return Err(BridgeError::EndOfStream {
                expected: self.width,
                received,
            });
        }
        if received < self.width {
            self.port.read_exact(&mut response[received..])?;
        }

        // The device answered with more than the configured width. Bytes still
        // in flight are caught by the check before the next query.
        let pending = self.port.bytes_pending()?;
        if pending > 0 {
            return Err(DecodeError::StaleBytes(pending).into());
        }

        debug!("📥 Raw response: [{}] ({} bytes)", hex::encode(&response), response.len());
        Ok(response)
    }
}

#[async_trait]
impl<P: SerialLink> CounterLink for SerialTransport<P> {
    // block_in_place needs the multi-threaded runtime.
    async fn send_query(&mut self) -> Result<(), BridgeError> {
        tokio::task::block_in_place(|| self.send_query_blocking())
    }

    async fn read_response(&mut self) -> Result<Vec<u8>, BridgeError> {
        tokio::task::block_in_place(|| self.read_response_blocking())
    }

    fn response_width(&self) -> usize {
        self.width
    }
}

fn width_label(width: usize) -> &'static str {
    if width == 4 {
        "32-bit responses"
    } else {
        "16-bit responses"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakePort {
        written: Vec<u8>,
        chunks: VecDeque<Vec<u8>>,
        pending: u32,
        trailing: u32,
        fail_writes: bool,
    }

    impl FakePort {
        fn answering(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                ..Self::default()
            }
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    self.pending = self.trailing;
                    Ok(n)
                }
                None => Ok(0),
            }
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialLink for FakePort {
        fn bytes_pending(&self) -> io::Result<u32> {
            Ok(self.pending)
        }

        fn discard_input(&mut self) -> io::Result<()> {
            self.pending = 0;
            Ok(())
        }
    }

    fn poll(transport: &mut SerialTransport<FakePort>) -> Result<Vec<u8>, BridgeError> {
        transport.send_query_blocking()?;
        transport.read_response_blocking()
    }

    #[test]
    fn sends_query_and_reads_full_width() {
        let mut transport = SerialTransport::from_port(FakePort::answering(&[&[0, 0, 0, 42]]), 4);

        assert_eq!(poll(&mut transport).unwrap(), vec![0, 0, 0, 42]);
        assert_eq!(transport.port.written, b"<GETCPM>>".to_vec());
    }

    #[test]
    fn completes_response_missing_one_byte() {
        let port = FakePort::answering(&[&[0, 0, 1], &[7]]);
        let mut transport = SerialTransport::from_port(port, 4);

        assert_eq!(poll(&mut transport).unwrap(), vec![0, 0, 1, 7]);
    }

    #[test]
    fn short_read_is_end_of_stream() {
        let mut transport = SerialTransport::from_port(FakePort::answering(&[&[0, 9]]), 4);

        match poll(&mut transport) {
            Err(BridgeError::EndOfStream { expected, received }) => {
                assert_eq!(expected, 4);
                assert_eq!(received, 2);
            }
            other => panic!("expected end of stream, got {:?}", other),
        }
    }

    #[test]
    fn empty_read_is_end_of_stream_for_two_byte_model() {
        let mut transport = SerialTransport::from_port(FakePort::default(), 2);
        assert!(matches!(
            poll(&mut transport),
            Err(BridgeError::EndOfStream { expected: 2, received: 0 })
        ));
    }

    #[test]
    fn pending_bytes_before_query_are_a_model_mismatch() {
        let port = FakePort {
            pending: 2,
            ..FakePort::answering(&[&[0, 1]])
        };
        let mut transport = SerialTransport::from_port(port, 2);

        assert!(matches!(
            poll(&mut transport),
            Err(BridgeError::Decode(DecodeError::StaleBytes(2)))
        ));
        assert!(transport.port.written.is_empty());
    }

    #[test]
    fn write_failure_is_io_error() {
        let port = FakePort {
            fail_writes: true,
            ..FakePort::answering(&[&[0, 1]])
        };
        let mut transport = SerialTransport::from_port(port, 2);

        let err = poll(&mut transport).unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn wider_answer_than_configured_is_caught_on_the_same_read() {
        // 4-byte device, 2-byte model: half of the answer is left behind
        let port = FakePort {
            trailing: 2,
            ..FakePort::answering(&[&[0, 0]])
        };
        let mut transport = SerialTransport::from_port(port, 2);

        assert!(matches!(
            poll(&mut transport),
            Err(BridgeError::Decode(DecodeError::StaleBytes(2)))
        ));
        assert_eq!(transport.port.written, b"<GETCPM>>".to_vec());
    }

    #[test]
    fn attach_drops_bytes_from_a_previous_session() {
        let port = FakePort {
            pending: 3,
            ..FakePort::answering(&[&[0, 0, 0, 12]])
        };
        let mut transport = SerialTransport::attach(port, 4).unwrap();

        assert_eq!(poll(&mut transport).unwrap(), vec![0, 0, 0, 12]);
    }
}
