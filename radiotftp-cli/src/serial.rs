//! Serial access to the radio modem
//!
//! The modem is a transparent byte pipe. RTS doubles as push-to-talk, so it
//! is asserted for the duration of every transmission.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use serialport::SerialPort;

/// Keying delay either side of a burst, giving the transmitter time to settle
const KEY_DELAY: Duration = Duration::from_millis(20);

/// What the runner needs from the radio modem
pub trait RadioPort: Send {
    /// Write every byte of `buf` to the modem
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read whatever arrives within `timeout`; `TimedOut` if nothing does
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Drive the RTS line, which keys the transmitter
    fn set_rts(&mut self, level: bool) -> io::Result<()>;

    /// A second handle to the same port, for the reader thread
    fn try_clone_port(&self) -> io::Result<Box<dyn RadioPort>>;

    /// Send one burst with the transmitter keyed
    fn transmit(&mut self, burst: &[u8]) -> io::Result<()> {
        self.set_rts(true)?;
        let sent = self.write_all(burst);
        self.set_rts(false)?;
        sent
    }
}

/// A modem on a real serial port, 8N1
pub struct RealSerialPort {
    port: Box<dyn SerialPort>,
}

impl RealSerialPort {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let mut port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()?;
        port.write_request_to_send(false)?;

        Ok(RealSerialPort { port })
    }
}

impl RadioPort for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.port.read(buf)
    }

    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.port
            .write_request_to_send(level)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn try_clone_port(&self) -> io::Result<Box<dyn RadioPort>> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(RealSerialPort { port }))
    }

    fn transmit(&mut self, burst: &[u8]) -> io::Result<()> {
        self.set_rts(true)?;
        thread::sleep(KEY_DELAY);
        let sent = self.write_all(burst);
        thread::sleep(KEY_DELAY);
        self.set_rts(false)?;
        sent
    }
}

#[derive(Debug, Default)]
struct MockState {
    incoming: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    rts: Vec<bool>,
}

/// In-memory modem for tests; clones share the same line
#[derive(Debug, Clone, Default)]
pub struct MockRadioPort {
    state: Arc<Mutex<MockState>>,
}

impl MockRadioPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the radio had received them
    pub fn feed(&self, bytes: &[u8]) {
        self.lock().incoming.extend(bytes);
    }

    /// Every `write_all` call so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Every RTS level change so far
    pub fn rts_log(&self) -> Vec<bool> {
        self.lock().rts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RadioPort for MockRadioPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.lock().writes.push(buf.to_vec());
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let read = {
            let mut state = self.lock();
            let n = buf.len().min(state.incoming.len());
            for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
                *slot = byte;
            }
            n
        };

        if read == 0 {
            thread::sleep(timeout.min(Duration::from_millis(5)));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "Mock timeout"));
        }
        Ok(read)
    }

    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.lock().rts.push(level);
        Ok(())
    }

    fn try_clone_port(&self) -> io::Result<Box<dyn RadioPort>> {
        Ok(Box::new(self.clone()))
    }
}
