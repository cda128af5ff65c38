//! Perch sensor link
//!
//! The sensor board reports beam-break occupancy as ASCII lines, one digit
//! per line: `0` = no perch occupied, `1`/`2`/`3` = that perch occupied.
//!
//! A dedicated thread polls the link and publishes the newest code into a
//! single-slot mailbox (`tokio::sync::watch`). Older codes are overwritten;
//! the decision loop only ever needs the latest occupancy.

use crate::error::{Error, Result};
use perchbox_common::config::SensorConfig;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Longest line accepted before the partial buffer is discarded
const MAX_LINE_BYTES: usize = 64;

/// Occupiable perch position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Perch {
    One,
    Two,
    Three,
}

impl Perch {
    /// Zero-based position (perch 1 = 0)
    pub fn index(self) -> usize {
        match self {
            Perch::One => 0,
            Perch::Two => 1,
            Perch::Three => 2,
        }
    }

    pub fn all() -> [Perch; 3] {
        [Perch::One, Perch::Two, Perch::Three]
    }
}

/// One occupancy report from the sensor board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCode {
    /// `0`: beam not broken anywhere
    NoPerch,
    /// `1`, `2`, `3`
    Perch(Perch),
    /// Anything else (noise, partial line, firmware chatter)
    Unrecognized(String),
}

impl RawCode {
    /// Decode one line of the sensor protocol
    pub fn parse_line(line: &str) -> Self {
        match line.trim() {
            "0" => RawCode::NoPerch,
            "1" => RawCode::Perch(Perch::One),
            "2" => RawCode::Perch(Perch::Two),
            "3" => RawCode::Perch(Perch::Three),
            other => RawCode::Unrecognized(other.to_string()),
        }
    }
}

/// Source of raw occupancy codes
///
/// `poll` blocks for at most the link's timeout and returns `None` when no
/// complete report arrived. Read failures are absorbed as `None`.
pub trait SensorLink: Send + 'static {
    fn poll(&mut self) -> Option<RawCode>;
}

/// Sensor board on a serial port
///
/// Generic over the byte source so line assembly can run against any
/// `Read`; production uses the serial port itself.
pub struct SerialSensor<R: Read = Box<dyn serialport::SerialPort>> {
    port_name: String,
    reader: BufReader<R>,
    pending: Vec<u8>,
    timeout: Duration,
}

impl SerialSensor {
    /// Open the serial channel and discard anything buffered before startup
    pub fn open(config: &SensorConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.poll_timeout_ms);
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|source| Error::SensorOpen {
                port: config.port.clone(),
                source,
            })?;

        if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
            warn!("Could not clear sensor input buffer: {}", e);
        }

        info!(
            "Connected to sensor port {} at {} baud",
            config.port, config.baud_rate
        );

        Ok(Self::from_reader(&config.port, port, timeout))
    }
}

impl<R: Read> SerialSensor<R> {
    /// Wrap an already opened byte source
    ///
    /// `timeout` is how long to back off after end of stream or a read error.
    pub fn from_reader(port_name: &str, reader: R, timeout: Duration) -> Self {
        Self {
            port_name: port_name.to_string(),
            reader: BufReader::new(reader),
            pending: Vec::with_capacity(MAX_LINE_BYTES),
            timeout,
        }
    }

    fn take_line(&mut self) -> RawCode {
        let code = RawCode::parse_line(&String::from_utf8_lossy(&self.pending));
        self.pending.clear();
        code
    }
}

impl<R: Read + Send + 'static> SensorLink for SerialSensor<R> {
    fn poll(&mut self) -> Option<RawCode> {
        // Partial lines stay in `pending` across timeouts
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => {
                debug!("Sensor port {} returned end of stream", self.port_name);
                thread::sleep(self.timeout);
                None
            }
            Ok(_) if self.pending.ends_with(b"\n") => Some(self.take_line()),
            Ok(_) => None,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                if self.pending.len() > MAX_LINE_BYTES {
                    warn!(
                        "Discarding {} bytes without line terminator",
                        self.pending.len()
                    );
                    return Some(self.take_line());
                }
                None
            }
            Err(e) => {
                warn!("Sensor read error on {}: {}", self.port_name, e);
                self.pending.clear();
                thread::sleep(self.timeout);
                None
            }
        }
    }
}

/// Handle to the sensor polling thread
pub struct SensorHandle<S: SensorLink> {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<S>>,
}

/// Start polling `sensor` on its own thread
///
/// Returns the handle and the receiving side of the latest-code mailbox.
pub fn spawn_sensor<S: SensorLink>(
    mut sensor: S,
) -> Result<(SensorHandle<S>, watch::Receiver<Option<RawCode>>)> {
    let (tx, rx) = watch::channel(None);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = thread::Builder::new()
        .name("perch-sensor".to_string())
        .spawn(move || {
            debug!("Sensor polling started");
            while !stop_flag.load(Ordering::Acquire) {
                if let Some(code) = sensor.poll() {
                    if let RawCode::Unrecognized(ref line) = code {
                        debug!("Unrecognized sensor line: {:?}", line);
                    }
                    tx.send_replace(Some(code));
                }
            }
            debug!("Sensor polling stopped");
            sensor
        })?;

    Ok((
        SensorHandle {
            stop,
            thread: Some(thread),
        },
        rx,
    ))
}

impl<S: SensorLink> SensorHandle<S> {
    /// Stop accepting new sensor data; the thread exits within one poll
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait for the polling thread and hand back the link
    ///
    /// Blocks for up to one poll timeout.
    pub fn join(mut self) -> Result<S> {
        self.request_stop();
        let thread = self
            .thread
            .take()
            .ok_or_else(|| std::io::Error::other("sensor thread already joined"))?;
        thread
            .join()
            .map_err(|_| Error::Io(std::io::Error::other("sensor thread panicked")))
    }
}

impl<S: SensorLink> Drop for SensorHandle<S> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}
