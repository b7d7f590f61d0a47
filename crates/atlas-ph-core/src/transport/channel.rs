//! Channel management
//!
//! Owns one open serial link to a device and frames it into
//! carriage-return terminated lines.

use serde::{Deserialize, Serialize};
use std::io;
use std::time::{Duration, Instant};

use super::{
    serial::{find_device, open_port},
    SerialLink, DEFAULT_BAUD_RATE, DEFAULT_PORT_TIMEOUT, DEFAULT_READ_TIMEOUT,
    DEFAULT_SETTLE_DELAY, LINE_TERMINATOR,
};
use crate::error::{AtlasError, Result};

/// Interval between polls of a link that had nothing to read
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Link is open, commands may be issued
    Open,
    /// Link released
    Closed,
}

/// Channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// UART baud rate used to open the port
    pub baud_rate: u32,
    /// Time the device needs after a command before its reply is complete
    pub settle_delay: Duration,
    /// Deadline for one response line
    pub read_timeout: Duration,
    /// Per-read timeout handed to the OS port
    pub port_timeout: Duration,
    /// Byte terminating commands and response lines
    pub line_terminator: u8,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            settle_delay: DEFAULT_SETTLE_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            port_timeout: DEFAULT_PORT_TIMEOUT,
            line_terminator: LINE_TERMINATOR,
        }
    }
}

impl ChannelConfig {
    /// Override the settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Override the response line deadline
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Override the baud rate the port is opened at
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Cumulative traffic on a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelCounters {
    /// Bytes written, terminators included
    pub tx_bytes: u64,
    /// Bytes read from the link
    pub rx_bytes: u64,
    /// Commands written
    pub tx_commands: u64,
    /// Complete lines handed to callers
    pub rx_lines: u64,
}

/// Open serial connection bound to one device identifier
///
/// Dropping the channel closes it.
pub struct Channel {
    /// Identifier the channel was opened for
    device_id: String,
    /// Underlying link, `None` once closed
    link: Option<Box<dyn SerialLink>>,
    /// Channel configuration
    config: ChannelConfig,
    /// Received bytes not yet returned as a complete line
    pending: Vec<u8>,
    /// Traffic counters
    counters: ChannelCounters,
}

impl Channel {
    /// Open a channel to the attached device whose serial number is `device_id`
    pub fn open(device_id: &str, config: ChannelConfig) -> Result<Self> {
        let device = find_device(device_id)?;
        tracing::info!(
            "Opening {} on {} at {} baud",
            device_id,
            device.port_name,
            config.baud_rate
        );

        let mut port = open_port(&device, &config)?;
        port.clear_input()
            .map_err(|e| AtlasError::Connection(format!("{}: {}", device.port_name, e)))?;

        Ok(Self::from_link(device_id, port, config))
    }

    /// Bind an already open link to `device_id`
    pub fn from_link<L>(device_id: &str, link: L, config: ChannelConfig) -> Self
    where
        L: SerialLink + 'static,
    {
        Self {
            device_id: device_id.to_string(),
            link: Some(Box::new(link)),
            config,
            pending: Vec::new(),
            counters: ChannelCounters::default(),
        }
    }

    /// Identifier the channel is bound to
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Current state
    pub fn state(&self) -> ChannelState {
        if self.link.is_some() {
            ChannelState::Open
        } else {
            ChannelState::Closed
        }
    }

    /// Whether commands may be issued
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Channel configuration
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Cumulative traffic counters
    pub fn counters(&self) -> ChannelCounters {
        self.counters
    }

    /// Release the link. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            self.pending.clear();
            tracing::info!("Closed channel to {}", self.device_id);
        }
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn SerialLink>> {
        self.link.as_mut().ok_or(AtlasError::NotOpen)
    }

    /// Discard all unread input, buffered or still in the OS queue
    pub fn flush(&mut self) -> Result<()> {
        let link = self.link.as_mut().ok_or(AtlasError::NotOpen)?;
        link.clear_input()?;
        if !self.pending.is_empty() {
            tracing::debug!(
                "flush: dropped {} buffered bytes: {:?}",
                self.pending.len(),
                String::from_utf8_lossy(&self.pending)
            );
            self.pending.clear();
        }
        Ok(())
    }

    /// Send `text` followed by the line terminator, propagating failures
    pub fn try_write_command(&mut self, text: &str) -> Result<usize> {
        let terminator = self.config.line_terminator;
        if text.bytes().any(|b| b == terminator) {
            return Err(AtlasError::InvalidArgument(format!(
                "command {:?} contains the line terminator",
                text
            )));
        }

        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(terminator);

        let written = self.link_mut()?.write(&bytes)?;
        tracing::debug!("write_command: sent {} bytes: {:?}", written, text);

        self.counters.tx_bytes = self.counters.tx_bytes.saturating_add(written as u64);
        self.counters.tx_commands = self.counters.tx_commands.saturating_add(1);
        Ok(written)
    }

    /// Send `text` followed by the line terminator.
    ///
    /// Returns the number of bytes written, or 0 if the write failed. The
    /// failure is logged rather than returned so callers can decide to retry.
    pub fn write_command(&mut self, text: &str) -> usize {
        match self.try_write_command(text) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Failed to send {:?} to {}: {}", text, self.device_id, e);
                0
            }
        }
    }

    /// Block for the configured settle delay
    pub fn wait(&self) {
        std::thread::sleep(self.config.settle_delay);
    }

    /// Read one response line, blocking until it is complete or the read
    /// deadline passes. The terminator is stripped.
    pub fn read_line(&mut self) -> Result<String> {
        // a timeout past what Instant can represent never expires
        let deadline = Instant::now().checked_add(self.config.read_timeout);

        loop {
            if let Some(line) = self.take_line() {
                tracing::debug!("read_line: {:?}", line);
                return Ok(line);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(
                    "read_line: no complete line from {} within {}ms ({} bytes pending)",
                    self.device_id,
                    self.config.read_timeout.as_millis(),
                    self.pending.len()
                );
                return Err(AtlasError::Timeout);
            }
            if self.fill()? == 0 {
                std::thread::sleep(IDLE_POLL_INTERVAL);
            }
        }
    }

    /// Return every complete line already received, without blocking.
    /// A trailing partial line stays buffered.
    pub fn read_lines(&mut self) -> Result<Vec<String>> {
        loop {
            let available = self.link_mut()?.bytes_to_read()?;
            if available == 0 || self.fill()? == 0 {
                break;
            }
        }

        let mut lines = Vec::new();
        while let Some(line) = self.take_line() {
            lines.push(line);
        }
        tracing::debug!("read_lines: {:?}", lines);
        Ok(lines)
    }

    /// Free-text exchange: flush, send, wait, then drain every line
    pub fn exchange(&mut self, text: &str) -> Result<Vec<String>> {
        self.flush()?;
        if self.write_command(text) == 0 {
            return Err(AtlasError::CommandNotSent(text.to_string()));
        }
        self.wait();
        self.read_lines()
    }

    /// One read from the link into `pending`; returns the byte count
    fn fill(&mut self) -> Result<usize> {
        let mut buffer = [0u8; 256];
        let link = self.link.as_mut().ok_or(AtlasError::NotOpen)?;
        match link.read(&mut buffer) {
            Ok(n) => {
                self.pending.extend_from_slice(&buffer[..n]);
                self.counters.rx_bytes = self.counters.rx_bytes.saturating_add(n as u64);
                Ok(n)
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            }
            Err(e) => {
                tracing::warn!("read from {} failed: {}", self.device_id, e);
                Err(AtlasError::Io(e))
            }
        }
    }

    /// Split the first complete line off `pending`
    fn take_line(&mut self) -> Option<String> {
        let terminator = self.config.line_terminator;
        let end = self.pending.iter().position(|&b| b == terminator)?;
        let line: Vec<u8> = self.pending.drain(..=end).take(end).collect();
        self.counters.rx_lines = self.counters.rx_lines.saturating_add(1);
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("device_id", &self.device_id)
            .field("state", &self.state())
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Loopback-style link: replies are queued up front, writes are recorded
    #[derive(Clone, Default)]
    struct ScriptedLink {
        inner: Arc<Mutex<Scripted>>,
    }

    #[derive(Default)]
    struct Scripted {
        written: Vec<u8>,
        incoming: VecDeque<u8>,
        fail_writes: bool,
        clears: usize,
    }

    impl ScriptedLink {
        fn queue(&self, bytes: &[u8]) {
            self.inner.lock().unwrap().incoming.extend(bytes.iter().copied());
        }
    }

    impl SerialLink for ScriptedLink {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            let mut s = self.inner.lock().unwrap();
            if s.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            s.written.extend_from_slice(data);
            Ok(data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut s = self.inner.lock().unwrap();
            // hand out at most 3 bytes per read to exercise reassembly
            let n = buf.len().min(s.incoming.len()).min(3);
            for slot in buf.iter_mut().take(n) {
                *slot = s.incoming.pop_front().unwrap();
            }
            Ok(n)
        }

        fn bytes_to_read(&mut self) -> io::Result<u32> {
            Ok(self.inner.lock().unwrap().incoming.len() as u32)
        }

        fn clear_input(&mut self) -> io::Result<()> {
            let mut s = self.inner.lock().unwrap();
            s.incoming.clear();
            s.clears += 1;
            Ok(())
        }
    }

    fn fast_config() -> ChannelConfig {
        ChannelConfig::default()
            .with_settle_delay(Duration::from_millis(5))
            .with_read_timeout(Duration::from_millis(50))
    }

    fn channel() -> (Channel, ScriptedLink) {
        let link = ScriptedLink::default();
        let chan = Channel::from_link("DK0G4FXK", link.clone(), fast_config());
        (chan, link)
    }

    #[test]
    fn test_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.line_terminator, b'\r');
    }

    #[test]
    fn test_write_appends_carriage_return() {
        let (mut chan, link) = channel();
        assert_eq!(chan.write_command("r"), 2);
        assert_eq!(link.inner.lock().unwrap().written, b"r\r".to_vec());
        assert_eq!(chan.counters().tx_commands, 1);
    }

    #[test]
    fn test_embedded_terminator_rejected() {
        let (mut chan, link) = channel();
        assert!(matches!(
            chan.try_write_command("r\rr"),
            Err(AtlasError::InvalidArgument(_))
        ));
        assert_eq!(chan.write_command("r\r"), 0);
        assert!(link.inner.lock().unwrap().written.is_empty());
    }

    #[test]
    fn test_write_failure_returns_zero() {
        let (mut chan, link) = channel();
        link.inner.lock().unwrap().fail_writes = true;
        assert_eq!(chan.write_command("r"), 0);
        assert!(matches!(chan.try_write_command("r"), Err(AtlasError::Io(_))));
        assert!(chan.is_open());
    }

    #[test]
    fn test_read_line_reassembles_partial_reads() {
        let (mut chan, link) = channel();
        link.queue(b"7.015\r*OK\r");
        assert_eq!(chan.read_line().unwrap(), "7.015");
        assert_eq!(chan.read_line().unwrap(), "*OK");
        assert_eq!(chan.counters().rx_lines, 2);
    }

    #[test]
    fn test_read_line_times_out() {
        let (mut chan, link) = channel();
        link.queue(b"7.0");
        let start = Instant::now();
        assert!(matches!(chan.read_line(), Err(AtlasError::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_read_line_with_unbounded_timeout() {
        let link = ScriptedLink::default();
        let config = fast_config().with_read_timeout(Duration::MAX);
        let mut chan = Channel::from_link("DK0G4FXK", link.clone(), config);
        link.queue(b"7.02\r");
        assert_eq!(chan.read_line().unwrap(), "7.02");
    }

    #[test]
    fn test_read_lines_drains_without_blocking() {
        let (mut chan, link) = channel();
        assert!(chan.read_lines().unwrap().is_empty());

        link.queue(b"?Baud,9600\r*OK\r*SL");
        assert_eq!(chan.read_lines().unwrap(), vec!["?Baud,9600", "*OK"]);

        link.queue(b"EEP\r");
        assert_eq!(chan.read_lines().unwrap(), vec!["*SLEEP"]);
    }

    #[test]
    fn test_flush_discards_buffered_input() {
        let (mut chan, link) = channel();
        link.queue(b"stale\rpart");
        chan.read_lines().unwrap();
        link.queue(b"more\r");
        chan.flush().unwrap();
        assert!(chan.read_lines().unwrap().is_empty());
        assert_eq!(link.inner.lock().unwrap().clears, 1);
    }

    #[test]
    fn test_custom_terminator() {
        let link = ScriptedLink::default();
        let mut config = fast_config();
        config.line_terminator = b'\n';
        let mut chan = Channel::from_link("X", link.clone(), config);
        link.queue(b"1.5\n");
        assert_eq!(chan.read_line().unwrap(), "1.5");
        chan.write_command("r");
        assert_eq!(link.inner.lock().unwrap().written, b"r\n".to_vec());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut chan, _link) = channel();
        assert_eq!(chan.state(), ChannelState::Open);
        chan.close();
        chan.close();
        assert_eq!(chan.state(), ChannelState::Closed);
    }

    #[test]
    fn test_closed_channel_rejects_io() {
        let (mut chan, link) = channel();
        chan.close();
        assert_eq!(chan.write_command("r"), 0);
        assert!(matches!(chan.flush(), Err(AtlasError::NotOpen)));
        assert!(matches!(chan.read_line(), Err(AtlasError::NotOpen)));
        assert!(matches!(chan.read_lines(), Err(AtlasError::NotOpen)));
        assert!(link.inner.lock().unwrap().written.is_empty());
    }

    #[test]
    fn test_exchange_reports_unsent_command() {
        let (mut chan, link) = channel();
        link.inner.lock().unwrap().fail_writes = true;
        assert!(matches!(
            chan.exchange("i"),
            Err(AtlasError::CommandNotSent(cmd)) if cmd == "i"
        ));
    }

    #[test]
    fn test_open_unknown_device() {
        let result = Channel::open("NO-SUCH-DEVICE-ID", ChannelConfig::default());
        assert!(matches!(result, Err(AtlasError::DeviceNotFound(id)) if id == "NO-SUCH-DEVICE-ID"));
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: ChannelConfig = serde_json::from_str(r#"{"baud_rate": 19200}"#).unwrap();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.settle_delay, DEFAULT_SETTLE_DELAY);
    }
}
