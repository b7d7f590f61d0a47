//! pH probe driver
//!
//! Typed operations over a [`Channel`], one command cycle at a time.

use super::{
    response::{is_ok, parse_baud, parse_extended_scale, parse_ph},
    BaudRate, Command, ResponseLine,
};
use crate::error::{AtlasError, Result};
use crate::transport::{Channel, ChannelConfig};

/// Atlas Scientific EZO pH probe
///
/// Owns its [`Channel`]; the channel is closed when the probe is closed or
/// dropped. Commands run strictly one at a time: flush, write, settle, read.
#[derive(Debug)]
pub struct PhProbe {
    channel: Channel,
}

impl PhProbe {
    /// Open the probe attached under `device_id`
    pub fn open(device_id: &str, config: ChannelConfig) -> Result<Self> {
        Ok(Self::new(Channel::open(device_id, config)?))
    }

    /// Drive a probe over an existing channel
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Identifier of the attached probe
    pub fn device_id(&self) -> &str {
        self.channel.device_id()
    }

    /// Underlying channel, for state and counters
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Close the channel; idempotent
    pub fn close(&mut self) {
        self.channel.close();
    }

    /// Flush, send `cmd` and wait out the settle delay
    fn send(&mut self, cmd: &Command) -> Result<()> {
        let text = cmd.text();
        self.channel.flush()?;
        if self.channel.write_command(&text) == 0 {
            return Err(AtlasError::CommandNotSent(text));
        }
        self.channel.wait();
        Ok(())
    }

    /// Take a single pH reading
    pub fn read_ph(&mut self) -> Result<f64> {
        self.send(&Command::Read)?;
        let line = self.channel.read_line()?;
        self.channel.flush()?;

        let ph = parse_ph(&line)?;
        tracing::debug!("{}: pH {}", self.device_id(), ph);
        Ok(ph)
    }

    /// Query the current UART baud rate
    pub fn get_baud(&mut self) -> Result<u32> {
        self.send(&Command::QueryBaud)?;
        let line = self.channel.read_line()?;
        parse_baud(&line)
    }

    /// Switch the UART baud rate.
    ///
    /// `rate` must be one of [`BaudRate::ALL`]; anything else is rejected
    /// before the device is touched. Returns whether the device acknowledged.
    pub fn set_baud(&mut self, rate: u32) -> Result<bool> {
        let rate = BaudRate::try_from(rate)?;
        self.send(&Command::SetBaud(rate))?;
        let line = self.channel.read_line()?;

        let acknowledged = is_ok(&line);
        if acknowledged {
            tracing::info!("{}: baud rate set to {}", self.device_id(), rate);
        } else {
            tracing::warn!(
                "{}: baud change to {} not acknowledged, got {:?}",
                self.device_id(),
                rate,
                line
            );
        }
        Ok(acknowledged)
    }

    /// Check whether the extended pH scale (-1.6 to 31.0) is enabled
    pub fn is_extended_ph_scale(&mut self) -> Result<bool> {
        self.send(&Command::QueryExtendedScale)?;
        let line = self.channel.read_line()?;
        parse_extended_scale(&line)
    }

    /// One polling cycle: request a reading and return every data line that
    /// arrived, dropping status lines
    pub fn poll(&mut self) -> Result<Vec<String>> {
        self.send(&Command::Read)?;
        let lines = self.channel.read_lines()?;
        Ok(lines
            .into_iter()
            .map(ResponseLine::classify)
            .filter(|l| !l.is_status())
            .map(|l| l.text().to_string())
            .collect())
    }

    /// Send free text and return every line of the reply
    pub fn query(&mut self, text: &str) -> Result<Vec<ResponseLine>> {
        let lines = self.channel.exchange(text)?;
        Ok(lines.into_iter().map(ResponseLine::classify).collect())
    }
}
