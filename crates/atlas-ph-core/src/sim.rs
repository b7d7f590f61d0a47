//! Demo Mode - Simulated pH probe for testing
//!
//! Answers the EZO pH UART command set without hardware attached. Readings
//! hover around neutral with a slow drift and a little noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::io;

use crate::probe::BaudRate;
use crate::transport::{SerialLink, LINE_TERMINATOR};

/// Firmware version reported by the `i` command
const FIRMWARE_VERSION: &str = "2.16";

/// Simulated EZO pH circuit implementing [`SerialLink`]
pub struct SimulatedProbe {
    /// Bytes of a command not yet terminated
    command: Vec<u8>,
    /// Reply bytes waiting to be read
    outgoing: VecDeque<u8>,
    /// Current UART rate
    baud: BaudRate,
    /// Extended pH scale flag
    extended_scale: bool,
    /// Reading returned verbatim instead of the simulated one
    fixed_reading: Option<f64>,
    /// Slowly drifting base value
    current_ph: f64,
    /// Random number generator
    rng: StdRng,
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProbe {
    /// Create a simulator at 9600 baud, reading near pH 7
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a simulator with reproducible noise
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            command: Vec::new(),
            outgoing: VecDeque::new(),
            baud: BaudRate::default(),
            extended_scale: false,
            fixed_reading: None,
            current_ph: 7.0,
            rng,
        }
    }

    /// Always report `ph` for `r`
    pub fn with_fixed_reading(mut self, ph: f64) -> Self {
        self.fixed_reading = Some(ph);
        self
    }

    /// Current simulated baud rate
    pub fn baud(&self) -> BaudRate {
        self.baud
    }

    fn next_reading(&mut self) -> f64 {
        if let Some(ph) = self.fixed_reading {
            return ph;
        }
        let drift: f64 = self.rng.gen_range(-0.01..0.01);
        self.current_ph = (self.current_ph + drift).clamp(6.5, 7.5);
        let noise: f64 = self.rng.gen_range(-0.005..0.005);
        self.current_ph + noise
    }

    fn reply(&mut self, line: &str) {
        self.outgoing.extend(line.bytes());
        self.outgoing.push_back(LINE_TERMINATOR);
    }

    /// Produce the reply lines for one command
    fn respond(&mut self, command: &str) {
        let lower = command.trim().to_ascii_lowercase();
        let (name, arg) = match lower.split_once(',') {
            Some((name, arg)) => (name, Some(arg)),
            None => (lower.as_str(), None),
        };

        match (name, arg) {
            ("r", None) => {
                let ph = self.next_reading();
                self.reply(&format!("{:.3}", ph));
            }
            ("i", None) => {
                self.reply(&format!("?i,pH,{}", FIRMWARE_VERSION));
            }
            ("baud", Some("?")) => {
                let line = format!("?Baud,{}", self.baud);
                self.reply(&line);
            }
            ("baud", Some(rate)) => {
                match rate.parse::<u32>().ok().and_then(|r| BaudRate::try_from(r).ok()) {
                    Some(rate) => self.baud = rate,
                    None => return self.reply("*ER"),
                }
            }
            ("phext", Some("?")) => {
                let line = format!("?pHext,{}", u8::from(self.extended_scale));
                self.reply(&line);
            }
            ("phext", Some("0")) => self.extended_scale = false,
            ("phext", Some("1")) => self.extended_scale = true,
            _ => return self.reply("*ER"),
        }
        self.reply("*OK");
    }
}

impl SerialLink for SimulatedProbe {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        for &byte in data {
            if byte == LINE_TERMINATOR {
                let command = String::from_utf8_lossy(&self.command).into_owned();
                self.command.clear();
                self.respond(&command);
            } else {
                self.command.push(byte);
            }
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.outgoing.len() as u32)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.outgoing.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(sim: &mut SimulatedProbe, cmd: &str) -> String {
        sim.write(format!("{}\r", cmd).as_bytes()).unwrap();
        let mut buf = [0u8; 128];
        let n = sim.read(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn test_reading_stays_near_neutral() {
        let mut sim = SimulatedProbe::with_seed(42);
        for _ in 0..100 {
            let reply = send(&mut sim, "r");
            let value: f64 = reply.split('\r').next().unwrap().parse().unwrap();
            assert!((6.4..=7.6).contains(&value), "reading {} out of range", value);
        }
    }

    #[test]
    fn test_fixed_reading() {
        let mut sim = SimulatedProbe::new().with_fixed_reading(7.01);
        assert_eq!(send(&mut sim, "R"), "7.010\r*OK\r");
    }

    #[test]
    fn test_baud_commands() {
        let mut sim = SimulatedProbe::new();
        assert_eq!(send(&mut sim, "baud,?"), "?Baud,9600\r*OK\r");
        assert_eq!(send(&mut sim, "baud,57600"), "*OK\r");
        assert_eq!(sim.baud(), BaudRate::B57600);
        assert_eq!(send(&mut sim, "baud,1"), "*ER\r");
        assert_eq!(sim.baud(), BaudRate::B57600);
    }

    #[test]
    fn test_extended_scale_commands() {
        let mut sim = SimulatedProbe::new();
        assert_eq!(send(&mut sim, "pHext,?"), "?pHext,0\r*OK\r");
        assert_eq!(send(&mut sim, "pHext,1"), "*OK\r");
        assert_eq!(send(&mut sim, "pHext,?"), "?pHext,1\r*OK\r");
    }

    #[test]
    fn test_device_information() {
        let mut sim = SimulatedProbe::new();
        assert_eq!(send(&mut sim, "i"), "?i,pH,2.16\r*OK\r");
        assert_eq!(send(&mut sim, "i,extra"), "*ER\r");
    }

    #[test]
    fn test_unknown_command() {
        let mut sim = SimulatedProbe::new();
        assert_eq!(send(&mut sim, "cal,mid,7.00,extra"), "*ER\r");
    }

    #[test]
    fn test_partial_writes_are_assembled() {
        let mut sim = SimulatedProbe::new();
        sim.write(b"ba").unwrap();
        assert_eq!(sim.bytes_to_read().unwrap(), 0);
        sim.write(b"ud,?\r").unwrap();
        assert!(sim.bytes_to_read().unwrap() > 0);
        sim.clear_input().unwrap();
        assert_eq!(sim.bytes_to_read().unwrap(), 0);
    }
}
