//! Interactive command loop
//!
//! Free text is passed to the probe verbatim and every reply line printed.
//! `POLL,<seconds>` repeats single reads until interrupted.

use atlas_ph_core::prelude::*;
use std::io::{BufRead, Write};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Granularity at which a poll sleep notices cancellation
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Blank line
    Empty,
    /// Leave the loop
    Quit,
    /// Read repeatedly, sleeping the given interval between cycles
    Poll(Duration),
    /// Send to the probe as-is
    Command(String),
    /// Malformed pseudo-command
    Invalid(String),
}

impl Input {
    /// Interpret one line typed at the prompt
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return Input::Quit;
        }

        match line.split_once(',') {
            Some((name, arg)) if name.eq_ignore_ascii_case("poll") => {
                // rejects negative, NaN and anything past Duration::MAX
                match arg.trim().parse::<f64>().ok().map(Duration::try_from_secs_f64) {
                    Some(Ok(interval)) => Input::Poll(interval),
                    _ => Input::Invalid(format!("POLL needs a number of seconds, got '{}'", arg)),
                }
            }
            _ => Input::Command(line.to_string()),
        }
    }
}

/// Run the loop until `quit`, end of input or cancellation
pub fn run<R, W>(
    probe: &mut PhProbe,
    input: R,
    mut out: W,
    cancel: &CancellationToken,
) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();

    while !cancel.is_cancelled() {
        write!(out, "{}> ", probe.device_id())?;
        out.flush()?;

        let Some(line) = lines.next() else { break };
        match Input::parse(&line?) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Invalid(msg) => writeln!(out, "[-] {}", msg)?,
            Input::Poll(interval) => poll(probe, interval, &mut out, cancel)?,
            Input::Command(text) => match probe.query(&text) {
                Ok(reply) => {
                    for line in reply {
                        writeln!(out, "{}", line.text())?;
                    }
                }
                Err(e) => writeln!(out, "[-] {} failed: {}", text, e)?,
            },
        }
    }

    probe.close();
    Ok(())
}

/// Poll until cancelled, printing timestamped data lines
fn poll<W: Write>(
    probe: &mut PhProbe,
    interval: Duration,
    out: &mut W,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    tracing::info!("Polling every {:.1}s, Ctrl-C to stop", interval.as_secs_f64());

    while !cancel.is_cancelled() {
        match probe.poll() {
            Ok(lines) => {
                let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                for line in lines {
                    writeln!(out, "{} {}", stamp, line)?;
                }
                out.flush()?;
            }
            Err(AtlasError::NotOpen) => return Err(AtlasError::NotOpen.into()),
            Err(e) => writeln!(out, "[-] poll failed: {}", e)?,
        }
        sleep_unless_cancelled(interval, cancel);
    }
    Ok(())
}

fn sleep_unless_cancelled(total: Duration, cancel: &CancellationToken) {
    let mut remaining = total;
    while !remaining.is_zero() && !cancel.is_cancelled() {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
}
