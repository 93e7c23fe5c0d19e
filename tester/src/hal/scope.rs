use anyhow::Context;
use cathcore::bench_interface::{Oscilloscope, Waveform};
use cathcore::{MeasureError, MeasureResult};
use log::{debug, info};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use crate::workflow::config::ScopeSettings;

fn unavailable(action: &str, err: impl std::fmt::Display) -> MeasureError {
    MeasureError::InstrumentUnavailable(format!("scope {}: {}", action, err))
}

/// Oscilloscope driven with raw SCPI over a TCP socket.
pub struct ScpiScope {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    capture_window_s: f64,
    busy_poll: Duration,
}

impl ScpiScope {
    pub fn connect(settings: &ScopeSettings) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(&settings.address)
            .with_context(|| format!("connecting to scope at {}", settings.address))?;
        stream
            .set_read_timeout(Some(Duration::from_millis(settings.io_timeout_ms)))
            .context("setting scope read timeout")?;
        let writer = stream.try_clone().context("cloning scope socket")?;
        let mut scope = Self {
            reader: BufReader::new(stream),
            writer,
            capture_window_s: settings.capture_window_s,
            busy_poll: Duration::from_millis(settings.busy_poll_ms),
        };
        let identity = scope.query("*IDN?").context("querying scope identity")?;
        info!("connected to scope {}", identity);
        Ok(scope)
    }

    fn send(&mut self, command: &str) -> io::Result<()> {
        debug!("scope <- {}", command);
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn query(&mut self, command: &str) -> io::Result<String> {
        self.send(command)?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "scope closed the connection",
            ));
        }
        Ok(line.trim().to_string())
    }

    fn query_number(&mut self, command: &str) -> MeasureResult<f64> {
        let reply = self.query(command).map_err(|err| unavailable(command, err))?;
        reply
            .parse::<f64>()
            .map_err(|_| unavailable(command, format!("unexpected reply '{}'", reply)))
    }

    /// Reads an IEEE-488.2 definite-length block: `#<n><len><bytes>`.
    fn read_block(&mut self) -> io::Result<Vec<u8>> {
        let invalid = |what: &str| io::Error::new(io::ErrorKind::InvalidData, what.to_string());
        let mut header = [0u8; 2];
        self.reader.read_exact(&mut header)?;
        if header[0] != b'#' {
            return Err(invalid("block does not start with '#'"));
        }
        let digits = (header[1] as char)
            .to_digit(10)
            .filter(|&d| d > 0)
            .ok_or_else(|| invalid("bad block length digit"))? as usize;
        let mut length = vec![0u8; digits];
        self.reader.read_exact(&mut length)?;
        let length: usize = std::str::from_utf8(&length)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| invalid("bad block length"))?;
        let mut data = vec![0u8; length];
        self.reader.read_exact(&mut data)?;
        let mut terminator = String::new();
        self.reader.read_line(&mut terminator)?;
        Ok(data)
    }

    fn wait_until_idle(&mut self, timeout: Duration) -> MeasureResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let busy = self
                .query("BUSY?")
                .map_err(|err| unavailable("polling BUSY?", err))?;
            if busy == "0" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(unavailable(
                    "acquisition",
                    format!("still busy after {} ms", timeout.as_millis()),
                ));
            }
            thread::sleep(self.busy_poll);
        }
    }
}

impl Oscilloscope for ScpiScope {
    fn capture_waveform(&mut self, scope_channel: u8, timeout: Duration) -> MeasureResult<Waveform> {
        let arm = [
            "HEADER OFF".to_string(),
            format!("DATA:SOURCE CH{}", scope_channel),
            "DATA:ENCDG RIBINARY".to_string(),
            "DATA:WIDTH 1".to_string(),
            "ACQUIRE:STATE OFF".to_string(),
            "ACQUIRE:MODE SAMPLE".to_string(),
            "ACQUIRE:STOPAFTER SEQUENCE".to_string(),
            "ACQUIRE:STATE RUN".to_string(),
        ];
        for command in &arm {
            self.send(command).map_err(|err| unavailable(command, err))?;
        }
        self.wait_until_idle(timeout)?;

        let record_length = self.query_number("HORIZONTAL:RECORDLENGTH?")? as usize;
        let xincr = self.query_number("WFMOUTPRE:XINCR?")?;
        let ymult = self.query_number("WFMOUTPRE:YMULT?")?;
        let yoff = self.query_number("WFMOUTPRE:YOFF?")?;
        let yzero = self.query_number("WFMOUTPRE:YZERO?")?;
        if !(xincr > 0.0) {
            return Err(unavailable("preamble", format!("sample interval {}", xincr)));
        }

        let wanted = (self.capture_window_s / xincr).round() as usize;
        let stop = wanted.min(record_length);
        for command in ["DATA:START 1".to_string(), format!("DATA:STOP {}", stop)] {
            self.send(&command).map_err(|err| unavailable(&command, err))?;
        }
        self.send("CURVE?")
            .and_then(|_| self.read_block())
            .map_err(|err| unavailable("reading CURVE?", err))
            .and_then(|raw| {
                let voltage = raw
                    .iter()
                    .take(stop)
                    .map(|&byte| ymult * (byte as i8 as f64 - yoff) + yzero)
                    .collect();
                Waveform::from_samples(0.0, xincr, voltage)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;

    /// Minimal scope that answers queries from a canned table.
    fn spawn_scope(busy_polls: usize, curve: Vec<i8>) -> (String, mpsc::Receiver<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut seen = Vec::new();
            let mut remaining_busy = busy_polls;
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                let command = line.trim().to_string();
                line.clear();
                let reply: Option<Vec<u8>> = match command.as_str() {
                    "*IDN?" => Some(b"TEKTRONIX,MSO44,0,1\n".to_vec()),
                    "BUSY?" if remaining_busy > 0 => {
                        remaining_busy -= 1;
                        Some(b"1\n".to_vec())
                    }
                    "BUSY?" => Some(b"0\n".to_vec()),
                    "HORIZONTAL:RECORDLENGTH?" => Some(b"10000\n".to_vec()),
                    "WFMOUTPRE:XINCR?" => Some(b"1.0E-9\n".to_vec()),
                    "WFMOUTPRE:YMULT?" => Some(b"0.01\n".to_vec()),
                    "WFMOUTPRE:YOFF?" => Some(b"2\n".to_vec()),
                    "WFMOUTPRE:YZERO?" => Some(b"0.5\n".to_vec()),
                    "CURVE?" => {
                        let mut block = format!("#1{}", curve.len()).into_bytes();
                        block.extend(curve.iter().map(|&v| v as u8));
                        block.push(b'\n');
                        Some(block)
                    }
                    _ => None,
                };
                seen.push(command);
                if let Some(reply) = reply {
                    writer.write_all(&reply).unwrap();
                }
            }
            let _ = tx.send(seen);
        });
        (address, rx)
    }

    fn settings(address: String) -> ScopeSettings {
        ScopeSettings {
            address,
            capture_window_s: 8.0e-9,
            io_timeout_ms: 2_000,
            busy_poll_ms: 1,
        }
    }

    #[test]
    fn capture_scales_curve_and_clamps_to_window() {
        let (address, seen) = spawn_scope(2, vec![2, 12, -8, 2, 2, 2, 2, 2]);
        let mut scope = ScpiScope::connect(&settings(address)).unwrap();
        let wave = scope.capture_waveform(1, Duration::from_secs(5)).unwrap();
        drop(scope);

        assert_eq!(wave.len(), 8);
        assert!((wave.voltage()[0] - 0.5).abs() < 1e-12);
        assert!((wave.voltage()[1] - 0.6).abs() < 1e-12);
        assert!((wave.voltage()[2] - 0.4).abs() < 1e-12);
        assert!((wave.sample_interval().unwrap() - 1.0e-9).abs() < 1e-15);

        let commands = seen.recv().unwrap();
        assert!(commands.contains(&"DATA:SOURCE CH1".to_string()));
        assert!(commands.contains(&"DATA:STOP 8".to_string()));
        assert_eq!(commands.iter().filter(|c| *c == "BUSY?").count(), 3);
    }

    #[test]
    fn stuck_acquisition_times_out() {
        let (address, _seen) = spawn_scope(usize::MAX, Vec::new());
        let mut scope = ScpiScope::connect(&settings(address)).unwrap();
        let err = scope
            .capture_waveform(2, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, MeasureError::InstrumentUnavailable(ref msg) if msg.contains("still busy")));
    }
}
