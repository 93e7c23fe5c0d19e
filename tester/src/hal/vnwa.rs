use cathcore::bench_interface::{NetworkAnalyzer, SParameterSweep, SweepRequest};
use cathcore::{MeasureError, MeasureResult};
use log::{info, warn};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use crate::hal::touchstone;
use crate::workflow::config::VnwaSettings;

const EXIT_POLL: Duration = Duration::from_millis(100);

fn unavailable(what: impl std::fmt::Display) -> MeasureError {
    MeasureError::InstrumentUnavailable(format!("VNWA {}", what))
}

/// Script the VNWA executes for one sweep.
pub fn render_script(settings: &VnwaSettings, request: &SweepRequest) -> String {
    let mut script = String::new();
    if let Some(master) = &settings.master_cal {
        let _ = writeln!(script, "loadmastercal {}", master.display());
    }
    if let Some(cal) = &settings.cal_file {
        let _ = writeln!(script, "loadcal {}", cal.display());
    }
    let _ = writeln!(script, "range {} {}", request.start_hz, request.stop_hz);
    let _ = writeln!(script, "frame {} {}", request.points, request.scale);
    let _ = writeln!(script, "timeperpoint {}", settings.time_per_point);
    let _ = writeln!(script, "setTXpower {}", settings.tx_power);
    if !request.parameters.is_empty() {
        let names: Vec<String> = request.parameters.iter().map(|p| p.to_string()).collect();
        let _ = writeln!(script, "sweep {}", names.join(" "));
        for parameter in &request.parameters {
            let _ = writeln!(
                script,
                "writes1p {} {}",
                request.output_path(*parameter).display(),
                parameter
            );
        }
    }
    script.push_str("exitVNWA\n");
    script
}

/// DG8SAQ VNWA driven by script files.
pub struct VnwaAnalyzer {
    settings: VnwaSettings,
}

impl VnwaAnalyzer {
    pub fn new(settings: VnwaSettings) -> Self {
        Self { settings }
    }
}

impl NetworkAnalyzer for VnwaAnalyzer {
    fn sweep(&mut self, request: &SweepRequest, timeout: Duration) -> MeasureResult<()> {
        for parameter in &request.parameters {
            // Stale files from an earlier run must not pass for fresh data.
            let _ = fs::remove_file(request.output_path(*parameter));
        }
        fs::write(&self.settings.script, render_script(&self.settings, request)).map_err(
            |err| unavailable(format!("writing {}: {}", self.settings.script.display(), err)),
        )?;

        let mut child = Command::new(&self.settings.executable)
            .arg(&self.settings.script)
            .arg("-debug")
            .spawn()
            .map_err(|err| {
                unavailable(format!(
                    "starting {}: {}",
                    self.settings.executable.display(),
                    err
                ))
            })?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        warn!("VNWA exited with {}", status);
                    }
                    break;
                }
                Ok(None) if started.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(unavailable(format!(
                        "sweep did not finish within {} ms",
                        timeout.as_millis()
                    )));
                }
                Ok(None) => thread::sleep(EXIT_POLL),
                Err(err) => return Err(unavailable(format!("waiting for sweep: {}", err))),
            }
        }
        info!(
            "VNWA sweep {}..{} Hz finished in {:.1} s",
            request.start_hz,
            request.stop_hz,
            started.elapsed().as_secs_f64()
        );

        for parameter in &request.parameters {
            let path = request.output_path(*parameter);
            if !path.exists() {
                return Err(unavailable(format!("produced no {}", path.display())));
            }
        }
        Ok(())
    }

    fn parse_touchstone(&mut self, path: &Path) -> MeasureResult<SParameterSweep> {
        touchstone::read(path).map(|data| data.sweep)
    }
}
