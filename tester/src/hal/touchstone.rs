//! One-port Touchstone (`.s1p`) files as written by the VNWA.

use cathcore::bench_interface::{ReflectionPoint, SParameterSweep};
use cathcore::{MeasureError, MeasureResult};
use num_complex::Complex64;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataFormat {
    RealImaginary,
    MagnitudeAngle,
    DecibelAngle,
}

/// Contents of the `#` option line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionLine {
    pub frequency_scale: f64,
    pub format: DataFormat,
    pub reference_ohms: f64,
}

impl Default for OptionLine {
    fn default() -> Self {
        // Touchstone defaults when the option line omits a field.
        Self {
            frequency_scale: 1.0e9,
            format: DataFormat::MagnitudeAngle,
            reference_ohms: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouchstoneData {
    pub options: OptionLine,
    pub sweep: SParameterSweep,
}

fn malformed(origin: &str, line: usize, what: impl std::fmt::Display) -> MeasureError {
    MeasureError::InstrumentUnavailable(format!("{}:{}: {}", origin, line, what))
}

fn parse_options(text: &str, origin: &str, line: usize) -> MeasureResult<OptionLine> {
    let mut options = OptionLine::default();
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        match token.to_ascii_uppercase().as_str() {
            "HZ" => options.frequency_scale = 1.0,
            "KHZ" => options.frequency_scale = 1.0e3,
            "MHZ" => options.frequency_scale = 1.0e6,
            "GHZ" => options.frequency_scale = 1.0e9,
            "S" => {}
            "Y" | "Z" | "H" | "G" => {
                return Err(malformed(origin, line, format!("unsupported parameter type {}", token)))
            }
            "RI" => options.format = DataFormat::RealImaginary,
            "MA" => options.format = DataFormat::MagnitudeAngle,
            "DB" => options.format = DataFormat::DecibelAngle,
            "R" => {
                let value = tokens
                    .next()
                    .and_then(|v| v.parse::<f64>().ok())
                    .ok_or_else(|| malformed(origin, line, "R must be followed by a resistance"))?;
                options.reference_ohms = value;
            }
            other => return Err(malformed(origin, line, format!("unknown option {}", other))),
        }
    }
    Ok(options)
}

fn to_gamma(format: DataFormat, a: f64, b: f64) -> Complex64 {
    match format {
        DataFormat::RealImaginary => Complex64::new(a, b),
        DataFormat::MagnitudeAngle => Complex64::from_polar(a, b.to_radians()),
        DataFormat::DecibelAngle => Complex64::from_polar(10f64.powf(a / 20.0), b.to_radians()),
    }
}

/// Parses `.s1p` text; `origin` names the source in error messages.
pub fn parse(text: &str, origin: &str) -> MeasureResult<TouchstoneData> {
    let mut options: Option<OptionLine> = None;
    let mut points = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let content = raw.split('!').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        if let Some(rest) = content.strip_prefix('#') {
            if options.is_some() {
                return Err(malformed(origin, line_no, "second option line"));
            }
            options = Some(parse_options(rest, origin, line_no)?);
            continue;
        }

        let active = options.unwrap_or_default();
        let values = content
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| malformed(origin, line_no, err))?;
        if values.len() != 3 {
            return Err(malformed(
                origin,
                line_no,
                format!("expected 3 columns, found {}", values.len()),
            ));
        }
        points.push(ReflectionPoint {
            frequency_hz: values[0] * active.frequency_scale,
            gamma: to_gamma(active.format, values[1], values[2]),
        });
    }

    let sweep = SParameterSweep::new(points)
        .map_err(|err| MeasureError::InstrumentUnavailable(format!("{}: {}", origin, err)))?;
    Ok(TouchstoneData {
        options: options.unwrap_or_default(),
        sweep,
    })
}

pub fn read(path: &Path) -> MeasureResult<TouchstoneData> {
    let text = fs::read_to_string(path).map_err(|err| {
        MeasureError::InstrumentUnavailable(format!("reading {}: {}", path.display(), err))
    })?;
    parse(&text, &path.display().to_string())
}

/// Renders a sweep as `# Hz S RI R <z0>` text.
pub fn render(sweep: &SParameterSweep, reference_ohms: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "! cathtester synthetic sweep");
    let _ = writeln!(out, "# Hz S RI R {}", reference_ohms);
    for point in sweep.points() {
        let _ = writeln!(
            out,
            "{:.6e}   {:.12e}   {:.12e}",
            point.frequency_hz, point.gamma.re, point.gamma.im
        );
    }
    out
}

pub fn write(path: &Path, sweep: &SParameterSweep, reference_ohms: f64) -> MeasureResult<()> {
    fs::write(path, render(sweep, reference_ohms)).map_err(|err| {
        MeasureError::InstrumentUnavailable(format!("writing {}: {}", path.display(), err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_vnwa_style_file() {
        let text = "! VNWA export\n! second comment\n# MHz S RI R 50\n0.1   0.5   -0.25\n0.2   0.4   -0.3 ! trailing\n";
        let data = parse(text, "sample.s1p").unwrap();
        assert_eq!(data.options.reference_ohms, 50.0);
        let points = data.sweep.points();
        assert_eq!(points.len(), 2);
        assert!((points[0].frequency_hz - 1.0e5).abs() < 1e-6);
        assert_eq!(points[1].gamma, Complex64::new(0.4, -0.3));
    }

    #[test]
    fn magnitude_angle_and_decibel_formats() {
        let ma = parse("# Hz S MA R 50\n1000 0.5 90\n", "ma").unwrap();
        let gamma = ma.sweep.points()[0].gamma;
        assert!(gamma.re.abs() < 1e-12);
        assert!((gamma.im - 0.5).abs() < 1e-12);

        let db = parse("# kHz S DB R 75\n1 -20 0\n", "db").unwrap();
        assert_eq!(db.options.reference_ohms, 75.0);
        assert!((db.sweep.points()[0].gamma.re - 0.1).abs() < 1e-12);
        assert!((db.sweep.points()[0].frequency_hz - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_scattering_parameters() {
        let err = parse("# Hz Z RI R 50\n1 2 3\n", "z.s1p").unwrap_err();
        assert!(matches!(err, MeasureError::InstrumentUnavailable(ref msg) if msg.starts_with("z.s1p:1")));
    }

    #[test]
    fn rejects_short_rows_with_line_number() {
        let err = parse("# Hz S RI R 50\n1 0.1 0.2\n2 0.3\n", "short.s1p").unwrap_err();
        assert!(matches!(err, MeasureError::InstrumentUnavailable(ref msg) if msg.starts_with("short.s1p:3")));
    }

    #[test]
    fn rejects_decreasing_frequencies() {
        assert!(parse("# Hz S RI R 50\n2 0 0\n1 0 0\n", "order").is_err());
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ch0_impedance_s11.s1p");
        let sweep = SParameterSweep::new(vec![
            ReflectionPoint {
                frequency_hz: 1.0e5,
                gamma: Complex64::new(0.99, -0.1),
            },
            ReflectionPoint {
                frequency_hz: 8.0e5,
                gamma: Complex64::new(0.6, -0.7),
            },
        ])
        .unwrap();
        write(&path, &sweep, 50.0).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.sweep.len(), 2);
        let gamma = back.sweep.points()[1].gamma;
        assert!((gamma - Complex64::new(0.6, -0.7)).norm() < 1e-9);
    }

    #[test]
    fn missing_file_is_instrument_unavailable() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read(&dir.path().join("absent.s1p")),
            Err(MeasureError::InstrumentUnavailable(_))
        ));
    }
}
