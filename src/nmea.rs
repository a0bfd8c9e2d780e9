//! Minimal NMEA 0183 position parser (GGA and RMC, any talker)

use crate::types::GeoPoint;
use thiserror::Error;

/// Position content of a sentence
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NmeaFix {
    Position(GeoPoint),
    /// Receiver reports no fix (GGA quality 0, RMC status V)
    NoFix,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NmeaError {
    #[error("Not an NMEA sentence")]
    NotASentence,

    #[error("Checksum mismatch: expected {expected:02X}, computed {computed:02X}")]
    BadChecksum { expected: u8, computed: u8 },

    #[error("Missing field {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: '{value}'")]
    BadField { field: &'static str, value: String },
}

/// Parse one sentence. Sentence types other than GGA and RMC yield `Ok(None)`.
pub fn parse_sentence(line: &str) -> Result<Option<NmeaFix>, NmeaError> {
    let line = line.trim();
    let body = line.strip_prefix('$').ok_or(NmeaError::NotASentence)?;

    let body = match body.split_once('*') {
        Some((data, checksum)) => {
            let expected = u8::from_str_radix(checksum.trim(), 16).map_err(|_| NmeaError::BadField {
                field: "checksum",
                value: checksum.to_string(),
            })?;
            let computed = data.bytes().fold(0u8, |acc, b| acc ^ b);
            if expected != computed {
                return Err(NmeaError::BadChecksum { expected, computed });
            }
            data
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let address = fields[0];
    if address.len() != 5 || !address.is_ascii() {
        return Err(NmeaError::NotASentence);
    }

    match &address[2..] {
        "GGA" => parse_gga(&fields).map(Some),
        "RMC" => parse_rmc(&fields).map(Some),
        _ => Ok(None),
    }
}

fn parse_gga(fields: &[&str]) -> Result<NmeaFix, NmeaError> {
    let quality = field(fields, 6, "fix quality")?;
    if quality.is_empty() || quality == "0" {
        return Ok(NmeaFix::NoFix);
    }
    position(fields, 2).map(NmeaFix::Position)
}

fn parse_rmc(fields: &[&str]) -> Result<NmeaFix, NmeaError> {
    match field(fields, 2, "status")? {
        "A" => position(fields, 3).map(NmeaFix::Position),
        _ => Ok(NmeaFix::NoFix),
    }
}

fn field<'a>(fields: &[&'a str], index: usize, name: &'static str) -> Result<&'a str, NmeaError> {
    fields.get(index).copied().ok_or(NmeaError::MissingField(name))
}

/// Latitude, N/S, longitude, E/W starting at `start`
fn position(fields: &[&str], start: usize) -> Result<GeoPoint, NmeaError> {
    let lat = degrees(field(fields, start, "latitude")?, "latitude")?;
    let lat = match field(fields, start + 1, "N/S")? {
        "N" => lat,
        "S" => -lat,
        other => {
            return Err(NmeaError::BadField {
                field: "N/S",
                value: other.to_string(),
            })
        }
    };

    let lon = degrees(field(fields, start + 2, "longitude")?, "longitude")?;
    let lon = match field(fields, start + 3, "E/W")? {
        "E" => lon,
        "W" => -lon,
        other => {
            return Err(NmeaError::BadField {
                field: "E/W",
                value: other.to_string(),
            })
        }
    };

    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        return Err(NmeaError::BadField {
            field: "position",
            value: point.to_string(),
        });
    }
    Ok(point)
}

/// `dddmm.mmmm` to decimal degrees
fn degrees(raw: &str, name: &'static str) -> Result<f64, NmeaError> {
    let bad = || NmeaError::BadField {
        field: name,
        value: raw.to_string(),
    };
    let value: f64 = raw.parse().map_err(|_| bad())?;
    if !value.is_finite() || value < 0.0 {
        return Err(bad());
    }
    let whole = (value / 100.0).trunc();
    let minutes = value - whole * 100.0;
    if minutes >= 60.0 {
        return Err(bad());
    }
    Ok(whole + minutes / 60.0)
}
