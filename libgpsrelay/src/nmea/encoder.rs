use chrono::{DateTime, Utc};

use crate::location::LocationSample;

use super::{Checksum, Kind};


/// Satellite count reported when the fix does not carry one.
const DEFAULT_SATELLITES: u8 = 7;


struct Encoder {
    buf: String,
    crc: Checksum,
}

impl Encoder {
    fn new(kind: Kind) -> Self {
        let mut buf = String::with_capacity(82);
        buf.push('$');

        let mut enc = Self { buf, crc: Checksum::new() };
        enc.put_str(kind.id());
        enc
    }

    fn put_str(&mut self, s: &str) -> &mut Self {
        self.crc.put_bytes(s.as_bytes());
        self.buf.push_str(s);
        self
    }

    fn field(&mut self, s: &str) -> &mut Self {
        self.put_str(",").put_str(s)
    }

    fn finalize(&mut self) -> String {
        let trailer = format!("*{:X}\r\n", self.crc.value());
        self.buf.push_str(&trailer);
        std::mem::take(&mut self.buf)
    }
}


fn timestamp(sample: &LocationSample) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(sample.timestamp_ms).unwrap_or_default()
}

/// Ten-thousandths of a minute per degree.
const MINUTE_UNITS: u64 = 600_000;

fn coordinate(value: f64, int_digits: usize) -> String {
    let value = if value.is_finite() { value.abs() } else { 0.0 };
    let width = int_digits + 5;

    let mut degrees = value.floor() as u64;
    let mut minutes = ((value - value.floor()) * MINUTE_UNITS as f64).round() as u64;

    // rounding may produce a full 60 minutes
    if minutes >= MINUTE_UNITS {
        degrees += 1;
        minutes -= MINUTE_UNITS;
    }

    let mut s = format!(
        "{:0dw$}{:02}.{:04}",
        degrees,
        minutes / 10_000,
        minutes % 10_000,
        dw = int_digits - 2,
    );

    // keep between three and four fractional digits
    while s.ends_with('0') && s.len() > width - 1 {
        s.pop();
    }

    s
}

/// Fixed-point rendering with zero-padded integer part, sign in front.
fn fixed(value: f64, int_digits: usize, frac_digits: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let width = int_digits + 1 + frac_digits;

    if value < 0.0 {
        format!("-{:0width$.frac_digits$}", -value)
    } else {
        format!("{:0width$.frac_digits$}", value)
    }
}

/// Latitude as `DDMM.mmm[m]` plus hemisphere letter.
pub fn format_latitude(latitude: f64) -> (String, char) {
    let hemisphere = if latitude >= 0.0 { 'N' } else { 'S' };
    (coordinate(latitude, 4), hemisphere)
}

/// Longitude as `DDDMM.mmm[m]` plus hemisphere letter.
pub fn format_longitude(longitude: f64) -> (String, char) {
    let hemisphere = if longitude >= 0.0 { 'E' } else { 'W' };
    (coordinate(longitude, 5), hemisphere)
}

fn put_position(enc: &mut Encoder, sample: &LocationSample) {
    let (lat, ns) = format_latitude(sample.latitude);
    let (lon, ew) = format_longitude(sample.longitude);

    enc.field(&lat)
        .field(ns.encode_utf8(&mut [0; 4]))
        .field(&lon)
        .field(ew.encode_utf8(&mut [0; 4]));
}


/// Build a `$GPRMC` sentence, including checksum and CRLF.
pub fn encode_rmc(sample: &LocationSample) -> String {
    let time = timestamp(sample);

    let mut enc = Encoder::new(Kind::Rmc);
    enc.field(&time.format("%H%M%S%.3f").to_string())
        .field("A");

    put_position(&mut enc, sample);

    enc.field(&fixed(sample.speed, 3, 2))
        .field(&fixed(sample.bearing, 3, 2))
        .field(&time.format("%d%m%y").to_string())
        .field("")
        .field("")
        .finalize()
}

/// Build a `$GPGGA` sentence, including checksum and CRLF.
///
/// The fix quality is always reported as `1` (GPS fix). The altitude is
/// reported both as height and as geoid separation.
pub fn encode_gga(sample: &LocationSample) -> String {
    let time = timestamp(sample);
    let satellites = sample.satellites.unwrap_or(DEFAULT_SATELLITES);

    let mut enc = Encoder::new(Kind::Gga);
    enc.field(&time.format("%H%M%S%.3f").to_string());

    put_position(&mut enc, sample);

    enc.field("1")
        .field(&format!("{satellites:02}"))
        .field(&fixed(sample.accuracy, 2, 1))
        .field(&fixed(sample.altitude, 5, 1))
        .field("M")
        .field(&fixed(sample.altitude, 4, 1))
        .field("M")
        .field("000.0")
        .field("0000")
        .finalize()
}
