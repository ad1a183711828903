use clap::{ArgAction, Parser};


/// Serve the local position as NMEA sentences over Bluetooth SPP
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// RFCOMM channel to listen on (-1 to register the default SPP service)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub channel: i64,

    /// Broadcast interval in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    pub interval: u64,

    /// Paired device to connect to after startup ("disabled" for none)
    #[arg(long, default_value = "disabled")]
    pub connect: String,

    /// Latitude of the position to serve, in decimal degrees
    #[arg(long, allow_negative_numbers = true, value_parser = parse_latitude)]
    pub latitude: f64,

    /// Longitude of the position to serve, in decimal degrees
    #[arg(long, allow_negative_numbers = true, value_parser = parse_longitude)]
    pub longitude: f64,

    /// Altitude above sea level, in meters
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub altitude: f64,

    /// Horizontal accuracy, reported as HDOP
    #[arg(long, default_value_t = 1.0)]
    pub accuracy: f64,

    /// Number of satellites to report
    #[arg(long)]
    pub satellites: Option<u8>,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_latitude(s: &str) -> std::result::Result<f64, String> {
    parse_degrees(s, 90.0)
}

fn parse_longitude(s: &str) -> std::result::Result<f64, String> {
    parse_degrees(s, 180.0)
}

fn parse_degrees(s: &str, limit: f64) -> std::result::Result<f64, String> {
    let val: f64 = s.parse().map_err(|e| format!("{e}"))?;

    if !val.is_finite() {
        Err("not a finite number".to_string())
    } else if val > limit {
        Err(format!("exceeds maximum of {limit}"))
    } else if val < -limit {
        Err(format!("exceeds minimum of -{limit}"))
    } else {
        Ok(val)
    }
}
