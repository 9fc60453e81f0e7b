//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use gamalta_types::{DaySet, Mode};
use time::{Time, Weekday};

/// Default connection timeout in seconds, as declared on [`DeviceArgs`].
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device name or address, or use GAMALTA_DEVICE env var
    #[arg(short, long, env = "GAMALTA_DEVICE")]
    pub device: Option<String>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Parser)]
#[command(name = "gamalta")]
#[command(author, version, about = "CLI for Gamalta aquarium lights", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolve output format: `--json` wins over the config file.
    pub fn format(&self, config_format: Option<&str>) -> OutputFormat {
        if self.json {
            return OutputFormat::Json;
        }
        match config_format {
            Some(f) if f.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby Gamalta lights
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long, default_value = "5")]
        timeout: u64,

        /// List every BLE device, not only Gamalta lights
        #[arg(long)]
        all: bool,
    },

    /// Show power, mode, brightness and colour
    Status {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Switch the light on or off
    Power {
        #[command(flatten)]
        device: DeviceArgs,

        #[arg(value_enum)]
        state: PowerState,
    },

    /// Set a manual colour
    Color {
        #[command(flatten)]
        device: DeviceArgs,

        /// Red channel (0-255)
        red: i32,
        /// Green channel (0-255)
        green: i32,
        /// Blue channel (0-255)
        blue: i32,

        /// Cool white channel (0-255)
        #[arg(long, default_value = "0")]
        cool: i32,

        /// Warm white channel (0-255)
        #[arg(long, default_value = "0")]
        warm: i32,

        /// Show the colour without storing it
        #[arg(long)]
        preview: bool,
    },

    /// Set master brightness
    Brightness {
        #[command(flatten)]
        device: DeviceArgs,

        /// Brightness in percent (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },

    /// Select a lighting mode
    Mode {
        #[command(flatten)]
        device: DeviceArgs,

        /// Mode name (manual, sunsync, coral-reef, fish-blue, waterweed, custom-basic, custom-pro)
        #[arg(value_parser = parse_mode)]
        mode: Mode,
    },

    /// Lightning storm effect
    Lightning {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(subcommand)]
        action: LightningAction,
    },

    /// Read or change the device name
    Name {
        #[command(flatten)]
        device: DeviceArgs,

        /// New name (reads the current name when omitted)
        name: Option<String>,
    },

    /// Stream device state reports and session events
    Watch {
        #[command(flatten)]
        device: DeviceArgs,

        /// Query the device state every N seconds (0 to only listen)
        #[arg(short, long, default_value = "0")]
        interval: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Power switch values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

/// Lightning subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum LightningAction {
    /// Flash once right now
    Preview,

    /// Store a lightning schedule
    Set {
        /// Flash intensity in percent (0-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        intensity: u8,

        /// Flash frequency (0-10)
        #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u8).range(0..=10))]
        frequency: u8,

        /// Daily start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start: Time,

        /// Daily end time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        end: Time,

        /// Days to run: all, weekdays, weekend, or a list such as mon,wed,fri
        #[arg(long, default_value = "all", value_parser = parse_days)]
        days: DaySet,

        /// Enable or disable the schedule
        #[arg(long, default_value = "on", value_parser = parse_bool_arg)]
        enabled: bool,
    },
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Store the default device
    SetDevice {
        /// Device name or address
        device: String,
    },
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse::<Mode>().map_err(|e| e.to_string())
}

/// Parse a wall-clock time as `HH:MM`.
pub fn parse_time(s: &str) -> Result<Time, String> {
    let (hour, minute) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("Invalid time '{}'. Use HH:MM", s))?;
    let hour: u8 = hour
        .parse()
        .map_err(|_| format!("Invalid hour in '{}'", s))?;
    let minute: u8 = minute
        .parse()
        .map_err(|_| format!("Invalid minute in '{}'", s))?;
    Time::from_hms(hour, minute, 0).map_err(|e| format!("Invalid time '{}': {}", s, e))
}

/// Parse a day set: `all`, `weekdays`, `weekend`, `none` or a comma list of day names.
pub fn parse_days(s: &str) -> Result<DaySet, String> {
    match s.trim().to_lowercase().as_str() {
        "all" | "daily" => return Ok(DaySet::ALL),
        "weekdays" => return Ok(DaySet::WEEKDAYS),
        "weekend" | "weekends" => return Ok(DaySet::WEEKEND),
        "none" => return Ok(DaySet::EMPTY),
        _ => {}
    }

    s.split(',')
        .map(|day| parse_weekday(day.trim()))
        .collect::<Result<Vec<_>, _>>()
        .map(|days| days.into_iter().collect())
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    let lower = s.to_lowercase();
    let day = match lower.get(..3).unwrap_or(lower.as_str()) {
        "mon" => Weekday::Monday,
        "tue" => Weekday::Tuesday,
        "wed" => Weekday::Wednesday,
        "thu" => Weekday::Thursday,
        "fri" => Weekday::Friday,
        "sat" => Weekday::Saturday,
        "sun" => Weekday::Sunday,
        _ => return Err(format!("Invalid day '{}'. Use mon, tue, wed, thu, fri, sat, sun", s)),
    };
    Ok(day)
}

/// Parse boolean argument with flexible input
fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: true/false, yes/no, on/off, 1/0",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("08:30"), Ok(Time::from_hms(8, 30, 0).unwrap()));
        assert_eq!(parse_time(" 23:59 "), Ok(Time::from_hms(23, 59, 0).unwrap()));
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("0830").is_err());
        assert!(parse_time("ab:cd").is_err());
    }

    #[test]
    fn test_parse_days_keywords() {
        assert_eq!(parse_days("all"), Ok(DaySet::ALL));
        assert_eq!(parse_days("Weekdays"), Ok(DaySet::WEEKDAYS));
        assert_eq!(parse_days("weekend"), Ok(DaySet::WEEKEND));
    }

    #[test]
    fn test_parse_days_list() {
        let days = parse_days("mon, friday").unwrap();
        assert_eq!(days.to_byte(true), 0x91);
        assert!(parse_days("mon,funday").is_err());
    }

    #[test]
    fn test_parse_bool_arg() {
        assert_eq!(parse_bool_arg("on"), Ok(true));
        assert_eq!(parse_bool_arg("Disabled"), Ok(false));
        assert!(parse_bool_arg("maybe").is_err());
    }

    #[test]
    fn test_parse_color_command() {
        let cli = Cli::parse_from(["gamalta", "color", "255", "0", "10", "--warm", "40"]);
        match cli.command {
            Commands::Color {
                red,
                green,
                blue,
                cool,
                warm,
                preview,
                ..
            } => {
                assert_eq!((red, green, blue, cool, warm), (255, 0, 10, 0, 40));
                assert!(!preview);
            }
            _ => panic!("expected color command"),
        }
    }

    #[test]
    fn test_brightness_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["gamalta", "brightness", "101"]).is_err());
    }

    #[test]
    fn test_parse_mode_command() {
        let cli = Cli::parse_from(["gamalta", "mode", "coral-reef"]);
        assert!(matches!(
            cli.command,
            Commands::Mode {
                mode: Mode::CoralReef,
                ..
            }
        ));
    }

    #[test]
    fn test_json_flag_overrides_config() {
        let cli = Cli::parse_from(["gamalta", "--json", "scan"]);
        assert_eq!(cli.format(Some("text")), OutputFormat::Json);

        let cli = Cli::parse_from(["gamalta", "scan"]);
        assert_eq!(cli.format(Some("json")), OutputFormat::Json);
        assert_eq!(cli.format(None), OutputFormat::Text);
    }
}
