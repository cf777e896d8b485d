use std::fmt::Write;

use jiff::{Zoned, tz::TimeZone};
use log::{Level, Record};
use logforth::{
    append::Stdout,
    diagnostic::Diagnostic,
    layout::{JsonLayout, Layout},
};

use crate::args::{Args, LogStyle};

/// `<UTC timestamp> <level>  <target>: <message>`, with the level optionally colored.
#[derive(Debug, Clone, Default)]
struct TextLayout {
    color: bool,
}

impl TextLayout {
    fn colored() -> Self {
        Self { color: true }
    }

    fn level(&self, level: Level) -> String {
        if !self.color {
            return format!("{level:>5}");
        }

        let code = match level {
            Level::Error => 31,
            Level::Warn => 33,
            Level::Info => 32,
            Level::Debug => 34,
            Level::Trace => 35,
        };

        format!("\x1b[{code}m{level:>5}\x1b[0m")
    }
}

impl Layout for TextLayout {
    fn format(&self, record: &Record<'_>, _diagnostics: &[Box<dyn Diagnostic>]) -> anyhow::Result<Vec<u8>> {
        let mut output = String::new();
        let now = Zoned::now().with_time_zone(TimeZone::UTC);

        write!(output, "{} ", now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;
        write!(output, "{}  ", self.level(record.level()))?;
        write!(output, "{}: {}", record.target(), record.args())?;

        Ok(output.into_bytes())
    }
}

pub(super) fn init(args: &Args) {
    logforth::builder()
        .dispatch(|d| {
            let d = d.filter(args.log_level.env_filter());

            match args.log_style {
                LogStyle::Color => d.append(Stdout::default().with_layout(TextLayout::colored())),
                LogStyle::Text => d.append(Stdout::default().with_layout(TextLayout::default())),
                LogStyle::Json => d.append(Stdout::default().with_layout(JsonLayout::default())),
            }
        })
        .apply();
}
