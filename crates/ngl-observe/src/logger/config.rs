use crate::logger::format::LoggerFormat;

/// Environment variable holding an `EnvFilter` directive that overrides the configured level.
pub const LOG_ENV: &str = "NIGHTINGALE_LOG";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `info,ngl_core=debug`.
    pub level: String,
    pub with_targets: bool,
    /// Print the source file and line of every event.
    pub with_source: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test)
            || (atty::is(atty::Stream::Stderr) && std::env::var_os("NO_COLOR").is_none());
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: false,
            with_source: false,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Map repeated `-v` flags onto a filter.
    ///
    /// Quiet runs keep run-level progress (`ngl_core`, `ngl_cli`, mail delivery) and warnings.
    /// `-v` shows every info event; `-vv` adds engine stages and external commands with their targets;
    /// `-vvv` traces child process output and adds source locations.
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => "warn,ngl_core=info,ngl_cli=info,ngl.notify=info",
            1 => "info",
            2 => "info,ngl_core=debug,ngl_cli=debug,ngl.exec=debug",
            _ => "debug,ngl_core=trace,ngl.exec=trace",
        };
        Self {
            level: level.to_string(),
            with_targets: verbosity >= 2,
            with_source: verbosity >= 3,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the filter unless `level` is blank.
    pub fn with_level(mut self, level: Option<&str>) -> Self {
        if let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) {
            self.level = level.to_string();
        }
        self
    }
}
