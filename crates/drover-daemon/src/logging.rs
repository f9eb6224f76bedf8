//! Logging backend construction.
//!
//! Translates the `Logging` section of the configuration into a global
//! `tracing` subscriber: a base level, per-target overrides, one of
//! three output formats and one sink (console, file or syslog). The
//! file sink writes synchronously so no worker thread exists before the
//! process forks.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing::{error, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use crate::error::LoggingError;

const DEFAULT_LOG_FILE_NAME: &str = "daemon.log";

/// The `Logging` section of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub filename: Option<PathBuf>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub syslog: Option<SyslogConfig>,
    #[serde(default)]
    pub loggers: Vec<LoggerOverride>,
}

/// Target of the optional syslog handler.
#[derive(Debug, Clone, Deserialize)]
pub struct SyslogConfig {
    pub address: PathBuf,
    #[serde(default)]
    pub facility: Option<String>,
}

/// A per-logger level override: either a bare target name, which keeps
/// the base level, or a `[target, level]` pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoggerOverride {
    Name(String),
    NameAndLevel(String, String),
}

/// Apply the debug override: force the level to `debug` and drop any
/// file output so everything lands on the console.
pub fn effective_config(mut config: LoggingConfig, debug: bool) -> LoggingConfig {
    if debug {
        config.level = Some("debug".to_string());
        config.filename = None;
    }
    config
}

fn level_filter(name: &str, notes: &mut Notes) -> LevelFilter {
    match name.to_ascii_lowercase().as_str() {
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warning" => LevelFilter::WARN,
        "error" | "critical" => LevelFilter::ERROR,
        other => {
            notes.warn(format!("Unknown logging level {other}, using info"));
            LevelFilter::INFO
        }
    }
}

fn filter_directives(config: &LoggingConfig, notes: &mut Notes) -> String {
    let base = match config.level.as_deref() {
        Some(name) => level_filter(name, notes),
        None => LevelFilter::INFO,
    };

    let mut directives = vec![base.to_string().to_ascii_lowercase()];
    for entry in &config.loggers {
        let (target, level) = match entry {
            LoggerOverride::Name(target) => (target, base),
            LoggerOverride::NameAndLevel(target, name) => (target, level_filter(name, notes)),
        };
        directives.push(format!(
            "{}={}",
            target,
            level.to_string().to_ascii_lowercase()
        ));
    }
    directives.join(",")
}

/// Messages produced while the subscriber is being built, replayed
/// through it once it is installed.
#[derive(Default)]
struct Notes {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Notes {
    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn replay(self) {
        for message in self.warnings {
            warn!("{}", message);
        }
        for message in self.errors {
            error!("{}", message);
        }
    }
}

fn file_writer(path: &Path, notes: &mut Notes) -> Option<BoxMakeWriter> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());

    match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(directory)
    {
        Ok(appender) => Some(BoxMakeWriter::new(appender)),
        Err(e) => {
            notes.error(format!("Could not open the log file {}: {}", path.display(), e));
            None
        }
    }
}

#[cfg(unix)]
fn syslog_writer(config: &SyslogConfig, notes: &mut Notes) -> Option<BoxMakeWriter> {
    let facility = match config.facility.as_deref() {
        None => syslog::DEFAULT_FACILITY,
        Some(name) => match syslog::facility_code(name) {
            Some(code) => code,
            None => {
                notes.error(format!("{name} is not a valid syslog facility"));
                return None;
            }
        },
    };
    match syslog::SyslogMakeWriter::connect(&config.address, facility, crate::ident::program_name())
    {
        Ok(writer) => Some(BoxMakeWriter::new(writer)),
        Err(e) => {
            notes.error(format!(
                "Could not connect to the syslog socket {}: {}",
                config.address.display(),
                e
            ));
            None
        }
    }
}

#[cfg(not(unix))]
fn syslog_writer(_config: &SyslogConfig, notes: &mut Notes) -> Option<BoxMakeWriter> {
    notes.warn("Syslog output is not supported on this platform".to_string());
    None
}

fn build_writer(config: &LoggingConfig, debug: bool, notes: &mut Notes) -> BoxMakeWriter {
    let mut sink = None;
    match config.handler.as_deref() {
        None => {}
        Some("syslog") => match &config.syslog {
            Some(syslog) => sink = syslog_writer(syslog, notes),
            None => notes.warn("Syslog handler configured without a syslog section".to_string()),
        },
        Some(other) => notes.warn(format!("Unknown logging handler {other}, ignoring it")),
    }
    if sink.is_none() {
        if let Some(path) = &config.filename {
            sink = file_writer(path, notes);
        }
    }
    finish_writer(sink, debug, BoxMakeWriter::new(std::io::stdout))
}

/// A debug run stays on the console even when another sink is
/// configured: the sink is teed with the console instead of replacing
/// it.
fn finish_writer(sink: Option<BoxMakeWriter>, debug: bool, console: BoxMakeWriter) -> BoxMakeWriter {
    match sink {
        None => console,
        Some(sink) if debug => BoxMakeWriter::new(sink.and(console)),
        Some(sink) => sink,
    }
}

/// Build and install the global subscriber from the configuration.
///
/// A failed syslog or file sink falls back to the console rather than
/// aborting; the failure is logged through whatever sink was installed.
/// Installing twice fails, which callers in tests may ignore.
pub fn setup_logging(config: &LoggingConfig, debug: bool) -> Result<(), LoggingError> {
    let config = effective_config(config.clone(), debug);
    let mut notes = Notes::default();

    let directives = filter_directives(&config, &mut notes);
    let filter = match EnvFilter::try_new(&directives) {
        Ok(filter) => filter,
        Err(e) => {
            notes.warn(format!("Invalid logger override in {directives:?}: {e}"));
            EnvFilter::new(
                filter_directives(
                    &LoggingConfig {
                        loggers: Vec::new(),
                        ..config.clone()
                    },
                    &mut Notes::default(),
                ),
            )
        }
    };

    let writer = build_writer(&config, debug, &mut notes);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    let installed = match config.format.as_deref() {
        Some("json") => builder.json().try_init(),
        Some("compact") => builder.compact().try_init(),
        None | Some("full") => builder.try_init(),
        Some(other) => {
            notes.warn(format!("Unknown logging format {other}, using full"));
            builder.try_init()
        }
    };
    installed.map_err(|_| LoggingError::AlreadyInitialized)?;

    notes.replay();
    Ok(())
}

/// RFC 3164 datagrams over a Unix socket. Each formatted log line
/// becomes one `<priority>tag: message` frame; the priority encodes the
/// configured facility and the record's level.
#[cfg(unix)]
mod syslog {
    use std::io::{self, Write};
    use std::os::unix::net::UnixDatagram;
    use std::path::Path;
    use std::sync::Arc;

    use tracing::{Level, Metadata};
    use tracing_subscriber::fmt::MakeWriter;

    /// LOG_USER.
    pub(super) const DEFAULT_FACILITY: u8 = 1;

    const FACILITIES: &[(&str, u8)] = &[
        ("kern", 0),
        ("user", 1),
        ("mail", 2),
        ("daemon", 3),
        ("auth", 4),
        ("syslog", 5),
        ("lpr", 6),
        ("news", 7),
        ("uucp", 8),
        ("cron", 9),
        ("authpriv", 10),
        ("ftp", 11),
        ("local0", 16),
        ("local1", 17),
        ("local2", 18),
        ("local3", 19),
        ("local4", 20),
        ("local5", 21),
        ("local6", 22),
        ("local7", 23),
    ];

    pub(super) fn facility_code(name: &str) -> Option<u8> {
        let wanted = name.to_ascii_lowercase();
        FACILITIES
            .iter()
            .find(|(facility, _)| *facility == wanted)
            .map(|(_, code)| *code)
    }

    fn severity(level: &Level) -> u8 {
        match *level {
            Level::ERROR => 3,
            Level::WARN => 4,
            Level::INFO => 6,
            _ => 7,
        }
    }

    pub(super) struct SyslogMakeWriter {
        socket: Arc<UnixDatagram>,
        facility: u8,
        tag: String,
    }

    impl SyslogMakeWriter {
        pub(super) fn connect(address: &Path, facility: u8, tag: String) -> io::Result<Self> {
            let socket = UnixDatagram::unbound()?;
            socket.connect(address)?;
            Ok(Self {
                socket: Arc::new(socket),
                facility,
                tag,
            })
        }

        fn writer(&self, level: &Level) -> SyslogWriter {
            SyslogWriter {
                socket: self.socket.clone(),
                priority: self.facility * 8 + severity(level),
                tag: self.tag.clone(),
                buffer: Vec::new(),
            }
        }
    }

    impl<'a> MakeWriter<'a> for SyslogMakeWriter {
        type Writer = SyslogWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.writer(&Level::INFO)
        }

        fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
            self.writer(meta.level())
        }
    }

    /// Buffers one formatted record and sends it as a single datagram
    /// when dropped. Send failures are swallowed; syslog is lossy by
    /// nature and the writer runs inside the logging path.
    pub(super) struct SyslogWriter {
        socket: Arc<UnixDatagram>,
        priority: u8,
        tag: String,
        buffer: Vec<u8>,
    }

    impl Write for SyslogWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for SyslogWriter {
        fn drop(&mut self) {
            let message = String::from_utf8_lossy(&self.buffer);
            let message = message.trim_end();
            if message.is_empty() {
                return;
            }
            let frame = format!("<{}>{}: {}", self.priority, self.tag, message);
            let _ = self.socket.send(frame.as_bytes());
        }
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
