
use super::*;

fn config_from_yaml(yaml: &str) -> LoggingConfig {
    serde_yml::from_str(yaml).unwrap()
}

#[test]
fn test_debug_override_forces_level_and_drops_file() {
    let config = config_from_yaml(
        r#"
level: warning
filename: /var/log/app.log
format: full
"#,
    );

    let effective = effective_config(config, true);
    assert_eq!(effective.level.as_deref(), Some("debug"));
    assert!(effective.filename.is_none());
}

#[test]
fn test_without_debug_config_is_untouched() {
    let config = config_from_yaml("level: warning\nfilename: /var/log/app.log\n");

    let effective = effective_config(config, false);
    assert_eq!(effective.level.as_deref(), Some("warning"));
    assert_eq!(
        effective.filename.as_deref(),
        Some(Path::new("/var/log/app.log"))
    );
}

#[test]
fn test_level_names() {
    let mut notes = Notes::default();
    assert_eq!(level_filter("debug", &mut notes), LevelFilter::DEBUG);
    assert_eq!(level_filter("info", &mut notes), LevelFilter::INFO);
    assert_eq!(level_filter("warning", &mut notes), LevelFilter::WARN);
    assert_eq!(level_filter("error", &mut notes), LevelFilter::ERROR);
    assert_eq!(level_filter("critical", &mut notes), LevelFilter::ERROR);
    assert_eq!(level_filter("CRITICAL", &mut notes), LevelFilter::ERROR);
    assert!(notes.warnings.is_empty());
}

#[test]
fn test_unknown_level_falls_back_to_info() {
    let mut notes = Notes::default();
    assert_eq!(level_filter("verbose", &mut notes), LevelFilter::INFO);
    assert_eq!(notes.warnings.len(), 1);
    assert!(notes.warnings[0].contains("verbose"));
}

#[test]
fn test_filter_directives_with_overrides() {
    let config = config_from_yaml(
        r#"
level: warning
loggers:
  - quiet_crate
  - [chatty_crate, debug]
"#,
    );

    let mut notes = Notes::default();
    let directives = filter_directives(&config, &mut notes);
    assert_eq!(directives, "warn,quiet_crate=warn,chatty_crate=debug");
}

#[test]
fn test_filter_directives_default_level() {
    let config = LoggingConfig::default();
    let mut notes = Notes::default();
    assert_eq!(filter_directives(&config, &mut notes), "info");
}

#[test]
fn test_logger_override_forms_deserialize() {
    let config = config_from_yaml(
        r#"
loggers:
  - bare_name
  - [paired_name, error]
"#,
    );

    assert_eq!(config.loggers.len(), 2);
    assert!(matches!(
        &config.loggers[0],
        LoggerOverride::Name(name) if name == "bare_name"
    ));
    assert!(matches!(
        &config.loggers[1],
        LoggerOverride::NameAndLevel(name, level) if name == "paired_name" && level == "error"
    ));
}

#[cfg(unix)]
#[test]
fn test_invalid_facility_is_rejected_and_named() {
    let config = config_from_yaml(
        r#"
handler: syslog
syslog:
  address: /dev/log
  facility: not-a-real-facility
"#,
    );

    let mut notes = Notes::default();
    let writer = syslog_writer(config.syslog.as_ref().unwrap(), &mut notes);
    assert!(writer.is_none());
    assert_eq!(notes.errors.len(), 1);
    assert!(notes.errors[0].contains("not-a-real-facility"));
}

#[cfg(unix)]
#[test]
fn test_facility_table() {
    assert_eq!(syslog::facility_code("kern"), Some(0));
    assert_eq!(syslog::facility_code("daemon"), Some(3));
    assert_eq!(syslog::facility_code("LOCAL7"), Some(23));
    assert_eq!(syslog::facility_code("not-a-real-facility"), None);
}

#[cfg(unix)]
#[test]
fn test_syslog_frames_carry_priority_and_tag() {
    use std::os::unix::net::UnixDatagram;

    let dir = tempfile::TempDir::new().unwrap();
    let address = dir.path().join("log.sock");
    let receiver = UnixDatagram::bind(&address).unwrap();

    let make_writer = syslog::SyslogMakeWriter::connect(&address, 3, "drover".to_string()).unwrap();
    {
        use std::io::Write;
        use tracing_subscriber::fmt::MakeWriter;
        let mut writer = make_writer.make_writer();
        writer.write_all(b"daemon started\n").unwrap();
    }

    let mut buffer = [0u8; 256];
    let received = receiver.recv(&mut buffer).unwrap();
    let frame = std::str::from_utf8(&buffer[..received]).unwrap();
    // facility 3, severity INFO (6): 3 * 8 + 6
    assert_eq!(frame, "<30>drover: daemon started");
}

/// Test console stand-in that records everything written through it.
#[derive(Clone, Default)]
struct CaptureWriter(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

impl CaptureWriter {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl std::io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(unix)]
#[test]
fn test_debug_keeps_console_alongside_syslog() {
    use std::io::Write;
    use std::os::unix::net::UnixDatagram;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::fmt::MakeWriter;

    let dir = tempfile::TempDir::new().unwrap();
    let address = dir.path().join("log.sock");
    let receiver = UnixDatagram::bind(&address).unwrap();

    let syslog = SyslogConfig {
        address,
        facility: Some("daemon".to_string()),
    };
    let mut notes = Notes::default();
    let sink = syslog_writer(&syslog, &mut notes);
    assert!(sink.is_some());

    let console = CaptureWriter::default();
    let writer = finish_writer(sink, true, BoxMakeWriter::new(console.clone()));
    {
        let mut out = writer.make_writer();
        out.write_all(b"debug run\n").unwrap();
    }

    // Both sinks saw the record.
    let mut buffer = [0u8; 256];
    let received = receiver.recv(&mut buffer).unwrap();
    let frame = std::str::from_utf8(&buffer[..received]).unwrap();
    assert!(frame.starts_with("<30>"));
    assert!(frame.ends_with(": debug run"));
    assert_eq!(console.contents(), b"debug run\n");
}

#[cfg(unix)]
#[test]
fn test_without_debug_syslog_replaces_console() {
    use std::io::Write;
    use std::os::unix::net::UnixDatagram;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::fmt::MakeWriter;

    let dir = tempfile::TempDir::new().unwrap();
    let address = dir.path().join("log.sock");
    let receiver = UnixDatagram::bind(&address).unwrap();

    let syslog = SyslogConfig {
        address,
        facility: Some("daemon".to_string()),
    };
    let mut notes = Notes::default();
    let sink = syslog_writer(&syslog, &mut notes);

    let console = CaptureWriter::default();
    let writer = finish_writer(sink, false, BoxMakeWriter::new(console.clone()));
    {
        let mut out = writer.make_writer();
        out.write_all(b"detached run\n").unwrap();
    }

    let mut buffer = [0u8; 256];
    let received = receiver.recv(&mut buffer).unwrap();
    assert!(received > 0);
    assert!(console.contents().is_empty());
}

#[test]
fn test_writer_defaults_to_console() {
    use std::io::Write;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::fmt::MakeWriter;

    let console = CaptureWriter::default();
    let writer = finish_writer(None, false, BoxMakeWriter::new(console.clone()));
    {
        let mut out = writer.make_writer();
        out.write_all(b"console run\n").unwrap();
    }
    assert_eq!(console.contents(), b"console run\n");
}

#[test]
fn test_file_writer_reports_unwritable_path() {
    // A path component that is a regular file cannot become a directory.
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let path = blocker.path().join("sub").join("app.log");

    let mut notes = Notes::default();
    let writer = file_writer(&path, &mut notes);
    assert!(writer.is_none());
    assert_eq!(notes.errors.len(), 1);
}
