use std::fs::File;
use std::path::Path;

use log::{LevelFilter, info, warn};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

use crate::Resolution;
use crate::error::ResolveError;

/// Install the stderr logger and, when the log file can be opened, a file
/// logger appending to ~/.local/share/specgate/resolutions.log.
/// Best-effort: a missing HOME or unwritable log directory only drops the file logger.
pub fn init(level: &str) {
    let level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(file) = open_log_file() {
        loggers.push(WriteLogger::new(LevelFilter::Info, config, file));
    }
    let _ = CombinedLogger::init(loggers);
}

fn open_log_file() -> Option<File> {
    let home = std::env::var_os("HOME")?;
    let log_dir = Path::new(&home).join(".local/share/specgate");
    std::fs::create_dir_all(&log_dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("resolutions.log"))
        .ok()
}

/// One line per request: the spec (truncated) and what it resolved to.
pub fn log_resolution(spec: &str, outcome: &Result<Resolution, ResolveError>) {
    let spec: String = spec.chars().take(200).collect();
    match outcome {
        Ok(r) => info!(
            "{spec:?}\tok\t{}\t{}\t{} mount(s)",
            r.descriptor.provider_kind,
            r.descriptor.resolved_spec,
            r.mounts.len()
        ),
        Err(e) => warn!("{spec:?}\t{}\t{}", e.kind(), e.to_string().replace('\n', "; ")),
    }
}
