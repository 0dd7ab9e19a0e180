use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Appends debug output to `debug_log` when given, otherwise logs warnings
/// to stderr. A log file that cannot be opened also falls back to stderr.
/// `RUST_LOG` overrides the level in every case. Stdout is left for the
/// prediction.
pub fn init(debug_log: Option<&Path>) {
    let mut builder = Builder::new();
    let mut open_failure = None;
    match debug_log.map(|path| (path, open_log(path))) {
        Some((_, Ok(file))) => {
            builder
                .filter_level(LevelFilter::Debug)
                .target(Target::Pipe(Box::new(file)));
        }
        Some((path, Err(err))) => {
            open_failure = Some(format!(
                "Cannot open debug log {}: {err}; logging to stderr",
                path.display()
            ));
            builder
                .filter_level(LevelFilter::Warn)
                .target(Target::Stderr);
        }
        None => {
            builder
                .filter_level(LevelFilter::Warn)
                .target(Target::Stderr);
        }
    }
    builder
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        });
    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
    if let Some(message) = open_failure {
        log::warn!("{message}");
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
