use std::path::Path;

use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

static CONSOLE_PATTERN: &'static str = "{h({d(%Y-%m-%d %H:%M:%S)} [{l}] {M})} - {m}{n}";
static FILE_PATTERN: &'static str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {M}:{L} - {m}{n}";

/// Send log messages at `level` and above to stderr and, if `log_file` is given,
/// also append them to that file.
///
/// If `log_file` cannot be opened, logging goes to stderr only and a warning
/// saying so is the first message logged.
///
/// Stdout is left alone so that binaries can print their actual output there.
pub fn init_logging(level: log::LevelFilter, log_file: Option<&Path>) {
    let (config, file_error) = build_config(level, log_file);
    log4rs::init_config(config).expect("Failed to initialize logger");
    if let Some((path, e)) = file_error {
        log::warn!("Could not open log file {}, logging to stderr only: {e}", path.display());
    }
}

fn build_config(level: log::LevelFilter, log_file: Option<&Path>) -> (Config, Option<(&Path, std::io::Error)>) {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .target(Target::Stderr)
        .build();

    let mut builder =
        Config::builder().appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");
    let mut file_error = None;

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
            .build(path);
        match file {
            Ok(file) => {
                builder = builder.appender(Appender::builder().build("file", Box::new(file)));
                root = root.appender("file");
            }
            Err(e) => file_error = Some((path, e)),
        }
    }

    let config = builder
        .build(root.build(level))
        .expect("Failed to configure logger");
    (config, file_error)
}
