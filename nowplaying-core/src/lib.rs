pub mod config;
pub mod error;
pub mod paths;
pub mod source;
pub mod time;
pub mod track;

pub use config::{
    build_config_template, DisplayConfig, LoggingConfig, NowPlayingConfig, ProvidersConfig,
};
pub use error::CoreError;
pub use paths::{config_dir, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME};
pub use source::{CommandOutcome, PlaybackSource};
pub use time::{format_clock, now_epoch_ms, DurationExt};
pub use track::{CurrentTrack, TrackImage};
