//! Transport commands typed on stdin.

use nowplaying_core::{CommandOutcome, PlaybackSource};
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const HELP: &str = "Commands: play, pause, toggle, next, prev, vol <0-100>, status, help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    Volume(i32),
    Status,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("vol expects a percentage")]
    MissingVolume,

    #[error("vol expects a number, got {0:?}")]
    InvalidVolume(String),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseCommandError::Empty);
        };

        match verb.to_ascii_lowercase().as_str() {
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "toggle" | "t" => Ok(Self::Toggle),
            "next" | "skip" | "n" => Ok(Self::Next),
            "prev" | "previous" | "rewind" | "p" => Ok(Self::Previous),
            "status" | "s" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "vol" | "volume" => {
                let arg = words.next().ok_or(ParseCommandError::MissingVolume)?;
                arg.parse::<i32>()
                    .map(Self::Volume)
                    .map_err(|_| ParseCommandError::InvalidVolume(arg.into()))
            }
            other => Err(ParseCommandError::Unknown(other.into())),
        }
    }
}

impl Command {
    /// Whether this command changes remote playback.
    #[must_use]
    pub const fn is_transport(self) -> bool {
        !matches!(self, Self::Status | Self::Help)
    }
}

/// Forward a transport command to the source.
///
/// Returns `None` for commands the host answers itself.
pub async fn execute(source: &dyn PlaybackSource, command: Command) -> Option<CommandOutcome> {
    let outcome = match command {
        Command::Play => source.play().await,
        Command::Pause => source.pause().await,
        Command::Toggle => source.toggle_play().await,
        Command::Next => source.skip().await,
        Command::Previous => source.rewind().await,
        Command::Volume(percent) => source.set_volume(percent).await,
        Command::Status | Command::Help => return None,
    };
    Some(outcome)
}

/// Read commands from stdin until EOF or shutdown.
pub async fn read_stdin(tx: mpsc::Sender<Command>, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match line.parse::<Command>() {
                Ok(command) => {
                    if tx.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{e}. {HELP}"),
            },
            Ok(None) => {
                debug!("stdin closed, transport commands disabled");
                break;
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}
