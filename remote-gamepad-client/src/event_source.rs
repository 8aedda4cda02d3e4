//! Text-line event source. Each line on the reader is one event:
//!
//! ```text
//! down <code>      key pressed
//! up <code>        key released
//! accel <a> <b>    accelerometer sample
//! analog           toggle analog mode
//! quit             stop the client
//! ```

use crate::error::EventParseError;
use crate::input_state::{InputEvent, InputStore};
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Input(InputEvent),
    Quit,
}

/// Parses one line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, EventParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let command = match name {
        "down" => Command::Input(InputEvent::KeyDown(argument(&mut words, "down")?)),
        "up" => Command::Input(InputEvent::KeyUp(argument(&mut words, "up")?)),
        "accel" => Command::Input(InputEvent::Accelerometer(
            argument(&mut words, "accel")?,
            argument(&mut words, "accel")?,
        )),
        "analog" => Command::Input(InputEvent::ToggleAnalog),
        "quit" => Command::Quit,
        other => return Err(EventParseError::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = words.next() {
        return Err(EventParseError::InvalidArgument(extra.to_string()));
    }
    Ok(Some(command))
}

fn argument<'a, T: FromStr>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
) -> Result<T, EventParseError> {
    let word = words
        .next()
        .ok_or(EventParseError::MissingArgument(command))?;
    word.parse()
        .map_err(|_| EventParseError::InvalidArgument(word.to_string()))
}

/// Applies events from `reader` to `store` until `quit`, end of input, or
/// shutdown. Ending the input (not shutdown) cancels `shutdown`.
pub async fn run<R: AsyncBufRead + Unpin>(
    reader: R,
    store: InputStore,
    shutdown: CancellationToken,
) {
    let mut lines = reader.lines();
    loop {
        let line = select! {
            biased;
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Event source closed");
                shutdown.cancel();
                break;
            }
            Err(e) => {
                warn!("Failed to read event: {e}");
                shutdown.cancel();
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(Command::Input(event))) => store.handle_event(event),
            Ok(Some(Command::Quit)) => {
                debug!("Quit requested");
                shutdown.cancel();
                break;
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring event line: {e}"),
        }
    }
}
