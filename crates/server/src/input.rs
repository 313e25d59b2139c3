//! Input events from the input collaborator.
//!
//! Hosts translate their own key/click events into [`InputEvent`]s. Held
//! direction keys are tracked here and become the per-tick pan axes; the
//! report line is owned by the controller until it is submitted.

use thiserror::Error;
use ubba_sim::CameraStep;

/// A pan direction key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "left" | "l" => Some(Self::Left),
            "right" | "r" => Some(Self::Right),
            "up" | "u" => Some(Self::Up),
            "down" | "d" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Keys the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Arrow(Direction),
    /// Number row key; `1` selects the first camera.
    Digit(u8),
    Enter,
}

/// One event from the input collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// The report field's full contents after an edit.
    ReportText(String),
    SubmitClick,
    CameraClick(CameraStep),
}

/// Direction keys currently held down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldDirections {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

impl HeldDirections {
    pub fn press(&mut self, direction: Direction) {
        *self.slot(direction) = true;
    }

    pub fn release(&mut self, direction: Direction) {
        *self.slot(direction) = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Pan axes for the next tick. Opposite keys held together cancel out.
    pub fn axes(&self) -> [i8; 2] {
        [
            i8::from(self.right) - i8::from(self.left),
            i8::from(self.down) - i8::from(self.up),
        ]
    }

    fn slot(&mut self, direction: Direction) -> &mut bool {
        match direction {
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }
}

// ============================================================================
// Console Lines
// ============================================================================

/// A line typed into the headless host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Input events to feed the controller in order.
    Events(Vec<InputEvent>),
    Restart,
    Night,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("empty line")]
    Empty,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unknown direction '{0}' (left, right, up, down)")]
    UnknownDirection(String),

    #[error("usage: report <text>")]
    MissingReport,
}

/// Parse one console line.
///
/// `1`-`9` switch cameras, `next`/`prev` cycle, `hold <dir>`/`release <dir>`
/// pan, `report <text>` fills the report field and submits it.
pub fn parse_console_line(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let events = match word.to_ascii_lowercase().as_str() {
        "" => return Err(ConsoleError::Empty),
        "restart" => return Ok(ConsoleCommand::Restart),
        "night" => return Ok(ConsoleCommand::Night),
        "quit" | "exit" | "q" => return Ok(ConsoleCommand::Quit),
        "next" | "n" => vec![InputEvent::CameraClick(CameraStep::Next)],
        "prev" | "p" => vec![InputEvent::CameraClick(CameraStep::Prev)],
        "hold" => vec![InputEvent::KeyDown(Key::Arrow(direction(rest)?))],
        "release" => vec![InputEvent::KeyUp(Key::Arrow(direction(rest)?))],
        "report" => {
            if rest.is_empty() {
                return Err(ConsoleError::MissingReport);
            }
            vec![
                InputEvent::ReportText(rest.to_string()),
                InputEvent::SubmitClick,
            ]
        }
        digit if digit.len() == 1 && digit.as_bytes()[0].is_ascii_digit() => {
            let n = digit.as_bytes()[0] - b'0';
            vec![InputEvent::KeyDown(Key::Digit(n)), InputEvent::KeyUp(Key::Digit(n))]
        }
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(ConsoleCommand::Events(events))
}

fn direction(text: &str) -> Result<Direction, ConsoleError> {
    let lower = text.to_ascii_lowercase();
    Direction::parse(&lower).ok_or_else(|| ConsoleError::UnknownDirection(text.to_string()))
}
