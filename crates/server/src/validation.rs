//! Input event validation.
//!
//! Rules:
//! - Digit outside the configured camera range: DROP
//! - Report text longer than the limit: DROP
//! - Report text with control characters: DROP
//! - Empty report on submit: DROP (checked by the controller, which owns the line)
//! - Session-mutating input while the session is inactive: DROP

use ubba_sim::ReportResult;

use crate::input::{InputEvent, Key};

/// Validation configuration.
#[derive(Debug, Clone, Copy)]
pub struct ValidationConfig {
    pub camera_count: usize,
    pub max_report_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            camera_count: ubba_sim::DEFAULT_CAMERA_NAMES.len(),
            max_report_len: crate::config::MAX_REPORT_LEN,
        }
    }
}

/// Result of handling an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// Event accepted and applied.
    Accepted,
    /// Report evaluated by the session.
    Reported(ReportResult),
    /// Dropped: digit does not name a configured camera.
    DroppedUnknownCamera { number: u8, count: usize },
    /// Dropped: report text over the length limit.
    DroppedReportTooLong { len: usize, max: usize },
    /// Dropped: report text contains control characters.
    DroppedControlCharacter,
    /// Dropped: submit with an empty report line.
    DroppedEmptyReport,
    /// Dropped: session is not active.
    DroppedInactive,
}

impl EventResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::Reported(_))
    }
}

/// Validate an input event against static limits.
///
/// Session-dependent checks (inactive session, empty line on submit) happen
/// in the controller.
pub fn validate_event(event: &InputEvent, config: &ValidationConfig) -> EventResult {
    match event {
        InputEvent::KeyDown(Key::Digit(number)) => {
            if *number == 0 || usize::from(*number) > config.camera_count {
                return EventResult::DroppedUnknownCamera {
                    number: *number,
                    count: config.camera_count,
                };
            }
        }
        InputEvent::ReportText(text) => {
            let len = text.chars().count();
            if len > config.max_report_len {
                return EventResult::DroppedReportTooLong {
                    len,
                    max: config.max_report_len,
                };
            }
            if text.chars().any(char::is_control) {
                return EventResult::DroppedControlCharacter;
            }
        }
        _ => {}
    }
    EventResult::Accepted
}
