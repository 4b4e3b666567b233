//! Inbound commands to the application service.
//!
//! These represent actions requested from the front panel that the
//! [`AppService`](super::service::AppService) interprets and acts upon.
//! HTTP requests take the [`Route`](crate::api::Route) path instead.

use crate::app::ports::ButtonId;
use crate::drivers::button::ButtonEvent;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Show the next UI frame.
    NextFrame,

    /// Show the previous UI frame.
    PreviousFrame,

    /// Switch the display panel on or off.
    ToggleDisplay,

    /// Zero the pulse count and power reading and delete the persisted log.
    ClearMetering,
}

impl AppCommand {
    /// Front-panel mapping.  Any number of short clicks counts as one click.
    pub fn from_button(button: ButtonId, event: ButtonEvent) -> Self {
        match (button, event) {
            (ButtonId::Menu, ButtonEvent::ShortPress | ButtonEvent::DoublePress) => Self::NextFrame,
            (ButtonId::Menu, ButtonEvent::LongPress) => Self::PreviousFrame,
            (ButtonId::Enter, ButtonEvent::ShortPress | ButtonEvent::DoublePress) => Self::ToggleDisplay,
            (ButtonId::Enter, ButtonEvent::LongPress) => Self::ClearMetering,
        }
    }
}
