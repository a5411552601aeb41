mod image_panel;
pub mod sidebar;
mod status;
mod stream_panel;

use iced::widget::{column, scrollable, text, Space};
use iced::{Element, Theme};

use crate::app::{App, Message, RunState};
use crate::settings::InputType;
use crate::theme::muted_color;

/// Right-hand side of the window: the view for the selected input type.
pub fn main_panel<'a>(app: &'a App, theme: &Theme) -> Element<'a, Message> {
    if let RunState::Error(error) = &app.state {
        return status::error_state(error, theme);
    }

    let input_type = app.settings.input_type;
    let subtitle = match input_type {
        InputType::Image => "Detect objects in a still image.",
        InputType::Video => "Run detection on every frame of a video file.",
        InputType::Webcam => "Run detection on your webcam feed.",
        InputType::IpCamera => "Run detection on an RTSP or HTTP camera stream.",
    };
    let body = match input_type {
        InputType::Image => image_panel::view(app, theme),
        InputType::Video | InputType::Webcam | InputType::IpCamera => {
            stream_panel::view(app, theme)
        }
    };

    scrollable(column![
        text(format!("{input_type} Detection")).size(22),
        Space::new().height(4),
        text(subtitle).size(14).color(muted_color(theme)),
        Space::new().height(20),
        body,
    ])
    .into()
}
