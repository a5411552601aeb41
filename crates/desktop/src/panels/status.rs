use iced::widget::{button, column, container, progress_bar, text, Space};
use iced::{Element, Length, Theme};

use crate::app::{Message, RunState};
use crate::theme::{muted_color, warning_color};

/// Progress line for a job that has not produced output yet.
pub fn progress<'a>(state: &RunState, theme: &Theme) -> Option<Element<'a, Message>> {
    let muted = muted_color(theme);
    let element: Element<'a, Message> = match state {
        RunState::Preparing => text("Loading model\u{2026}").size(14).color(muted).into(),
        RunState::Downloading(downloaded, total) => {
            if *total > 0 {
                let pct = *downloaded as f32 / *total as f32 * 100.0;
                column![
                    text(format!("Downloading model: {pct:.0}%")).size(14).color(muted),
                    progress_bar(0.0..=100.0, pct),
                ]
                .spacing(8)
                .into()
            } else {
                text(format!("Downloading model\u{2026} {downloaded} bytes"))
                    .size(14)
                    .color(muted)
                    .into()
            }
        }
        RunState::Stopping => text("Stopping\u{2026}").size(14).color(muted).into(),
        RunState::Idle | RunState::Running | RunState::Finished | RunState::Error(_) => {
            return None
        }
    };
    Some(element)
}

pub fn notice<'a>(message: &str, theme: &Theme) -> Element<'a, Message> {
    text(message.to_owned())
        .size(14)
        .color(warning_color(theme))
        .into()
}

pub fn error_state<'a>(error: &str, theme: &Theme) -> Element<'a, Message> {
    let content = column![
        text("Something went wrong").size(18),
        Space::new().height(8),
        text(error.to_owned()).size(14).color(muted_color(theme)),
        Space::new().height(20),
        button(text("Try Again").size(14))
            .on_press(Message::TryAgain)
            .padding([12, 24])
            .width(Length::Fill),
        Space::new().height(10),
        button(text("Start Over").size(14))
            .on_press(Message::StartOver)
            .padding([12, 24])
            .width(Length::Fill)
            .style(button::secondary),
    ]
    .align_x(iced::Alignment::Center)
    .width(320);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
