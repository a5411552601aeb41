use iced::widget::{button, column, container, image, row, text, Column};
use iced::{Element, Length, Theme};

use crate::app::{App, Message};
use crate::panels::status;
use crate::theme::muted_color;

pub fn view<'a>(app: &'a App, theme: &Theme) -> Element<'a, Message> {
    let muted = muted_color(theme);
    let busy = app.state.is_busy();

    let selected = app
        .image_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "No image selected".to_string());
    let picker = row![
        button(text("Choose Image\u{2026}").size(14))
            .on_press_maybe((!busy).then_some(Message::SelectImage))
            .padding([8, 16]),
        text(selected).size(14).color(muted),
    ]
    .spacing(12)
    .align_y(iced::Alignment::Center);

    let mut col = column![picker].spacing(16);

    if let Some(progress) = status::progress(&app.state, theme) {
        col = col.push(progress);
    }

    if let Some(view) = &app.image {
        col = col.push(
            row![
                captioned("Original Image", view.original.clone()),
                captioned("Detected Objects", view.annotated.clone()),
            ]
            .spacing(16),
        );
        let report = Column::with_children(
            view.report
                .iter()
                .map(|line| text(line.clone()).size(14).into()),
        )
        .spacing(4);
        col = col.push(container(report).padding(12).style(container::rounded_box));
    }

    if let Some(notice) = &app.notice {
        col = col.push(status::notice(notice, theme));
    }

    col.into()
}

fn captioned<'a>(caption: &'a str, handle: image::Handle) -> Element<'a, Message> {
    column![
        text(caption).size(15),
        image(handle).width(Length::Fill),
    ]
    .spacing(8)
    .width(Length::FillPortion(1))
    .into()
}
