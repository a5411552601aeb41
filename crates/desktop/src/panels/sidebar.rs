use iced::widget::{button, checkbox, column, container, image, pick_list, scrollable, slider, text, Space};
use iced::{Element, Length, Theme};

use lookout_core::shared::constants::{DEVICE_CHOICES, MAX_MAX_DETECTIONS, MIN_MAX_DETECTIONS};
use lookout_core::shared::settings::Device;

use crate::app::{App, Message};
use crate::settings::{Appearance, InputType};
use crate::theme::{muted_color, surface_color};

const SIDEBAR_WIDTH: f32 = 260.0;

/// The configuration panel plus, after an image run, the result download.
pub fn view<'a>(app: &'a App, theme: &Theme) -> Element<'a, Message> {
    let settings = &app.settings;
    let muted = muted_color(theme);
    let devices: Vec<Device> = DEVICE_CHOICES
        .iter()
        .filter_map(|choice| choice.parse().ok())
        .collect();

    let mut col = column![
        text("Lookout").size(22),
        text("Configuration").size(14).color(muted),
        Space::new().height(12),
        label("Input type"),
        pick_list(InputType::ALL, Some(settings.input_type), Message::InputTypeChanged)
            .text_size(13)
            .width(Length::Fill),
        Space::new().height(8),
        label(format!("Max boxes to draw: {}", settings.max_detections)),
        slider(
            MIN_MAX_DETECTIONS as u32..=MAX_MAX_DETECTIONS as u32,
            settings.max_detections,
            Message::MaxDetectionsChanged,
        ),
        Space::new().height(8),
        label("Device"),
        pick_list(devices, Some(settings.device()), Message::DeviceChanged)
            .text_size(13)
            .width(Length::Fill),
        Space::new().height(8),
        label(format!("Min confidence threshold: {:.2}", settings.confidence)),
        slider(0.0..=1.0, settings.confidence, Message::ConfidenceChanged).step(0.01),
        Space::new().height(8),
        checkbox(settings.save_result)
            .label("Save result")
            .on_toggle(Message::SaveResultChanged)
            .text_size(13),
        Space::new().height(16),
        label("Appearance"),
        pick_list(Appearance::ALL, Some(settings.appearance), Message::AppearanceChanged)
            .text_size(13)
            .width(Length::Fill),
    ]
    .spacing(6);

    let downloadable = app
        .image
        .as_ref()
        .filter(|view| view.jpeg.is_some() && settings.input_type == InputType::Image);
    if let Some(view) = downloadable {
        col = col
            .push(Space::new().height(20))
            .push(text("Result").size(15))
            .push(image(view.annotated.clone()).width(Length::Fill))
            .push(
                button(text("Download Result Image").size(13))
                    .on_press(Message::DownloadImage)
                    .padding([8, 14])
                    .width(Length::Fill),
            );
        if let Some(saved) = &app.saved_to {
            col = col.push(
                button(text("Show in Folder").size(13))
                    .on_press(Message::ShowInFolder(saved.clone()))
                    .padding([8, 14])
                    .width(Length::Fill)
                    .style(button::secondary),
            );
        }
    }

    let surface = surface_color(theme);
    container(scrollable(col))
        .width(SIDEBAR_WIDTH)
        .height(Length::Fill)
        .padding(16)
        .style(move |_theme: &Theme| container::Style {
            background: Some(iced::Background::Color(surface)),
            ..container::Style::default()
        })
        .into()
}

fn label<'a>(content: impl Into<String>) -> Element<'a, Message> {
    text(content.into()).size(13).into()
}
