use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::shared::detection::{Detection, DetectionResult};
use crate::shared::frame::Frame;

/// Ultralytics default class palette.
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38],
    [0xFF, 0x9D, 0x97],
    [0xFF, 0x70, 0x1F],
    [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31],
    [0x48, 0xF9, 0x0A],
    [0x92, 0xCC, 0x17],
    [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34],
    [0x00, 0xD4, 0xBB],
    [0x2C, 0x99, 0xA8],
    [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93],
    [0x64, 0x73, 0xFF],
    [0x00, 0x18, 0xEC],
    [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85],
    [0xCB, 0x38, 0xFF],
    [0xFF, 0x95, 0xC8],
    [0xFF, 0x37, 0xC7],
];

/// TrueType fonts probed when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Stroke width scaled to the frame, at least 2px.
fn line_width(width: u32, height: u32) -> u32 {
    (((width + height) as f32 / 2.0 * 0.003).round() as u32).max(2)
}

/// Draws a coloured box and a filled label tab per detection.
pub struct BoxAnnotator {
    font: Option<FontVec>,
}

impl BoxAnnotator {
    /// Without a font, boxes and tabs are drawn but labels are not.
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    pub fn from_font_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| format!("invalid font {}: {e}", path.display()))?;
        Ok(Self::new(Some(font)))
    }

    /// Uses the first readable font from the usual system locations.
    pub fn with_system_font() -> Self {
        let font = SYSTEM_FONTS.iter().map(PathBuf::from).find_map(|path| {
            let bytes = std::fs::read(&path).ok()?;
            let font = FontVec::try_from_vec(bytes).ok()?;
            log::debug!("Label font: {}", path.display());
            Some(font)
        });
        if font.is_none() {
            log::warn!("No system font found; boxes will be drawn without labels");
        }
        Self::new(font)
    }

    /// `font` if given, otherwise whatever the system provides.
    pub fn with_font(font: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match font {
            Some(path) => Self::from_font_file(path),
            None => Ok(Self::with_system_font()),
        }
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection, lw: u32) {
        let (w, h) = image.dimensions();
        let bbox = detection.bbox.clamp_to(w, h);
        let x1 = bbox.x1.floor() as i32;
        let y1 = bbox.y1.floor() as i32;
        let x2 = (bbox.x2.ceil() as i32).min(w as i32);
        let y2 = (bbox.y2.ceil() as i32).min(h as i32);
        if x2 - x1 < 1 || y2 - y1 < 1 {
            return;
        }
        let color = class_color(detection.class_id);

        // Concentric strokes, shrinking inward so the box stays inside the frame
        for t in 0..lw as i32 {
            let bw = x2 - x1 - 2 * t;
            let bh = y2 - y1 - 2 * t;
            if bw < 1 || bh < 1 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(bw as u32, bh as u32);
            draw_hollow_rect_mut(image, rect, color);
        }

        let label = format!("{} {:.2}", detection.label, detection.confidence);
        let font_px = (lw as f32 * 6.0).max(12.0);
        let pad = (lw as i32).max(2);
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(PxScale::from(font_px), font, &label),
            None => ((font_px * 0.55 * label.chars().count() as f32) as u32, font_px as u32),
        };
        let tab_w = (text_w as i32 + 2 * pad).min(w as i32 - x1);
        let tab_h = text_h as i32 + 2 * pad;
        // Above the box when there's room, otherwise just inside its top edge
        let tab_y = if y1 - tab_h >= 0 { y1 - tab_h } else { y1 };
        let tab_h = tab_h.min(h as i32 - tab_y);
        if tab_w < 1 || tab_h < 1 {
            return;
        }
        draw_filled_rect_mut(
            image,
            Rect::at(x1, tab_y).of_size(tab_w as u32, tab_h as u32),
            color,
        );

        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                TEXT_COLOR,
                x1 + pad,
                tab_y + pad,
                PxScale::from(font_px),
                font,
                &label,
            );
        }
    }
}

impl FrameAnnotator for BoxAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        result: &DetectionResult,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if result.is_empty() || frame.width() == 0 || frame.height() == 0 {
            return Ok(());
        }
        let lw = line_width(frame.width(), frame.height());
        let mut image = frame.to_rgb_image();
        // Lowest confidence first so the strongest boxes end up on top
        for detection in result.detections.iter().rev() {
            self.draw_detection(&mut image, detection, lw);
        }
        frame.copy_from_rgb_image(&image);
        Ok(())
    }
}
