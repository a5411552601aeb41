use iced::color;
use iced::theme::Palette;
use iced::{Color, Theme};

use crate::settings::Appearance;

/// `system_dark` is the last polled OS preference; it only matters for
/// [`Appearance::System`].
pub fn resolve_theme(appearance: Appearance, system_dark: bool) -> Theme {
    let palette = if is_dark(appearance, system_dark) {
        dark_palette()
    } else {
        light_palette()
    };
    Theme::custom("Lookout", palette)
}

fn is_dark(appearance: Appearance, system_dark: bool) -> bool {
    match appearance {
        Appearance::Dark => true,
        Appearance::Light => false,
        Appearance::System => system_dark,
    }
}

fn dark_palette() -> Palette {
    Palette {
        background: color!(0x18, 0x1a, 0x1f),
        text: color!(0xd6, 0xd8, 0xdc),
        primary: color!(0xff, 0x6f, 0x3c),
        success: color!(0x3d, 0xc9, 0x7a),
        warning: color!(0xff, 0xc1, 0x3d),
        danger: color!(0xff, 0x4d, 0x4f),
    }
}

fn light_palette() -> Palette {
    Palette {
        background: color!(0xf6, 0xf6, 0xf8),
        text: color!(0x1f, 0x21, 0x26),
        primary: color!(0xe8, 0x59, 0x24),
        success: color!(0x2b, 0xa8, 0x5f),
        warning: color!(0xc7, 0x8a, 0x00),
        danger: color!(0xd9, 0x2d, 0x2f),
    }
}

/// Secondary text (captions, frame details).
pub fn muted_color(theme: &Theme) -> Color {
    Color {
        a: 0.6,
        ..theme.palette().text
    }
}

/// Background for the sidebar and framed panels.
pub fn surface_color(theme: &Theme) -> Color {
    let palette = theme.extended_palette();
    if palette.is_dark {
        palette.background.weak.color
    } else {
        palette.background.strong.color
    }
}

pub fn warning_color(theme: &Theme) -> Color {
    theme.palette().warning
}

/// Asks the OS for its dark-mode setting. Spawns a process on macOS and
/// Windows, so callers poll it rather than query it per render.
pub fn system_prefers_dark() -> bool {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("defaults")
            .args(["read", "-g", "AppleInterfaceStyle"])
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout)
                    .trim()
                    .eq_ignore_ascii_case("dark")
            })
            .unwrap_or(true)
    }
    #[cfg(target_os = "windows")]
    {
        // AppsUseLightTheme is 0x0 in dark mode.
        std::process::Command::new("reg")
            .args([
                "query",
                r"HKCU\Software\Microsoft\Windows\CurrentVersion\Themes\Personalize",
                "/v",
                "AppsUseLightTheme",
            ])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains("0x0"))
            .unwrap_or(true)
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_appearance_ignores_system() {
        assert!(is_dark(Appearance::Dark, false));
        assert!(!is_dark(Appearance::Light, true));
    }

    #[test]
    fn test_system_appearance_follows_polled_flag() {
        assert!(is_dark(Appearance::System, true));
        assert!(!is_dark(Appearance::System, false));
        assert!(resolve_theme(Appearance::System, true).extended_palette().is_dark);
        assert!(!resolve_theme(Appearance::System, false).extended_palette().is_dark);
    }
}
