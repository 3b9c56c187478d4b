use ratatui::style::Color;

use crate::model::LogLevel;

/// All themeable colors in the application
#[derive(Clone, Debug)]
pub struct Theme {
    // Log levels
    pub level_debug: Color,
    pub level_info: Color,
    pub level_warning: Color,
    pub level_error: Color,
    pub level_critical: Color,

    // UI borders
    pub border_focused: Color,
    pub border_unfocused: Color,

    // Header
    pub header_title: Color,
    pub header_source: Color,
    pub header_bg: Color,

    // Status bar
    pub status_mode_bg: Color,
    pub status_mode_fg: Color,
    pub status_help: Color,
    pub status_bg: Color,

    // Search matches
    pub highlight_match_bg: Color,
    pub highlight_match_fg: Color,

    // Entries
    pub new_entry: Color,
    pub timestamp: Color,
    pub category: Color,
    pub function: Color,

    // Filter summary
    pub filter_active: Color,

    // Empty states / messages
    pub empty_state: Color,
    pub warning_message: Color,
    pub error_banner: Color,

    // Help overlay
    pub help_border: Color,
    pub help_bg: Color,

    // Chart series, cycled per category
    pub chart_palette: Vec<Color>,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    /// The default theme
    pub fn default_theme() -> Self {
        Self {
            // Log levels
            level_debug: Color::Blue,
            level_info: Color::Green,
            level_warning: Color::Yellow,
            level_error: Color::Red,
            level_critical: Color::LightMagenta,

            // UI borders
            border_focused: Color::Cyan,
            border_unfocused: Color::DarkGray,

            // Header
            header_title: Color::Green,
            header_source: Color::Cyan,
            header_bg: Color::DarkGray,

            // Status bar
            status_mode_bg: Color::Blue,
            status_mode_fg: Color::White,
            status_help: Color::DarkGray,
            status_bg: Color::Black,

            // Search matches
            highlight_match_bg: Color::Yellow,
            highlight_match_fg: Color::Black,

            // Entries
            new_entry: Color::LightGreen,
            timestamp: Color::DarkGray,
            category: Color::Cyan,
            function: Color::Magenta,

            // Filter summary
            filter_active: Color::Yellow,

            // Empty states / messages
            empty_state: Color::DarkGray,
            warning_message: Color::Yellow,
            error_banner: Color::Red,

            // Help overlay
            help_border: Color::Cyan,
            help_bg: Color::Black,

            // Chart series
            chart_palette: vec![
                Color::Cyan,
                Color::Green,
                Color::Yellow,
                Color::Magenta,
                Color::Blue,
                Color::Red,
                Color::LightCyan,
                Color::LightGreen,
            ],
        }
    }

    /// Kawaii theme - cute pastel colors
    pub fn kawaii() -> Self {
        Self {
            // Log levels
            level_debug: Color::Rgb(162, 200, 255),
            level_info: Color::Rgb(152, 255, 200),
            level_warning: Color::Rgb(255, 200, 152),
            level_error: Color::Rgb(255, 121, 162),
            level_critical: Color::Rgb(255, 80, 140),

            // UI borders
            border_focused: Color::Rgb(255, 182, 214),
            border_unfocused: Color::Rgb(180, 180, 200),

            // Header
            header_title: Color::Rgb(255, 182, 214),
            header_source: Color::Rgb(182, 214, 255),
            header_bg: Color::Rgb(60, 50, 70),

            // Status bar
            status_mode_bg: Color::Rgb(214, 182, 255),
            status_mode_fg: Color::Rgb(40, 30, 50),
            status_help: Color::Rgb(180, 180, 200),
            status_bg: Color::Rgb(40, 30, 50),

            // Search matches
            highlight_match_bg: Color::Rgb(255, 214, 182),
            highlight_match_fg: Color::Rgb(40, 30, 50),

            // Entries
            new_entry: Color::Rgb(182, 255, 214),
            timestamp: Color::Rgb(180, 180, 200),
            category: Color::Rgb(182, 214, 255),
            function: Color::Rgb(214, 182, 255),

            // Filter summary
            filter_active: Color::Rgb(255, 214, 182),

            // Empty states / messages
            empty_state: Color::Rgb(180, 180, 200),
            warning_message: Color::Rgb(255, 200, 152),
            error_banner: Color::Rgb(255, 121, 162),

            // Help overlay
            help_border: Color::Rgb(255, 182, 214),
            help_bg: Color::Rgb(40, 30, 50),

            // Chart series
            chart_palette: vec![
                Color::Rgb(255, 182, 214),
                Color::Rgb(182, 214, 255),
                Color::Rgb(182, 255, 214),
                Color::Rgb(255, 214, 182),
                Color::Rgb(214, 182, 255),
            ],
        }
    }

    /// Cyber/Futuristic theme - neon on dark
    pub fn cyber() -> Self {
        Self {
            // Log levels
            level_debug: Color::Rgb(0, 200, 255),
            level_info: Color::Rgb(0, 255, 150),
            level_warning: Color::Rgb(255, 200, 0),
            level_error: Color::Rgb(255, 50, 100),
            level_critical: Color::Rgb(255, 0, 255),

            // UI borders
            border_focused: Color::Rgb(0, 255, 255),
            border_unfocused: Color::Rgb(60, 60, 80),

            // Header
            header_title: Color::Rgb(255, 0, 255),
            header_source: Color::Rgb(0, 255, 255),
            header_bg: Color::Rgb(20, 20, 35),

            // Status bar
            status_mode_bg: Color::Rgb(255, 0, 255),
            status_mode_fg: Color::Rgb(0, 0, 0),
            status_help: Color::Rgb(100, 100, 120),
            status_bg: Color::Rgb(10, 10, 20),

            // Search matches
            highlight_match_bg: Color::Rgb(0, 255, 255),
            highlight_match_fg: Color::Rgb(0, 0, 0),

            // Entries
            new_entry: Color::Rgb(0, 255, 150),
            timestamp: Color::Rgb(100, 100, 120),
            category: Color::Rgb(0, 200, 255),
            function: Color::Rgb(255, 100, 255),

            // Filter summary
            filter_active: Color::Rgb(255, 200, 0),

            // Empty states / messages
            empty_state: Color::Rgb(100, 100, 120),
            warning_message: Color::Rgb(255, 200, 0),
            error_banner: Color::Rgb(255, 50, 100),

            // Help overlay
            help_border: Color::Rgb(0, 255, 255),
            help_bg: Color::Rgb(10, 10, 20),

            // Chart series
            chart_palette: vec![
                Color::Rgb(0, 255, 255),
                Color::Rgb(255, 0, 255),
                Color::Rgb(0, 255, 150),
                Color::Rgb(255, 200, 0),
                Color::Rgb(0, 200, 255),
            ],
        }
    }

    /// Dracula theme - popular dark theme
    pub fn dracula() -> Self {
        Self {
            // Log levels
            level_debug: Color::Rgb(139, 233, 253),
            level_info: Color::Rgb(80, 250, 123),
            level_warning: Color::Rgb(255, 184, 108),
            level_error: Color::Rgb(255, 85, 85),
            level_critical: Color::Rgb(255, 121, 198),

            // UI borders
            border_focused: Color::Rgb(189, 147, 249),
            border_unfocused: Color::Rgb(68, 71, 90),

            // Header
            header_title: Color::Rgb(255, 121, 198),
            header_source: Color::Rgb(139, 233, 253),
            header_bg: Color::Rgb(40, 42, 54),

            // Status bar
            status_mode_bg: Color::Rgb(189, 147, 249),
            status_mode_fg: Color::Rgb(40, 42, 54),
            status_help: Color::Rgb(98, 114, 164),
            status_bg: Color::Rgb(33, 34, 44),

            // Search matches
            highlight_match_bg: Color::Rgb(241, 250, 140),
            highlight_match_fg: Color::Rgb(40, 42, 54),

            // Entries
            new_entry: Color::Rgb(80, 250, 123),
            timestamp: Color::Rgb(98, 114, 164),
            category: Color::Rgb(139, 233, 253),
            function: Color::Rgb(189, 147, 249),

            // Filter summary
            filter_active: Color::Rgb(241, 250, 140),

            // Empty states / messages
            empty_state: Color::Rgb(98, 114, 164),
            warning_message: Color::Rgb(255, 184, 108),
            error_banner: Color::Rgb(255, 85, 85),

            // Help overlay
            help_border: Color::Rgb(189, 147, 249),
            help_bg: Color::Rgb(40, 42, 54),

            // Chart series
            chart_palette: vec![
                Color::Rgb(189, 147, 249),
                Color::Rgb(139, 233, 253),
                Color::Rgb(80, 250, 123),
                Color::Rgb(255, 184, 108),
                Color::Rgb(255, 121, 198),
                Color::Rgb(241, 250, 140),
            ],
        }
    }

    /// Monochrome theme - grayscale only
    pub fn monochrome() -> Self {
        Self {
            // Log levels
            level_debug: Color::Rgb(140, 140, 140),
            level_info: Color::Rgb(170, 170, 170),
            level_warning: Color::Rgb(200, 200, 200),
            level_error: Color::Rgb(230, 230, 230),
            level_critical: Color::Rgb(255, 255, 255),

            // UI borders
            border_focused: Color::Rgb(200, 200, 200),
            border_unfocused: Color::Rgb(80, 80, 80),

            // Header
            header_title: Color::Rgb(255, 255, 255),
            header_source: Color::Rgb(180, 180, 180),
            header_bg: Color::Rgb(50, 50, 50),

            // Status bar
            status_mode_bg: Color::Rgb(200, 200, 200),
            status_mode_fg: Color::Rgb(0, 0, 0),
            status_help: Color::Rgb(120, 120, 120),
            status_bg: Color::Rgb(30, 30, 30),

            // Search matches
            highlight_match_bg: Color::Rgb(200, 200, 200),
            highlight_match_fg: Color::Rgb(0, 0, 0),

            // Entries
            new_entry: Color::Rgb(255, 255, 255),
            timestamp: Color::Rgb(120, 120, 120),
            category: Color::Rgb(180, 180, 180),
            function: Color::Rgb(160, 160, 160),

            // Filter summary
            filter_active: Color::Rgb(255, 255, 255),

            // Empty states / messages
            empty_state: Color::Rgb(120, 120, 120),
            warning_message: Color::Rgb(200, 200, 200),
            error_banner: Color::Rgb(255, 255, 255),

            // Help overlay
            help_border: Color::Rgb(180, 180, 180),
            help_bg: Color::Rgb(20, 20, 20),

            // Chart series
            chart_palette: vec![
                Color::Rgb(255, 255, 255),
                Color::Rgb(190, 190, 190),
                Color::Rgb(140, 140, 140),
                Color::Rgb(100, 100, 100),
            ],
        }
    }

    /// Get a theme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "kawaii" => Self::kawaii(),
            "cyber" | "futuristic" => Self::cyber(),
            "monochrome" | "mono" => Self::monochrome(),
            "dracula" => Self::dracula(),
            _ => Self::default_theme(),
        }
    }

    pub fn level_color(&self, level: LogLevel) -> Color {
        match level {
            LogLevel::Debug => self.level_debug,
            LogLevel::Info => self.level_info,
            LogLevel::Warning => self.level_warning,
            LogLevel::Error => self.level_error,
            LogLevel::Critical => self.level_critical,
        }
    }

    /// Series color for the n-th category
    pub fn series_color(&self, index: usize) -> Color {
        if self.chart_palette.is_empty() {
            return Color::Reset;
        }
        self.chart_palette[index % self.chart_palette.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_falls_back_to_default() {
        assert_eq!(Theme::by_name("Dracula").level_error, Color::Rgb(255, 85, 85));
        assert_eq!(Theme::by_name("mono").level_critical, Color::Rgb(255, 255, 255));
        assert_eq!(Theme::by_name("nope").level_error, Color::Red);
    }

    #[test]
    fn test_series_color_cycles() {
        let theme = Theme::kawaii();
        let n = theme.chart_palette.len();
        assert_eq!(theme.series_color(0), theme.series_color(n));
        assert_eq!(theme.level_color(LogLevel::Info), theme.level_info);
    }
}
