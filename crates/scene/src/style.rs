use mission::ActionMode;

/// RGBA, 8 bits per channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const YELLOW: Color = Color([255, 214, 10, 255]);
    pub const ORANGE: Color = Color([255, 140, 0, 255]);
    pub const RED: Color = Color([230, 57, 70, 255]);
    pub const GREEN: Color = Color([46, 204, 113, 255]);
    pub const CYAN: Color = Color([0, 188, 212, 255]);
    pub const BLUE: Color = Color([52, 120, 246, 255]);
    pub const MAGENTA: Color = Color([214, 51, 214, 255]);
    pub const GRAY: Color = Color([150, 150, 150, 255]);

    pub fn with_alpha(self, alpha: u8) -> Self {
        let [r, g, b, _] = self.0;
        Color([r, g, b, alpha])
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MarkerStyle {
    pub color: Color,
    pub size_px: u16,
    pub outline: Option<Color>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LineStyle {
    pub color: Color,
    pub width_px: u16,
    pub dashed: bool,
}

impl MarkerStyle {
    /// Waypoint markers are coloured by action so takeoff and land stand out.
    pub fn waypoint(mode: ActionMode) -> Self {
        let color = match mode {
            ActionMode::Takeoff => Color::GREEN,
            ActionMode::Land => Color::RED,
            ActionMode::Loiter => Color::MAGENTA,
            ActionMode::Hold => Color::ORANGE,
            ActionMode::Waypoint => Color::YELLOW,
        };
        Self {
            color,
            size_px: 12,
            outline: Some(Color::WHITE),
        }
    }

    pub fn vehicle(selected: bool) -> Self {
        Self {
            color: if selected { Color::CYAN } else { Color::BLUE },
            size_px: if selected { 18 } else { 14 },
            outline: selected.then_some(Color::WHITE),
        }
    }

    pub fn geofile_point() -> Self {
        Self {
            color: Color::GRAY,
            size_px: 8,
            outline: None,
        }
    }
}

impl LineStyle {
    pub fn mission_path() -> Self {
        Self {
            color: Color::YELLOW,
            width_px: 3,
            dashed: false,
        }
    }

    pub fn geofile_outline() -> Self {
        Self {
            color: Color::ORANGE.with_alpha(200),
            width_px: 2,
            dashed: true,
        }
    }

    pub fn coverage_path() -> Self {
        Self {
            color: Color::CYAN,
            width_px: 2,
            dashed: false,
        }
    }
}
