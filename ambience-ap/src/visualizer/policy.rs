//! Intensity to colour mapping

use serde::{Deserialize, Serialize};

/// HSL colour (hue in degrees, saturation and lightness in percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
}

impl Hsl {
    pub const fn new(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
        }
    }

    /// CSS form, e.g. `hsl(180deg, 100%, 9.41%)`
    pub fn to_css(&self) -> String {
        format!(
            "hsl({}deg, {}%, {}%)",
            round2(self.hue),
            round2(self.saturation),
            round2(self.lightness)
        )
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Maps a kick intensity to a background colour
pub trait ColorPolicy: Send + Sync {
    fn color(&self, kick: f32, muted: bool) -> Hsl;

    /// Colour shown while nothing is being visualized
    fn resting(&self) -> Hsl;
}

/// Teal background that brightens on kicks
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TealPulse {
    pub hue: f32,
    /// Above this the colour is flat bright
    pub bright_threshold: f32,
    /// At or below this the colour is flat dark
    pub dark_threshold: f32,
    pub bright_saturation: f32,
    pub bright_lightness: f32,
    pub dark_saturation: f32,
    pub dark_lightness: f32,
    pub saturation_slope: f32,
    pub saturation_offset: f32,
    pub lightness_slope: f32,
    pub lightness_ceiling: f32,
    /// Lightness is lowered by `lightness_shift - dark_lightness`
    pub lightness_shift: f32,
}

impl Default for TealPulse {
    fn default() -> Self {
        Self {
            hue: 180.0,
            bright_threshold: 1.365,
            dark_threshold: 1.0,
            bright_saturation: 50.0,
            bright_lightness: 70.0,
            dark_saturation: 100.0,
            dark_lightness: 9.41,
            saturation_slope: 10.0,
            saturation_offset: 13.0,
            lightness_slope: 8.0,
            lightness_ceiling: 90.0,
            lightness_shift: 19.0,
        }
    }
}

impl ColorPolicy for TealPulse {
    fn color(&self, kick: f32, muted: bool) -> Hsl {
        if kick > self.bright_threshold {
            return Hsl::new(self.hue, self.bright_saturation, self.bright_lightness);
        }
        if kick <= self.dark_threshold || muted {
            return self.resting();
        }

        let saturation = (self.dark_saturation - kick * self.saturation_slope).max(0.0) + self.saturation_offset;
        let lightness = (self.dark_lightness + kick * self.lightness_slope)
            .max(self.dark_lightness)
            .min(self.lightness_ceiling)
            - (self.lightness_shift - self.dark_lightness);
        Hsl::new(self.hue, saturation, lightness)
    }

    fn resting(&self) -> Hsl {
        Hsl::new(self.hue, self.dark_saturation, self.dark_lightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        let policy = TealPulse::default();
        assert_eq!(policy.color(2.0, false), Hsl::new(180.0, 50.0, 70.0));
        assert_eq!(policy.color(1.0, false), policy.resting());
        assert_eq!(policy.color(0.0, false), policy.resting());
        assert_eq!(policy.color(1.2, true), policy.resting());
    }

    #[test]
    fn test_interpolated_band() {
        let color = TealPulse::default().color(1.2, false);
        // saturation 100 - 12 + 13, lightness 9.41 + 9.6 - 9.59
        assert!((color.saturation - 101.0).abs() < 1e-4);
        assert!((color.lightness - 9.42).abs() < 1e-4);
    }

    #[test]
    fn test_css_format() {
        assert_eq!(TealPulse::default().resting().to_css(), "hsl(180deg, 100%, 9.41%)");
        assert_eq!(Hsl::new(180.0, 50.0, 70.0).to_css(), "hsl(180deg, 50%, 70%)");
    }
}
