//! Kick-band intensity
//!
//! Turns the low end of an analyser frame into the kick intensity that drives
//! the colour policy, plus the accent value and its sawtooth peak envelope.
//! The constants are presentation tuning, exposed through configuration.

use ambience_common::PageState;
use serde::Deserialize;

/// Intensity transform constants
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntensityParams {
    /// Band maximum (0-255) below which intensity is 0
    pub kick_floor: f32,
    /// Band range mapped onto intensity 1.0
    pub kick_range: f32,
    /// Create page: intensity becomes `(pivot - k) * scale`
    pub create_pivot: f32,
    pub create_scale: f32,
    /// Accent = intensity * accent_scale
    pub accent_scale: f32,
    /// Subtracted from the accent on the create page
    pub create_accent_offset: f32,
    /// Peak tracker drops to 0 once above this on a non-rising frame
    pub peak_reset: f32,
}

impl Default for IntensityParams {
    fn default() -> Self {
        Self {
            kick_floor: 40.0,
            kick_range: 150.0,
            create_pivot: 1.5,
            create_scale: 9.0,
            accent_scale: 100.0,
            create_accent_offset: 30.0,
            peak_reset: 160.0,
        }
    }
}

/// One processed visualizer frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityFrame {
    pub max_band: u8,
    /// Mean of the band; not used by the default policy
    pub avg_band: f32,
    /// Kick intensity after the page transform
    pub kick: f32,
    pub accent: f32,
    /// Peak tracker value after this frame
    pub peak: f32,
}

/// Per-loop intensity state (the peak envelope)
#[derive(Debug, Clone)]
pub struct IntensityTracker {
    params: IntensityParams,
    peak: f32,
}

impl IntensityTracker {
    pub fn new(params: IntensityParams) -> Self {
        Self { params, peak: 0.0 }
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn reset(&mut self) {
        self.peak = 0.0;
    }

    /// Process the kick band of one analyser frame
    pub fn process(&mut self, band: &[u8], page: PageState) -> IntensityFrame {
        let p = &self.params;
        let max_band = band.iter().copied().max().unwrap_or(0);
        let avg_band = if band.is_empty() {
            0.0
        } else {
            band.iter().map(|b| *b as f32).sum::<f32>() / band.len() as f32
        };

        let mut kick = ((max_band as f32 - p.kick_floor) / p.kick_range).max(0.0);
        let mut accent = kick * p.accent_scale;
        if page == PageState::Create {
            kick = (p.create_pivot - kick) * p.create_scale;
            accent = kick * p.accent_scale - p.create_accent_offset;
        }

        // Sawtooth, not a running maximum
        if accent > self.peak {
            self.peak = accent;
        } else if self.peak > p.peak_reset {
            self.peak = 0.0;
        }

        IntensityFrame {
            max_band,
            avg_band,
            kick,
            accent,
            peak: self.peak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(max: u8) -> Vec<u8> {
        let mut band = vec![0u8; 40];
        band[3] = max;
        band
    }

    #[test]
    fn test_quiet_band_is_zero_intensity() {
        let mut tracker = IntensityTracker::new(IntensityParams::default());
        let frame = tracker.process(&band(40), PageState::Main);
        assert_eq!(frame.kick, 0.0);
        assert_eq!(frame.accent, 0.0);
    }

    #[test]
    fn test_main_page_uses_raw_intensity() {
        let mut tracker = IntensityTracker::new(IntensityParams::default());
        let frame = tracker.process(&band(190), PageState::Main);
        assert_eq!(frame.max_band, 190);
        assert!((frame.kick - 1.0).abs() < 1e-6);
        assert!((frame.accent - 100.0).abs() < 1e-4);
        assert!((frame.avg_band - 190.0 / 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_create_page_inverts_and_rescales() {
        let mut tracker = IntensityTracker::new(IntensityParams::default());
        // raw 1.0 -> (1.5 - 1.0) * 9 = 4.5, accent 450 - 30
        let frame = tracker.process(&band(190), PageState::Create);
        assert!((frame.kick - 4.5).abs() < 1e-5);
        assert!((frame.accent - 420.0).abs() < 1e-3);

        // silence on create is bright: (1.5 - 0) * 9
        let frame = tracker.process(&band(0), PageState::Create);
        assert!((frame.kick - 13.5).abs() < 1e-5);
    }

    #[test]
    fn test_peak_tracker_is_a_sawtooth() {
        let mut tracker = IntensityTracker::new(IntensityParams::default());

        // 115 -> accent 50, 190 -> 100, 250 -> 140
        assert!((tracker.process(&band(115), PageState::Main).peak - 50.0).abs() < 1e-3);
        assert!((tracker.process(&band(190), PageState::Main).peak - 100.0).abs() < 1e-3);
        // falling frame below the reset mark keeps the peak
        assert!((tracker.process(&band(40), PageState::Main).peak - 100.0).abs() < 1e-3);

        // 255 -> accent ~143; still under 160, keeps rising
        let frame = tracker.process(&band(255), PageState::Main);
        assert!(frame.peak > 140.0 && frame.peak < 160.0);

        let mut tracker = IntensityTracker::new(IntensityParams::default());
        // create-page accents exceed 160; the next non-rising frame drops to 0
        assert!(tracker.process(&band(0), PageState::Create).peak > 160.0);
        assert_eq!(tracker.process(&band(0), PageState::Create).peak, 0.0);
        assert!(tracker.process(&band(0), PageState::Create).peak > 160.0);
    }

    #[test]
    fn test_reset_clears_peak() {
        let mut tracker = IntensityTracker::new(IntensityParams::default());
        tracker.process(&band(200), PageState::Main);
        assert!(tracker.peak() > 0.0);
        tracker.reset();
        assert_eq!(tracker.peak(), 0.0);
    }
}
