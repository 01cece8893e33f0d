//! Render sink that keeps every write for later inspection

use ambience_ap::visualizer::policy::Hsl;
use ambience_ap::visualizer::sink::{Control, RenderSink};
use parking_lot::Mutex;

#[derive(Default)]
pub struct RecordingSink {
    backgrounds: Mutex<Vec<Hsl>>,
    controls: Mutex<Vec<(Control, bool)>>,
}

impl RecordingSink {
    pub fn backgrounds(&self) -> Vec<Hsl> {
        self.backgrounds.lock().clone()
    }

    pub fn last_background(&self) -> Option<Hsl> {
        self.backgrounds.lock().last().copied()
    }

    pub fn background_count(&self) -> usize {
        self.backgrounds.lock().len()
    }

    /// Latest engaged flag written for `control`
    pub fn control(&self, control: Control) -> Option<bool> {
        self.controls
            .lock()
            .iter()
            .rev()
            .find(|(c, _)| *c == control)
            .map(|(_, engaged)| *engaged)
    }
}

impl RenderSink for RecordingSink {
    fn set_background(&self, color: Hsl) {
        self.backgrounds.lock().push(color);
    }

    fn set_control(&self, control: Control, engaged: bool) {
        self.controls.lock().push((control, engaged));
    }
}
