//! Date and time acquisition

use super::{EventAdapter, TimeEventListener};
use crate::backend::DateTimeService;

impl TimeEventListener for EventAdapter {
    fn on_time_event(&self, source: &dyn DateTimeService) {
        let _delivery = self.signals.begin_delivery();

        if source.is_valid() {
            if !self.signals.time().is_set() {
                tracing::info!("Date and time obtained");
            }
            self.signals.time().set();
        } else {
            tracing::debug!("Time event without a trusted timestamp");
        }
    }
}
