use super::XdndScreen;

impl XdndScreen {
    pub(super) fn debug_log_event(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{message}");
        if !self.options.debug_event_log {
            return;
        }
        self.push_debug_log_line(&message);
    }

    pub(super) fn push_debug_log_line(&mut self, message: &str) {
        let cap = self.options.debug_event_log_capacity.clamp(1, 10_000);
        while self.debug_log.len() >= cap {
            self.debug_log.pop_front();
        }
        self.debug_log_seq = self.debug_log_seq.wrapping_add(1);
        self.debug_log
            .push_back(format!("[event {}] {}", self.debug_log_seq, message));
    }

    /// Lines recorded while [`super::XdndOptions::debug_event_log`] is enabled, oldest first.
    pub fn debug_log_lines(&self) -> impl Iterator<Item = &str> {
        self.debug_log.iter().map(String::as_str)
    }

    pub fn debug_log_text(&self) -> String {
        self.debug_log
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn debug_log_clear(&mut self) {
        self.debug_log.clear();
    }
}
