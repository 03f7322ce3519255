use std::time::Duration;

/// Highest XDND protocol version this engine speaks, advertised in `XdndAware` and `XdndEnter`.
pub const XDND_VERSION: u8 = 3;

/// Peers below this version are refused.
pub(super) const MIN_PEER_VERSION: u8 = 3;

/// Options for [`super::XdndScreen`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct XdndOptions {
    /// Version written to `XdndAware` and offered to destinations.
    ///
    /// Clamped to [`XDND_VERSION`]; older protocol revisions are not implemented.
    pub protocol_version: u8,

    /// How long the destination side waits for the source's next message before giving up.
    pub destination_response_timeout: Duration,

    /// How long the source side waits for the destination's next message before giving up.
    ///
    /// Longer than the destination's timeout, since a destination may be busy fetching data.
    pub source_response_timeout: Duration,

    /// Pointer travel (points, per axis) after a press before a drag actually starts.
    pub drag_start_threshold: f32,

    /// Upper bound on the number of moves in the slide-back animation of a failed drag.
    ///
    /// `0` jumps straight back.
    pub max_slide_back_steps: usize,

    /// If true, record state transitions and session boundaries into an in-memory ring buffer,
    /// readable with [`super::XdndScreen::debug_log_lines`].
    pub debug_event_log: bool,

    /// Maximum number of lines kept in the debug ring buffer.
    pub debug_event_log_capacity: usize,
}

impl Default for XdndOptions {
    fn default() -> Self {
        Self {
            protocol_version: XDND_VERSION,
            destination_response_timeout: Duration::from_millis(3000),
            source_response_timeout: Duration::from_millis(10_000),
            drag_start_threshold: 5.0,
            max_slide_back_steps: 15,
            debug_event_log: false,
            debug_event_log_capacity: 500,
        }
    }
}

impl XdndOptions {
    pub(crate) fn own_version(&self) -> u8 {
        self.protocol_version.clamp(MIN_PEER_VERSION, XDND_VERSION)
    }

    /// Version to put into an `XdndEnter` for a destination advertising `peer`.
    pub(crate) fn enter_version(&self, peer: u32) -> u8 {
        let own = self.own_version();
        if peer > 2 {
            u8::try_from(peer).map_or(own, |peer| peer.min(own))
        } else {
            own
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let opt = XdndOptions::default();
        assert_eq!(opt.own_version(), 3);
        assert_eq!(opt.destination_response_timeout, Duration::from_secs(3));
        assert_eq!(opt.source_response_timeout, Duration::from_secs(10));
        assert_eq!(opt.drag_start_threshold, 5.0);
        assert_eq!(opt.max_slide_back_steps, 15);
    }

    #[test]
    fn enter_version_never_exceeds_our_own() {
        let opt = XdndOptions::default();
        assert_eq!(opt.enter_version(5), 3);
        assert_eq!(opt.enter_version(3), 3);
        assert_eq!(opt.enter_version(2), 3);
        assert_eq!(opt.enter_version(0), 3);
        assert_eq!(opt.enter_version(u32::MAX), 3);
    }

    #[test]
    fn unsupported_versions_are_clamped() {
        let opt = XdndOptions {
            protocol_version: 9,
            ..Default::default()
        };
        assert_eq!(opt.own_version(), XDND_VERSION);

        let opt = XdndOptions {
            protocol_version: 1,
            ..Default::default()
        };
        assert_eq!(opt.own_version(), MIN_PEER_VERSION);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_ron_config_keeps_defaults() {
        let opt: XdndOptions = ron::from_str(
            "(destination_response_timeout: (secs: 1, nanos: 0), debug_event_log: true)",
        )
        .expect("valid options");

        assert_eq!(opt.destination_response_timeout, Duration::from_secs(1));
        assert!(opt.debug_event_log);
        assert_eq!(opt.source_response_timeout, Duration::from_secs(10));
        assert_eq!(opt.max_slide_back_steps, 15);
    }
}
