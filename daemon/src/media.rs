use std::time::Duration;

/// Cadence of the position ticker while media is playing.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Samples older than this are shown as reported instead of extrapolated.
pub const STALE_SAMPLE_MS: i64 = 10_000;
/// Step applied per tick when the sample carries no usable update time.
pub const FALLBACK_STEP_MS: i64 = 1_000;

/// Last playback position reported by the media session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSample {
    pub position_ms: i64,
    /// Wall-clock milliseconds at which `position_ms` was sampled; <= 0 if unknown.
    pub last_update_ms: i64,
    pub speed: f32,
}

impl PlaybackSample {
    /// A sample with no update time, which makes every tick step forward by
    /// [`FALLBACK_STEP_MS`].
    pub fn unknown(position_ms: i64) -> Self {
        Self {
            position_ms,
            last_update_ms: 0,
            speed: 1.0,
        }
    }
}

/// Live playback position for the progress bar.
///
/// - fresh sample (`0 < last_update <= now`, less than 10 s old): reported
///   position advanced by the elapsed time times the playback speed
/// - stale sample: reported position as is
/// - no usable update time: `displayed_ms` plus one second
///
/// The result is always clamped to `[0, duration_ms]`.
pub fn extrapolate_position(
    sample: &PlaybackSample,
    displayed_ms: i64,
    duration_ms: i64,
    now_ms: i64,
) -> i64 {
    let position = if sample.last_update_ms > 0 && sample.last_update_ms <= now_ms {
        let elapsed = now_ms - sample.last_update_ms;
        if elapsed < STALE_SAMPLE_MS {
            let speed = if sample.speed > 0.0 { sample.speed } else { 1.0 };
            sample.position_ms + (elapsed as f64 * speed as f64) as i64
        } else {
            sample.position_ms
        }
    } else {
        displayed_ms + FALLBACK_STEP_MS
    };
    position.clamp(0, duration_ms.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;
    const DURATION: i64 = 200_000;

    fn sample(position_ms: i64, last_update_ms: i64, speed: f32) -> PlaybackSample {
        PlaybackSample {
            position_ms,
            last_update_ms,
            speed,
        }
    }

    // ── fresh samples ─────────────────────────────────────────────────────────

    #[test]
    fn fresh_sample_advances_by_elapsed_time() {
        let s = sample(10_000, T, 1.0);
        assert_eq!(extrapolate_position(&s, 0, DURATION, T + 3_000), 13_000);
    }

    #[test]
    fn playback_speed_scales_elapsed_time() {
        let s = sample(10_000, T, 2.0);
        assert_eq!(extrapolate_position(&s, 0, DURATION, T + 3_000), 16_000);
    }

    #[test]
    fn non_positive_speed_counts_as_normal_speed() {
        let s = sample(10_000, T, 0.0);
        assert_eq!(extrapolate_position(&s, 0, DURATION, T + 1_000), 11_000);
    }

    #[test]
    fn just_under_stale_limit_is_still_extrapolated() {
        let s = sample(10_000, T, 1.0);
        assert_eq!(extrapolate_position(&s, 0, DURATION, T + 9_999), 19_999);
    }

    // ── stale samples ─────────────────────────────────────────────────────────

    #[test]
    fn stale_sample_uses_reported_position() {
        let s = sample(10_000, T, 1.0);
        assert_eq!(extrapolate_position(&s, 55_000, DURATION, T + 12_000), 10_000);
        assert_eq!(extrapolate_position(&s, 55_000, DURATION, T + STALE_SAMPLE_MS), 10_000);
    }

    // ── missing update time ───────────────────────────────────────────────────

    #[test]
    fn unknown_update_time_steps_displayed_position() {
        let s = PlaybackSample::unknown(10_000);
        assert_eq!(extrapolate_position(&s, 10_000, DURATION, T), 11_000);
    }

    #[test]
    fn future_update_time_is_treated_as_unknown() {
        let s = sample(10_000, T + 5_000, 1.0);
        assert_eq!(extrapolate_position(&s, 20_000, DURATION, T), 21_000);
    }

    // ── clamping ──────────────────────────────────────────────────────────────

    #[test]
    fn result_is_clamped_to_duration() {
        let s = sample(199_500, T, 1.0);
        assert_eq!(extrapolate_position(&s, 0, DURATION, T + 2_000), DURATION);
        let unknown = PlaybackSample::unknown(0);
        assert_eq!(extrapolate_position(&unknown, DURATION, DURATION, T), DURATION);
    }

    #[test]
    fn negative_positions_clamp_to_zero() {
        let s = sample(-5_000, T, 1.0);
        assert_eq!(extrapolate_position(&s, 0, DURATION, T + 1_000), 0);
    }

    #[test]
    fn unknown_duration_pins_position_to_zero() {
        let s = sample(10_000, T, 1.0);
        assert_eq!(extrapolate_position(&s, 0, 0, T + 1_000), 0);
    }
}
