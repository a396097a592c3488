pub(super) const MAX_WORKER_COUNT: u32 = 64;

pub(super) fn clamp_worker_count(value: u32) -> u32 {
    value.min(MAX_WORKER_COUNT)
}

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_start_time() -> f64 {
    0.0
}

pub(super) fn default_end_time() -> f64 {
    0.0
}

pub(super) fn default_shortest_period() -> f64 {
    0.0001
}

pub(super) fn default_longest_period() -> f64 {
    0.02
}

pub(super) fn default_maximum_period_factor() -> f64 {
    1.3
}

pub(super) fn default_maximum_amplitude() -> f64 {
    1.6
}

pub(super) fn default_pitch_floor() -> f64 {
    50.0
}

pub(super) fn default_pitch_ceiling() -> f64 {
    500.0
}

pub(super) fn default_worker_count() -> u32 {
    0
}
