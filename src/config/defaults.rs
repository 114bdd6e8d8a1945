pub(super) const DEFAULT_NEGATIVE_LABEL: &str = "untouched";
pub(super) const DEFAULT_POSITIVE_LABEL: &str = "touched";

pub(super) const MIN_THUMBNAIL_SIDE: u32 = 4;
pub(super) const MAX_THUMBNAIL_SIDE: u32 = 64;
pub(super) const MAX_CLASSIFIER_K: usize = 64;

pub(super) fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_label_names() -> Vec<String> {
    vec![
        DEFAULT_NEGATIVE_LABEL.to_string(),
        DEFAULT_POSITIVE_LABEL.to_string(),
    ]
}

pub(super) fn default_positive_label() -> String {
    DEFAULT_POSITIVE_LABEL.to_string()
}

pub(super) fn default_sample_count() -> u32 {
    50
}

pub(super) fn default_sample_interval_ms() -> u64 {
    200
}

pub(super) fn default_confidence_threshold() -> f32 {
    0.8
}

pub(super) fn default_cycle_interval_ms() -> u64 {
    200
}

pub(super) fn default_max_consecutive_failures() -> u32 {
    25
}

pub(super) fn default_k() -> usize {
    3
}

pub(super) fn default_thumbnail_side() -> u32 {
    16
}

pub(super) fn default_volume() -> f32 {
    1.0
}

pub(super) fn default_tone_hz() -> f32 {
    880.0
}

pub(super) fn default_tone_ms() -> u64 {
    600
}

pub(super) fn default_log_filter() -> String {
    "info".to_string()
}

pub(super) fn default_max_log_files() -> usize {
    10
}
