/// Sentinel written for every unset field of the canonical schema.
///
/// Converters emit `-1` instead of `null` or an omitted key, so any field of a
/// sample can be addressed uniformly. Readers accept `-1`, `null` and a missing
/// key alike.
pub const UNSET: i64 = -1;

/// Number of values in a quadrilateral `poly`: 4 corners, clockwise from top-left.
pub const POLY_LEN: usize = 8;

/// Match method used when the prediction source does not name one.
pub const DEFAULT_MATCH_METHOD: &str = "quick_match";

/// Minimum IoU for a geometric match between a ground-truth and a predicted element.
///
/// Greedy assignment keeps taking the best remaining pair while its IoU is at
/// least this value. It only applies when the two sides cannot be paired by
/// `anno_id`.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Suffix of the per-task result artifact written under the output directory.
pub const RESULT_FILE_SUFFIX: &str = "_metric_result.json";
