//! Global constants for the refcap session controller

/// Minimum drag distance (canvas pixels, per axis) for a custom box
pub const MIN_DRAW_SIZE: f64 = 5.0;

/// How long the "saved" acknowledgment stays visible (milliseconds)
pub const SAVED_INDICATOR_MS: u64 = 2000;

/// Side length of the fixed coordinate space used by normalized solutions
pub const NORMALIZED_SCALE: u32 = 1000;

/// Dataset tag stamped into every saved record
pub const DEFAULT_DATASET_TAG: &str = "refcocos_test";

/// Text type stamped into every saved record
pub const DEFAULT_TEXT_TYPE: &str = "caption";

/// Prefix joined with the file name to form a record's `image` reference
pub const DEFAULT_IMAGE_PREFIX: &str = "val2017/";

/// Leading text of the derived problem statement
pub const PROBLEM_PREFIX: &str =
    "Please provide the bounding box coordinate of the region this sentence describes";

/// Status shown when nothing is missing
pub const READY_MESSAGE: &str = "Ready to save";

/// Status shown when the filter hides every image and is cleared
pub const FILTER_RESET_MESSAGE: &str =
    "No images match the selected filters. Filters have been reset.";

/// Status shown right after entering a blank annotation
pub const BLANK_MESSAGE: &str = "Please select a bounding box and provide a caption";
