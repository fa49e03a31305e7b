/// Fewest surviving stars before a unit is flagged as having too few.
pub const DEFAULT_FEW_STARS: usize = 20;

/// Largest fraction of detections that may be classified as stars before a
/// unit is flagged as having too many.
pub const DEFAULT_MANY_STARS_FRAC: f64 = 0.5;

/// Median star FWHM (pixels) above which a unit is flagged.
/// 3.6 arcsec at 0.26 arcsec/pixel.
pub const DEFAULT_HIGH_FWHM: f64 = 13.8;

/// Star FWHM may exceed the header FWHM by at most this factor.
pub const DEFAULT_FWHM_HEADER_RATIO: f64 = 1.5;

/// Blur width assumed when the image header does not provide one.
pub const DEFAULT_HEADER_FWHM: f64 = 4.0;

/// Number of brightest stars whose median anchors the bright-end cut.
pub const DEFAULT_NBRIGHT_STARS: usize = 10;

/// Tapebump exclusion margin in units of FWHM.
pub const DEFAULT_TAPEBUMP_EXTRA: f64 = 2.0;

/// Bump boundaries name the last defective pixel; the physical edge is half a
/// pixel further out.
pub const TAPEBUMP_EDGE_CORRECTION: f64 = 0.5;

/// Default positional tolerance (pixels, per axis) for catalog cross-matching.
pub const DEFAULT_MATCH_TOLERANCE: f64 = 1.0;

/// Minimum number of A rows to scan in parallel during cross-matching.
pub const PARALLEL_MATCH_THRESHOLD: usize = 2_048;

/// Wait between blacklist append attempts, in milliseconds.
pub const DEFAULT_BLACKLIST_RETRY_MS: u64 = 1_000;

/// Overall magnitude zeropoint adjustment applied in star diagnostics.
pub const DEFAULT_ZEROPOINT: f64 = 5.3;

/// Candidate size spread (std / mean) above which star finding is considered
/// to have failed.
pub const DEFAULT_SIZE_SPREAD_RATIO: f64 = 0.15;

/// Catalog artifact infix shared by every refined catalog name.
pub const CATALOG_INFIX: &str = "psfcat";

/// Catalog artifact file extension.
pub const CATALOG_EXTENSION: &str = "csv";

/// Classifier score above which a bright detection counts as a modest star.
pub const MODEST_CLASS_STAR_MIN: f64 = 0.3;

/// Bright-star magnitude limit of the modest classification, before the
/// zeropoint is applied.
pub const MODEST_BRIGHT_MAG: f64 = 18.0;

/// Upper limit of `SPREAD_MODEL + 3 * SPREADERR_MODEL` on the stellar locus.
pub const MODEST_LOCUS_MAX: f64 = 0.003;

/// Faint PSF-magnitude and auto-magnitude limits that reject spurious
/// modest stars, before the zeropoint is applied.
pub const MODEST_FAINT_PSF_MAG: f64 = 30.0;
pub const MODEST_FAINT_AUTO_MAG: f64 = 21.0;
