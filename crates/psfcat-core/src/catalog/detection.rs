use serde::{Deserialize, Serialize};

/// Anything with a position in detector-pixel coordinates.
pub trait Positioned {
    /// `(x, y)` in pixels.
    fn position(&self) -> (f64, f64);
}

/// Column layout of a CSV-backed table.
pub trait TableSchema {
    /// Every column, in the order rows are written.
    const HEADER: &'static [&'static str];
    /// Columns that must be present when reading.
    const REQUIRED: &'static [&'static str];
}

/// One source from the detection catalog of a detector unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "NUMBER")]
    pub number: u64,
    #[serde(rename = "X_IMAGE")]
    pub x: f64,
    #[serde(rename = "Y_IMAGE")]
    pub y: f64,
    #[serde(rename = "XWIN_IMAGE")]
    pub xwin: f64,
    #[serde(rename = "YWIN_IMAGE")]
    pub ywin: f64,
    #[serde(rename = "MAG_AUTO")]
    pub mag_auto: f64,
    /// Detection quality; 0 is a clean detection.
    #[serde(rename = "FLAGS")]
    pub flags: u32,
    #[serde(rename = "FLUX_RADIUS")]
    pub flux_radius: f64,
    #[serde(rename = "BACKGROUND")]
    pub background: f64,
    #[serde(rename = "ALPHAWIN_J2000")]
    pub alpha: f64,
    #[serde(rename = "DELTAWIN_J2000")]
    pub delta: f64,
    /// Star/galaxy classifier score.
    #[serde(rename = "CLASS_STAR", default)]
    pub class_star: Option<f64>,
    #[serde(rename = "SPREAD_MODEL", default)]
    pub spread_model: Option<f64>,
    #[serde(rename = "SPREADERR_MODEL", default)]
    pub spreaderr_model: Option<f64>,
    #[serde(rename = "MAG_PSF", default)]
    pub mag_psf: Option<f64>,
}

impl Detection {
    /// A clean detection at `(x, y)` with magnitude `mag`; remaining fields
    /// are zeroed.
    pub fn at(number: u64, x: f64, y: f64, mag: f64) -> Self {
        Self {
            number,
            x,
            y,
            xwin: x,
            ywin: y,
            mag_auto: mag,
            flags: 0,
            flux_radius: 0.0,
            background: 0.0,
            alpha: 0.0,
            delta: 0.0,
            class_star: None,
            spread_model: None,
            spreaderr_model: None,
            mag_psf: None,
        }
    }

    /// FWHM estimate from the half-light radius.
    pub fn fwhm_estimate(&self) -> f64 {
        2.0 * self.flux_radius
    }
}

impl Positioned for Detection {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl TableSchema for Detection {
    const HEADER: &'static [&'static str] = &[
        "NUMBER",
        "X_IMAGE",
        "Y_IMAGE",
        "XWIN_IMAGE",
        "YWIN_IMAGE",
        "MAG_AUTO",
        "FLAGS",
        "FLUX_RADIUS",
        "BACKGROUND",
        "ALPHAWIN_J2000",
        "DELTAWIN_J2000",
        "CLASS_STAR",
        "SPREAD_MODEL",
        "SPREADERR_MODEL",
        "MAG_PSF",
    ];
    const REQUIRED: &'static [&'static str] = &[
        "NUMBER",
        "X_IMAGE",
        "Y_IMAGE",
        "XWIN_IMAGE",
        "YWIN_IMAGE",
        "MAG_AUTO",
        "FLAGS",
        "FLUX_RADIUS",
        "BACKGROUND",
        "ALPHAWIN_J2000",
        "DELTAWIN_J2000",
    ];
}

/// Column projection written for stars held out of PSF fitting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservedStar {
    #[serde(rename = "NUMBER")]
    pub number: u64,
    #[serde(rename = "FLAGS")]
    pub flags: u32,
    #[serde(rename = "XWIN_IMAGE")]
    pub xwin: f64,
    #[serde(rename = "YWIN_IMAGE")]
    pub ywin: f64,
    #[serde(rename = "BACKGROUND")]
    pub background: f64,
    #[serde(rename = "ALPHAWIN_J2000")]
    pub alpha: f64,
    #[serde(rename = "DELTAWIN_J2000")]
    pub delta: f64,
    #[serde(rename = "FLUX_RADIUS")]
    pub flux_radius: f64,
}

impl From<&Detection> for ReservedStar {
    fn from(d: &Detection) -> Self {
        Self {
            number: d.number,
            flags: d.flags,
            xwin: d.xwin,
            ywin: d.ywin,
            background: d.background,
            alpha: d.alpha,
            delta: d.delta,
            flux_radius: d.flux_radius,
        }
    }
}

impl TableSchema for ReservedStar {
    const HEADER: &'static [&'static str] = &[
        "NUMBER",
        "FLAGS",
        "XWIN_IMAGE",
        "YWIN_IMAGE",
        "BACKGROUND",
        "ALPHAWIN_J2000",
        "DELTAWIN_J2000",
        "FLUX_RADIUS",
    ];
    const REQUIRED: &'static [&'static str] = Self::HEADER;
}

/// One row of star-finder output, aligned with the detection catalog the
/// star finder was run on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FindStarsRow {
    pub x: f64,
    pub y: f64,
    /// Gaussian size estimate.
    pub sigma0: f64,
    /// 1 marks a star candidate.
    pub star_flag: u32,
    /// Nonzero when the size measurement is unreliable.
    #[serde(default)]
    pub size_flags: u32,
}

impl FindStarsRow {
    pub fn is_candidate(&self) -> bool {
        self.star_flag == 1
    }

    /// `T = 2 sigma^2`.
    pub fn size(&self) -> f64 {
        2.0 * self.sigma0 * self.sigma0
    }
}

impl Positioned for FindStarsRow {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl TableSchema for FindStarsRow {
    const HEADER: &'static [&'static str] = &["x", "y", "sigma0", "star_flag", "size_flags"];
    const REQUIRED: &'static [&'static str] = &["x", "y", "sigma0", "star_flag"];
}

/// A star the PSF fitter reports as used in its model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsedStar {
    #[serde(rename = "X_IMAGE")]
    pub x: f64,
    #[serde(rename = "Y_IMAGE")]
    pub y: f64,
}

impl Positioned for UsedStar {
    fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl TableSchema for UsedStar {
    const HEADER: &'static [&'static str] = &["X_IMAGE", "Y_IMAGE"];
    const REQUIRED: &'static [&'static str] = Self::HEADER;
}
