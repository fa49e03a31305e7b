use std::fmt;

use bitflags::bitflags;
use tracing::warn;

bitflags! {
    /// Per-unit processing anomalies, as written to the blacklist.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QualityFlags: u32 {
        /// No candidate stars survived selection
        const NO_STARS = 1 << 0;
        /// Fewer stars than the configured minimum
        const TOO_FEW_STARS = 1 << 1;
        /// Too large a fraction of detections classified as stars
        const TOO_MANY_STARS = 1 << 2;
        /// Star FWHM too high, absolutely or relative to the image header
        const TOO_HIGH_FWHM = 1 << 3;
        /// Star finder produced no usable output
        const FINDSTARS_FAILURE = 1 << 4;
        /// PSF fitter did not produce a model
        const PSF_FIT_FAILURE = 1 << 5;
        /// Unrecoverable error while processing the unit
        const UNCLASSIFIED_ERROR = 1 << 6;
    }
}

impl QualityFlags {
    /// Bits that end processing of a unit.
    pub const FATAL: QualityFlags = QualityFlags::NO_STARS
        .union(QualityFlags::FINDSTARS_FAILURE)
        .union(QualityFlags::UNCLASSIFIED_ERROR);

    pub fn is_fatal(&self) -> bool {
        self.intersects(Self::FATAL)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Short-circuits the remaining stages for the unit.
    Fatal,
    /// Recorded for later review; processing continues.
    Advisory,
}

/// Named anomaly a stage can raise. Each maps to one flag bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anomaly {
    NoStars,
    TooFewStars,
    TooManyStars,
    TooHighFwhm,
    FindStarsFailure,
    PsfFitFailure,
    UnclassifiedError,
}

impl Anomaly {
    pub const ALL: [Anomaly; 7] = [
        Anomaly::NoStars,
        Anomaly::TooFewStars,
        Anomaly::TooManyStars,
        Anomaly::TooHighFwhm,
        Anomaly::FindStarsFailure,
        Anomaly::PsfFitFailure,
        Anomaly::UnclassifiedError,
    ];

    pub fn flag(self) -> QualityFlags {
        match self {
            Self::NoStars => QualityFlags::NO_STARS,
            Self::TooFewStars => QualityFlags::TOO_FEW_STARS,
            Self::TooManyStars => QualityFlags::TOO_MANY_STARS,
            Self::TooHighFwhm => QualityFlags::TOO_HIGH_FWHM,
            Self::FindStarsFailure => QualityFlags::FINDSTARS_FAILURE,
            Self::PsfFitFailure => QualityFlags::PSF_FIT_FAILURE,
            Self::UnclassifiedError => QualityFlags::UNCLASSIFIED_ERROR,
        }
    }

    pub fn severity(self) -> Severity {
        if self.flag().is_fatal() {
            Severity::Fatal
        } else {
            Severity::Advisory
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStars => write!(f, "no stars"),
            Self::TooFewStars => write!(f, "too few stars"),
            Self::TooManyStars => write!(f, "too many stars"),
            Self::TooHighFwhm => write!(f, "FWHM too high"),
            Self::FindStarsFailure => write!(f, "star finding failed"),
            Self::PsfFitFailure => write!(f, "PSF fitting failed"),
            Self::UnclassifiedError => write!(f, "unclassified error"),
        }
    }
}

/// Quality flags for one detector unit. Bits are only ever added.
#[derive(Clone, Debug, Default)]
pub struct FlagAccumulator {
    flags: QualityFlags,
}

impl FlagAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, anomaly: Anomaly) {
        warn!(anomaly = %anomaly, bit = anomaly.flag().bits(), "Flagging unit");
        self.flags |= anomaly.flag();
    }

    pub fn flags(&self) -> QualityFlags {
        self.flags
    }

    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.flags.is_fatal()
    }

    /// Anomalies raised so far, in bit order.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        Anomaly::ALL
            .into_iter()
            .filter(|a| self.flags.contains(a.flag()))
            .collect()
    }
}
