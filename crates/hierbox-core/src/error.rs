//! Error taxonomy for the hierarchy engine
//!
//! Validation errors come from rejected boxes at insertion time. Precondition
//! errors come from running a pass out of order. Ambiguous parent choices are
//! not errors and never show up here.

use thiserror::Error;

/// Why a set of coordinates does not describe a usable box
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoxError {
    #[error("coordinate is not a finite number")]
    NonFinite,
    #[error("width {width} is not positive")]
    NonPositiveWidth { width: f64 },
    #[error("height {height} is not positive")]
    NonPositiveHeight { height: f64 },
    #[error("area {area} is not positive")]
    NonPositiveArea { area: f64 },
}

/// Errors raised by the hierarchy engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HierError {
    #[error(
        "invalid box for {label:?} in image {image_id:?} \
         (x0={x0} y0={y0} x1={x1} y1={y1}): {source}"
    )]
    InvalidBox {
        image_id: String,
        label: String,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        #[source]
        source: BoxError,
    },

    #[error("overlaps of image {image_id:?} are already indexed")]
    OverlapsAlreadyIndexed { image_id: String },

    #[error("overlaps of image {image_id:?} have not been indexed")]
    OverlapsNotIndexed { image_id: String },

    #[error("duplicates of image {image_id:?} have not been resolved")]
    DuplicatesNotResolved { image_id: String },

    #[error("parents for ({child:?}, {parent:?}) in image {image_id:?} were already assigned")]
    PairAlreadyResolved {
        image_id: String,
        child: String,
        parent: String,
    },
}

pub type Result<T> = std::result::Result<T, HierError>;
