//! 🫐欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx2d;

pub use crate::data::{CtWindow, DecodeError, DicomDecoder, ImageSlice, SliceDecoder};
pub use crate::geometry::{transform, GeometryError, NormBox, PixelBox, PixelGeometry, PixelPoint};
pub use crate::resolve::{resolve, DuplicatePolicy, Resolution, ResolveError};
pub use crate::table::{AnnotationRecord, AnnotationTable, Derived, RecordKey, TableError};

pub use crate::render::{OverlayJob, OverlayRender, PngOverlay, RenderError, SliceLabel};

#[cfg(feature = "plot")]
pub use crate::render::OpencvOverlay;

pub use crate::dataset::{classify_dir, DirKind, TreeLayout};

pub use crate::batch::{
    run, BatchRunner, ErrorKind, ItemError, RunConfig, RunError, RunPhase, RunSummary,
};

pub use crate::consts::{DICOM_SUFFIX, UPDATED_TABLE_NAME};
