//! Measurement algorithms: peak detection, zero-span refinement, calibration
//! segmentation and stepped-sweep planning.

pub mod peaks;
pub mod refine;
pub mod segment;
pub mod stepped;

pub use peaks::{PeakDetector, find_peaks};
pub use refine::{PeakRefiner, RecordContext};
pub use segment::{Segment, plan_segments};
pub use stepped::{StepPlan, plan_frequencies};
