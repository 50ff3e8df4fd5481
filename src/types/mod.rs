// ABOUTME: Validated domain types shared by every registry component.
// ABOUTME: The image reference is the unit of work for pulls, checks and checkpoints.

mod image_ref;

pub use image_ref::{DEFAULT_REGISTRY, ImageReference, ParseImageRefError};
