//! Page display state: asynchronous, cancelable rasterization kept in step
//! with the edit model.

pub mod cancel;
pub mod controller;
pub mod raster;

pub use cancel::CancellationToken;
pub use controller::{RenderController, RenderEvent, RenderState};
pub use raster::{Bitmap, RasterError, RenderTarget, Rasterizer};
