//! Interfaces this backend consumes from (and exposes to) the parts of the system that live
//! outside it: swapchain/window integration, shader library reload, and device capability queries.

use crate::descriptor::PixelFormat;
use crate::error::{DrawableError, Result};
use downcast_rs::{impl_downcast, Downcast};
use std::fmt::Debug;

/// A single acquired swapchain image for this frame.
pub trait Drawable: Downcast + Debug {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}
impl_downcast!(Drawable);

/// The windowing/presentation surface this backend renders into. Implemented outside this crate.
pub trait Swapchain: Debug {
    /// Acquires the drawable for this frame, validating it against the size the graph requested.
    fn acquire(&self, requested_width: u32, requested_height: u32) -> Result<Box<dyn Drawable>> {
        let drawable = self
            .try_acquire()
            .ok_or(crate::error::Error::InvalidDrawable(DrawableError::UnableToRetrieveDrawable))?;
        if drawable.width() < requested_width || drawable.height() < requested_height {
            return Err(crate::error::Error::InvalidDrawable(DrawableError::InvalidSizeDrawable {
                requested_width,
                requested_height,
                actual_width: drawable.width(),
                actual_height: drawable.height(),
            }));
        }
        Ok(drawable)
    }

    fn try_acquire(&self) -> Option<Box<dyn Drawable>>;

    fn present(&self, drawable: Box<dyn Drawable>) -> Result<()>;
}

/// Supplies compiled shader bytecode and reacts to hot-reload requests from the frontend.
pub trait ShaderLibraryProvider: Debug {
    fn load(&self, name: &str) -> Result<Vec<u8>>;

    /// Re-reads and re-validates `name`'s bytecode; implementations should leave the previously
    /// loaded library in place if reload fails, per the "library reload" state machine.
    fn reload(&self, name: &str) -> Result<Vec<u8>> {
        self.load(name)
    }
}

/// Device capability queries the allocator selection policy and the generator depend on.
pub trait Device: Debug {
    fn supports_pixel_format(&self, format: PixelFormat) -> bool;
    fn max_buffer_length(&self) -> u64;
}
