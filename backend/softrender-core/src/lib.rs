//! A parallel two-pass software sprite rasterizer.
//!
//! Each frame, sprites are first distributed onto the scanlines they cover (parallel over
//! blocks of rows), then every scanline is rasterized independently into the caller's
//! framebuffer (parallel over rows) by sweeping an ordered stack of the sprites active at
//! each column.

mod raster_line;
mod renderer;
mod sprite;

pub use renderer::{
    ConfigError, DEFAULT_BLOCK_ROWS, RendererConfig, ScratchPolicy, SpriteRenderer,
};
pub use sprite::{Bitmap, PixelSource, SolidColor, Sprite, SpritePixel};
