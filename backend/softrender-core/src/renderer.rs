//! The frame renderer: owns one [`RasterLine`] per output row and drives the two-pass
//! algorithm over a caller-supplied framebuffer.


use crate::raster_line::{RasterLine, RowSprite};
use crate::sprite::Sprite;
use rayon::prelude::*;
use softrender_common::frontend::{FrameSize, PixelPacker};
use softrender_common::geom::IRect32;
use std::cmp;
use thiserror::Error;

/// Number of consecutive rows distributed by one worker during Pass A.
///
/// Each block of rows is written by exactly one worker, which is what makes the
/// distribution pass safe without locks; the block height only trades scheduling
/// granularity against per-block sprite scan overhead.
pub const DEFAULT_BLOCK_ROWS: usize = 8;

/// Bounds on the per-row scratch capacity retained between frames.
///
/// After a row renders with `n` sprites, its scratch is shrunk back to
/// `n * min_extra_factor` entries if its capacity exceeds
/// `max(n * max_wastage_factor, min_capacity)`. A transient sprite spike therefore can't
/// pin a large allocation on every row forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchPolicy {
    pub min_extra_factor: usize,
    pub max_wastage_factor: usize,
    pub min_capacity: usize,
}

impl Default for ScratchPolicy {
    fn default() -> Self {
        Self { min_extra_factor: 2, max_wastage_factor: 4, min_capacity: 128 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    pub block_rows: usize,
    pub scratch: ScratchPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { block_rows: DEFAULT_BLOCK_ROWS, scratch: ScratchPolicy::default() }
    }
}

impl RendererConfig {
    fn validate(self) -> Result<(), ConfigError> {
        if self.block_rows == 0 {
            return Err(ConfigError::ZeroBlockRows);
        }
        if self.scratch.min_capacity == 0 {
            return Err(ConfigError::ZeroMinCapacity);
        }
        if self.scratch.max_wastage_factor < self.scratch.min_extra_factor {
            return Err(ConfigError::WastageBelowExtra {
                max_wastage_factor: self.scratch.max_wastage_factor,
                min_extra_factor: self.scratch.min_extra_factor,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("block_rows must be non-zero")]
    ZeroBlockRows,
    #[error("scratch min_capacity must be non-zero")]
    ZeroMinCapacity,
    #[error(
        "scratch max_wastage_factor ({max_wastage_factor}) must not be less than min_extra_factor ({min_extra_factor})"
    )]
    WastageBelowExtra { max_wastage_factor: usize, min_extra_factor: usize },
}

/// Renders sprite sets into caller-supplied framebuffers.
///
/// Constructed once for a fixed frame size and reused across frames; the per-row
/// distribution state is allocated up front and retained so steady-state rendering does
/// not allocate. One instance renders one frame at a time (`render` takes `&mut self`).
pub struct SpriteRenderer {
    size: FrameSize,
    packer: PixelPacker,
    lines: Vec<RasterLine>,
    config: RendererConfig,
}

impl SpriteRenderer {
    #[must_use]
    pub fn new(size: FrameSize, packer: PixelPacker) -> Self {
        Self::build(size, packer, RendererConfig::default())
    }

    /// # Errors
    ///
    /// Returns an error if the config fails validation; see [`ConfigError`].
    pub fn with_config(
        size: FrameSize,
        packer: PixelPacker,
        config: RendererConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(size, packer, config))
    }

    fn build(size: FrameSize, packer: PixelPacker, config: RendererConfig) -> Self {
        let lines =
            (0..size.height).map(|_| RasterLine::new(size.width as usize)).collect();
        log::debug!("Allocated {} raster lines of {} columns each", size.height, size.width);

        Self { size, packer, lines, config }
    }

    #[must_use]
    pub fn frame_size(&self) -> FrameSize {
        self.size
    }

    /// Renders one frame of `sprites` into `framebuffer`.
    ///
    /// `framebuffer` is row-major with `pitch` bytes between row starts; the first
    /// `4 * width` bytes of each of the first `height` rows are overwritten with packed
    /// pixels and any remaining bytes per row are left untouched. `pitch` must be a
    /// multiple of 4 and at least `4 * width`, `framebuffer` must hold at least
    /// `height * pitch` bytes and be 4-byte aligned, and every sprite's pixel source must
    /// tolerate concurrent calls. Rows come out back-to-front: at every pixel the topmost
    /// opaque sprite wins, transparency falls through, and uncovered pixels are packed
    /// opaque black.
    pub fn render(&mut self, sprites: &[Sprite], framebuffer: &mut [u8], pitch: usize) {
        let width = self.size.width as usize;
        let height = self.size.height as usize;

        debug_assert!(pitch >= 4 * width, "pitch {pitch} too small for width {width}");
        debug_assert_eq!(pitch % 4, 0, "pitch {pitch} is not a whole number of pixels");
        debug_assert!(
            framebuffer.len() >= height * pitch,
            "framebuffer of {} bytes too small for {height} rows of pitch {pitch}",
            framebuffer.len()
        );

        if width == 0 || height == 0 {
            return;
        }

        log::trace!(
            "Rendering {} sprites into a {}x{} frame with pitch {pitch}",
            sprites.len(),
            self.size.width,
            self.size.height
        );

        self.distribute_sprites(sprites);

        let packer = self.packer;
        let scratch = self.config.scratch;
        framebuffer[..height * pitch]
            .par_chunks_exact_mut(pitch)
            .zip(self.lines.par_iter_mut())
            .enumerate()
            .for_each(|(y, (row, line))| {
                let row_pixels: &mut [u32] = bytemuck::cast_slice_mut(&mut row[..4 * width]);
                line.render(y as i32, sprites, row_pixels, packer, scratch);
            });
    }

    /// Pass A: append every sprite to the begin-lists of the rows it covers.
    ///
    /// Parallelized over blocks of consecutive rows rather than over sprites: a sprite
    /// spanning several blocks is enqueued independently by each block's worker, and no two
    /// workers ever touch the same row. Within a block sprites are visited in input order,
    /// which makes every begin-list's order (and therefore the whole frame) deterministic.
    fn distribute_sprites(&mut self, sprites: &[Sprite]) {
        let viewport = IRect32::new(0, 0, self.size.width, self.size.height);
        let block_rows = self.config.block_rows;

        self.lines.par_chunks_mut(block_rows).enumerate().for_each(|(block_idx, block)| {
            let block_y = (block_idx * block_rows) as i32;
            let block_last_y = block_y + block.len() as i32 - 1;

            for (idx, sprite) in sprites.iter().enumerate() {
                let visible = viewport.intersection(sprite.position());
                if visible.is_empty() || visible.y > block_last_y || visible.last_y() < block_y {
                    continue;
                }

                let entry = RowSprite {
                    sprite: idx as u32,
                    layer: sprite.layer(),
                    last_x: visible.last_x(),
                };
                let first_row = cmp::max(visible.y, block_y);
                let last_row = cmp::min(visible.last_y(), block_last_y);
                for y in first_row..=last_row {
                    block[(y - block_y) as usize].push_begin(visible.x as usize, entry);
                }
            }
        });
    }
}
