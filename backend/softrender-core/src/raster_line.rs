//! Per-scanline distribution state and the row rasterization algorithm.
//!
//! Every output row owns a [`RasterLine`]: one begin-list per column holding the sprites
//! whose first visible column on this row is that column, plus a reusable "active stack"
//! of the sprites covering the column currently being resolved. The stack is kept sorted
//! by layer with the topmost sprite at the back, so resolving a pixel walks from the back
//! until it finds an opaque sprite pixel.

use crate::renderer::ScratchPolicy;
use crate::sprite::{Sprite, SpritePixel};
use softrender_common::frontend::{Color, PixelPacker};
use std::cmp;
use tinyvec::TinyVec;

/// Inline begin-list capacity. Columns where more sprites begin on the same row spill that
/// one list to the heap; the spilled storage is retained across frames.
const INLINE_BEGIN_SPRITES: usize = 4;

type BeginList = TinyVec<[RowSprite; INLINE_BEGIN_SPRITES]>;

/// A sprite's footprint on a single row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RowSprite {
    /// Index into the sprite slice of the current render call.
    pub sprite: u32,
    pub layer: u32,
    /// Last framebuffer column this sprite covers on this row, viewport-clipped.
    pub last_x: i32,
}

#[derive(Debug)]
pub(crate) struct RasterLine {
    begin_lists: Box<[BeginList]>,
    active: Vec<RowSprite>,
}

impl RasterLine {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            begin_lists: vec![BeginList::default(); width].into_boxed_slice(),
            active: Vec::new(),
        }
    }

    /// Queues `entry` to activate at column `x` when this row is rendered.
    ///
    /// `x` must be the sprite's viewport-clipped first visible column, so it is always in
    /// bounds even for sprites whose position starts left of the viewport.
    #[inline]
    pub(crate) fn push_begin(&mut self, x: usize, entry: RowSprite) {
        self.begin_lists[x].push(entry);
    }

    /// Rasterizes row `y` into `out`, which must hold exactly one `u32` per column.
    ///
    /// On return all begin-lists are empty again (capacity retained) and the active stack
    /// has been cleared and possibly shrunk per `scratch`.
    pub(crate) fn render(
        &mut self,
        y: i32,
        sprites: &[Sprite],
        out: &mut [u32],
        packer: PixelPacker,
        scratch: ScratchPolicy,
    ) {
        debug_assert_eq!(out.len(), self.begin_lists.len());

        let mut row_sprite_count = 0;
        for (x, out_pixel) in out.iter_mut().enumerate() {
            if !self.begin_lists[x].is_empty() {
                row_sprite_count += self.begin_lists[x].len();
                self.activate_column(x);
            }

            *out_pixel = self.resolve_pixel(x as i32, y, sprites, packer);
        }

        self.reset_scratch(row_sprite_count, scratch);
    }

    /// Merges column `x`'s begin-list into the active stack, leaving the list empty.
    ///
    /// The batch is stable-sorted by layer first, so among sprites beginning at the same
    /// column the later one in the input slice lands nearer the back (on top). The merge
    /// itself inserts each entry above all existing sprites at the same or a lower layer.
    fn activate_column(&mut self, x: usize) {
        let begins = &mut self.begin_lists[x];
        begins.sort_by_key(|entry| entry.layer);

        for &entry in begins.iter() {
            let idx = self.active.partition_point(|stacked| stacked.layer <= entry.layer);
            self.active.insert(idx, entry);
        }

        begins.clear();
    }

    /// Resolves the output pixel at column `x`: the color of the topmost active sprite with
    /// an opaque pixel there, or opaque black.
    ///
    /// Sprites whose row range ended before `x` are popped off the top as they are
    /// encountered; stale entries buried below a live sprite are compacted in a single pass
    /// instead, which keeps total removal work across a row linear.
    fn resolve_pixel(&mut self, x: i32, y: i32, sprites: &[Sprite], packer: PixelPacker) -> u32 {
        while self.active.last().is_some_and(|top| top.last_x < x) {
            self.active.pop();
        }

        let mut color = Color::BLACK;
        let mut stale_below = false;
        for entry in self.active.iter().rev() {
            if entry.last_x < x {
                stale_below = true;
                continue;
            }

            let sprite = &sprites[entry.sprite as usize];
            let u = (x - sprite.position().x) as u32;
            let v = (y - sprite.position().y) as u32;
            if let SpritePixel::Opaque(c) = sprite.pixel_at(u, v) {
                color = c;
                break;
            }
        }

        if stale_below {
            self.active.retain(|entry| entry.last_x >= x);
        }

        packer(color.r, color.g, color.b)
    }

    fn reset_scratch(&mut self, row_sprite_count: usize, scratch: ScratchPolicy) {
        self.active.clear();

        let max_useful =
            cmp::max(row_sprite_count * scratch.max_wastage_factor, scratch.min_capacity);
        if self.active.capacity() > max_useful {
            let target = row_sprite_count * scratch.min_extra_factor;
            log::trace!(
                "Shrinking row scratch from {} to {target} entries",
                self.active.capacity()
            );
            self.active = Vec::with_capacity(target);
        }
    }
}
