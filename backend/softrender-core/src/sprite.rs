use softrender_common::frontend::Color;
use softrender_common::geom::IRect32;
use std::fmt::{self, Debug, Formatter};

/// A single sprite-local pixel: either a fully opaque color or fully transparent.
///
/// There is no partial coverage; a transparent pixel lets whatever is below it show
/// through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpritePixel {
    Opaque(Color),
    #[default]
    Transparent,
}

impl SpritePixel {
    #[must_use]
    #[inline]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::Opaque(Color::rgb(r, g, b))
    }

    #[must_use]
    #[inline]
    pub const fn transparent() -> Self {
        Self::Transparent
    }

    #[must_use]
    #[inline]
    pub const fn is_opaque(self) -> bool {
        matches!(self, Self::Opaque(_))
    }
}

/// Source of a sprite's pixels, addressed in sprite-local coordinates.
///
/// `pixel_at` must be deterministic: render workers call it concurrently, and a frame may
/// sample the same pixel more than once. Callers guarantee `u < width` and `v < height` of
/// the sprite the source is attached to.
pub trait PixelSource: Send + Sync {
    fn pixel_at(&self, u: u32, v: u32) -> SpritePixel;
}

// Adapter so plain closures can act as pixel sources; see [`Sprite::from_fn`]
struct FnSource<F>(F);

impl<F: Fn(u32, u32) -> SpritePixel + Send + Sync> PixelSource for FnSource<F> {
    #[inline]
    fn pixel_at(&self, u: u32, v: u32) -> SpritePixel {
        (self.0)(u, v)
    }
}

/// Pixel source with a single opaque color everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolidColor(pub Color);

impl PixelSource for SolidColor {
    #[inline]
    fn pixel_at(&self, _u: u32, _v: u32) -> SpritePixel {
        SpritePixel::Opaque(self.0)
    }
}

/// Pixel source backed by an owned row-major grid of pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Box<[SpritePixel]>,
}

impl Bitmap {
    /// Creates a fully transparent bitmap.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![SpritePixel::Transparent; (width * height) as usize].into_boxed_slice(),
        }
    }

    /// Creates a bitmap by evaluating `f` at every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> SpritePixel) -> Self {
        let mut bitmap = Self::new(width, height);
        for v in 0..height {
            for u in 0..width {
                bitmap.set(u, v, f(u, v));
            }
        }
        bitmap
    }

    pub fn set(&mut self, u: u32, v: u32, pixel: SpritePixel) {
        assert!(
            u < self.width && v < self.height,
            "Bitmap pixel ({u}, {v}) is out of bounds for size {}x{}",
            self.width,
            self.height
        );

        self.pixels[(v * self.width + u) as usize] = pixel;
    }
}

impl PixelSource for Bitmap {
    #[inline]
    fn pixel_at(&self, u: u32, v: u32) -> SpritePixel {
        debug_assert!(u < self.width && v < self.height);
        self.pixels[(v * self.width + u) as usize]
    }
}

/// An axis-aligned rectangular picture with a z-layer, immutable for the duration of a frame.
///
/// The position's origin is in framebuffer coordinates and may be negative; sprites may
/// straddle the viewport or lie entirely outside it. Sprites with a larger layer draw on top
/// of sprites with a smaller one. Among sprites on the same layer the later sprite in the
/// slice passed to [`SpriteRenderer::render`] draws on top; callers that need a strict order
/// must make layers unique.
///
/// [`SpriteRenderer::render`]: crate::SpriteRenderer::render
pub struct Sprite {
    position: IRect32,
    layer: u32,
    source: Box<dyn PixelSource>,
}

impl Sprite {
    pub fn new(position: IRect32, layer: u32, source: impl PixelSource + 'static) -> Self {
        Self { position, layer, source: Box::new(source) }
    }

    pub fn solid(position: IRect32, layer: u32, color: Color) -> Self {
        Self::new(position, layer, SolidColor(color))
    }

    /// Builds a sprite whose pixels come from a closure over sprite-local coordinates.
    pub fn from_fn(
        position: IRect32,
        layer: u32,
        f: impl Fn(u32, u32) -> SpritePixel + Send + Sync + 'static,
    ) -> Self {
        Self::new(position, layer, FnSource(f))
    }

    #[must_use]
    #[inline]
    pub fn position(&self) -> IRect32 {
        self.position
    }

    #[must_use]
    #[inline]
    pub fn layer(&self) -> u32 {
        self.layer
    }

    #[must_use]
    #[inline]
    pub fn pixel_at(&self, u: u32, v: u32) -> SpritePixel {
        self.source.pixel_at(u, v)
    }
}

impl Debug for Sprite {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("position", &self.position)
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}
