use core::convert::Infallible;

use embedded_graphics::{
    pixelcolor::{Rgb888, RgbColor},
    prelude::*,
    primitives::Rectangle,
};
use image::{Rgba, RgbaImage};
use meme_canvas::Color;
use meme_canvas_render::FrameRect;

/// RGBA pixel buffer that embedded-graphics can draw into.
///
/// Starts fully transparent. Primitives and text are written opaque; images
/// are alpha-blended with [`RgbaSurface::blend_pixel`].
#[derive(Clone, Debug, PartialEq)]
pub struct RgbaSurface {
    pixels: RgbaImage,
}

impl RgbaSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Pixel at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width() && y < self.height()).then(|| self.pixels.get_pixel(x, y).0)
    }

    /// Reset every pixel to transparent.
    pub fn clear_transparent(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Intersection of `rect` with the surface, as `(x0, y0, x1, y1)`
    /// exclusive bounds.
    pub(crate) fn clip_bounds(&self, rect: FrameRect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x.max(0) as i64;
        let y0 = rect.y.max(0) as i64;
        let x1 = (rect.x as i64 + rect.width as i64).min(self.width() as i64);
        let y1 = (rect.y as i64 + rect.height as i64).min(self.height() as i64);
        (x0 < x1 && y0 < y1).then_some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    /// Source-over blend of a straight-alpha pixel. Out-of-bounds writes are
    /// ignored.
    pub fn blend_pixel(&mut self, x: i32, y: i32, src: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let dst = self.pixels.get_pixel_mut(x as u32, y as u32);
        dst.0 = blend(dst.0, src);
    }
}

fn blend(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as u32;
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = dst[3] as u32;
    // Straight alpha, in 0..=255 fixed point.
    let out_a = sa + da * (255 - sa) / 255;
    if out_a == 0 {
        return [0, 0, 0, 0];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src[c] as u32 * sa;
        let d = dst[c] as u32 * da * (255 - sa) / 255;
        out[c] = ((s + d) / out_a).min(255) as u8;
    }
    out[3] = out_a.min(255) as u8;
    out
}

pub(crate) fn to_rgb888(color: Color) -> Rgb888 {
    Rgb888::new(color.r, color.g, color.b)
}

impl OriginDimensions for RgbaSurface {
    fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }
}

impl DrawTarget for RgbaSurface {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = (self.width() as i32, self.height() as i32);
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.x >= w || point.y >= h {
                continue;
            }
            self.pixels.put_pixel(
                point.x as u32,
                point.y as u32,
                Rgba([color.r(), color.g(), color.b(), 255]),
            );
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let rect = FrameRect::new(
            area.top_left.x,
            area.top_left.y,
            area.size.width,
            area.size.height,
        );
        let Some((x0, y0, x1, y1)) = self.clip_bounds(rect) else {
            return Ok(());
        };
        let px = Rgba([color.r(), color.g(), color.b(), 255]);
        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels.put_pixel(x, y, px);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let px = Rgba([color.r(), color.g(), color.b(), 255]);
        for p in self.pixels.pixels_mut() {
            *p = px;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn starts_transparent_and_clips_writes() {
        let mut surface = RgbaSurface::new(4, 4);
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
        Rectangle::new(Point::new(-2, -2), Size::new(4, 4))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::RED))
            .draw(&mut surface)
            .expect("infallible");
        assert_eq!(surface.pixel(1, 1), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(9, 9), None);
    }

    #[test]
    fn blend_composites_over_existing_pixels() {
        let mut surface = RgbaSurface::new(2, 1);
        surface.clear(Rgb888::WHITE).expect("infallible");
        surface.blend_pixel(0, 0, [0, 0, 0, 128]);
        let px = surface.pixel(0, 0).expect("in bounds");
        assert_eq!(px[3], 255);
        assert!(px[0] > 120 && px[0] < 135);
        surface.blend_pixel(1, 0, [10, 20, 30, 0]);
        assert_eq!(surface.pixel(1, 0), Some([255, 255, 255, 255]));
        surface.blend_pixel(-1, 0, [0, 0, 0, 255]);
    }

    #[test]
    fn semi_transparent_over_transparent_keeps_color() {
        let mut surface = RgbaSurface::new(1, 1);
        surface.blend_pixel(0, 0, [200, 100, 50, 128]);
        assert_eq!(surface.pixel(0, 0), Some([200, 100, 50, 128]));
    }
}
