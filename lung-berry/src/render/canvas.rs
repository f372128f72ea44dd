//! 基于 `image` 的 RGB 画布.
//!
//! 画布由顶部的标题栏和下方放大 `scale` 倍的切片组成. 切片中的像素 `(x, y)`
//! 对应画布上左上角为 `(x * scale, banner + y * scale)` 的 `scale * scale` 方块,
//! 与切片一样以左上角为原点, `y` 向下增长.

use super::glyph::{glyph, lit, GLYPH_H, GLYPH_W};
use crate::consts::rgb;
use crate::geometry::{PixelBox, PixelPoint};
use crate::CtWindow;
use image::{Rgb, RgbImage};
use ndarray::ArrayView2;

/// 叠加图画布.
pub(crate) struct Canvas {
    img: RgbImage,
    scale: u32,
    banner: u32,
}

/// 两行标题所需的标题栏高度, `dot` 为单个字形点的边长.
#[inline]
pub(crate) fn banner_height(dot: u32) -> u32 {
    GLYPH_H * dot * 2 + dot * 3
}

impl Canvas {
    /// 用 `window` 将切片映射为灰度, 放大 `scale` 倍, 并在顶部预留 `banner` 高度的黑色标题栏.
    pub(crate) fn from_gray(
        pixels: ArrayView2<'_, f32>,
        window: &CtWindow,
        scale: u32,
        banner: u32,
    ) -> Self {
        let (h, w) = pixels.dim();
        let mut img = RgbImage::from_pixel(w as u32 * scale, h as u32 * scale + banner, Rgb(rgb::BLACK));
        for ((y, x), &v) in pixels.indexed_iter() {
            let g = window.eval_or_black(v);
            let (x0, y0) = (x as u32 * scale, banner + y as u32 * scale);
            for dy in 0..scale {
                for dx in 0..scale {
                    img.put_pixel(x0 + dx, y0 + dy, Rgb([g, g, g]));
                }
            }
        }
        Self { img, scale, banner }
    }

    /// 画布尺寸 `(width, height)`.
    #[cfg(test)]
    fn dimensions(&self) -> (u32, u32) {
        self.img.dimensions()
    }

    /// 切片像素 `p` 对应方块的中心在画布上的位置.
    #[inline]
    pub(crate) fn to_canvas(&self, p: PixelPoint) -> (i64, i64) {
        let s = self.scale as i64;
        (p.x as i64 * s + s / 2, self.banner as i64 + p.y as i64 * s + s / 2)
    }

    /// 写入单个像素, 越界 (含标题栏) 时忽略.
    #[inline]
    fn put_in_image(&mut self, x: i64, y: i64, color: [u8; 3]) {
        let (w, h) = self.img.dimensions();
        if x >= 0 && y >= self.banner as i64 && x < w as i64 && y < h as i64 {
            self.img.put_pixel(x as u32, y as u32, Rgb(color));
        }
    }

    /// 填充 `[x0, x1) * [y0, y1)` 区域, 裁剪到切片区域内.
    fn fill(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: [u8; 3]) {
        for y in y0..y1 {
            for x in x0..x1 {
                self.put_in_image(x, y, color);
            }
        }
    }

    /// 绘制不填充的矩形边框. 边框沿 bbox 外沿向内绘制 `thickness` 个画布像素.
    pub(crate) fn stroke_box(&mut self, bbox: &PixelBox, thickness: u32, color: [u8; 3]) {
        let s = self.scale as i64;
        let t = thickness as i64;
        let left = bbox.x as i64 * s;
        let top = self.banner as i64 + bbox.y as i64 * s;
        // 零宽/零高的 bbox 仍画出一条线.
        let right = left + (bbox.width as i64 * s).max(t);
        let bottom = top + (bbox.height as i64 * s).max(t);

        self.fill((left, top), (right, top + t), color);
        self.fill((left, bottom - t), (right, bottom), color);
        self.fill((left, top), (left + t, bottom), color);
        self.fill((right - t, top), (right, bottom), color);
    }

    /// 在 `center` 处绘制米字形星标, 臂长 `radius` 个画布像素.
    pub(crate) fn star(&mut self, center: PixelPoint, radius: u32, color: [u8; 3]) {
        let (cx, cy) = self.to_canvas(center);
        let r = radius as i64;
        for d in -r..=r {
            // 横、竖两笔加粗一个像素, 斜向两笔单像素.
            for o in 0..=1 {
                self.put_in_image(cx + d, cy + o, color);
                self.put_in_image(cx + o, cy + d, color);
            }
            let k = d * 7 / 10;
            self.put_in_image(cx + k, cy + k, color);
            self.put_in_image(cx + k, cy - k, color);
        }
    }

    /// 在标题栏第 `line` 行 (从 0 开始) 写入 `text`. 超出画布宽度的部分被截断.
    pub(crate) fn caption(&mut self, line: u32, text: &str, dot: u32, color: [u8; 3]) {
        let (w, _) = self.img.dimensions();
        let top = dot + line * (GLYPH_H * dot + dot);
        let mut left = dot;
        for c in text.chars() {
            if left + GLYPH_W * dot > w {
                break;
            }
            if let Some(rows) = glyph(c) {
                for row in 0..GLYPH_H {
                    for col in 0..GLYPH_W {
                        if !lit(&rows, row, col) {
                            continue;
                        }
                        for dy in 0..dot {
                            for dx in 0..dot {
                                let (x, y) = (left + col * dot + dx, top + row * dot + dy);
                                if y < self.banner {
                                    self.img.put_pixel(x, y, Rgb(color));
                                }
                            }
                        }
                    }
                }
            }
            left += (GLYPH_W + 1) * dot;
        }
    }

    /// 消费画布, 获得底层图像.
    #[inline]
    pub(crate) fn into_image(self) -> RgbImage {
        self.img
    }
}
