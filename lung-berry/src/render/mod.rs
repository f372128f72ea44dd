//! 叠加图渲染.
//!
//! 将切片灰度图、像素 bbox (不填充的矩形) 与种子点 (星标) 叠加, 加上切片序号与
//! 标识符标题, 保存为 `Slice-{instance_number}.png`. 渲染器与切片数组使用同一坐标约定
//! (原点左上, `y` 向下), 不做任何垂直翻转.
//!
//! 默认实现 [`PngOverlay`] 只依赖 `image`. 打开 `plot` feature 后可以使用
//! opencv 版本 `OpencvOverlay`.

mod canvas;
mod glyph;

use crate::consts::{rgb, OVERLAY_PREFIX};
use crate::geometry::PixelGeometry;
use crate::{CtWindow, ImageSlice};
use canvas::{banner_height, Canvas};
use ndarray::ArrayView2;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        mod plot;
        pub use plot::OpencvOverlay;
    }
}

/// 渲染错误. 对批处理而言均为非致命错误.
#[derive(Debug, Error)]
pub enum RenderError {
    /// 切片为空, 无法绘制.
    #[error("cannot render an empty slice ({height}x{width})")]
    EmptyImage {
        /// 高度.
        height: usize,
        /// 宽度.
        width: usize,
    },

    /// 文件系统错误.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 编码或写入 PNG 失败.
    #[error("cannot write image: {0}")]
    Image(#[from] image::ImageError),

    /// opencv 内部错误.
    #[cfg(feature = "plot")]
    #[error("opencv error: {0}")]
    Opencv(#[from] opencv::Error),
}

/// 叠加图标题信息.
#[derive(Copy, Clone, Debug)]
pub struct SliceLabel<'a> {
    /// 切片标识符.
    pub instance_uid: &'a str,
    /// 切片序号.
    pub instance_number: i64,
}

impl SliceLabel<'_> {
    /// 两行标题文本.
    pub fn lines(&self) -> [String; 2] {
        [
            format!("SLICE {}", self.instance_number),
            format!("UID {}", self.instance_uid),
        ]
    }
}

/// 一次渲染所需的全部输入.
#[derive(Clone, Debug)]
pub struct OverlayJob<'a> {
    /// 像素数组, 形状 `(height, width)`.
    pub pixels: ArrayView2<'a, f32>,
    /// 灰度映射窗口.
    pub window: CtWindow,
    /// 像素 bbox 与中心点.
    pub geometry: PixelGeometry,
    /// 标题.
    pub label: SliceLabel<'a>,
}

impl<'a> OverlayJob<'a> {
    /// 由解码后的切片和几何结果构建渲染任务, 使用切片的显示窗口.
    pub fn from_slice(slice: &'a ImageSlice, geometry: PixelGeometry) -> Self {
        Self {
            pixels: slice.pixels(),
            window: slice.display_window(),
            geometry,
            label: SliceLabel {
                instance_uid: slice.instance_uid(),
                instance_number: slice.instance_number(),
            },
        }
    }

    /// 输出文件名.
    #[inline]
    pub fn file_name(&self) -> String {
        overlay_file_name(self.label.instance_number)
    }

    fn check_not_empty(&self) -> Result<(), RenderError> {
        let (height, width) = self.pixels.dim();
        if height == 0 || width == 0 {
            return Err(RenderError::EmptyImage { height, width });
        }
        Ok(())
    }
}

/// 序号为 `instance_number` 的切片的叠加图文件名.
#[inline]
pub fn overlay_file_name(instance_number: i64) -> String {
    format!("{OVERLAY_PREFIX}{instance_number}.png")
}

/// 表明一个可以把 [`OverlayJob`] 保存为图像文件的渲染器.
pub trait OverlayRender {
    /// 在已存在的目录 `dest_dir` 中写入叠加图, 返回写入的文件路径.
    /// 同名文件会被覆盖.
    fn render(&self, job: &OverlayJob<'_>, dest_dir: &Path) -> Result<PathBuf, RenderError>;
}

/// 基于 `image` 的 PNG 渲染器.
#[derive(Copy, Clone, Debug)]
pub struct PngOverlay {
    scale: u32,
    thickness: u32,
    radius: u32,
}

impl Default for PngOverlay {
    fn default() -> Self {
        Self {
            scale: 2,
            thickness: 2,
            radius: 8,
        }
    }
}

impl PngOverlay {
    /// 以放大倍数 `scale` 创建渲染器. `scale` 必须在 `1..=8` 内, 否则返回 `None`.
    pub fn new(scale: u32) -> Option<Self> {
        (1..=8).contains(&scale).then(|| Self {
            scale,
            thickness: scale,
            radius: 4 * scale,
        })
    }

    /// 放大倍数.
    #[inline]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// 绘制叠加图, 不写文件.
    pub fn draw(&self, job: &OverlayJob<'_>) -> Result<image::RgbImage, RenderError> {
        job.check_not_empty()?;
        let dot = self.scale.max(2);
        let mut canvas = Canvas::from_gray(job.pixels, &job.window, self.scale, banner_height(dot));
        canvas.stroke_box(&job.geometry.bbox, self.thickness, rgb::GREEN);
        canvas.star(job.geometry.center, self.radius, rgb::RED);
        for (i, line) in job.label.lines().iter().enumerate() {
            canvas.caption(i as u32, line, dot, rgb::WHITE);
        }
        Ok(canvas.into_image())
    }
}

impl OverlayRender for PngOverlay {
    fn render(&self, job: &OverlayJob<'_>, dest_dir: &Path) -> Result<PathBuf, RenderError> {
        let img = self.draw(job)?;
        let path = dest_dir.join(job.file_name());
        img.save(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{transform, NormBox};
    use ndarray::Array2;

    fn slice(h: usize, w: usize) -> ImageSlice {
        let pixels = Array2::from_shape_fn((h, w), |(y, x)| (y * w + x) as f32);
        ImageSlice::new("1.2.3", 17, pixels)
    }

    #[test]
    fn test_file_name() {
        assert_eq!(overlay_file_name(17), "Slice-17.png");
        assert_eq!(overlay_file_name(-1), "Slice--1.png");
    }

    #[test]
    fn test_render_png() {
        let s = slice(32, 48);
        let g = transform(&NormBox::new(0.25, 0.5, 0.5, 0.25).unwrap(), s.shape()).unwrap();
        let job = OverlayJob::from_slice(&s, g);
        let dir = tempfile::tempdir().unwrap();

        let r = PngOverlay::new(1).unwrap();
        let path = r.render(&job, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Slice-17.png"));

        let img = image::open(&path).unwrap().to_rgb8();
        let banner = banner_height(2);
        assert_eq!(img.dimensions(), (48, 32 + banner));

        // bbox 左上角 (12, 16), 中心 (24, 20).
        assert_eq!(img.get_pixel(12, banner + 16).0, rgb::GREEN);
        assert_eq!(img.get_pixel(24, banner + 20).0, rgb::RED);
        // 边框以外保持灰度.
        let p = img.get_pixel(2, banner + 2).0;
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
    }

    #[test]
    fn test_render_overwrites() {
        let s = slice(8, 8);
        let g = transform(&NormBox::new(0.0, 0.0, 1.0, 1.0).unwrap(), s.shape()).unwrap();
        let job = OverlayJob::from_slice(&s, g);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(job.file_name());
        std::fs::write(&target, b"stale").unwrap();

        let path = PngOverlay::default().render(&job, dir.path()).unwrap();
        assert_eq!(path, target);
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_render_errors() {
        let s = slice(8, 8);
        let g = transform(&NormBox::new(0.1, 0.1, 0.2, 0.2).unwrap(), s.shape()).unwrap();
        let job = OverlayJob::from_slice(&s, g);
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no").join("such").join("dir");
        assert!(PngOverlay::default().render(&job, &missing).is_err());

        let empty = Array2::<f32>::zeros((0, 4));
        let job = OverlayJob {
            pixels: empty.view(),
            ..job
        };
        assert!(matches!(
            PngOverlay::default().draw(&job),
            Err(RenderError::EmptyImage { height: 0, width: 4 })
        ));
    }

    #[test]
    fn test_invalid_scale() {
        assert!(PngOverlay::new(0).is_none());
        assert!(PngOverlay::new(9).is_none());
        assert_eq!(PngOverlay::new(3).unwrap().scale(), 3);
    }
}
