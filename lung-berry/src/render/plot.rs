//! opencv 叠加图渲染.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use super::{OverlayJob, OverlayRender, RenderError};
use opencv::core::{Point, Rect, Scalar, Vector};
use opencv::prelude::{Mat, MatTraitConst};
use opencv::{imgcodecs, imgproc};
use std::io;
use std::path::{Path, PathBuf};

/// 基于 opencv 的渲染器. 不放大图像, 标题直接写在切片左上角.
#[derive(Copy, Clone, Debug, Default)]
pub struct OpencvOverlay;

/// opencv 使用 BGR 顺序.
#[inline]
fn bgr([r, g, b]: [u8; 3]) -> Scalar {
    Scalar::new(b as f64, g as f64, r as f64, 0.0)
}

impl OverlayRender for OpencvOverlay {
    fn render(&self, job: &OverlayJob<'_>, dest_dir: &Path) -> Result<PathBuf, RenderError> {
        use crate::consts::rgb;

        job.check_not_empty()?;
        let (h, w) = job.pixels.dim();
        // `iter()` 按逻辑行优先顺序遍历, 与存储布局无关.
        let gray: Vec<u8> = job.pixels.iter().map(|&v| job.window.eval_or_black(v)).collect();
        let gray = Mat::from_slice_rows_cols(&gray, h, w)?;
        debug_assert_eq!(gray.rows() as usize, h);

        let mut canvas = Mat::default();
        imgproc::cvt_color(&gray, &mut canvas, imgproc::COLOR_GRAY2BGR, 0)?;

        let b = job.geometry.bbox;
        imgproc::rectangle(
            &mut canvas,
            Rect::new(b.x as i32, b.y as i32, b.width as i32, b.height as i32),
            bgr(rgb::GREEN),
            1,
            imgproc::LINE_8,
            0,
        )?;
        let c = job.geometry.center;
        imgproc::draw_marker(
            &mut canvas,
            Point::new(c.x as i32, c.y as i32),
            bgr(rgb::RED),
            imgproc::MARKER_STAR,
            12,
            1,
            imgproc::LINE_8,
        )?;
        for (i, line) in job.label.lines().iter().enumerate() {
            imgproc::put_text(
                &mut canvas,
                line,
                Point::new(4, 14 + 14 * i as i32),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.4,
                bgr(rgb::WHITE),
                1,
                imgproc::LINE_AA,
                false,
            )?;
        }

        let path = dest_dir.join(job.file_name());
        let name = path.to_str().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "non UTF-8 overlay path")
        })?;
        if !imgcodecs::imwrite(name, &canvas, &Vector::new())? {
            return Err(io::Error::new(io::ErrorKind::Other, format!("opencv refused to write `{name}`")).into());
        }
        Ok(path)
    }
}
