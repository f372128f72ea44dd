use std::path::Path;

use ndarray::{Array2, ArrayView2};

use crate::Idx2d;

mod decode;
pub mod window;

pub use decode::{DecodeError, DicomDecoder};
pub use window::CtWindow;

/// 已解码的二维切片. 像素值以 `f32` 保存, 形状为 `(height, width)`,
/// 按行优先存储 (第一维向下增长, 第二维向右增长).
#[derive(Debug, Clone)]
pub struct ImageSlice {
    instance_uid: String,
    instance_number: i64,
    pixels: Array2<f32>,
    window: Option<CtWindow>,
}

impl ImageSlice {
    /// 由标识符、切片序号和像素数组直接创建切片.
    pub fn new<S: Into<String>>(instance_uid: S, instance_number: i64, pixels: Array2<f32>) -> Self {
        Self {
            instance_uid: instance_uid.into(),
            instance_number,
            pixels,
            window: None,
        }
    }

    /// 附加文件自带的显示窗口.
    #[inline]
    pub fn with_window(mut self, window: CtWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// 切片唯一标识符 (SOP Instance UID).
    #[inline]
    pub fn instance_uid(&self) -> &str {
        &self.instance_uid
    }

    /// 切片序号 (Instance Number). 用于标题和输出文件名.
    #[inline]
    pub fn instance_number(&self) -> i64 {
        self.instance_number
    }

    /// 像素数组的只读视图.
    #[inline]
    pub fn pixels(&self) -> ArrayView2<'_, f32> {
        self.pixels.view()
    }

    /// 切片形状 `(height, width)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.pixels.dim()
    }

    /// 文件自带的显示窗口 (若有).
    #[inline]
    pub fn window(&self) -> Option<CtWindow> {
        self.window
    }

    /// 用于可视化的显示窗口.
    ///
    /// 优先使用文件自带的窗口; 否则按切片自身的最小/最大值拉伸;
    /// 切片中没有任何有限值时退化为肺窗.
    pub fn display_window(&self) -> CtWindow {
        if let Some(w) = self.window {
            return w;
        }
        let (min, max) = self
            .pixels
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        CtWindow::from_min_max(min, max).unwrap_or(CtWindow::from_lung_visual())
    }
}

/// 表明一个可以从文件解码出 [`ImageSlice`] 的对象.
///
/// 批处理只通过该 trait 访问图像文件, 因此可以替换为其他格式或内存实现.
pub trait SliceDecoder {
    /// 解码 `path` 处的单个切片.
    fn decode(&self, path: &Path) -> Result<ImageSlice, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_slice_attributes() {
        let s = ImageSlice::new("1.2.3", 42, Array2::zeros((3, 5)));
        assert_eq!(s.instance_uid(), "1.2.3");
        assert_eq!(s.instance_number(), 42);
        assert_eq!(s.shape(), (3, 5));
        assert_eq!(s.window(), None);
    }

    #[test]
    fn test_display_window_fallbacks() {
        let s = ImageSlice::new("a", 1, array![[0.0, 100.0], [f32::NAN, 50.0]]);
        let w = s.display_window();
        assert_eq!((w.level(), w.width()), (50.0, 100.0));

        let own = CtWindow::new(40.0, 400.0).unwrap();
        assert_eq!(s.clone().with_window(own).display_window(), own);

        let s = ImageSlice::new("b", 1, array![[f32::NAN]]);
        assert_eq!(s.display_window(), CtWindow::from_lung_visual());
    }
}
