/// CT 显示窗口, 包含窗位 (window level) 和窗宽 (window width).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CtWindow {
    level: f32,
    width: f32,
}

impl CtWindow {
    /// 构建 CT 窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<CtWindow> {
        if (-1e5..=1e5).contains(&level) && 0.0 < width && width <= 1e5 {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 构建一个便于展示肺实质结构的 CT 窗口. 该窗口的窗位为
    /// -600, 窗宽为 1500.
    #[inline]
    pub const fn from_lung_visual() -> CtWindow {
        Self {
            level: -600.0,
            width: 1500.0,
        }
    }

    /// 构建一个恰好覆盖 `[min, max]` 的窗口, 即按切片自身的取值范围拉伸灰度.
    ///
    /// `min == max` 时窗宽取 1. 任一参数无意义 (inf, NaN) 或 `min > max`
    /// 或超出 [`CtWindow::new`] 的合理范围时返回 `None`.
    pub fn from_min_max(min: f32, max: f32) -> Option<CtWindow> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return None;
        }
        let width = (max - min).max(1.0);
        Self::new((min + max) / 2.0, width)
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前窗设置下, `value` 对应的灰度图像素整数值 (0 <= value <= 255)
    ///
    /// 如果 `value` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, value: f32) -> Option<u8> {
        if !value.is_finite() {
            return None;
        }
        let lb = self.lower_bound();
        if value <= lb {
            Some(u8::MIN)
        } else if value >= self.upper_bound() {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some((((value - lb) / self.width()) * 255.0) as u8)
        }
    }

    /// 同 `eval`, 但无意义的值映射为黑色.
    #[inline]
    pub fn eval_or_black(&self, value: f32) -> u8 {
        self.eval(value).unwrap_or(u8::MIN)
    }
}

#[cfg(test)]
mod tests {
    use crate::CtWindow;

    fn is_valid_init(level: f32, width: f32) -> bool {
        CtWindow::new(level, width).is_some()
    }

    #[test]
    fn test_ct_window_invalid_input() {
        assert!(!is_valid_init(0.0, -1.0));
        assert!(!is_valid_init(0.0, 0.0));
        assert!(!is_valid_init(-2e5, 10.0));
    }

    #[test]
    fn test_ct_window_generic() {
        // [60, 100]
        let ct = CtWindow::new(80.0, 40.0).unwrap();
        assert_eq!(ct.eval(f32::NAN), None);
        assert_eq!(ct.eval_or_black(f32::NAN), 0);
        assert_eq!(ct.eval(f32::MIN), Some(0));
        assert_eq!(ct.eval(f32::MAX), Some(255));

        assert_eq!(ct.eval(50.0), Some(0));
        assert_eq!(ct.eval(60.0), Some(0));

        // boundary 1
        assert_eq!(ct.eval(60.1), Some(0));
        // -- boundary 1

        assert_eq!(ct.eval(70.0).unwrap(), (255.0 * 0.25) as u8);
        assert_eq!(ct.eval(80.0).unwrap(), (255.0 * 0.5) as u8);
        assert_eq!(ct.eval(90.0).unwrap(), (255.0 * 0.75) as u8);

        // boundary 2
        assert_eq!(ct.eval(99.999), Some(254));
        // -- boundary 2

        assert_eq!(ct.eval(100.0).unwrap(), u8::MAX);
    }

    #[test]
    fn test_lung_window() {
        let w = CtWindow::from_lung_visual();
        assert_eq!(w.lower_bound(), -1350.0);
        assert_eq!(w.upper_bound(), 150.0);
        // 窗下限以下为黑, 窗上限以上为白.
        assert_eq!(w.eval(-1000.0), Some(59));
        assert_eq!(w.eval(-2000.0), Some(0));
        assert_eq!(w.eval(400.0), Some(255));
    }

    #[test]
    fn test_min_max_window() {
        let w = CtWindow::from_min_max(0.0, 200.0).unwrap();
        assert_eq!(w.level(), 100.0);
        assert_eq!(w.width(), 200.0);
        assert_eq!(w.eval(0.0), Some(0));
        assert_eq!(w.eval(200.0), Some(255));

        // 常数图像.
        let w = CtWindow::from_min_max(7.0, 7.0).unwrap();
        assert_eq!(w.width(), 1.0);
        assert_eq!(w.eval(7.0), Some(127));

        assert_eq!(CtWindow::from_min_max(f32::NAN, 1.0), None);
        assert_eq!(CtWindow::from_min_max(2.0, 1.0), None);
    }
}
