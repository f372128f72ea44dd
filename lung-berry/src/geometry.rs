//! 归一化 bbox 到像素坐标的转换.
//!
//! 像素坐标统一以图像左上角为原点: `x` 为列索引, 向右增长; `y` 为行索引, 向下增长.
//! 归一化 bbox 的原点同样在左上角, 因此转换时不需要翻转任何方向.
//!
//! 转换规则 (需要与既有标注结果逐像素一致):
//!
//! - `x`, `width` 按图像宽度缩放, `y`, `height` 按图像高度缩放, 二者互相独立;
//! - 缩放后一律 **截断** (floor), 而不是四舍五入;
//! - 中心点为 `bbox 起点 + bbox 边长 / 2` (整数除法), 边长为奇数时不取边界中点.

use crate::Idx2d;
use thiserror::Error;

/// 几何字段错误.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GeometryError {
    /// 标注行缺少必要的几何字段 (列不存在或单元格为空).
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// 字段无法解析为有限浮点数.
    #[error("invalid geometry: field `{field}` is not a finite number (`{raw}`)")]
    NotANumber {
        /// 字段名.
        field: &'static str,
        /// 原始文本.
        raw: String,
    },

    /// 归一化分量超出 `[0, 1]`.
    #[error("invalid geometry: field `{field}` = {value} is outside [0, 1]")]
    OutOfRange {
        /// 字段名.
        field: &'static str,
        /// 实际值.
        value: f64,
    },

    /// 归一化宽或高不为正.
    #[error("invalid geometry: extent `{0}` must be positive")]
    EmptyExtent(&'static str),

    /// 图像高或宽为 0.
    #[error("invalid geometry: image shape {height}x{width} is empty")]
    EmptyImage {
        /// 图像高度.
        height: usize,
        /// 图像宽度.
        width: usize,
    },
}

impl GeometryError {
    /// 是否为字段缺失. 其余变体均属于非法几何.
    #[inline]
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField(_))
    }
}

/// 归一化 bbox. 所有分量都在 `[0, 1]` 内, 宽高严格大于 0.
///
/// 该结构只能通过 [`NormBox::new`] 或 [`NormBox::parse`] 构造, 因此持有的值总是合法的.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NormBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl NormBox {
    /// 构建归一化 bbox.
    ///
    /// # 返回值
    ///
    /// - 任一分量非有限数时, 返回 `Err(GeometryError::NotANumber)`;
    /// - 任一分量不在 `[0, 1]` 内时, 返回 `Err(GeometryError::OutOfRange)`;
    /// - `width` 或 `height` 为 0 时, 返回 `Err(GeometryError::EmptyExtent)`;
    /// - 其他情况下成功.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, GeometryError> {
        use crate::consts::column;

        let named = [
            (column::X, x),
            (column::Y, y),
            (column::WIDTH, width),
            (column::HEIGHT, height),
        ];
        for (field, value) in named {
            if !value.is_finite() {
                return Err(GeometryError::NotANumber {
                    field,
                    raw: value.to_string(),
                });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(GeometryError::OutOfRange { field, value });
            }
        }
        if width <= 0.0 {
            return Err(GeometryError::EmptyExtent(column::WIDTH));
        }
        if height <= 0.0 {
            return Err(GeometryError::EmptyExtent(column::HEIGHT));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// 从 `x, y, width, height` 四个原始文本字段构建归一化 bbox.
    ///
    /// `None` 或空白文本视为字段缺失.
    pub fn parse(fields: [Option<&str>; 4]) -> Result<Self, GeometryError> {
        let mut values = [0.0f64; 4];
        for ((slot, raw), field) in values
            .iter_mut()
            .zip(fields)
            .zip(crate::consts::column::GEOMETRY)
        {
            let raw = raw
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(GeometryError::MissingField(field))?;
            *slot = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| GeometryError::NotANumber {
                    field,
                    raw: raw.to_string(),
                })?;
        }
        let [x, y, width, height] = values;
        Self::new(x, y, width, height)
    }

    /// 左上角 x 分量.
    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// 左上角 y 分量.
    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// 宽度.
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// 高度.
    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }
}

/// 像素空间 bbox. `(x, y)` 为左上角像素.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PixelBox {
    /// 左上角列索引.
    pub x: usize,
    /// 左上角行索引.
    pub y: usize,
    /// 宽度 (列数).
    pub width: usize,
    /// 高度 (行数).
    pub height: usize,
}

/// 像素空间中的点.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PixelPoint {
    /// 列索引.
    pub x: usize,
    /// 行索引.
    pub y: usize,
}

impl PixelPoint {
    /// 转换为行优先二维索引 `(y, x)`.
    #[inline]
    pub fn idx(&self) -> Idx2d {
        (self.y, self.x)
    }
}

/// 一次转换的全部结果. 只在单个切片的处理过程中存在.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PixelGeometry {
    /// 像素 bbox.
    pub bbox: PixelBox,
    /// 种子点 (bbox 中心).
    pub center: PixelPoint,
}

/// `floor(value * extent)`. `value` 已保证在 `[0, 1]` 内, 结果不会超过 `extent`.
#[inline]
fn scale(value: f64, extent: usize) -> usize {
    (value * extent as f64).floor() as usize
}

/// 将归一化 bbox 转换为 `shape = (height, width)` 图像上的像素 bbox 与种子点.
///
/// 该函数是纯函数, 相同输入总是得到相同输出.
///
/// 当 `height` 或 `width` 为 0 时, 返回 `Err(GeometryError::EmptyImage)`.
pub fn transform(bbox: &NormBox, (height, width): Idx2d) -> Result<PixelGeometry, GeometryError> {
    if height == 0 || width == 0 {
        return Err(GeometryError::EmptyImage { height, width });
    }
    let bbox = PixelBox {
        x: scale(bbox.x, width),
        y: scale(bbox.y, height),
        width: scale(bbox.width, width),
        height: scale(bbox.height, height),
    };
    let center = PixelPoint {
        x: bbox.x + bbox.width / 2,
        y: bbox.y + bbox.height / 2,
    };
    Ok(PixelGeometry { bbox, center })
}
