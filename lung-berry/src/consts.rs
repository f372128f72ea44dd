//! 通用常量.

/// 标注表列名.
pub mod column {
    /// 序列唯一标识符. 核心流程不使用, 只原样保留.
    pub const SERIES_UID: &str = "Series UID";

    /// 切片唯一标识符 (SOP Instance UID). 标注表的主键.
    pub const INSTANCE_UID: &str = "Instance UID";

    /// 归一化 bbox 左上角的 x (列) 分量.
    pub const X: &str = "x";

    /// 归一化 bbox 左上角的 y (行) 分量.
    pub const Y: &str = "y";

    /// 归一化 bbox 宽度.
    pub const WIDTH: &str = "width";

    /// 归一化 bbox 高度.
    pub const HEIGHT: &str = "height";

    /// 派生列: 命中切片的源文件路径.
    pub const DCM_PATH: &str = "dcm_path";

    /// 派生列: 中心点 x (列) 像素坐标.
    pub const CENTER_X: &str = "center_x";

    /// 派生列: 中心点 y (行) 像素坐标.
    pub const CENTER_Y: &str = "center_y";

    /// 几何列, 按 `x, y, width, height` 顺序.
    pub const GEOMETRY: [&str; 4] = [X, Y, WIDTH, HEIGHT];

    /// 派生列, 按输出顺序.
    pub const DERIVED: [&str; 3] = [DCM_PATH, CENTER_X, CENTER_Y];
}

/// 三通道颜色.
pub mod rgb {
    /// 黑色.
    pub const BLACK: [u8; 3] = [0, 0, 0];

    /// 白色.
    pub const WHITE: [u8; 3] = [255, 255, 255];

    /// bbox 边框颜色.
    pub const GREEN: [u8; 3] = [0, 200, 0];

    /// 种子点颜色.
    pub const RED: [u8; 3] = [230, 20, 20];
}

/// DICOM 文件后缀. 匹配时不区分大小写.
pub const DICOM_SUFFIX: &str = ".dcm";

/// 批处理结束后输出的标注表文件名.
pub const UPDATED_TABLE_NAME: &str = "updated_annotations.csv";

/// 叠加图文件名前缀. 完整文件名形如 `Slice-{instance_number}.png`.
pub const OVERLAY_PREFIX: &str = "Slice-";
