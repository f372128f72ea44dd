#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 在 DICOM 切片目录树中定位逐切片的肺结节标注, 将归一化 bbox
//! 转换为像素坐标, 计算种子点 (中心点), 渲染可视化叠加图, 并输出增补后的标注表.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 标注表格式以 NLST 标注 (经 [`convert`] 展平后的 CSV) 为准. 其他来源的标注只要
//!   具有 `Instance UID, x, y, width, height` 列, 也可以工作.
//! 2. 单个切片的失败 (解码失败、几何字段缺失、渲染失败等) 不会中断整批处理,
//!   只有启动时的输入校验失败才会终止程序.
//!
//! # 坐标约定
//!
//! 全 crate 只有一种像素坐标约定: 原点在图像左上角, `x` 为列索引 (向右增长),
//! `y` 为行索引 (**向下** 增长). 按行优先索引二维数组时, 使用 `(y, x)`,
//! 即 [`Idx2d`] 的 `(h, w)` 顺序. 渲染器不会翻转垂直方向.
//!
//! # 开发计划
//!
//! ### 归一化 bbox -> 像素 bbox / 中心点 ✅
//!
//! 截断 (floor) 转换, 宽高分别独立缩放.
//!
//! 实现位于 `lung-berry/src/geometry.rs`.
//!
//! ### 标注表 ✅
//!
//! 以 `Instance UID` 建立哈希索引, 派生列 (`dcm_path`, `center_x`, `center_y`)
//! 每个标识符至多写入一次.
//!
//! 实现位于 `lung-berry/src/table`.
//!
//! ### 重复标识符策略 ✅
//!
//! `first | last | error`, 默认 `error`.
//!
//! 实现位于 `lung-berry/src/resolve.rs`.
//!
//! ### 叠加图渲染 ✅
//!
//! 默认使用 `image` 绘制; 打开 `plot` feature 后可以使用 opencv 渲染.
//!
//! 实现位于 `lung-berry/src/render`.
//!
//! ### 批处理 ✅
//!
//! 顺序遍历; 打开 `rayon` feature 后可并行遍历, 标注表更新仍是单写者.
//!
//! 实现位于 `lung-berry/src/batch`.
//!
//! ### JSON -> CSV 标注展平 ✅
//!
//! 实现位于 `lung-berry/src/convert.rs`.

/// 二维索引 `(h, w)`, 即 `(行, 列)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// DICOM 切片与显示窗口.
mod data;

pub use data::{CtWindow, DecodeError, DicomDecoder, ImageSlice, SliceDecoder};

pub mod batch;
pub mod consts;
pub mod convert;
pub mod dataset;
pub mod geometry;
pub mod prelude;
pub mod render;
pub mod resolve;
pub mod table;

pub use batch::{run, BatchRunner, RunConfig, RunError, RunSummary};
pub use geometry::{transform, NormBox, PixelBox, PixelGeometry, PixelPoint};
pub use resolve::{resolve, DuplicatePolicy, Resolution};
pub use table::{AnnotationRecord, AnnotationTable, Derived, TableError};
