//! DICOM 切片解码.

use super::{CtWindow, ImageSlice, SliceDecoder};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{open_file, DefaultDicomObject};
use dicom_pixeldata::PixelDecoder;
use log::debug;
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

/// 切片解码错误.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecodeError {
    /// 文件无法按 DICOM 格式读取.
    #[error("cannot read DICOM file: {0}")]
    Read(String),

    /// 缺少必要属性.
    #[error("missing attribute `{0}`")]
    MissingAttribute(&'static str),

    /// 属性存在, 但无法转换为期望的类型.
    #[error("malformed attribute `{name}`: {reason}")]
    MalformedAttribute {
        /// 属性名.
        name: &'static str,
        /// 原因.
        reason: String,
    },

    /// 像素数据无法解码.
    #[error("cannot decode pixel data: {0}")]
    PixelData(String),

    /// 像素布局不受支持 (例如彩色图像).
    #[error("unsupported pixel layout: {0}")]
    Unsupported(String),
}

/// 基于 `dicom-object` / `dicom-pixeldata` 的单帧灰度 DICOM 解码器.
///
/// 多帧文件只取第一帧. 像素值会经过模态 LUT (Rescale Slope/Intercept),
/// 对 CT 而言即 HU 值.
#[derive(Copy, Clone, Debug, Default)]
pub struct DicomDecoder;

/// 读取文本属性, 去掉 DICOM 的 `\0`/空格填充.
fn text(obj: &DefaultDicomObject, tag: Tag, name: &'static str) -> Result<String, DecodeError> {
    let elem = obj
        .element(tag)
        .map_err(|_| DecodeError::MissingAttribute(name))?;
    let value = elem
        .to_str()
        .map_err(|e| DecodeError::MalformedAttribute {
            name,
            reason: e.to_string(),
        })?;
    let value = value.trim_end_matches('\0').trim();
    if value.is_empty() {
        return Err(DecodeError::MissingAttribute(name));
    }
    Ok(value.to_string())
}

/// 读取文件自带的窗位/窗宽. 多值时取第一个; 缺失或非法时返回 `None`.
fn file_window(obj: &DefaultDicomObject) -> Option<CtWindow> {
    let level = obj.element(tags::WINDOW_CENTER).ok()?.to_float64().ok()?;
    let width = obj.element(tags::WINDOW_WIDTH).ok()?.to_float64().ok()?;
    CtWindow::new(level as f32, width as f32)
}

/// 解码第一帧灰度像素.
fn first_frame(obj: &DefaultDicomObject) -> Result<Array2<f32>, DecodeError> {
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| DecodeError::PixelData(e.to_string()))?;

    let samples = decoded.samples_per_pixel();
    if samples != 1 {
        return Err(DecodeError::Unsupported(format!(
            "{samples} samples per pixel"
        )));
    }
    let frames = decoded.number_of_frames();
    if frames > 1 {
        debug!("Multi-frame object ({frames} frames), using the first one");
    }

    let shape = (decoded.rows() as usize, decoded.columns() as usize);
    let data = decoded
        .to_vec_frame::<f32>(0)
        .map_err(|e| DecodeError::PixelData(e.to_string()))?;
    Array2::from_shape_vec(shape, data).map_err(|e| DecodeError::PixelData(e.to_string()))
}

impl SliceDecoder for DicomDecoder {
    fn decode(&self, path: &Path) -> Result<ImageSlice, DecodeError> {
        let obj = open_file(path).map_err(|e| DecodeError::Read(e.to_string()))?;

        let uid = text(&obj, tags::SOP_INSTANCE_UID, "SOPInstanceUID")?;
        let number = obj
            .element(tags::INSTANCE_NUMBER)
            .map_err(|_| DecodeError::MissingAttribute("InstanceNumber"))?
            .to_int::<i64>()
            .map_err(|e| DecodeError::MalformedAttribute {
                name: "InstanceNumber",
                reason: e.to_string(),
            })?;
        let pixels = first_frame(&obj)?;

        let slice = ImageSlice::new(uid, number, pixels);
        Ok(match file_window(&obj) {
            Some(w) => slice.with_window(w),
            None => slice,
        })
    }
}
