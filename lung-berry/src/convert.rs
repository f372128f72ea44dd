//! 将 NLST 嵌套 JSON 标注展平为 CSV 标注表.
//!
//! 输入形如 `{series_uid: {instance_uid: [{x, y, width, height}, ...]}}`,
//! 每个 bbox 输出一行 `Series UID, Instance UID, x, y, width, height`.
//! 行顺序与 JSON 中的顺序一致, 数值按 JSON 原文写出.

use crate::consts::column;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Number;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// 转换错误.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// 文件读写失败.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON 无法解析, 或结构不符合预期.
    #[error("malformed annotation JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV 写入失败.
    #[error("cannot write CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct RawBox {
    x: Number,
    y: Number,
    width: Number,
    height: Number,
}

type Nested = IndexMap<String, IndexMap<String, Vec<RawBox>>>;

/// 从 `reader` 读取 JSON, 将展平后的 CSV 写入 `writer`. 返回写出的数据行数.
pub fn convert_reader_to_writer<R: io::Read, W: io::Write>(
    reader: R,
    writer: W,
) -> Result<usize, ConvertError> {
    let data: Nested = serde_json::from_reader(reader)?;

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(
        [column::SERIES_UID, column::INSTANCE_UID]
            .iter()
            .chain(&column::GEOMETRY),
    )?;
    let mut rows = 0;
    for (series, images) in data.iter() {
        for (image, boxes) in images.iter() {
            for b in boxes.iter() {
                let [x, y, w, h] = [&b.x, &b.y, &b.width, &b.height].map(Number::to_string);
                wtr.write_record([series, image, &x, &y, &w, &h])?;
                rows += 1;
            }
        }
    }
    wtr.flush()?;
    Ok(rows)
}

/// 将 `json_path` 处的 JSON 标注展平写入 `csv_path`. 返回写出的数据行数.
pub fn convert_json_to_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    json_path: P,
    csv_path: Q,
) -> Result<usize, ConvertError> {
    let reader = BufReader::new(File::open(json_path)?);
    let writer = BufWriter::new(File::create(csv_path)?);
    convert_reader_to_writer(reader, writer)
}
