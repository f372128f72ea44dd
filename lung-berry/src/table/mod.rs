//! 标注表.
//!
//! 以 `Instance UID` 为键的内存表. 原始列按原样保留, 另外维护三个派生列
//! (`dcm_path`, `center_x`, `center_y`). 对外只暴露三种操作:
//!
//! 1. [`AnnotationTable::lookup`]: 按标识符 O(1) 查询候选行;
//! 2. [`AnnotationTable::upsert_derived`]: 写入某一行的派生列, 每个标识符至多写入一次;
//! 3. [`AnnotationTable::serialize`] / [`AnnotationTable::save`]: 持久化.
//!
//! 行本身永远不会以可变方式暴露给调用方.

mod error;

pub use error::TableError;

use crate::consts::column;
use crate::geometry::{GeometryError, NormBox, PixelPoint};
use itertools::Itertools;
use log::warn;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

/// 派生字段. 要么整体存在, 要么整体不存在.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Derived {
    /// 命中切片的源文件路径.
    pub path: PathBuf,
    /// 种子点像素坐标.
    pub center: PixelPoint,
}

/// 一个原始数据行.
#[derive(Debug)]
struct Row {
    /// 原始单元格, 长度与 `AnnotationTable::headers` 相同.
    cells: Vec<String>,
    derived: Option<Derived>,
}

/// 标注表记录的不透明键. 只在生成它的表上有意义.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RecordKey(usize);

impl RecordKey {
    /// 行号 (从 0 开始, 不含表头).
    #[inline]
    pub fn row(&self) -> usize {
        self.0
    }
}

/// 标注表.
#[derive(Debug)]
pub struct AnnotationTable {
    /// 除派生列以外的原始表头.
    headers: Vec<String>,
    rows: Vec<Row>,
    /// 标识符 -> 行号 (按文件中出现的顺序).
    index: HashMap<String, Vec<usize>>,
    uid_column: usize,
    /// `x, y, width, height` 所在列.
    geometry_columns: [Option<usize>; 4],
}

/// 不可变、借用的标注记录视图.
#[derive(Copy, Clone)]
pub struct AnnotationRecord<'a> {
    table: &'a AnnotationTable,
    row: usize,
}

impl std::fmt::Debug for AnnotationRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationRecord")
            .field("row", &self.row)
            .field("uid", &self.instance_uid())
            .field("derived", &self.derived())
            .finish()
    }
}

impl<'a> AnnotationRecord<'a> {
    #[inline]
    fn inner(&self) -> &'a Row {
        &self.table.rows[self.row]
    }

    /// 记录键, 用于 [`AnnotationTable::upsert_derived`].
    #[inline]
    pub fn key(&self) -> RecordKey {
        RecordKey(self.row)
    }

    /// 行号 (从 0 开始, 不含表头).
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// 切片唯一标识符.
    #[inline]
    pub fn instance_uid(&self) -> &'a str {
        self.inner().cells[self.table.uid_column].trim()
    }

    /// 按列名获取原始单元格. 列不存在时返回 `None`.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        let col = self.table.column(name)?;
        Some(self.inner().cells[col].as_str())
    }

    /// 解析该行的归一化 bbox.
    ///
    /// 列不存在或单元格为空时返回 `Err(GeometryError::MissingField)`.
    pub fn norm_box(&self) -> Result<NormBox, GeometryError> {
        let cells = &self.inner().cells;
        NormBox::parse(
            self.table
                .geometry_columns
                .map(|c| c.map(|c| cells[c].as_str())),
        )
    }

    /// 派生字段 (若已写入).
    #[inline]
    pub fn derived(&self) -> Option<&'a Derived> {
        self.inner().derived.as_ref()
    }
}

/// 单元格是否代表空值. 缺失的浮点数常被写成空串或 `nan`.
#[inline]
fn is_null(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell.eq_ignore_ascii_case("nan")
}

/// 解析派生的中心点坐标. 接受 `307` 和 `307.0` 两种写法.
fn parse_coord(row: usize, column: &'static str, raw: &str) -> Result<usize, TableError> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<usize>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as usize),
        _ => Err(TableError::MalformedDerived {
            row,
            column,
            raw: raw.to_string(),
        }),
    }
}

impl AnnotationTable {
    /// 从 CSV 文件加载标注表.
    ///
    /// 输入中若已存在派生列 (例如对上一次的输出再运行一次), 这些列会被丢弃,
    /// 本次运行重新计算.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        Self::from_reader(File::open(path.as_ref())?)
    }

    /// 从 CSV 文件加载标注表, 并保留其中已有的派生列.
    ///
    /// 用于检查一次运行的输出. 派生列只填了一部分的行会导致 `Err(TableError::PartialDerived)`.
    pub fn load_resolved<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        Self::from_reader_resolved(File::open(path.as_ref())?)
    }

    /// 从任意 CSV 输入流构建标注表, 丢弃已有的派生列.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, TableError> {
        Self::read(reader, false)
    }

    /// 从任意 CSV 输入流构建标注表, 保留已有的派生列.
    pub fn from_reader_resolved<R: io::Read>(reader: R) -> Result<Self, TableError> {
        Self::read(reader, true)
    }

    fn read<R: io::Read>(reader: R, keep_derived: bool) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let raw_headers: Vec<String> = rdr
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        let derived_at = column::DERIVED.map(|name| raw_headers.iter().position(|h| h == name));
        let is_derived = |idx: usize| derived_at.contains(&Some(idx));
        let kept: Vec<usize> = (0..raw_headers.len()).filter(|&i| !is_derived(i)).collect();
        let headers: Vec<String> = kept.iter().map(|&i| raw_headers[i].clone()).collect();

        let position = |name: &str| headers.iter().position(|h| h == name);
        let uid_column =
            position(column::INSTANCE_UID).ok_or(TableError::MissingKeyColumn(column::INSTANCE_UID))?;
        let geometry_columns = column::GEOMETRY.map(position);
        for (name, col) in column::GEOMETRY.iter().zip(geometry_columns) {
            if col.is_none() {
                warn!("Annotation table has no `{name}` column; every match will miss this field");
            }
        }

        let mut rows = Vec::new();
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (row, record) in rdr.byte_records().enumerate() {
            let record = record?;
            if record.iter().any(|f| std::str::from_utf8(f).is_err()) {
                warn!("Row {row}: invalid UTF-8; bad bytes replaced with U+FFFD");
            }
            if record.len() > raw_headers.len() {
                warn!(
                    "Row {row}: {} cells but {} columns; extra cells dropped",
                    record.len(),
                    raw_headers.len()
                );
            }
            let text = |c: Option<usize>| {
                c.and_then(|c| record.get(c))
                    .map(|f| String::from_utf8_lossy(f).into_owned())
                    .unwrap_or_default()
            };
            let cells: Vec<String> = kept.iter().map(|&i| text(Some(i))).collect();

            let derived = if keep_derived {
                let [path, cx, cy] = derived_at.map(text);
                match [&path, &cx, &cy].map(|c| is_null(c)) {
                    [true, true, true] => None,
                    [false, false, false] => Some(Derived {
                        path: PathBuf::from(path),
                        center: PixelPoint {
                            x: parse_coord(row, column::CENTER_X, &cx)?,
                            y: parse_coord(row, column::CENTER_Y, &cy)?,
                        },
                    }),
                    _ => return Err(TableError::PartialDerived { row }),
                }
            } else {
                None
            };

            let uid = cells[uid_column].trim();
            if uid.is_empty() {
                warn!("Row {row}: empty `{}`; it can never be matched", column::INSTANCE_UID);
            } else {
                index.entry(uid.to_string()).or_default().push(row);
            }
            rows.push(Row { cells, derived });
        }

        Ok(Self {
            headers,
            rows,
            index,
            uid_column,
            geometry_columns,
        })
    }

    /// 按列名获取列索引.
    #[inline]
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 原始表头 (不含派生列).
    #[inline]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// 数据行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何数据行.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 不同标识符的个数.
    #[inline]
    pub fn identifier_len(&self) -> usize {
        self.index.len()
    }

    /// 已写入派生字段的行数.
    pub fn resolved_len(&self) -> usize {
        self.rows.iter().filter(|r| r.derived.is_some()).count()
    }

    /// 按文件顺序迭代所有记录.
    pub fn records(&self) -> impl ExactSizeIterator<Item = AnnotationRecord<'_>> {
        (0..self.rows.len()).map(move |row| AnnotationRecord { table: self, row })
    }

    /// 获取 `key` 对应的记录. 键不属于该表时返回 `None`.
    pub fn get(&self, key: RecordKey) -> Option<AnnotationRecord<'_>> {
        (key.0 < self.rows.len()).then_some(AnnotationRecord { table: self, row: key.0 })
    }

    /// 按标识符查询所有候选记录 (按文件中出现的顺序). 不存在时迭代器为空.
    ///
    /// 查询基于哈希索引, 为 O(1) 均摊复杂度.
    pub fn lookup(&self, uid: &str) -> impl ExactSizeIterator<Item = AnnotationRecord<'_>> + '_ {
        self.index
            .get(uid)
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .map(move |&row| AnnotationRecord { table: self, row })
    }

    /// 出现不止一次的标识符及其出现次数, 按标识符排序.
    pub fn duplicates(&self) -> Vec<(&str, usize)> {
        self.index
            .iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(uid, rows)| (uid.as_str(), rows.len()))
            .sorted_unstable()
            .collect()
    }

    /// 写入 `key` 对应行的派生字段.
    ///
    /// 同一标识符在一次运行中只允许写入一次:
    ///
    /// - 若该标识符的任意一行已经写入过, 且不是同一行的完全相同的值,
    ///   返回 `Err(TableError::AlreadyResolved)`, 原值保持不变;
    /// - 对同一行重复写入完全相同的值是幂等的, 返回 `Ok(())`.
    pub fn upsert_derived(&mut self, key: RecordKey, derived: Derived) -> Result<(), TableError> {
        let row = self.rows.get(key.0).ok_or(TableError::UnknownRecord(key.0))?;
        let uid = row.cells[self.uid_column].trim();
        let siblings = self
            .index
            .get(uid)
            .map_or(std::slice::from_ref(&key.0), Vec::as_slice);

        for &sibling in siblings {
            if let Some(previous) = &self.rows[sibling].derived {
                if sibling == key.0 && *previous == derived {
                    return Ok(());
                }
                return Err(TableError::AlreadyResolved {
                    uid: uid.to_string(),
                    previous: previous.path.clone(),
                });
            }
        }

        self.rows[key.0].derived = Some(derived);
        Ok(())
    }

    /// 将整张表 (包括未命中的行) 以 CSV 写入 `writer`.
    ///
    /// 列顺序为原始列, 然后是 `dcm_path, center_x, center_y`. 未命中行的派生列为空.
    pub fn serialize<W: io::Write>(&self, writer: W) -> Result<(), TableError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(
            self.headers
                .iter()
                .map(String::as_str)
                .chain(column::DERIVED),
        )?;
        for row in self.rows.iter() {
            let [path, cx, cy] = match &row.derived {
                Some(d) => [
                    d.path.display().to_string(),
                    d.center.x.to_string(),
                    d.center.y.to_string(),
                ],
                None => Default::default(),
            };
            wtr.write_record(
                row.cells
                    .iter()
                    .map(String::as_str)
                    .chain([path.as_str(), cx.as_str(), cy.as_str()]),
            )?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// 将整张表写到 `path`. 已存在的文件会被覆盖.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let file = File::create(path.as_ref())?;
        self.serialize(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Series UID,Instance UID,x,y,width,height
s1,1.2.3,0.5,0.5,0.2,0.1
s1,1.2.4,0.1,0.2,0.3,0.4
s2,9.9.9,0.0,0.0,1.0,1.0
";

    fn table(s: &str) -> AnnotationTable {
        AnnotationTable::from_reader(s.as_bytes()).unwrap()
    }

    fn derived(path: &str, x: usize, y: usize) -> Derived {
        Derived {
            path: PathBuf::from(path),
            center: PixelPoint { x, y },
        }
    }

    fn to_string(t: &AnnotationTable) -> String {
        let mut buf = Vec::new();
        t.serialize(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_lookup() {
        let t = table(CSV);
        assert_eq!(t.len(), 3);
        assert_eq!(t.identifier_len(), 3);

        let found: Vec<_> = t.lookup("1.2.4").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row(), 1);
        assert_eq!(found[0].get("Series UID"), Some("s1"));
        assert_eq!(found[0].get("nope"), None);
        assert_eq!(
            found[0].norm_box().unwrap(),
            NormBox::new(0.1, 0.2, 0.3, 0.4).unwrap()
        );

        assert_eq!(t.lookup("absent").len(), 0);
        assert!(t.duplicates().is_empty());
    }

    #[test]
    fn test_missing_key_column() {
        let e = AnnotationTable::from_reader("x,y,width,height\n0,0,1,1\n".as_bytes()).unwrap_err();
        assert!(matches!(e, TableError::MissingKeyColumn("Instance UID")));
    }

    #[test]
    fn test_missing_geometry_column_is_per_record() {
        let t = table("Instance UID,x,y,width\nA,0.1,0.1,0.1\n");
        let r = t.lookup("A").next().unwrap();
        assert_eq!(r.norm_box(), Err(GeometryError::MissingField("height")));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let t = table("Instance UID,x,y,width,height\nA,0.1,0.1\n");
        let r = t.lookup("A").next().unwrap();
        assert_eq!(r.norm_box(), Err(GeometryError::MissingField("width")));
        assert_eq!(to_string(&t).lines().nth(1), Some("A,0.1,0.1,,,,,"));
    }

    #[test]
    fn test_invalid_utf8_row_is_kept() {
        let mut csv = b"Series UID,Instance UID,x,y,width,height\n".to_vec();
        csv.extend_from_slice(b"s\xff,A,0.1,0.1,0.1,0.1\n");
        csv.extend_from_slice(b"s,B,0.2,0.2,0.2,0.2\n");
        let t = AnnotationTable::from_reader(csv.as_slice()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.lookup("A").next().unwrap().get("Series UID"), Some("s\u{fffd}"));
        assert!(t.lookup("B").next().unwrap().norm_box().is_ok());
    }

    #[test]
    fn test_duplicates_keep_file_order() {
        let t = table("Instance UID,x,y,width,height\nA,0.1,0.1,0.1,0.1\nB,0,0,1,1\nA,0.2,0.2,0.2,0.2\n");
        assert_eq!(t.duplicates(), vec![("A", 2)]);
        let rows: Vec<usize> = t.lookup("A").map(|r| r.row()).collect();
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn test_upsert_once_per_identifier() {
        let mut t = table("Instance UID,x,y,width,height\nA,0.1,0.1,0.1,0.1\nA,0.2,0.2,0.2,0.2\n");
        let first = t.lookup("A").next().unwrap().key();
        let second = t.lookup("A").nth(1).unwrap().key();

        t.upsert_derived(first, derived("a.dcm", 1, 2)).unwrap();
        // 幂等.
        t.upsert_derived(first, derived("a.dcm", 1, 2)).unwrap();
        assert_eq!(t.resolved_len(), 1);

        // 同一行冲突.
        let e = t.upsert_derived(first, derived("b.dcm", 3, 4)).unwrap_err();
        assert!(matches!(e, TableError::AlreadyResolved { ref uid, .. } if uid == "A"));
        // 同一标识符的另一行也不允许.
        assert!(t.upsert_derived(second, derived("b.dcm", 3, 4)).is_err());

        assert_eq!(t.get(first).unwrap().derived(), Some(&derived("a.dcm", 1, 2)));
        assert_eq!(t.get(second).unwrap().derived(), None);
        assert!(matches!(
            t.upsert_derived(RecordKey(99), derived("c.dcm", 0, 0)),
            Err(TableError::UnknownRecord(99))
        ));
    }

    #[test]
    fn test_serialize_appends_derived_columns() {
        let mut t = table(CSV);
        let key = t.lookup("1.2.3").next().unwrap().key();
        t.upsert_derived(key, derived("root/a/1.dcm", 307, 281)).unwrap();

        let out = to_string(&t);
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("Series UID,Instance UID,x,y,width,height,dcm_path,center_x,center_y")
        );
        assert_eq!(lines.next(), Some("s1,1.2.3,0.5,0.5,0.2,0.1,root/a/1.dcm,307,281"));
        assert_eq!(lines.next(), Some("s1,1.2.4,0.1,0.2,0.3,0.4,,,"));
        assert_eq!(lines.next(), Some("s2,9.9.9,0.0,0.0,1.0,1.0,,,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_round_trip_and_rerun() {
        let mut t = table(CSV);
        let key = t.lookup("9.9.9").next().unwrap().key();
        t.upsert_derived(key, derived("x.dcm", 5, 6)).unwrap();
        let out = to_string(&t);

        // 保留派生列读回.
        let back = AnnotationTable::from_reader_resolved(out.as_bytes()).unwrap();
        assert_eq!(back.headers(), t.headers());
        for (a, b) in t.records().zip(back.records()) {
            assert_eq!(a.instance_uid(), b.instance_uid());
            assert_eq!(a.norm_box(), b.norm_box());
            for name in column::GEOMETRY {
                assert_eq!(a.get(name), b.get(name));
            }
            assert_eq!(a.derived(), b.derived());
        }

        // 再次作为输入时, 派生列被丢弃而不是重复.
        let rerun = AnnotationTable::from_reader(out.as_bytes()).unwrap();
        assert_eq!(rerun.resolved_len(), 0);
        assert_eq!(rerun.headers(), t.headers());
        assert_eq!(to_string(&rerun), to_string(&table(CSV)));
    }

    #[test]
    fn test_load_resolved_accepts_float_centers() {
        let s = "Instance UID,x,y,width,height,dcm_path,center_x,center_y\n\
A,0.1,0.1,0.1,0.1,a.dcm,307.0,281.0\n\
B,0.1,0.1,0.1,0.1,,nan,NaN\n";
        let t = AnnotationTable::from_reader_resolved(s.as_bytes()).unwrap();
        assert_eq!(
            t.lookup("A").next().unwrap().derived(),
            Some(&derived("a.dcm", 307, 281))
        );
        assert_eq!(t.lookup("B").next().unwrap().derived(), None);
    }

    #[test]
    fn test_load_resolved_rejects_partial_rows() {
        let s = "Instance UID,x,y,width,height,dcm_path,center_x,center_y\nA,0,0,1,1,a.dcm,,3\n";
        assert!(matches!(
            AnnotationTable::from_reader_resolved(s.as_bytes()),
            Err(TableError::PartialDerived { row: 0 })
        ));
        let s = "Instance UID,x,y,width,height,dcm_path,center_x,center_y\nA,0,0,1,1,a.dcm,1.5,3\n";
        assert!(matches!(
            AnnotationTable::from_reader_resolved(s.as_bytes()),
            Err(TableError::MalformedDerived { row: 0, column: "center_x", .. })
        ));
    }
}
