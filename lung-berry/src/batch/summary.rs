//! 批处理统计.

use super::error::{ErrorKind, ItemError};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

/// 一次批处理的统计结果.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// 枚举到的图像文件数.
    pub discovered: usize,
    /// 成功解码的文件数.
    pub processed: usize,
    /// 在标注表中找到标注的切片数.
    pub matched: usize,
    /// 成功写入派生列的切片数.
    pub updated: usize,
    /// 成功写出的叠加图数.
    pub rendered: usize,
    /// 解析时因重复标识符而产生的警告数 (`first`/`last` 策略).
    pub duplicate_warnings: usize,
    /// 单个切片 (或目录) 的失败记录, 按文件路径排序.
    pub errors: Vec<ItemError>,
    /// 最终写出的标注表路径.
    pub output_table: PathBuf,
}

impl RunSummary {
    /// 类别为 `kind` 的失败数.
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// 各类别的失败数, 按 [`ErrorKind::ALL`] 顺序, 省略为零的类别.
    pub fn error_counts(&self) -> Vec<(ErrorKind, usize)> {
        ErrorKind::ALL
            .into_iter()
            .map(|k| (k, self.count(k)))
            .filter(|&(_, n)| n > 0)
            .collect()
    }

    /// 将报告写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Summary:")?;
        writeln!(w, "{S4}Discovered files: {}", self.discovered)?;
        writeln!(w, "{S4}Decoded slices: {}", self.processed)?;
        writeln!(w, "{S4}Matched annotations: {}", self.matched)?;
        writeln!(w, "{S4}Updated rows: {}", self.updated)?;
        writeln!(w, "{S4}Rendered overlays: {}", self.rendered)?;
        writeln!(w, "{S4}Duplicate warnings: {}", self.duplicate_warnings)?;
        let counts = self.error_counts();
        if counts.is_empty() {
            writeln!(w, "{S4}Errors: 0")?;
        } else {
            writeln!(w, "{S4}Errors: {}", self.errors.len())?;
            for (kind, n) in counts {
                writeln!(w, "{S4}{S4}{kind}: {n}")?;
            }
        }
        write!(w, "{S4}Updated table: {}", self.output_table.display())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::with_capacity(512);
        self.describe_into(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report() {
        let s = RunSummary {
            discovered: 10,
            processed: 9,
            matched: 3,
            updated: 3,
            rendered: 2,
            duplicate_warnings: 0,
            errors: vec![
                ItemError::new(ErrorKind::DecodeFailure, "a.dcm", None, "x"),
                ItemError::new(ErrorKind::IoFailure, "b.dcm", Some("1"), "y"),
            ],
            output_table: "out/updated_annotations.csv".into(),
        };
        assert_eq!(s.count(ErrorKind::DecodeFailure), 1);
        assert_eq!(s.count(ErrorKind::MissingField), 0);
        assert_eq!(
            s.error_counts(),
            [(ErrorKind::DecodeFailure, 1), (ErrorKind::IoFailure, 1)]
        );

        let report = s.to_string();
        assert!(report.starts_with("Summary:\n"));
        assert!(report.contains("    Decoded slices: 9\n"));
        assert!(report.contains("    Errors: 2\n        DecodeFailure: 1\n        IoFailure: 1\n"));
        assert!(report.ends_with("Updated table: out/updated_annotations.csv"));
    }

    #[test]
    fn test_report_without_errors() {
        let report = RunSummary::default().to_string();
        assert!(report.contains("    Errors: 0\n"));
    }
}
