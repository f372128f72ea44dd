//! 标注表错误.

use std::path::PathBuf;
use thiserror::Error;

/// 标注表加载、更新或持久化时的错误.
#[derive(Debug, Error)]
pub enum TableError {
    /// CSV 读写错误.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// 其他底层 I/O 错误.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// 表头缺少主键列.
    #[error("annotation table has no `{0}` column")]
    MissingKeyColumn(&'static str),

    /// 第 `row` 行 (从 0 开始, 不含表头) 的派生列只填了一部分.
    #[error("row {row}: derived columns must be all empty or all set")]
    PartialDerived {
        /// 行号.
        row: usize,
    },

    /// 第 `row` 行的派生列无法解析.
    #[error("row {row}: malformed derived column `{column}` (`{raw}`)")]
    MalformedDerived {
        /// 行号.
        row: usize,
        /// 列名.
        column: &'static str,
        /// 原始文本.
        raw: String,
    },

    /// 该标识符在本次运行中已经被另一个切片解析过, 拒绝覆写.
    #[error("identifier `{uid}` was already resolved from `{}`", previous.display())]
    AlreadyResolved {
        /// 标识符.
        uid: String,
        /// 先前写入的源文件路径.
        previous: PathBuf,
    },

    /// 记录键不属于该表.
    #[error("record key {0} does not belong to this table")]
    UnknownRecord(usize),
}
