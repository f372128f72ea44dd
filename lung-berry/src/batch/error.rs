//! 批处理错误.

use crate::table::TableError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 单个切片失败的类别. 均为非致命错误: 记录、计数后继续处理下一个切片.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ErrorKind {
    /// 文件无法解码为切片.
    DecodeFailure,
    /// 标注缺少几何字段.
    MissingField,
    /// 几何字段存在, 但无法转换为像素坐标.
    InvalidGeometry,
    /// 标识符在标注表中出现多次, 且策略为 `error`.
    DuplicateIdentifier,
    /// 标识符已经被另一个文件解析过.
    DuplicateResolution,
    /// 文件系统错误 (目录不可读, 叠加图无法写入等).
    IoFailure,
}

impl ErrorKind {
    /// 所有类别, 按报告顺序.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::DecodeFailure,
        ErrorKind::MissingField,
        ErrorKind::InvalidGeometry,
        ErrorKind::DuplicateIdentifier,
        ErrorKind::DuplicateResolution,
        ErrorKind::IoFailure,
    ];

    /// 类别名.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::DecodeFailure => "DecodeFailure",
            ErrorKind::MissingField => "MissingField",
            ErrorKind::InvalidGeometry => "InvalidGeometry",
            ErrorKind::DuplicateIdentifier => "DuplicateIdentifier",
            ErrorKind::DuplicateResolution => "DuplicateResolution",
            ErrorKind::IoFailure => "IoFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个切片的失败记录.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemError {
    /// 类别.
    pub kind: ErrorKind,
    /// 出错的文件 (或目录) 路径.
    pub path: PathBuf,
    /// 切片标识符. 解码失败时未知.
    pub uid: Option<String>,
    /// 具体信息.
    pub message: String,
}

impl ItemError {
    /// 创建失败记录.
    pub fn new<P: Into<PathBuf>, M: ToString>(
        kind: ErrorKind,
        path: P,
        uid: Option<&str>,
        message: M,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            uid: uid.map(str::to_string),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] `{}`", self.kind, self.path.display())?;
        if let Some(uid) = &self.uid {
            write!(f, " (uid `{uid}`)")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// 批处理的致命错误. 只有启动时的输入校验和最终标注表的写入会产生该错误.
#[derive(Debug, Error)]
pub enum RunError {
    /// 根目录不存在或不是目录.
    #[error("invalid input: DICOM root `{0}` is not an existing directory")]
    RootNotDir(PathBuf),

    /// 标注表不存在或不是文件.
    #[error("invalid input: annotation table `{0}` is not an existing file")]
    TableNotFile(PathBuf),

    /// 标注表无法解析.
    #[error("invalid input: cannot load annotation table `{path}`: {source}")]
    Table {
        /// 标注表路径.
        path: PathBuf,
        /// 原因.
        source: TableError,
    },

    /// 输出目录无法创建.
    #[error("cannot create output directory `{path}`: {source}")]
    OutputDir {
        /// 输出目录.
        path: PathBuf,
        /// 原因.
        source: io::Error,
    },

    /// 最终标注表无法写入.
    #[error("cannot write updated annotation table `{path}`: {source}")]
    Persist {
        /// 输出文件路径.
        path: PathBuf,
        /// 原因.
        source: TableError,
    },
}

impl RunError {
    /// 是否为输入校验错误.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            RunError::RootNotDir(_) | RunError::TableNotFile(_) | RunError::Table { .. }
        )
    }

    /// 对应的进程退出码. 输入错误为 3, 输出错误为 4.
    /// (2 留给命令行参数错误.)
    pub fn exit_code(&self) -> u8 {
        if self.is_invalid_input() {
            3
        } else {
            4
        }
    }
}
