//! 数据集目录树操作.
//!
//! 支持两种目录树布局:
//!
//! 1. [`TreeLayout::Recursive`]: 递归遍历根目录下的所有目录;
//! 2. [`TreeLayout::Structured`]: 只遍历 `sub-*` (受试者) / `*ses-*` (检查) /
//!   `*ser-*` (序列) 三层结构, 跳过名称中含有 `None` 的序列, 只在序列目录中寻找图像文件.

use std::fmt;
use std::str::FromStr;

mod walk;

pub use walk::{walk, Walk};

/// 目录类别. 见 [`classify_dir`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DirKind {
    /// 受试者目录, 以 `sub-` 开头.
    Subject,
    /// 检查目录, 名称含 `ses-`.
    Session,
    /// 序列目录, 名称含 `ser-`.
    Series,
    /// 被排除的序列目录, 名称同时含 `ser-` 与 `None`.
    Excluded,
    /// 其他目录.
    Other,
}

/// 按目录名分类. 按 `Subject`, `Session`, `Series`/`Excluded` 的顺序判断.
///
/// ```
/// use lung_berry::dataset::{classify_dir, DirKind};
///
/// assert_eq!(classify_dir("sub-100012"), DirKind::Subject);
/// assert_eq!(classify_dir("ses-T0"), DirKind::Session);
/// assert_eq!(classify_dir("ser-1.2.3"), DirKind::Series);
/// assert_eq!(classify_dir("ser-None"), DirKind::Excluded);
/// assert_eq!(classify_dir("misc"), DirKind::Other);
/// ```
pub fn classify_dir(name: &str) -> DirKind {
    if name.starts_with("sub-") {
        DirKind::Subject
    } else if name.contains("ses-") {
        DirKind::Session
    } else if name.contains("ser-") {
        if name.contains("None") {
            DirKind::Excluded
        } else {
            DirKind::Series
        }
    } else {
        DirKind::Other
    }
}

/// 目录树布局.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TreeLayout {
    /// 递归遍历所有目录.
    #[default]
    Recursive,
    /// 只遍历 `sub-*/ses-*/ser-*` 结构.
    Structured,
}

impl TreeLayout {
    /// 所有可被 [`FromStr`] 接受的名称.
    pub const NAMES: [&'static str; 2] = ["recursive", "structured"];
}

impl fmt::Display for TreeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TreeLayout::Recursive => "recursive",
            TreeLayout::Structured => "structured",
        })
    }
}

impl FromStr for TreeLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recursive" => Ok(TreeLayout::Recursive),
            "structured" => Ok(TreeLayout::Structured),
            _ => Err(format!(
                "unknown layout `{s}`, expected one of {:?}",
                Self::NAMES
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_dir() {
        assert_eq!(classify_dir("sub-1"), DirKind::Subject);
        // 只认前缀.
        assert_eq!(classify_dir("xsub-1"), DirKind::Other);
        assert_eq!(classify_dir("01-ses-2"), DirKind::Session);
        assert_eq!(classify_dir("3-ser-4"), DirKind::Series);
        assert_eq!(classify_dir("ser-None-5"), DirKind::Excluded);
        // 大小写敏感.
        assert_eq!(classify_dir("ser-none"), DirKind::Series);
        assert_eq!(classify_dir("SER-1"), DirKind::Other);
        assert_eq!(classify_dir(""), DirKind::Other);
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("recursive".parse(), Ok(TreeLayout::Recursive));
        assert_eq!("Structured".parse(), Ok(TreeLayout::Structured));
        assert!("flat".parse::<TreeLayout>().is_err());
        for name in TreeLayout::NAMES {
            let l: TreeLayout = name.parse().unwrap();
            assert_eq!(l.to_string(), name);
        }
        assert_eq!(TreeLayout::default(), TreeLayout::Recursive);
    }
}
