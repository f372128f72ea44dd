//! 切片到标注记录的解析.
//!
//! 绝大多数切片都没有标注, 因此 [`Resolution::NotFound`] 是正常结果而不是错误.

use crate::table::{AnnotationRecord, AnnotationTable};
use log::warn;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// 标注表中同一标识符出现多次时的处理策略.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum DuplicatePolicy {
    /// 采用文件中第一次出现的行, 并给出警告.
    First,

    /// 采用文件中最后一次出现的行, 并给出警告.
    Last,

    /// 视为该切片的错误, 不做任何更新.
    #[default]
    Error,
}

impl DuplicatePolicy {
    /// 所有可选值的名字.
    pub const NAMES: [&'static str; 3] = ["first", "last", "error"];
}

impl Display for DuplicatePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Error => "error",
        })
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "error" | "error-on-duplicate" => Ok(Self::Error),
            other => Err(format!(
                "unknown duplicate policy `{other}`, expected one of {:?}",
                Self::NAMES
            )),
        }
    }
}

/// 解析结果.
#[derive(Debug)]
pub enum Resolution<'a> {
    /// 找到对应记录.
    Found {
        /// 被选中的记录.
        record: AnnotationRecord<'a>,
        /// 因重复而被忽略的其他记录个数. 非 0 时调用方应计入警告.
        shadowed: usize,
    },

    /// 标注表中没有该标识符.
    NotFound,
}

impl Resolution<'_> {
    /// 是否找到记录.
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// 解析错误.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ResolveError {
    /// 标识符在标注表中出现多次, 且策略为 [`DuplicatePolicy::Error`].
    #[error("identifier `{uid}` appears {count} times in the annotation table")]
    DuplicateIdentifier {
        /// 标识符.
        uid: String,
        /// 出现次数.
        count: usize,
    },
}

/// 在 `table` 中查找标识符为 `uid` 的记录.
///
/// # 返回值
///
/// - 不存在时返回 `Ok(Resolution::NotFound)`;
/// - 唯一存在时返回 `Ok(Resolution::Found)`, `shadowed == 0`;
/// - 存在多次时按 `policy` 处理: `First`/`Last` 返回对应记录并打印警告,
///   `Error` 返回 `Err(ResolveError::DuplicateIdentifier)`.
pub fn resolve<'a>(
    table: &'a AnnotationTable,
    uid: &str,
    policy: DuplicatePolicy,
) -> Result<Resolution<'a>, ResolveError> {
    let mut candidates = table.lookup(uid);
    let count = candidates.len();
    let record = match (count, policy) {
        (0, _) => return Ok(Resolution::NotFound),
        (1, _) | (_, DuplicatePolicy::First) => candidates.next(),
        (_, DuplicatePolicy::Last) => candidates.last(),
        (_, DuplicatePolicy::Error) => {
            return Err(ResolveError::DuplicateIdentifier {
                uid: uid.to_string(),
                count,
            })
        }
    };
    // `count > 0`, 一定存在.
    let Some(record) = record else {
        return Ok(Resolution::NotFound);
    };
    if count > 1 {
        warn!(
            "Identifier `{uid}` appears {count} times in the annotation table; using row {} ({policy})",
            record.row()
        );
    }
    Ok(Resolution::Found {
        record,
        shadowed: count - 1,
    })
}
