//! 图像文件枚举.

use super::{classify_dir, DirKind, TreeLayout};
use glob::{glob_with, MatchOptions, Pattern};
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// 一次枚举的结果.
#[derive(Debug, Default)]
pub struct Walk {
    /// 匹配后缀的文件, 已按路径排序.
    pub files: Vec<PathBuf>,
    /// 无法读取的目录 (或目录项) 及其错误. 枚举会跳过它们继续进行.
    pub unreadable: Vec<(PathBuf, io::Error)>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// `root` 下相对路径为 `rel` 的 glob 模式. `root` 中的元字符会被转义.
fn pattern(root: &Path, rel: &str) -> String {
    let root = Pattern::escape(&root.to_string_lossy());
    Path::new(&root).join(rel).to_string_lossy().into_owned()
}

/// `file` 在 `root` 下是否位于 `sub-*/ses-*/ser-*` 结构中, 且序列未被排除.
fn in_series(root: &Path, file: &Path) -> bool {
    let Ok(rel) = file.strip_prefix(root) else {
        return false;
    };
    let dirs: Vec<_> = rel
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .map(|c| match c {
            Component::Normal(name) => name.to_str().map_or(DirKind::Other, classify_dir),
            _ => DirKind::Other,
        })
        .collect();
    match dirs[..] {
        [DirKind::Subject, DirKind::Session, DirKind::Series] => true,
        [DirKind::Subject, DirKind::Session, DirKind::Excluded] => {
            debug!("Skip `{}` in an excluded series", file.display());
            false
        }
        _ => false,
    }
}

/// 把 glob 返回的路径放回 `root` 之下.
///
/// 相对于当前目录的匹配结果会丢掉开头的 `./`, 这里补回来,
/// 以保证所有结果都能对 `root` 做 `strip_prefix`.
fn rebase(root: &Path, path: PathBuf) -> PathBuf {
    if path.starts_with(root) {
        return path;
    }
    let bare: PathBuf = root
        .components()
        .skip_while(|c| matches!(c, Component::CurDir))
        .collect();
    match path.strip_prefix(&bare) {
        Ok(rel) => root.join(rel),
        Err(_) => path,
    }
}

impl Walk {
    /// 收集 `root` 下与 `pattern` 匹配且通过 `keep` 的普通文件.
    fn gather<F: Fn(&Path) -> bool>(&mut self, root: &Path, pattern: &str, keep: F) {
        let paths = match glob_with(pattern, MATCH_OPTIONS) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Invalid search pattern `{pattern}`: {e}");
                let e = io::Error::new(io::ErrorKind::InvalidInput, e);
                self.unreadable.push((PathBuf::from(pattern), e));
                return;
            }
        };
        for entry in paths {
            match entry {
                Ok(path) => {
                    let path = rebase(root, path);
                    if path.is_file() && keep(&path) {
                        self.files.push(path);
                    }
                }
                Err(e) => {
                    let path = e.path().to_owned();
                    warn!("Cannot read `{}`: {}", path.display(), e.error());
                    self.unreadable.push((path, e.into_error()));
                }
            }
        }
    }
}

/// 按 `layout` 枚举 `root` 下文件名以 `suffix` 结尾 (不区分大小写) 的文件.
///
/// 无法读取的目录会被记录在 [`Walk::unreadable`] 中并跳过, 不会中断枚举.
/// 返回的文件按路径排序, 与文件系统的遍历顺序无关.
pub fn walk(root: &Path, layout: TreeLayout, suffix: &str) -> Walk {
    let mut ans = Walk::default();
    if let Err(e) = fs::read_dir(root) {
        warn!("Cannot read directory `{}`: {e}", root.display());
        ans.unreadable.push((root.to_owned(), e));
        return ans;
    }

    let suffix_pat = Pattern::escape(suffix);
    match layout {
        TreeLayout::Recursive => {
            ans.gather(root, &pattern(root, &format!("**/*{suffix_pat}")), |_| true);
        }
        TreeLayout::Structured => {
            let rel = format!("sub-*/*ses-*/*ser-*/*{suffix_pat}");
            ans.gather(root, &pattern(root, &rel), |f| in_series(root, f));
        }
    }
    ans.files.sort();
    debug!(
        "Found {} `{suffix}` files under `{}` ({layout} layout)",
        ans.files.len(),
        root.display()
    );
    ans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, b"").unwrap();
    }

    fn rel(root: &Path, w: &Walk) -> Vec<String> {
        w.files
            .iter()
            .map(|f| {
                f.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "sub-1/ses-a/ser-x/2.dcm");
        touch(root, "sub-1/ses-a/ser-x/1.DCM");
        touch(root, "sub-1/ses-a/ser-x/notes.txt");
        touch(root, "sub-1/ses-a/ser-x/deeper/3.dcm");
        touch(root, "sub-1/ses-a/ser-None/4.dcm");
        touch(root, "sub-1/ses-a/5.dcm");
        touch(root, "sub-1/misc/ser-y/6.dcm");
        touch(root, "other/ses-b/ser-z/7.dcm");
        touch(root, "0.dcm");
        touch(root, "SUB-2/ses-c/ser-w/8.dcm");
        touch(root, "sub-3/ses-d/ser-[v]/9.dcm");
        touch(root, "sub-1/ses-a/ser-x/fake.dcm/10.txt");
        dir
    }

    #[test]
    fn test_recursive() {
        let dir = tree();
        let w = walk(dir.path(), TreeLayout::Recursive, ".dcm");
        assert!(w.unreadable.is_empty());
        assert_eq!(
            rel(dir.path(), &w),
            [
                "0.dcm",
                "SUB-2/ses-c/ser-w/8.dcm",
                "other/ses-b/ser-z/7.dcm",
                "sub-1/misc/ser-y/6.dcm",
                "sub-1/ses-a/5.dcm",
                "sub-1/ses-a/ser-None/4.dcm",
                "sub-1/ses-a/ser-x/1.DCM",
                "sub-1/ses-a/ser-x/2.dcm",
                "sub-1/ses-a/ser-x/deeper/3.dcm",
                "sub-3/ses-d/ser-[v]/9.dcm",
            ]
        );
    }

    #[test]
    fn test_structured() {
        let dir = tree();
        let w = walk(dir.path(), TreeLayout::Structured, ".dcm");
        assert_eq!(
            rel(dir.path(), &w),
            [
                "sub-1/ses-a/ser-x/1.DCM",
                "sub-1/ses-a/ser-x/2.dcm",
                "sub-3/ses-d/ser-[v]/9.dcm",
            ]
        );
    }

    #[test]
    fn test_root_with_glob_characters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scan [1]*");
        touch(&root, "sub-1/ses-a/ser-x/1.dcm");
        touch(&dir.path().join("scan 1"), "sub-1/ses-a/ser-x/2.dcm");
        for layout in [TreeLayout::Recursive, TreeLayout::Structured] {
            let w = walk(&root, layout, ".dcm");
            assert_eq!(rel(&root, &w), ["sub-1/ses-a/ser-x/1.dcm"]);
        }
    }

    #[test]
    fn test_other_suffix() {
        let dir = tree();
        let w = walk(dir.path(), TreeLayout::Recursive, ".TXT");
        // 名为 `fake.dcm` 的目录不算图像文件.
        assert_eq!(
            rel(dir.path(), &w),
            ["sub-1/ses-a/ser-x/fake.dcm/10.txt", "sub-1/ses-a/ser-x/notes.txt"]
        );
        let w = walk(dir.path(), TreeLayout::Recursive, ".dcm");
        assert!(w.files.iter().all(|f| f.is_file()));
    }

    #[test]
    fn test_rebase() {
        let p = |s: &str| PathBuf::from(s);
        assert_eq!(rebase(Path::new("."), p("a/1.dcm")), p("./a/1.dcm"));
        assert_eq!(rebase(Path::new("./data"), p("data/a/1.dcm")), p("./data/a/1.dcm"));
        assert_eq!(rebase(Path::new("data"), p("data/a/1.dcm")), p("data/a/1.dcm"));
        assert_eq!(rebase(Path::new("/r"), p("/r/1.dcm")), p("/r/1.dcm"));
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("missing");
        for layout in [TreeLayout::Recursive, TreeLayout::Structured] {
            let w = walk(&root, layout, ".dcm");
            assert!(w.files.is_empty());
            assert_eq!(w.unreadable.len(), 1);
            assert_eq!(w.unreadable[0].0, root);
        }
    }
}
