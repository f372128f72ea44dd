//! 命令行工具依赖的通用组件.

use log::LevelFilter;
use simple_logger::SimpleLogger;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 初始化日志. 默认等级为 `Info`, `verbose` 时为 `Debug`.
/// 设置了 `RUST_LOG` 时以其为准.
pub fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("Logger already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpus() {
        assert!(cpus() >= 1);
    }
}
