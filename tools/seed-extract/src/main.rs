//! 在 DICOM 目录树中定位带标注的切片, 计算种子点, 渲染叠加图并输出增补后的标注表.
//!
//! ```text
//! seed-extract <ROOT_DIRECTORY> <ANNOTATION_CSV_PATH> <OUTPUT_DIRECTORY>
//! ```
//!
//! 退出码: 0 成功; 2 命令行参数错误; 3 输入校验失败; 4 输出写入失败.

use clap::Parser;
use lung_berry::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "seed-extract", version)]
#[command(about = "Extract lung nodule seed points from annotated DICOM slices")]
struct Cli {
    /// DICOM 根目录.
    root_directory: PathBuf,

    /// 标注表 (CSV), 至少含 `Instance UID, x, y, width, height` 列.
    annotation_csv_path: PathBuf,

    /// 输出目录. 叠加图与 `updated_annotations.csv` 写在这里.
    output_directory: PathBuf,

    /// 重复标识符策略: first, last 或 error.
    #[arg(long, default_value_t = DuplicatePolicy::Error)]
    policy: DuplicatePolicy,

    /// 目录树布局: recursive 或 structured (sub-*/ses-*/ser-*).
    #[arg(long, default_value_t = TreeLayout::Recursive)]
    layout: TreeLayout,

    /// 只计算标注表, 不渲染叠加图.
    #[arg(long)]
    no_overlay: bool,

    /// 并行遍历切片.
    #[arg(long)]
    parallel: bool,

    /// 使用 opencv 渲染叠加图.
    #[cfg(feature = "plot")]
    #[arg(long)]
    opencv: bool,

    /// 输出调试日志.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> RunConfig {
        RunConfig::new(
            &self.root_directory,
            &self.annotation_csv_path,
            &self.output_directory,
        )
        .with_policy(self.policy)
        .with_layout(self.layout)
        .with_overlays(!self.no_overlay)
        .with_parallel(self.parallel)
    }

    fn execute(&self) -> Result<RunSummary, RunError> {
        #[cfg(feature = "plot")]
        {
            if self.opencv {
                return BatchRunner::new(self.config(), DicomDecoder, OpencvOverlay).run();
            }
        }
        BatchRunner::new(self.config(), DicomDecoder, PngOverlay::default()).run()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    utils::init_logger(cli.verbose);

    log::info!("DICOM root: {}", cli.root_directory.display());
    log::info!("Annotations: {}", cli.annotation_csv_path.display());
    log::info!("Output: {}", cli.output_directory.display());
    if cli.parallel {
        log::info!("Parallel traversal on up to {} cores", utils::cpus());
    }

    match cli.execute() {
        Ok(summary) => {
            utils::sep();
            println!("{summary}");
            utils::sep();
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
