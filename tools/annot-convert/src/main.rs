//! 将 NLST 嵌套 JSON 标注展平为 CSV 标注表.
//!
//! ```text
//! annot-convert <JSON_PATH> <CSV_PATH>
//! ```

use clap::Parser;
use lung_berry::convert::convert_json_to_csv;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "annot-convert", version)]
#[command(about = "Convert nested NLST annotation JSON to a flat CSV table")]
struct Cli {
    /// 输入 JSON 文件.
    json_path: PathBuf,

    /// 输出 CSV 文件. 已存在时覆盖.
    csv_path: PathBuf,

    /// 输出调试日志.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    utils::init_logger(cli.verbose);

    match convert_json_to_csv(&cli.json_path, &cli.csv_path) {
        Ok(rows) => {
            log::info!(
                "Converted `{}` to `{}` ({rows} rows)",
                cli.json_path.display(),
                cli.csv_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
