//! 批处理: 遍历 DICOM 目录树, 解析标注, 写入派生列, 渲染叠加图, 最后写出标注表.
//!
//! # 状态
//!
//! `Init -> Validating -> Traversing -> Finalizing -> Done`. 输入校验失败时为
//! `Validating -> Aborted`, 标注表写出失败时为 `Finalizing -> Aborted`.
//!
//! # 失败处理
//!
//! 单个切片的失败 (见 [`ErrorKind`]) 会被记录到 [`RunSummary::errors`] 后继续.
//! 写入派生列与渲染叠加图是同一次解析的两个独立副作用: 渲染失败不会撤销已写入的派生列.
//! 即使所有切片都失败, 最终的标注表仍然会被写出.

mod error;
mod summary;

pub use error::{ErrorKind, ItemError, RunError};
pub use summary::RunSummary;

use crate::consts::{DICOM_SUFFIX, UPDATED_TABLE_NAME};
use crate::dataset::{self, TreeLayout};
use crate::geometry::{transform, PixelGeometry};
use crate::render::{OverlayJob, OverlayRender, PngOverlay};
use crate::resolve::{resolve, DuplicatePolicy, Resolution};
use crate::table::{AnnotationTable, Derived, TableError};
use crate::{DicomDecoder, ImageSlice, SliceDecoder};
use itertools::Itertools;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 批处理所处的阶段.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RunPhase {
    /// 尚未开始.
    Init,
    /// 校验输入.
    Validating,
    /// 遍历切片.
    Traversing,
    /// 写出标注表.
    Finalizing,
    /// 已完成.
    Done,
    /// 因致命错误终止.
    Aborted,
}

/// 批处理配置.
///
/// ```
/// use lung_berry::prelude::*;
///
/// let config = RunConfig::new("dicom", "annotations.csv", "out")
///     .with_policy(DuplicatePolicy::First)
///     .with_overlays(false);
/// assert_eq!(config.layout(), TreeLayout::Recursive);
/// assert!(config.output_table().ends_with("updated_annotations.csv"));
/// ```
#[derive(Clone, Debug)]
pub struct RunConfig {
    root: PathBuf,
    table: PathBuf,
    output: PathBuf,
    policy: DuplicatePolicy,
    layout: TreeLayout,
    suffix: String,
    overlays: bool,
    output_name: String,
    parallel: bool,
}

impl RunConfig {
    /// 以默认设置创建配置: 重复标识符报错, 递归遍历, 后缀 `.dcm`, 渲染叠加图, 顺序执行.
    pub fn new<R, T, O>(root: R, table: T, output: O) -> Self
    where
        R: Into<PathBuf>,
        T: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        Self {
            root: root.into(),
            table: table.into(),
            output: output.into(),
            policy: DuplicatePolicy::default(),
            layout: TreeLayout::default(),
            suffix: DICOM_SUFFIX.to_string(),
            overlays: true,
            output_name: UPDATED_TABLE_NAME.to_string(),
            parallel: false,
        }
    }

    /// 设置重复标识符策略.
    #[inline]
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 设置目录树布局.
    #[inline]
    pub fn with_layout(mut self, layout: TreeLayout) -> Self {
        self.layout = layout;
        self
    }

    /// 设置图像文件后缀 (不区分大小写).
    #[inline]
    pub fn with_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// 是否渲染叠加图.
    #[inline]
    pub fn with_overlays(mut self, overlays: bool) -> Self {
        self.overlays = overlays;
        self
    }

    /// 设置输出标注表文件名.
    #[inline]
    pub fn with_output_name<S: Into<String>>(mut self, name: S) -> Self {
        self.output_name = name.into();
        self
    }

    /// 是否并行遍历. 需要 `rayon` feature, 否则退化为顺序遍历.
    #[inline]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// DICOM 根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 输入标注表路径.
    #[inline]
    pub fn table(&self) -> &Path {
        &self.table
    }

    /// 输出目录.
    #[inline]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// 重复标识符策略.
    #[inline]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// 目录树布局.
    #[inline]
    pub fn layout(&self) -> TreeLayout {
        self.layout
    }

    /// 图像文件后缀.
    #[inline]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// 是否渲染叠加图.
    #[inline]
    pub fn overlays(&self) -> bool {
        self.overlays
    }

    /// 是否并行遍历.
    #[inline]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// 输出标注表的完整路径.
    #[inline]
    pub fn output_table(&self) -> PathBuf {
        self.output.join(&self.output_name)
    }

    /// 源文件 `file` 的叠加图目录: 输出目录下, 与 `file` 相对根目录的父路径相同的目录.
    pub fn overlay_dir(&self, file: &Path) -> PathBuf {
        let parent = file.parent().unwrap_or(Path::new(""));
        match parent.strip_prefix(&self.root) {
            Ok(rel) => self.output.join(rel),
            Err(_) => self.output.clone(),
        }
    }
}

/// 单个文件的处理结果.
#[derive(Debug, Default)]
struct Outcome {
    processed: bool,
    matched: bool,
    updated: bool,
    rendered: bool,
    shadowed: usize,
    error: Option<ItemError>,
}

impl Outcome {
    fn fail(mut self, e: ItemError) -> Self {
        warn!("{e}");
        self.error = Some(e);
        self
    }
}

impl RunSummary {
    fn absorb(&mut self, o: Outcome) {
        self.processed += o.processed as usize;
        self.matched += o.matched as usize;
        self.updated += o.updated as usize;
        self.rendered += o.rendered as usize;
        self.duplicate_warnings += (o.shadowed > 0) as usize;
        self.errors.extend(o.error);
    }
}

fn lock(table: &Mutex<AnnotationTable>) -> MutexGuard<'_, AnnotationTable> {
    // 持锁期间不会 panic, 中毒的表内容仍然一致.
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 批处理器.
///
/// 图像解码与叠加图渲染分别通过 [`SliceDecoder`] 和 [`OverlayRender`] 完成,
/// 因此可以替换为任意实现. 并行遍历要求二者都是 `Sync`.
pub struct BatchRunner<D, R> {
    config: RunConfig,
    decoder: D,
    renderer: R,
    phase: RunPhase,
}

impl<D: SliceDecoder + Sync, R: OverlayRender + Sync> BatchRunner<D, R> {
    /// 创建批处理器.
    pub fn new(config: RunConfig, decoder: D, renderer: R) -> Self {
        Self {
            config,
            decoder,
            renderer,
            phase: RunPhase::Init,
        }
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// 当前阶段.
    #[inline]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!("{:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    /// 执行批处理. 每个批处理器只应运行一次.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        self.enter(RunPhase::Validating);
        let table = match self.validate() {
            Ok(t) => t,
            Err(e) => {
                self.enter(RunPhase::Aborted);
                return Err(e);
            }
        };

        self.enter(RunPhase::Traversing);
        let cfg = &self.config;
        info!(
            "Scanning `{}` ({} layout, `{}` files)",
            cfg.root().display(),
            cfg.layout(),
            cfg.suffix()
        );
        let walk = dataset::walk(cfg.root(), cfg.layout(), cfg.suffix());
        let mut summary = RunSummary {
            discovered: walk.files.len(),
            output_table: cfg.output_table(),
            ..Default::default()
        };
        summary.errors.extend(
            walk.unreadable
                .into_iter()
                .map(|(p, e)| ItemError::new(ErrorKind::IoFailure, p, None, e)),
        );
        info!("Found {} image files", summary.discovered);

        let table = Mutex::new(table);
        for outcome in self.process_all(&walk.files, &table) {
            summary.absorb(outcome);
        }
        summary.errors.sort_by(|a, b| a.path.cmp(&b.path));

        self.enter(RunPhase::Finalizing);
        let table = table.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Err(source) = table.save(&summary.output_table) {
            self.enter(RunPhase::Aborted);
            return Err(RunError::Persist {
                path: summary.output_table,
                source,
            });
        }
        info!(
            "Wrote `{}` ({} of {} rows resolved)",
            summary.output_table.display(),
            table.resolved_len(),
            table.len()
        );

        self.enter(RunPhase::Done);
        Ok(summary)
    }

    /// 校验输入, 加载标注表, 并创建输出目录.
    fn validate(&self) -> Result<AnnotationTable, RunError> {
        let cfg = &self.config;
        if !cfg.root().is_dir() {
            return Err(RunError::RootNotDir(cfg.root().to_owned()));
        }
        if !cfg.table().is_file() {
            return Err(RunError::TableNotFile(cfg.table().to_owned()));
        }
        let table = AnnotationTable::load(cfg.table()).map_err(|source| RunError::Table {
            path: cfg.table().to_owned(),
            source,
        })?;
        info!(
            "Loaded {} annotations ({} identifiers) from `{}`",
            table.len(),
            table.identifier_len(),
            cfg.table().display()
        );
        let dups = table.duplicates();
        if !dups.is_empty() {
            warn!(
                "{} identifiers appear more than once in the annotation table (policy: {}): {}{}",
                dups.len(),
                cfg.policy(),
                dups.iter().take(5).map(|(uid, n)| format!("`{uid}` x{n}")).join(", "),
                if dups.len() > 5 { ", ..." } else { "" }
            );
        }

        fs::create_dir_all(cfg.output()).map_err(|source| RunError::OutputDir {
            path: cfg.output().to_owned(),
            source,
        })?;
        Ok(table)
    }

    fn process_all(&self, files: &[PathBuf], table: &Mutex<AnnotationTable>) -> Vec<Outcome> {
        #[cfg(feature = "rayon")]
        {
            if self.config.parallel() {
                use rayon::prelude::*;
                info!("Traversing in parallel on {} threads", rayon::current_num_threads());
                return files.par_iter().map(|f| self.process(f, table)).collect();
            }
        }
        #[cfg(not(feature = "rayon"))]
        {
            if self.config.parallel() {
                warn!("Built without the `rayon` feature, traversing sequentially");
            }
        }
        files.iter().map(|f| self.process(f, table)).collect()
    }

    /// 处理单个文件. 切片在返回前释放.
    fn process(&self, path: &Path, table: &Mutex<AnnotationTable>) -> Outcome {
        debug!("Processing `{}`", path.display());
        let outcome = Outcome::default();
        let slice = match self.decoder.decode(path) {
            Ok(s) => s,
            Err(e) => return outcome.fail(ItemError::new(ErrorKind::DecodeFailure, path, None, e)),
        };
        let outcome = Outcome {
            processed: true,
            ..outcome
        };
        let (outcome, geometry) = match self.update(path, &slice, table, outcome) {
            (o, Some(g)) => (o, g),
            (o, None) => return o,
        };
        if !self.config.overlays() {
            return outcome;
        }
        self.render(path, &slice, geometry, outcome)
    }

    /// 解析、转换并写入派生列. 只有成功写入时返回几何结果.
    fn update(
        &self,
        path: &Path,
        slice: &ImageSlice,
        table: &Mutex<AnnotationTable>,
        mut outcome: Outcome,
    ) -> (Outcome, Option<PixelGeometry>) {
        let uid = slice.instance_uid();
        let item = |kind, e: &dyn ToString| ItemError::new(kind, path, Some(uid), e.to_string());

        let mut table = lock(table);
        let record = match resolve(&table, uid, self.config.policy()) {
            Ok(Resolution::Found { record, shadowed }) => {
                outcome.shadowed = shadowed;
                record
            }
            Ok(Resolution::NotFound) => {
                debug!("No annotation for `{uid}` (`{}`)", path.display());
                return (outcome, None);
            }
            Err(e) => return (outcome.fail(item(ErrorKind::DuplicateIdentifier, &e)), None),
        };
        outcome.matched = true;

        let key = record.key();
        let geometry = match record.norm_box().and_then(|b| transform(&b, slice.shape())) {
            Ok(g) => g,
            Err(e) => {
                let kind = if e.is_missing_field() {
                    ErrorKind::MissingField
                } else {
                    ErrorKind::InvalidGeometry
                };
                return (outcome.fail(item(kind, &e)), None);
            }
        };
        let derived = Derived {
            path: path.to_owned(),
            center: geometry.center,
        };
        if let Err(e) = table.upsert_derived(key, derived) {
            let kind = match e {
                TableError::AlreadyResolved { .. } => ErrorKind::DuplicateResolution,
                _ => ErrorKind::IoFailure,
            };
            return (outcome.fail(item(kind, &e)), None);
        }
        outcome.updated = true;
        debug!(
            "`{uid}`: bbox {:?}, center ({}, {})",
            geometry.bbox, geometry.center.x, geometry.center.y
        );
        (outcome, Some(geometry))
    }

    /// 在镜像目录中渲染叠加图.
    fn render(
        &self,
        path: &Path,
        slice: &ImageSlice,
        geometry: PixelGeometry,
        mut outcome: Outcome,
    ) -> Outcome {
        let uid = Some(slice.instance_uid());
        let dest = self.config.overlay_dir(path);
        if let Err(e) = fs::create_dir_all(&dest) {
            let msg = format!("cannot create `{}`: {e}", dest.display());
            return outcome.fail(ItemError::new(ErrorKind::IoFailure, path, uid, msg));
        }
        match self.renderer.render(&OverlayJob::from_slice(slice, geometry), &dest) {
            Ok(p) => {
                debug!("Saved overlay `{}`", p.display());
                outcome.rendered = true;
                outcome
            }
            Err(e) => outcome.fail(ItemError::new(ErrorKind::IoFailure, path, uid, e)),
        }
    }
}

/// 以默认配置 (DICOM 解码, PNG 叠加图) 运行批处理.
///
/// 等价于 `BatchRunner::new(RunConfig::new(root, table, output), DicomDecoder, PngOverlay::default()).run()`.
pub fn run<R, T, O>(root: R, table: T, output: O) -> Result<RunSummary, RunError>
where
    R: Into<PathBuf>,
    T: Into<PathBuf>,
    O: Into<PathBuf>,
{
    BatchRunner::new(
        RunConfig::new(root, table, output),
        DicomDecoder,
        PngOverlay::default(),
    )
    .run()
}
