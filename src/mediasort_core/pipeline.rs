use crate::mediasort_core::convert::ConversionService;
use crate::mediasort_core::date::DateResolver;
use crate::mediasort_core::decode::DecodeService;
use crate::mediasort_core::error::{MediaSortError, Result};
use crate::mediasort_core::media::{MediaItem, Stage};
use crate::mediasort_core::metadata::MetadataProvider;
use crate::mediasort_core::naming::{place, NameBuilder, PlaceError};
use crate::mediasort_core::phash::average_hash;
use crate::mediasort_core::registry::{Classification, DuplicateRegistry};
use crate::mediasort_core::scan::list_files;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REPORT_NAME: &str = "hash.txt";

/// Settings for one run of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Archive root; files land in `<target_root>/<year>/<month>/`.
    pub target_root: PathBuf,
    /// Report file name inside `target_root`.
    pub report_name: String,
    /// Resolve names and hashes but leave every file where it is.
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn new(target_root: &Path) -> Self {
        PipelineConfig {
            target_root: target_root.to_path_buf(),
            report_name: DEFAULT_REPORT_NAME.to_string(),
            dry_run: false,
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.target_root.join(&self.report_name)
    }
}

/// Counts from a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub archived: usize,
    pub duplicates: usize,
    pub collisions: usize,
    pub unsupported: usize,
    pub failed: usize,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files archived ({} duplicates, {} renamed on collision), {} unsupported, {} failed",
            self.archived, self.duplicates, self.collisions, self.unsupported, self.failed
        )
    }
}

/// Takes media files one at a time from metadata to their archive location.
///
/// The pipeline owns the duplicate registry, so the order files are fed in
/// decides which copy of a picture becomes the canonical one.
pub struct MediaPipeline {
    config: PipelineConfig,
    metadata: Box<dyn MetadataProvider>,
    converter: Box<dyn ConversionService>,
    decoder: Box<dyn DecodeService>,
    names: NameBuilder,
    registry: DuplicateRegistry,
}

impl MediaPipeline {
    pub fn new(
        config: PipelineConfig,
        metadata: Box<dyn MetadataProvider>,
        converter: Box<dyn ConversionService>,
        decoder: Box<dyn DecodeService>,
    ) -> Self {
        let names = NameBuilder::new(&config.target_root);
        MediaPipeline {
            config,
            metadata,
            converter,
            decoder,
            names,
            registry: DuplicateRegistry::new(),
        }
    }

    pub fn registry(&self) -> &DuplicateRegistry {
        &self.registry
    }

    /// Process every file under `input_dir`, then append the hash report.
    ///
    /// A failing file is logged and skipped; only traversal and report
    /// errors abort the run.
    pub fn run(&mut self, input_dir: &Path) -> Result<RunStats> {
        let files = list_files(input_dir, Some(self.config.target_root.as_path()))?;
        log::info!(
            "Processing {} files from {}",
            files.len(),
            input_dir.display()
        );

        if !self.config.dry_run {
            fs::create_dir_all(&self.config.target_root)?;
        }

        let bar_style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(files.len() as u64).with_style(bar_style);
        bar.set_message("Sorting media");

        let mut stats = RunStats::default();

        for path in files {
            bar.inc(1);

            let mut item = match MediaItem::new(&path) {
                Ok(item) => item,
                Err(e) => {
                    log::warn!("{}", e);
                    stats.unsupported += 1;
                    continue;
                }
            };

            match self.process(&mut item) {
                Ok(destination) => {
                    log::info!("{} -> {}", path.display(), destination.display());
                    stats.archived += 1;
                    if item.is_duplicate {
                        stats.duplicates += 1;
                    }
                    if item.used_fallback_name {
                        stats.collisions += 1;
                    }
                }
                Err(e) => {
                    log::error!("Failed to process {}: {}", path.display(), e);
                    stats.failed += 1;
                }
            }
        }

        bar.finish_with_message("Done");

        if self.config.dry_run {
            log::info!("[DRY RUN] Skipping hash report");
        } else {
            self.registry.write_report(&self.config.report_path())?;
        }

        log::info!("Run complete: {}", stats);
        Ok(stats)
    }

    /// Take one item through every stage. On error the item is marked `Failed`
    /// and its file is left at its original path.
    pub fn process(&mut self, item: &mut MediaItem) -> Result<PathBuf> {
        match self.run_stages(item) {
            Ok(destination) => {
                item.advance(Stage::Done);
                Ok(destination)
            }
            Err(e) => {
                item.advance(Stage::Failed);
                Err(e)
            }
        }
    }

    fn run_stages(&mut self, item: &mut MediaItem) -> Result<PathBuf> {
        log::debug!("Processing {} ({})", item, item.kind);

        item.metadata = self.metadata.extract(&item.source_path)?;
        item.advance(Stage::MetadataExtracted);

        let resolved = DateResolver::resolve(&item.metadata, &item.source_path)?;
        log::debug!(
            "{}: date {} -> base name {}",
            item,
            resolved.date_value,
            resolved.base_name
        );
        item.date_value = resolved.date_value;
        item.base_name = resolved.base_name;
        item.year = resolved.year;
        item.month = resolved.month;
        item.advance(Stage::DateResolved);

        let converted = if item.needs_conversion() {
            match self.converter.convert(&item.source_path) {
                Ok(copy) => {
                    item.working_path = copy.path().to_path_buf();
                    item.advance(Stage::Converted);
                    Some(copy)
                }
                Err(e) => {
                    log::warn!("{}; decoding the original instead", e);
                    None
                }
            }
        } else {
            None
        };

        let classified = self.hash_and_classify(item);

        if let Some(copy) = converted {
            drop(copy);
            item.working_path = item.source_path.clone();
        }

        let class = classified?;
        item.advance(Stage::Closed);

        item.is_duplicate = matches!(class, Classification::Duplicate(_));
        if let Classification::Duplicate(count) = class {
            item.copy_count = count;
        }
        item.new_file = NameBuilder::file_name(&item.base_name, &item.extension, class);

        if self.config.dry_run {
            let destination = self.names.destination(&item.year, &item.month, &item.new_file);
            log::info!(
                "[DRY RUN] Would move {} -> {}",
                item,
                destination.display()
            );
            item.destination = Some(destination.clone());
            return Ok(destination);
        }

        let destination = self.move_into_archive(item)?;
        item.destination = Some(destination.clone());
        item.advance(Stage::Renamed);
        Ok(destination)
    }

    /// Decode the item's frame, hash it and record it in the registry.
    /// The frame is released when this returns, whatever the outcome.
    fn hash_and_classify(&mut self, item: &mut MediaItem) -> Result<Classification> {
        let frame = self.decoder.open(&item.working_path, item.frame_source)?;
        item.advance(Stage::Opened);

        let hash = average_hash(frame.image()).to_hex();
        log::debug!("{}: hash {}", item, hash);

        let class = self.registry.classify(&hash, &item.base_name);
        item.hash = Some(hash);
        item.advance(Stage::Hashed);
        Ok(class)
    }

    fn move_into_archive(&mut self, item: &mut MediaItem) -> Result<PathBuf> {
        let month_dir = self.names.ensure_month_dir(&item.year, &item.month)?;
        let destination = month_dir.join(&item.new_file);

        match place(&item.working_path, &destination) {
            Ok(path) => return Ok(path),
            Err(PlaceError::Io(e)) => return Err(e.into()),
            Err(PlaceError::Collision(taken)) => {
                log::warn!(
                    "{} already exists, falling back to a hash-suffixed name",
                    taken.display()
                );
            }
        }

        let hash = item.hash.clone().unwrap_or_default();
        item.new_file =
            NameBuilder::fallback_file_name(&item.base_name, &item.extension, item.copy_count, &hash);
        item.used_fallback_name = true;
        let fallback = month_dir.join(&item.new_file);

        match place(&item.working_path, &fallback) {
            Ok(path) => Ok(path),
            Err(PlaceError::Collision(taken)) => Err(MediaSortError::DestinationCollision(taken)),
            Err(PlaceError::Io(e)) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediasort_core::convert::ConvertedCopy;
    use crate::mediasort_core::decode::DecodedFrame;
    use crate::mediasort_core::media::FrameSource;
    use crate::mediasort_core::metadata::MetadataMapping;
    use crate::mediasort_core::naming::HASH_SUFFIX_LEN;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
    use std::collections::HashMap;

    /// Serves a capture date per file name; names listed in `broken` fail.
    struct StubMetadata {
        dates: HashMap<String, String>,
        broken: Vec<String>,
    }

    impl StubMetadata {
        fn new(dates: &[(&str, &str)]) -> Self {
            StubMetadata {
                dates: dates
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                broken: Vec::new(),
            }
        }
    }

    impl MetadataProvider for StubMetadata {
        fn extract(&mut self, path: &Path) -> Result<MetadataMapping> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if self.broken.contains(&name) {
                return Err(MediaSortError::MetadataExtraction {
                    path: path.to_path_buf(),
                    reason: "stub failure".to_string(),
                });
            }
            Ok(self
                .dates
                .get(&name)
                .map(|d| [("DateTimeOriginal", d.as_str())].into_iter().collect())
                .unwrap_or_default())
        }
    }

    /// "converts" by copying the file into its scratch location.
    struct CopyConverter;

    impl ConversionService for CopyConverter {
        fn convert(&self, path: &Path) -> Result<ConvertedCopy> {
            let copy = ConvertedCopy::reserve(path)?;
            fs::copy(path, copy.path())?;
            Ok(copy)
        }
    }

    struct FailingConverter;

    impl ConversionService for FailingConverter {
        fn convert(&self, path: &Path) -> Result<ConvertedCopy> {
            Err(MediaSortError::Conversion {
                path: path.to_path_buf(),
                reason: "stub failure".to_string(),
            })
        }
    }

    /// Picks a synthetic frame from the file's text content.
    struct PatternDecoder;

    fn pattern(vertical: bool) -> DynamicImage {
        let img: RgbImage = ImageBuffer::from_fn(32, 32, |x, y| {
            let bright = if vertical { x < 16 } else { y < 16 };
            if bright { Rgb([230, 230, 230]) } else { Rgb([20, 20, 20]) }
        });
        DynamicImage::ImageRgb8(img)
    }

    impl DecodeService for PatternDecoder {
        fn open(&self, path: &Path, _source: FrameSource) -> Result<DecodedFrame> {
            let content = fs::read_to_string(path)?;
            match content.trim() {
                "A" => Ok(DecodedFrame::new(path, pattern(true))),
                "B" => Ok(DecodedFrame::new(path, pattern(false))),
                other => Err(MediaSortError::Decode {
                    path: path.to_path_buf(),
                    reason: format!("unknown pattern {:?}", other),
                }),
            }
        }
    }

    fn pipeline_with(
        target: &Path,
        metadata: StubMetadata,
        converter: Box<dyn ConversionService>,
    ) -> MediaPipeline {
        MediaPipeline::new(
            PipelineConfig::new(target),
            Box::new(metadata),
            converter,
            Box::new(PatternDecoder),
        )
    }

    fn pipeline(target: &Path, metadata: StubMetadata) -> MediaPipeline {
        pipeline_with(target, metadata, Box::new(CopyConverter))
    }

    #[test]
    fn test_duplicates_are_numbered() {
        let temp = TempDir::new().unwrap();
        let input = temp.child("input");
        input.child("a.jpg").write_str("A").unwrap();
        input.child("b.jpg").write_str("A").unwrap();
        input.child("c.jpg").write_str("A").unwrap();
        let target = temp.path().join("results");

        let meta = StubMetadata::new(&[
            ("a.jpg", "2020:01:15 10:00:00"),
            ("b.jpg", "2020:01:16 10:00:00"),
            ("c.jpg", "2020:01:17 10:00:00"),
        ]);
        let mut pipeline = pipeline(&target, meta);
        let stats = pipeline.run(input.path()).unwrap();

        assert_eq!(stats.archived, 3);
        assert_eq!(stats.duplicates, 2);
        assert!(target.join("2020/01/20200115_100000.jpg").is_file());
        assert!(target.join("2020/01/20200116_100000_copy1.jpg").is_file());
        assert!(target.join("2020/01/20200117_100000_copy2.jpg").is_file());

        assert_eq!(pipeline.registry().len(), 1);
        let entry = &pipeline.registry().entries()[0];
        assert_eq!(entry.count, 2);
        assert_eq!(entry.canonical_name, "20200115_100000");

        let report = fs::read_to_string(target.join("hash.txt")).unwrap();
        assert_eq!(report.trim(), format!("20200115_100000 : {} : 2", entry.hash));
    }

    #[test]
    fn test_distinct_content_gets_two_entries() {
        let temp = TempDir::new().unwrap();
        let input = temp.child("input");
        input.child("a.jpg").write_str("A").unwrap();
        input.child("b.png").write_str("B").unwrap();
        let target = temp.path().join("results");

        let meta = StubMetadata::new(&[
            ("a.jpg", "2020:01:15 10:00:00"),
            ("b.png", "2021:02:01 08:00:00"),
        ]);
        let mut pipeline = pipeline(&target, meta);
        let stats = pipeline.run(input.path()).unwrap();

        assert_eq!(stats.duplicates, 0);
        assert_eq!(pipeline.registry().len(), 2);
        assert!(target.join("2020/01/20200115_100000.jpg").is_file());
        assert!(target.join("2021/02/20210201_080000.png").is_file());
    }

    #[test]
    fn test_metadata_failure_skips_only_that_item() {
        let temp = TempDir::new().unwrap();
        let input = temp.child("input");
        input.child("bad.jpg").write_str("A").unwrap();
        input.child("good.jpg").write_str("B").unwrap();
        let target = temp.path().join("results");

        let mut meta = StubMetadata::new(&[("good.jpg", "2020:03:01 00:00:00")]);
        meta.broken.push("bad.jpg".to_string());
        let mut pipeline = pipeline(&target, meta);
        let stats = pipeline.run(input.path()).unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.archived, 1);
        assert!(input.child("bad.jpg").path().is_file());
        assert!(target.join("2020/03/20200301_000000.jpg").is_file());
    }

    #[test]
    fn test_failed_item_stays_in_place() {
        let temp = TempDir::new().unwrap();
        let source = temp.child("broken.jpg");
        source.write_str("garbage").unwrap();
        let target = temp.path().join("results");

        let meta = StubMetadata::new(&[("broken.jpg", "2020:03:01 00:00:00")]);
        let mut pipeline = pipeline(&target, meta);
        let mut item = MediaItem::new(source.path()).unwrap();

        let result = pipeline.process(&mut item);
        assert!(matches!(result, Err(MediaSortError::Decode { .. })));
        assert_eq!(item.stage, Stage::Failed);
        assert!(source.path().is_file());
        assert!(!target.join("2020").exists());
    }

    #[test]
    fn test_unsupported_files_are_counted() {
        let temp = TempDir::new().unwrap();
        let input = temp.child("input");
        input.child("notes.txt").write_str("hello").unwrap();
        let target = temp.path().join("results");

        let mut pipeline = pipeline(&target, StubMetadata::new(&[]));
        let stats = pipeline.run(input.path()).unwrap();
        assert_eq!(stats.unsupported, 1);
        assert!(input.child("notes.txt").path().is_file());
    }

    #[test]
    fn test_converted_copy_is_removed_and_original_archived() {
        let temp = TempDir::new().unwrap();
        let source = temp.child("IMG_0001.heic");
        source.write_str("A").unwrap();
        let target = temp.path().join("results");

        let meta = StubMetadata::new(&[("IMG_0001.heic", "2019:12:31 23:59:59")]);
        let mut pipeline = pipeline(&target, meta);
        let mut item = MediaItem::new(source.path()).unwrap();

        let destination = pipeline.process(&mut item).unwrap();
        assert_eq!(destination, target.join("2019/12/20191231_235959.heic"));
        assert!(destination.is_file());
        assert!(!temp.child("IMG_0001.heic.jpg").path().exists());
        assert!(!source.path().exists());
        assert_eq!(item.working_path, item.source_path);
        assert_eq!(item.stage, Stage::Done);
    }

    #[test]
    fn test_conversion_keeps_neighbouring_jpeg() {
        let temp = TempDir::new().unwrap();
        let input = temp.child("input");
        input.child("IMG.heic").write_str("A").unwrap();
        input.child("IMG.heic.jpg").write_str("B").unwrap();
        let target = temp.path().join("results");

        let meta = StubMetadata::new(&[
            ("IMG.heic", "2020:01:15 00:00:00"),
            ("IMG.heic.jpg", "2020:01:16 00:00:00"),
        ]);
        let mut pipeline = pipeline(&target, meta);
        let stats = pipeline.run(input.path()).unwrap();

        assert_eq!(stats.archived, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(
            fs::read_to_string(target.join("2020/01/20200115_000000.heic")).unwrap(),
            "A"
        );
        assert_eq!(
            fs::read_to_string(target.join("2020/01/20200116_000000.jpg")).unwrap(),
            "B"
        );
    }

    #[test]
    fn test_conversion_failure_falls_back_to_original() {
        let temp = TempDir::new().unwrap();
        let source = temp.child("IMG_0002.heic");
        source.write_str("B").unwrap();
        let target = temp.path().join("results");

        let meta = StubMetadata::new(&[("IMG_0002.heic", "2019:12:31 23:59:59")]);
        let mut pipeline = pipeline_with(&target, meta, Box::new(FailingConverter));
        let mut item = MediaItem::new(source.path()).unwrap();

        let destination = pipeline.process(&mut item).unwrap();
        assert!(destination.is_file());
        assert_eq!(destination.file_name().unwrap(), "20191231_235959.heic");
    }

    #[test]
    fn test_collision_uses_hash_suffix() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("results");
        let taken = target.join("2020/01/20200115_100000.jpg");
        fs::create_dir_all(taken.parent().unwrap()).unwrap();
        fs::write(&taken, "from an earlier run").unwrap();

        let source = temp.child("a.jpg");
        source.write_str("A").unwrap();

        let meta = StubMetadata::new(&[("a.jpg", "2020:01:15 10:00:00")]);
        let mut pipeline = pipeline(&target, meta);
        let mut item = MediaItem::new(source.path()).unwrap();

        let destination = pipeline.process(&mut item).unwrap();
        let hash = item.hash.clone().unwrap();
        assert_eq!(
            destination.file_name().unwrap().to_string_lossy(),
            format!("20200115_100000_copy0_{}.jpg", &hash[..HASH_SUFFIX_LEN])
        );
        assert!(item.used_fallback_name);
        assert_eq!(fs::read_to_string(&taken).unwrap(), "from an earlier run");
    }

    #[test]
    fn test_second_collision_fails_item() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("results");
        let month = target.join("2020/01");
        fs::create_dir_all(&month).unwrap();

        let source = temp.child("a.jpg");
        source.write_str("A").unwrap();
        let hash = average_hash(&pattern(true)).to_hex();
        fs::write(month.join("20200115_100000.jpg"), "x").unwrap();
        fs::write(
            month.join(NameBuilder::fallback_file_name("20200115_100000", "jpg", 0, &hash)),
            "y",
        )
        .unwrap();

        let meta = StubMetadata::new(&[("a.jpg", "2020:01:15 10:00:00")]);
        let mut pipeline = pipeline(&target, meta);
        let mut item = MediaItem::new(source.path()).unwrap();

        let result = pipeline.process(&mut item);
        assert!(matches!(result, Err(MediaSortError::DestinationCollision(_))));
        assert!(source.path().is_file());
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let temp = TempDir::new().unwrap();
        let input = temp.child("input");
        input.child("a.jpg").write_str("A").unwrap();
        let target = temp.path().join("results");

        let mut config = PipelineConfig::new(&target);
        config.dry_run = true;
        let mut pipeline = MediaPipeline::new(
            config,
            Box::new(StubMetadata::new(&[("a.jpg", "2020:01:15 10:00:00")])),
            Box::new(CopyConverter),
            Box::new(PatternDecoder),
        );

        let stats = pipeline.run(input.path()).unwrap();
        assert_eq!(stats.archived, 1);
        assert!(input.child("a.jpg").path().is_file());
        assert!(!target.exists());
    }

    #[test]
    fn test_missing_date_uses_filesystem_time() {
        let temp = TempDir::new().unwrap();
        let source = temp.child("undated.jpg");
        source.write_str("A").unwrap();
        let target = temp.path().join("results");

        let mut pipeline = pipeline(&target, StubMetadata::new(&[]));
        let mut item = MediaItem::new(source.path()).unwrap();
        let destination = pipeline.process(&mut item).unwrap();

        assert!(destination.is_file());
        assert_eq!(item.base_name.len(), 15);
        assert!(destination.starts_with(target.join(&item.year).join(&item.month)));
    }
}
