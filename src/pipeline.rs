//! Batch Generation Pipeline
//!
//! One batch renders every participant of an event into a fresh timestamped
//! folder, then mirrors that folder into the backup store. Per-participant
//! failures are counted, never fatal.

use chrono::Local;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::WorkspaceConfig;
use crate::dates::{format_date_range, timestamp_now};
use crate::error::{CertError, CertResult, IoContext};
use crate::hashing::{digest_tree, sha256_file};
use crate::importer::{self, BootstrapPayload};
use crate::model::{EventHandle, EventMetadata, MetadataUpdate, SignatorySet};
use crate::render::{CertificateJob, CertificateRenderer, Renderer, TextRasterizer};
use crate::sanitize::{file_identifier, folder_identifier};
use crate::store::{CollisionPolicy, EventStore, FsEventStore};
use crate::templates::{TemplateImage, TemplateStore};
use crate::validation::ValidationViolation;

/// Inputs of one batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    /// Event identifier used to name the backup folder.
    pub event_name: &'a str,
    pub event: &'a EventMetadata,
    /// Names in input order; blank entries are skipped.
    pub participants: &'a [String],
    pub signatories: &'a SignatorySet,
    pub template: &'a TemplateImage,
    pub output_root: &'a Path,
    pub backup_root: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputArtifact {
    pub participant_name: String,
    pub path: PathBuf,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupOutcome {
    pub path: PathBuf,
    pub files: usize,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub timestamp: String,
    pub event: String,
    pub output_dir: PathBuf,
    pub participants: usize,
    pub generated: usize,
    /// Render failures plus skipped blank names.
    pub failed: usize,
    pub skipped: usize,
    pub artifacts: Vec<OutputArtifact>,
    pub backup: Option<BackupOutcome>,
    pub log: Vec<String>,
}

impl BatchSummary {
    /// Every input row became an artifact.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.generated == self.participants
    }
}

/// Human-readable progress lines, mirrored to `tracing`.
#[derive(Debug, Default)]
struct BatchLog {
    lines: Vec<String>,
}

impl BatchLog {
    fn info(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!("{msg}");
        self.push(msg);
    }

    fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!("{msg}");
        self.push(msg);
    }

    fn push(&mut self, msg: String) {
        self.lines.push(format!("[{}] {msg}", Local::now().format("%H:%M:%S")));
    }
}

/// Hands out unique file stems within one batch: `Ada`, `Ada_2`, `Ada_3`.
#[derive(Debug, Default)]
pub struct ArtifactNamer {
    used: HashSet<String>,
}

impl ArtifactNamer {
    pub fn claim(&mut self, stem: &str) -> String {
        if self.used.insert(stem.to_string()) {
            return stem.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{stem}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

pub struct BatchGenerator<R> {
    renderer: R,
}

impl<R: Renderer> BatchGenerator<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn generate(&self, request: &BatchRequest<'_>) -> CertResult<BatchSummary> {
        self.generate_at(request, &timestamp_now())
    }

    /// Run a batch stamped `timestamp`. Fails before writing anything if the
    /// event dates or identifier are invalid.
    #[tracing::instrument(skip_all, fields(event = %request.event_name, participants = request.participants.len()))]
    pub fn generate_at(&self, request: &BatchRequest<'_>, timestamp: &str) -> CertResult<BatchSummary> {
        let dates = format_date_range(&request.event.start_date, &request.event.end_date)?;
        let event_id = folder_identifier(request.event_name)?;

        let output_dir = unique_dir(&request.output_root.join(timestamp));
        fs::create_dir_all(&output_dir).io_context("create batch folder", &output_dir)?;

        let mut log = BatchLog::default();
        log.info(format!("Generating certificates → {}", output_dir.display()));

        let mut namer = ArtifactNamer::default();
        let mut artifacts = Vec::new();
        let mut generated = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for raw in request.participants {
            let name = raw.trim();
            if name.is_empty() {
                skipped += 1;
                log.info("Skipped empty name.");
                continue;
            }

            let stem = match file_identifier(name) {
                Ok(stem) => namer.claim(&stem),
                Err(e) => {
                    failed += 1;
                    log.warn(format!("[FAILED] {name}: {e}"));
                    continue;
                }
            };

            let job = CertificateJob {
                participant_name: name,
                event_title: &request.event.title,
                organization: &request.event.organization,
                date_sentence: &dates,
                signatories: request.signatories,
                file_stem: Some(&stem),
            };

            match self.renderer.render(request.template, &job, &output_dir) {
                Ok(path) => {
                    generated += 1;
                    log.info(format!("Generated: {}", path.display()));
                    let sha256 = match sha256_file(&path) {
                        Ok(hash) => Some(hash),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "could not hash artifact");
                            None
                        }
                    };
                    artifacts.push(OutputArtifact {
                        participant_name: name.to_string(),
                        path,
                        sha256,
                    });
                }
                Err(e) => {
                    failed += 1;
                    log.warn(format!("[FAILED] {name}: {e}"));
                }
            }
        }

        let folder = output_dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| timestamp.to_string());
        let backup_dir = request.backup_root.join(format!("backup_{event_id}_{folder}"));
        let backup = match mirror_backup(&output_dir, &backup_dir) {
            Ok(outcome) => {
                log.info(format!("Backup saved: {}", outcome.path.display()));
                Some(outcome)
            }
            Err(e) => {
                log.warn(format!("[WARN] Backup failed: {e}"));
                None
            }
        };

        log.info(format!("Done. Generated: {generated}, Failed/Skipped: {}", failed + skipped));

        Ok(BatchSummary {
            timestamp: timestamp.to_string(),
            event: event_id,
            output_dir,
            participants: request.participants.len(),
            generated,
            failed: failed + skipped,
            skipped,
            artifacts,
            backup,
            log: log.lines,
        })
    }
}

/// `base`, or `base_2`, `base_3`... when it already exists.
fn unique_dir(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let name = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = base.with_file_name(format!("{name}_{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Copy `source` byte-for-byte into a new `dest` folder and verify every digest.
pub fn mirror_backup(source: &Path, dest: &Path) -> CertResult<BackupOutcome> {
    if dest.exists() {
        return Err(CertError::Backup(format!("'{}' already exists", dest.display())));
    }

    let mut files = 0;
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| CertError::Backup(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| CertError::Backup(e.to_string()))?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).io_context("create backup folder", &target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).io_context("copy to backup", &target)?;
            files += 1;
        }
    }

    let verified = digest_tree(source)? == digest_tree(dest)?;
    if !verified {
        return Err(CertError::Backup(format!(
            "'{}' does not match '{}'",
            dest.display(),
            source.display()
        )));
    }

    Ok(BackupOutcome {
        path: dest.to_path_buf(),
        files,
        verified,
    })
}

/// Result of an all-in-one run: the persisted event, what the CSV held, and the batch.
#[derive(Debug, Clone, Serialize)]
pub struct AllInOneOutcome {
    pub event: EventHandle,
    pub payload: BootstrapPayload,
    pub template: PathBuf,
    pub summary: BatchSummary,
}

/// Stored state of one event, for display.
#[derive(Debug, Clone, Serialize)]
pub struct EventDetails {
    pub event: EventHandle,
    pub metadata: EventMetadata,
    /// Non-blank names in `participants.csv`; 0 before any import.
    pub participants: usize,
    /// Batch folder names under `certificates/`, oldest first.
    pub batches: Vec<String>,
}

/// Workspace-level entry point tying the stores to a batch generator.
pub struct CertificationPipeline<R = CertificateRenderer> {
    config: WorkspaceConfig,
    store: FsEventStore,
    templates: TemplateStore,
    generator: BatchGenerator<R>,
}

impl CertificationPipeline<CertificateRenderer> {
    /// Build the production renderer from the workspace fonts and print settings.
    pub fn open(config: WorkspaceConfig) -> Self {
        let text = TextRasterizer::new(config.font_family.clone(), &[config.fonts_path()]);
        let renderer = CertificateRenderer::new(text, config.print);
        Self::with_renderer(config, renderer)
    }
}

impl<R: Renderer> CertificationPipeline<R> {
    pub fn with_renderer(config: WorkspaceConfig, renderer: R) -> Self {
        Self {
            store: FsEventStore::new(config.events_path()),
            templates: TemplateStore::new(config.templates_path()),
            generator: BatchGenerator::new(renderer),
            config,
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn store(&self) -> &FsEventStore {
        &self.store
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn create_event(&self, metadata: &EventMetadata, policy: CollisionPolicy) -> CertResult<EventHandle> {
        self.store.create(metadata, policy)
    }

    pub fn import_participants(&self, event_name: &str, csv_path: &Path) -> CertResult<usize> {
        let event = self.store.open(event_name)?;
        importer::import_participants(&self.store, &event, csv_path)
    }

    pub fn show_event(&self, event_name: &str) -> CertResult<EventDetails> {
        let event = self.store.open(event_name)?;
        let metadata = self.store.load_metadata(&event);
        let participants = if event.participants_path().exists() {
            self.store
                .load_participants(&event)?
                .iter()
                .filter(|name| !name.is_empty())
                .count()
        } else {
            0
        };

        let mut batches = vec![];
        let certificates = event.certificates_dir();
        if certificates.is_dir() {
            for entry in fs::read_dir(&certificates).io_context("read certificates folder", &certificates)? {
                let entry = entry.io_context("read certificates folder", &certificates)?;
                if entry.path().is_dir() {
                    batches.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        batches.sort();

        Ok(EventDetails {
            event,
            metadata,
            participants,
            batches,
        })
    }

    /// Replace the stored organization and dates, validated before writing.
    /// Returns the metadata now on disk.
    pub fn update_event(&self, event_name: &str, update: &MetadataUpdate) -> CertResult<EventMetadata> {
        let event = self.store.open(event_name)?;
        let metadata = update.apply(self.store.load_metadata(&event));
        if !update.is_empty() {
            self.store.save_metadata(&event, &metadata)?;
            tracing::info!(event = %event.folder, "event metadata updated");
        }
        Ok(metadata)
    }

    /// Generate certificates for a stored event. An unresolvable template hint
    /// falls back to the blank canvas.
    pub fn generate(
        &self,
        event_name: &str,
        signatories: &SignatorySet,
        template_hint: Option<&str>,
    ) -> CertResult<BatchSummary> {
        let event = self.store.open(event_name)?;
        let template = template_hint.and_then(|hint| {
            let resolved = self.templates.resolve(hint);
            if resolved.is_none() {
                tracing::warn!(hint, "template not found");
            }
            resolved
        });
        self.generate_for(&event, signatories, template.as_deref())
    }

    fn generate_for(
        &self,
        event: &EventHandle,
        signatories: &SignatorySet,
        template: Option<&Path>,
    ) -> CertResult<BatchSummary> {
        let metadata = self.store.load_metadata(event);
        let participants = self.store.load_participants(event)?;
        let template = self.templates.load(template);
        let output_root = event.certificates_dir();
        let backup_root = self.config.backups_path();

        self.generator.generate(&BatchRequest {
            event_name: &event.folder,
            event: &metadata,
            participants: &participants,
            signatories,
            template: &template,
            output_root: &output_root,
            backup_root: &backup_root,
        })
    }

    /// Bootstrap an event from one CSV and generate its certificates.
    ///
    /// `template_hint` overrides the CSV's `template_file`. With neither
    /// resolving, nothing is written. `signatures` attach images by signatory name.
    pub fn all_in_one(
        &self,
        csv_path: &Path,
        policy: CollisionPolicy,
        template_hint: Option<&str>,
        signatures: &[(String, PathBuf)],
    ) -> CertResult<AllInOneOutcome> {
        let mut payload = importer::parse_all_in_one(csv_path, &self.templates)?;

        let template = template_hint
            .and_then(|hint| self.templates.resolve(hint))
            .or_else(|| payload.template.clone())
            .ok_or_else(|| {
                ValidationViolation::new("template", "No template resolved. Supply one explicitly.")
                    .actual(template_hint.or(payload.template_hint.as_deref()).unwrap_or_default())
            })?;

        for (name, path) in signatures {
            if !payload.signatories.attach_signature(name, path) {
                tracing::warn!(signatory = %name, "signature given for unknown signatory");
            }
        }

        let event = self.store.bootstrap(&payload, policy)?;
        let summary = self.generate_for(&event, &payload.signatories, Some(&template))?;

        Ok(AllInOneOutcome {
            event,
            payload,
            template,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Signatory;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Writes a tiny file per participant and records the call order.
    #[derive(Default)]
    struct RecordingRenderer {
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, _t: &TemplateImage, job: &CertificateJob<'_>, dir: &Path) -> CertResult<PathBuf> {
            self.calls.borrow_mut().push(job.participant_name.to_string());
            if self.fail_on == Some(job.participant_name) {
                return Err(CertError::render(job.participant_name, "boom"));
            }
            let path = dir.join(format!("{}.pdf", job.file_stem.unwrap_or(job.participant_name)));
            fs::write(&path, job.participant_name).io_context("write", &path)?;
            Ok(path)
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(renderer: RecordingRenderer, participants: &[String], dir: &TempDir) -> (BatchSummary, RecordingRenderer) {
        let generator = BatchGenerator::new(renderer);
        let event = EventMetadata::new("Expo").with_dates("2025-01-01", "2025-01-03");
        let sigs = SignatorySet::new(vec![Signatory::new("A", "B")]).unwrap();
        let template = TemplateImage::blank();
        let out = dir.path().join("certs");
        let backups = dir.path().join("backups");
        let summary = generator
            .generate_at(
                &BatchRequest {
                    event_name: "Expo",
                    event: &event,
                    participants,
                    signatories: &sigs,
                    template: &template,
                    output_root: &out,
                    backup_root: &backups,
                },
                "20250101_120000",
            )
            .unwrap();
        (summary, generator.renderer)
    }

    #[test]
    fn namer_suffixes_duplicates() {
        let mut namer = ArtifactNamer::default();
        assert_eq!(namer.claim("Ada"), "Ada");
        assert_eq!(namer.claim("Ada"), "Ada_2");
        assert_eq!(namer.claim("Ada"), "Ada_3");
        assert_eq!(namer.claim("Bob"), "Bob");
    }

    #[test]
    fn blanks_are_skipped_without_rendering() {
        let dir = TempDir::new().unwrap();
        let (summary, renderer) = run(RecordingRenderer::default(), &names(&["Ada", "  ", "Bob"]), &dir);
        assert_eq!(*renderer.calls.borrow(), vec!["Ada", "Bob"]);
        assert_eq!(summary.generated, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_complete());
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let renderer = RecordingRenderer { fail_on: Some("Bob"), ..Default::default() };
        let (summary, renderer) = run(renderer, &names(&["Ada", "Bob", "Cy"]), &dir);
        assert_eq!(renderer.calls.borrow().len(), 3);
        assert_eq!((summary.generated, summary.failed), (2, 1));
        assert!(summary.log.iter().any(|l| l.contains("[FAILED] Bob")));
        assert!(summary.log.iter().all(|l| l.starts_with('[')));
    }

    #[test]
    fn second_batch_in_same_second_gets_its_own_folder() {
        let dir = TempDir::new().unwrap();
        let (first, _) = run(RecordingRenderer::default(), &names(&["Ada"]), &dir);
        let (second, _) = run(RecordingRenderer::default(), &names(&["Ada"]), &dir);
        assert_ne!(first.output_dir, second.output_dir);
        assert!(second.output_dir.ends_with("20250101_120000_2"));
        assert!(second.backup.unwrap().path.ends_with("backup_Expo_20250101_120000_2"));
    }

    #[test]
    fn invalid_dates_abort_before_writing() {
        let dir = TempDir::new().unwrap();
        let generator = BatchGenerator::new(RecordingRenderer::default());
        let event = EventMetadata::new("Expo").with_dates("2025-13-01", "");
        let sigs = SignatorySet::new(vec![Signatory::new("A", "B")]).unwrap();
        let template = TemplateImage::blank();
        let out = dir.path().join("certs");
        let err = generator
            .generate(&BatchRequest {
                event_name: "Expo",
                event: &event,
                participants: &names(&["Ada"]),
                signatories: &sigs,
                template: &template,
                output_root: &out,
                backup_root: dir.path(),
            })
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!out.exists());
    }

    #[test]
    fn backup_failure_only_warns() {
        let dir = TempDir::new().unwrap();
        // A plain file where the backup folder should go.
        fs::write(dir.path().join("backups"), b"x").unwrap();

        let (summary, _) = run(RecordingRenderer::default(), &names(&["Ada", "Bob"]), &dir);
        assert!(summary.backup.is_none());
        assert_eq!((summary.generated, summary.failed, summary.skipped), (2, 0, 0));
        assert!(summary.is_complete());
        assert_eq!(summary.artifacts.len(), 2);
        assert!(summary.artifacts.iter().all(|a| a.path.exists()));
        assert!(summary.log.iter().any(|l| l.contains("[WARN] Backup failed")));
    }

    #[test]
    fn backup_refuses_existing_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.pdf"), b"a").unwrap();
        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        assert!(matches!(mirror_backup(&src, &dest), Err(CertError::Backup(_))));
    }
}
