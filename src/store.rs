//! Event Store - folder-keyed persistence for events
//!
//! Every event is one directory under `events/`, named by the sanitized
//! title. Callers only ever hold an `EventHandle`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dates::timestamp_now;
use crate::error::{CertError, CertResult, IoContext};
use crate::importer::{CsvTable, CLASSIC_COLUMNS, NAME_COLUMN};
use crate::importer::BootstrapPayload;
use crate::model::{EventHandle, EventMetadata, Participant};
use crate::sanitize::folder_identifier;
use crate::validation::{ValidationViolation, Validator};

/// What to do when the sanitized folder of a new event already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Refuse to create the event.
    #[default]
    Fail,
    /// Reuse the folder, replacing `event.json` and `participants.csv`.
    Overwrite,
    /// Create `<folder>_<YYYYMMDD_HHMMSS>` instead, suffixed `_2`, `_3`, ...
    /// when that folder is taken as well.
    Timestamped,
}

pub trait EventStore {
    fn create(&self, metadata: &EventMetadata, policy: CollisionPolicy) -> CertResult<EventHandle>;

    /// Look an event up by its title or folder name.
    fn open(&self, name: &str) -> CertResult<EventHandle>;

    fn list(&self) -> CertResult<Vec<String>>;

    fn delete(&self, name: &str) -> CertResult<()>;

    fn load_metadata(&self, event: &EventHandle) -> EventMetadata;

    fn save_metadata(&self, event: &EventHandle, metadata: &EventMetadata) -> CertResult<()>;

    fn save_participants(&self, event: &EventHandle, participants: &[Participant]) -> CertResult<()>;

    /// Names in file order, trimmed. Blank rows are kept so generation can count them.
    fn load_participants(&self, event: &EventHandle) -> CertResult<Vec<String>>;

    /// Persist an all-in-one payload as a new (or reused) event.
    fn bootstrap(&self, payload: &BootstrapPayload, policy: CollisionPolicy) -> CertResult<EventHandle> {
        let event = self.create(&payload.event, policy)?;
        self.save_participants(&event, &payload.participants)?;
        Ok(event)
    }
}

/// Filesystem-backed store rooted at an `events/` folder.
#[derive(Debug, Clone)]
pub struct FsEventStore {
    root: PathBuf,
}

impl FsEventStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn handle(&self, folder: String) -> EventHandle {
        let path = self.root.join(&folder);
        EventHandle { folder, path }
    }

    /// First of `<base>`, `<base>_2`, `<base>_3`, ... with no folder on disk.
    fn free_handle(&self, base: String) -> EventHandle {
        let mut event = self.handle(base.clone());
        let mut n = 2;
        while event.path.exists() {
            event = self.handle(format!("{base}_{n}"));
            n += 1;
        }
        event
    }

    fn write_metadata(path: &Path, metadata: &EventMetadata) -> CertResult<()> {
        let json = serde_json::to_string_pretty(metadata)?;
        fs::write(path, json).io_context("write event metadata", path)
    }
}

impl EventStore for FsEventStore {
    fn create(&self, metadata: &EventMetadata, policy: CollisionPolicy) -> CertResult<EventHandle> {
        Validator::for_events().validate(metadata).into_result()?;

        let folder = folder_identifier(&metadata.title)?;
        let mut event = self.handle(folder);

        if event.path.exists() {
            match policy {
                CollisionPolicy::Fail => {
                    return Err(ValidationViolation::new(
                        "event_exists",
                        format!("Event '{}' already exists", metadata.title),
                    )
                    .actual(event.folder)
                    .into());
                }
                CollisionPolicy::Overwrite => {
                    tracing::info!(event = %event.folder, "overwriting existing event");
                }
                CollisionPolicy::Timestamped => {
                    event = self.free_handle(format!("{}_{}", event.folder, timestamp_now()));
                    tracing::info!(event = %event.folder, "event exists, creating timestamped folder");
                }
            }
        }

        fs::create_dir_all(&event.path).io_context("create event folder", &event.path)?;
        Self::write_metadata(&event.metadata_path(), metadata)?;
        tracing::info!(event = %event.folder, path = %event.path.display(), "event created");
        Ok(event)
    }

    fn open(&self, name: &str) -> CertResult<EventHandle> {
        let folder = folder_identifier(name)?;
        let event = self.handle(folder);
        if event.path.is_dir() {
            Ok(event)
        } else {
            Err(CertError::NotFound(name.to_string()))
        }
    }

    fn list(&self) -> CertResult<Vec<String>> {
        let mut events = vec![];
        if self.root.exists() {
            for entry in fs::read_dir(&self.root).io_context("read events folder", &self.root)? {
                let entry = entry.io_context("read events folder", &self.root)?;
                if entry.path().is_dir() {
                    events.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        events.sort();
        Ok(events)
    }

    fn delete(&self, name: &str) -> CertResult<()> {
        let event = self.open(name)?;
        fs::remove_dir_all(&event.path).io_context("delete event", &event.path)?;
        tracing::info!(event = %event.folder, "event deleted");
        Ok(())
    }

    fn load_metadata(&self, event: &EventHandle) -> EventMetadata {
        let path = event.metadata_path();
        let parsed = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<EventMetadata>(&content).ok());

        let mut metadata = parsed.unwrap_or_else(|| {
            tracing::warn!(event = %event.folder, "event.json missing or unreadable, using defaults");
            EventMetadata::default()
        });
        if metadata.title.trim().is_empty() {
            metadata.title = event.folder.clone();
        }
        metadata
    }

    fn save_metadata(&self, event: &EventHandle, metadata: &EventMetadata) -> CertResult<()> {
        Validator::for_events().validate(metadata).into_result()?;
        Self::write_metadata(&event.metadata_path(), metadata)
    }

    fn save_participants(&self, event: &EventHandle, participants: &[Participant]) -> CertResult<()> {
        let path = event.participants_path();
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([NAME_COLUMN])?;
        for p in participants {
            writer.write_record([p.name.as_str()])?;
        }
        writer.flush().io_context("write participants", &path)?;
        Ok(())
    }

    fn load_participants(&self, event: &EventHandle) -> CertResult<Vec<String>> {
        let path = event.participants_path();
        if !path.exists() {
            return Err(ValidationViolation::new(
                "participants",
                "Participants CSV missing. Import participants first.",
            )
            .actual(path.display().to_string())
            .into());
        }
        let table = CsvTable::from_path(&path)?;
        table.require(CLASSIC_COLUMNS)?;
        Ok(table.column(NAME_COLUMN).into_iter().map(str::to_string).collect())
    }
}
