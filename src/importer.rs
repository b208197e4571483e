//! Participant Importer - CSV intake for the classic and all-in-one paths
//!
//! Raw rows never leave this module: they are parsed into `IntakeRow`
//! records and then folded into typed participants and signatories.

use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::dates::parse_date_ymd;
use crate::error::{CertResult, IoContext};
use crate::layout::MAX_SIGNATORIES;
use crate::model::{EventHandle, EventMetadata, Participant, Signatory, SignatorySet};
use crate::store::EventStore;
use crate::templates::TemplateStore;
use crate::validation::{RequiredColumnsRule, ValidationRule, ValidationViolation};

pub const NAME_COLUMN: &str = "name";

pub const CLASSIC_COLUMNS: &[&str] = &[NAME_COLUMN];

pub const ALL_IN_ONE_COLUMNS: &[&str] = &["event_name", "name", "signatory_name", "signatory_position"];

/// A CSV file held as a header row plus string records.
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

impl CsvTable {
    pub fn from_path(path: &Path) -> CertResult<Self> {
        let file = File::open(path).io_context("open CSV", path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> CertResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require(&self, columns: &'static [&'static str]) -> Result<(), crate::validation::ValidationError> {
        let violations = RequiredColumnsRule { columns }.validate(&self.headers);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(crate::validation::ValidationError { violations })
        }
    }

    /// Trimmed cell; short rows read as blank.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(str::trim)
            .unwrap_or("")
    }

    /// Every cell of a column in row order (trimmed, blanks included).
    pub fn column(&self, name: &str) -> Vec<&str> {
        match self.column_index(name) {
            Some(idx) => (0..self.rows.len()).map(|r| self.cell(r, idx)).collect(),
            None => vec![],
        }
    }
}

/// Trim, drop blanks and keep the first occurrence of each name.
pub fn normalize_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Participant> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter_map(Participant::parse)
        .filter(|p| seen.insert(p.name.clone()))
        .collect()
}

// --- Classic path ---

/// Participant list from a table with a `name` column.
pub fn participants_from_table(table: &CsvTable) -> CertResult<Vec<Participant>> {
    table.require(CLASSIC_COLUMNS)?;
    let participants = normalize_names(table.column(NAME_COLUMN));
    if participants.is_empty() {
        return Err(ValidationViolation::new("participants", "No valid participants. Column 'name' is empty.").into());
    }
    Ok(participants)
}

/// Validate a participants CSV and persist it as the event's `participants.csv`.
/// Nothing is written when validation fails.
pub fn import_participants<S: EventStore + ?Sized>(
    store: &S,
    event: &EventHandle,
    csv_path: &Path,
) -> CertResult<usize> {
    let table = CsvTable::from_path(csv_path)?;
    let participants = participants_from_table(&table)?;
    store.save_participants(event, &participants)?;
    tracing::info!(
        event = %event.folder,
        imported = participants.len(),
        rows = table.len(),
        "participants imported"
    );
    Ok(participants.len())
}

// --- All-in-one path ---

/// One validated row of an all-in-one CSV. Blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeRow {
    pub event_name: Option<String>,
    pub name: Option<String>,
    pub signatory: Option<(String, String)>,
    pub organization: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub template_file: Option<String>,
}

struct IntakeColumns {
    event_name: usize,
    name: usize,
    signatory_name: usize,
    signatory_position: usize,
    organization: Option<usize>,
    start_date: Option<usize>,
    end_date: Option<usize>,
    template_file: Option<usize>,
}

impl IntakeColumns {
    fn locate(table: &CsvTable) -> CertResult<Self> {
        table.require(ALL_IN_ONE_COLUMNS)?;
        let required = |name: &str| table.column_index(name).unwrap_or_default();
        Ok(Self {
            event_name: required("event_name"),
            name: required("name"),
            signatory_name: required("signatory_name"),
            signatory_position: required("signatory_position"),
            organization: table.column_index("organization"),
            start_date: table.column_index("start_date"),
            end_date: table.column_index("end_date"),
            template_file: table.column_index("template_file"),
        })
    }

    fn row(&self, table: &CsvTable, row: usize) -> IntakeRow {
        let cell = |idx: usize| Some(table.cell(row, idx)).filter(|s| !s.is_empty()).map(str::to_string);
        let optional = |idx: Option<usize>| idx.and_then(cell);

        let signatory = match (cell(self.signatory_name), cell(self.signatory_position)) {
            (Some(name), Some(position)) => Some((name, position)),
            _ => None,
        };

        IntakeRow {
            event_name: cell(self.event_name),
            name: cell(self.name),
            signatory,
            organization: optional(self.organization),
            start_date: optional(self.start_date),
            end_date: optional(self.end_date),
            template_file: optional(self.template_file),
        }
    }
}

/// Everything an all-in-one CSV bootstraps: event, participants, signatories, template.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapPayload {
    pub event: EventMetadata,
    pub participants: Vec<Participant>,
    pub signatories: SignatorySet,
    /// Raw `template_file` value, if any.
    pub template_hint: Option<String>,
    /// The hint resolved against the filesystem; `None` means the caller must supply one.
    pub template: Option<PathBuf>,
}

pub fn parse_all_in_one(csv_path: &Path, templates: &TemplateStore) -> CertResult<BootstrapPayload> {
    let table = CsvTable::from_path(csv_path)?;
    bootstrap_from_table(&table, templates)
}

pub fn bootstrap_from_table(table: &CsvTable, templates: &TemplateStore) -> CertResult<BootstrapPayload> {
    let columns = IntakeColumns::locate(table)?;
    let rows: Vec<IntakeRow> = (0..table.len()).map(|r| columns.row(table, r)).collect();

    let first = |pick: fn(&IntakeRow) -> Option<&String>| rows.iter().find_map(pick).cloned();

    let title = first(|r| r.event_name.as_ref())
        .ok_or_else(|| ValidationViolation::new("event_name", "event_name cannot be empty."))?;

    let participants = normalize_names(rows.iter().filter_map(|r| r.name.as_deref()));
    if participants.is_empty() {
        return Err(ValidationViolation::new("participants", "No valid participants. Column 'name' is empty.").into());
    }

    let mut seen = HashSet::new();
    let signatories: Vec<Signatory> = rows
        .iter()
        .filter_map(|r| r.signatory.clone())
        .filter(|pair| seen.insert(pair.clone()))
        .take(MAX_SIGNATORIES)
        .map(|(name, position)| Signatory::new(name, position))
        .collect();
    if signatories.is_empty() {
        return Err(ValidationViolation::new("signatories", "No valid signatories found in CSV.").into());
    }
    let signatories = SignatorySet::new(signatories)?;

    let start_date = first(|r| r.start_date.as_ref()).unwrap_or_default();
    let end_date = first(|r| r.end_date.as_ref()).unwrap_or_default();
    parse_date_ymd(&start_date)?;
    parse_date_ymd(&end_date)?;

    let template_hint = first(|r| r.template_file.as_ref());
    let template = template_hint.as_deref().and_then(|hint| templates.resolve(hint));
    if template_hint.is_some() && template.is_none() {
        tracing::warn!(hint = ?template_hint, "template_file did not resolve; a template must be supplied");
    }

    let event = EventMetadata {
        title,
        organization: first(|r| r.organization.as_ref()).unwrap_or_default(),
        start_date,
        end_date,
    };

    tracing::info!(
        event = %event.title,
        participants = participants.len(),
        signatories = signatories.len(),
        "all-in-one CSV parsed"
    );

    Ok(BootstrapPayload {
        event,
        participants,
        signatories,
        template_hint,
        template,
    })
}
