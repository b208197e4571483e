//! Value records passed between the importer, the store and the renderer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::validation::{ValidationError, Validator};

/// Metadata persisted as `event.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

impl EventMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    pub fn with_dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = start.into();
        self.end_date = end.into();
        self
    }
}

/// Fields to replace in a stored event's metadata; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    pub organization: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.organization.is_none() && self.start_date.is_none() && self.end_date.is_none()
    }

    pub fn apply(&self, mut metadata: EventMetadata) -> EventMetadata {
        if let Some(organization) = &self.organization {
            metadata.organization = organization.trim().to_string();
        }
        if let Some(start) = &self.start_date {
            metadata.start_date = start.trim().to_string();
        }
        if let Some(end) = &self.end_date {
            metadata.end_date = end.trim().to_string();
        }
        metadata
    }
}

/// An event directory inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventHandle {
    pub folder: String,
    pub path: PathBuf,
}

impl EventHandle {
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join("event.json")
    }

    pub fn participants_path(&self) -> PathBuf {
        self.path.join("participants.csv")
    }

    pub fn certificates_dir(&self) -> PathBuf {
        self.path.join("certificates")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
}

impl Participant {
    /// Trimmed participant, or `None` when the name is blank.
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim();
        (!name.is_empty()).then(|| Self { name: name.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatory {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub signature_path: Option<PathBuf>,
}

impl Signatory {
    pub fn new(name: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: position.into(),
            signature_path: None,
        }
    }

    pub fn with_signature(mut self, path: impl Into<PathBuf>) -> Self {
        self.signature_path = Some(path.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.position.trim().is_empty()
    }
}

/// Ordered signatories for one batch: 1 to 3 entries, each with a name and a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SignatorySet(Vec<Signatory>);

impl SignatorySet {
    pub fn new(signatories: Vec<Signatory>) -> Result<Self, ValidationError> {
        Validator::for_signatories().validate(&signatories[..]).into_result()?;
        Ok(Self(signatories))
    }

    /// Keep only complete entries, then validate the count.
    pub fn from_valid(signatories: impl IntoIterator<Item = Signatory>) -> Result<Self, ValidationError> {
        Self::new(signatories.into_iter().filter(Signatory::is_valid).collect())
    }

    pub fn as_slice(&self) -> &[Signatory] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Signatory> {
        self.0.iter()
    }

    /// Attach a signature image to the first signatory with this name.
    pub fn attach_signature(&mut self, name: &str, path: &Path) -> bool {
        match self.0.iter_mut().find(|s| s.name == name.trim()) {
            Some(sig) => {
                sig.signature_path = Some(path.to_path_buf());
                true
            }
            None => false,
        }
    }
}

impl<'a> IntoIterator for &'a SignatorySet {
    type Item = &'a Signatory;
    type IntoIter = std::slice::Iter<'a, Signatory>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
