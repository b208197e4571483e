//! Print Authority System
//!
//! Defines where the output resolution and compression settings come from.

use serde::{Deserialize, Serialize};

use crate::validation::ValidationViolation;

/// PrintAuthority records who chose the print settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintAuthority {
    /// System defaults (fallback)
    System,
    /// Workspace configuration overrides (with validation)
    User,
}

impl Default for PrintAuthority {
    fn default() -> Self {
        Self::System
    }
}

/// Settings used when a composed canvas is serialized to PDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintSpec {
    pub authority: PrintAuthority,
    /// Pixels per inch; the page is `pixels * 72 / dpi` points wide.
    pub dpi: u32,
    pub jpeg_quality: u8,
}

impl Default for PrintSpec {
    fn default() -> Self {
        Self {
            authority: PrintAuthority::System,
            dpi: 100,
            jpeg_quality: 92,
        }
    }
}

impl PrintSpec {
    /// Create from user with validation
    pub fn from_user(dpi: u32, jpeg_quality: u8) -> Result<Self, ValidationViolation> {
        let spec = Self {
            authority: PrintAuthority::User,
            dpi,
            jpeg_quality,
        };
        spec.check()?;
        Ok(spec)
    }

    pub fn check(&self) -> Result<(), ValidationViolation> {
        if !(72..=1200).contains(&self.dpi) {
            return Err(ValidationViolation::new("print_dpi", "DPI must be between 72 and 1200")
                .expected("72..=1200")
                .actual(self.dpi.to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ValidationViolation::new("print_quality", "JPEG quality must be between 1 and 100")
                .expected("1..=100")
                .actual(self.jpeg_quality.to_string()));
        }
        Ok(())
    }

    /// Page size in PDF points for a canvas of the given pixel size.
    pub fn page_size(&self, width_px: u32, height_px: u32) -> (f32, f32) {
        let scale = 72.0 / self.dpi as f32;
        (width_px as f32 * scale, height_px as f32 * scale)
    }
}
