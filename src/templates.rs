//! Template Store - raster backgrounds for certificates

use image::{Rgba, RgbaImage};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CertError, CertResult, IoContext};
use crate::validation::ValidationViolation;

pub const ALLOWED_TEMPLATE_EXTS: &[&str] = &["png", "jpg", "jpeg"];

/// Size of the blank canvas used when no template can be read.
pub const DEFAULT_CANVAS_SIZE: (u32, u32) = (1600, 1000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum TemplateSource {
    File(PathBuf),
    Blank,
}

/// A decoded template, ready to be copied and drawn on.
#[derive(Debug, Clone)]
pub struct TemplateImage {
    canvas: RgbaImage,
    source: TemplateSource,
}

impl TemplateImage {
    pub fn blank() -> Self {
        let (w, h) = DEFAULT_CANVAS_SIZE;
        Self {
            canvas: RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])),
            source: TemplateSource::Blank,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, image::ImageError> {
        let canvas = image::open(path)?.to_rgb8();
        // Templates are opaque; drop any alpha the file carried.
        let canvas = image::DynamicImage::ImageRgb8(canvas).to_rgba8();
        Ok(Self {
            canvas,
            source: TemplateSource::File(path.to_path_buf()),
        })
    }

    pub fn from_canvas(canvas: RgbaImage) -> Self {
        Self {
            canvas,
            source: TemplateSource::Blank,
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn is_blank(&self) -> bool {
        self.source == TemplateSource::Blank
    }
}

pub fn is_template_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| ALLOWED_TEMPLATE_EXTS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Template store - the `templates/` folder of a workspace
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names of every usable template, sorted.
    pub fn list(&self) -> CertResult<Vec<String>> {
        let mut names = vec![];
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir).io_context("read templates folder", &self.dir)? {
                let path = entry.io_context("read templates folder", &self.dir)?.path();
                if path.is_file() && is_template_file(&path) {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn is_empty(&self) -> CertResult<bool> {
        Ok(self.list()?.is_empty())
    }

    /// Copy an image into the store, keeping its file name.
    pub fn add(&self, source: &Path) -> CertResult<PathBuf> {
        if !is_template_file(source) {
            return Err(ValidationViolation::new("template_format", "Template must be a PNG/JPG/JPEG")
                .expected(ALLOWED_TEMPLATE_EXTS.join(", "))
                .actual(source.display().to_string())
                .into());
        }
        let name = source.file_name().ok_or_else(|| {
            CertError::from(
                ValidationViolation::new("template_format", "Template path has no file name")
                    .actual(source.display().to_string()),
            )
        })?;

        fs::create_dir_all(&self.dir).io_context("create templates folder", &self.dir)?;
        let dest = self.dir.join(name);
        fs::copy(source, &dest).io_context("copy template", source)?;
        tracing::info!(template = %dest.display(), "template added");
        Ok(dest)
    }

    /// An absolute existing path, else a file of that name in the store.
    pub fn resolve(&self, hint: &str) -> Option<PathBuf> {
        let hint = hint.trim();
        if hint.is_empty() {
            return None;
        }

        let direct = Path::new(hint);
        if direct.is_absolute() && direct.exists() {
            return Some(direct.to_path_buf());
        }

        let candidate = self.dir.join(hint);
        candidate.exists().then_some(candidate)
    }

    /// Decode a template, degrading to the blank canvas when it is absent or unreadable.
    pub fn load(&self, path: Option<&Path>) -> TemplateImage {
        let Some(path) = path else {
            tracing::warn!("no template given, using blank canvas");
            return TemplateImage::blank();
        };
        if !path.exists() {
            tracing::warn!(template = %path.display(), "template not found, using blank canvas");
            return TemplateImage::blank();
        }
        match TemplateImage::from_path(path) {
            Ok(template) => template,
            Err(e) => {
                tracing::warn!(template = %path.display(), error = %e, "template unreadable, using blank canvas");
                TemplateImage::blank()
            }
        }
    }
}
