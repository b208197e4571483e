//! Certificate composition.
//!
//! `CertificateRenderer` draws one participant onto a copy of the template
//! and writes it out as a single-page PDF. The batch generator only talks to
//! the `Renderer` trait.

pub mod pdf;
pub mod text;

use image::imageops::{self, FilterType};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CertError, CertResult, IoContext};
use crate::layout::{signature_size, CertificateLayout, FONT_SIZES};
use crate::model::{Signatory, SignatorySet};
use crate::print::PrintSpec;
use crate::sanitize::file_identifier;
use crate::templates::TemplateImage;

pub use text::TextRasterizer;

/// Everything that varies per participant, plus the shared batch fields.
#[derive(Debug, Clone, Copy)]
pub struct CertificateJob<'a> {
    pub participant_name: &'a str,
    pub event_title: &'a str,
    pub organization: &'a str,
    /// Already formatted, e.g. `January 1–3, 2025`. Empty omits the line.
    pub date_sentence: &'a str,
    pub signatories: &'a SignatorySet,
    /// Disambiguated file stem chosen by the batch; defaults to the sanitized name.
    pub file_stem: Option<&'a str>,
}

pub trait Renderer {
    /// Compose and write one certificate, returning the written path.
    fn render(&self, template: &TemplateImage, job: &CertificateJob<'_>, output_dir: &Path) -> CertResult<PathBuf>;
}

pub struct CertificateRenderer {
    text: TextRasterizer,
    print: PrintSpec,
}

impl CertificateRenderer {
    pub fn new(text: TextRasterizer, print: PrintSpec) -> Self {
        Self { text, print }
    }

    pub fn print(&self) -> &PrintSpec {
        &self.print
    }

    /// Draw all text and signature bands onto a copy of the template.
    pub fn compose(&self, template: &TemplateImage, job: &CertificateJob<'_>) -> CertResult<image::RgbaImage> {
        let mut canvas = template.canvas().clone();
        let layout = CertificateLayout::compute(canvas.width(), canvas.height(), job.signatories.len())?;

        self.text.draw_centered(
            &mut canvas,
            job.participant_name,
            FONT_SIZES.participant_name as f32,
            layout.participant_name,
        )?;
        self.text.draw_centered(
            &mut canvas,
            &event_sentence(job.event_title, job.organization),
            FONT_SIZES.sentence as f32,
            layout.event_line,
        )?;
        if let Some(line) = date_sentence(job.date_sentence) {
            self.text
                .draw_centered(&mut canvas, &line, FONT_SIZES.sentence as f32, layout.date_line)?;
        }

        for (signatory, anchors) in job.signatories.iter().zip(&layout.signatories) {
            if let Some(signature) = load_signature(signatory, canvas.width())? {
                let (x, y) = anchors.signature.centered_origin(signature.width(), signature.height());
                imageops::overlay(&mut canvas, &signature, x, y);
            }
            self.text
                .draw_centered(&mut canvas, &signatory.name, FONT_SIZES.signatory_name as f32, anchors.name)?;
            self.text.draw_centered(
                &mut canvas,
                &signatory.position,
                FONT_SIZES.signatory_title as f32,
                anchors.title,
            )?;
        }

        Ok(canvas)
    }

    fn render_inner(&self, template: &TemplateImage, job: &CertificateJob<'_>, output_dir: &Path) -> CertResult<PathBuf> {
        let stem = match job.file_stem {
            Some(stem) => stem.to_string(),
            None => file_identifier(job.participant_name)?,
        };

        let canvas = self.compose(template, job)?;
        fs::create_dir_all(output_dir).io_context("create output folder", output_dir)?;
        let path = output_dir.join(format!("{stem}.pdf"));
        pdf::write_pdf(&canvas, &self.print, &path)?;
        Ok(path)
    }
}

impl Renderer for CertificateRenderer {
    fn render(&self, template: &TemplateImage, job: &CertificateJob<'_>, output_dir: &Path) -> CertResult<PathBuf> {
        self.render_inner(template, job, output_dir)
            .map_err(|e| match e {
                e @ CertError::Render { .. } => e,
                e => CertError::render(job.participant_name, e),
            })
    }
}

/// `for participating in the <title>`, with ` held by <org>` when an organization is set.
pub fn event_sentence(title: &str, organization: &str) -> String {
    let title = title.trim();
    let organization = organization.trim();
    if organization.is_empty() {
        format!("for participating in the {title}")
    } else {
        format!("for participating in the {title} held by {organization}")
    }
}

pub fn date_sentence(dates: &str) -> Option<String> {
    let dates = dates.trim();
    (!dates.is_empty()).then(|| format!("on {dates}"))
}

/// Decode and scale a signature image. A path that does not exist is skipped;
/// a file that exists but cannot be decoded is an error.
fn load_signature(signatory: &Signatory, canvas_width: u32) -> CertResult<Option<image::RgbaImage>> {
    let Some(path) = signatory.signature_path.as_deref() else {
        return Ok(None);
    };
    if !path.is_file() {
        tracing::warn!(signatory = %signatory.name, path = %path.display(), "signature image missing, skipping");
        return Ok(None);
    }

    let img = image::open(path)
        .map_err(|e| CertError::compose(format!("signature '{}': {e}", path.display())))?
        .to_rgba8();
    let (w, h) = signature_size(canvas_width, img.width(), img.height());
    Ok(Some(imageops::resize(&img, w, h, FilterType::Lanczos3)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn renderer() -> CertificateRenderer {
        // No fonts: text draws nothing, which keeps pixel assertions about signatures exact.
        let text = TextRasterizer::with_database(Arc::new(usvg::fontdb::Database::new()), "Roboto");
        CertificateRenderer::new(text, PrintSpec::default())
    }

    fn signatories(sigs: Vec<Signatory>) -> SignatorySet {
        SignatorySet::new(sigs).unwrap()
    }

    fn job<'a>(name: &'a str, sigs: &'a SignatorySet) -> CertificateJob<'a> {
        CertificateJob {
            participant_name: name,
            event_title: "Science Expo",
            organization: "Acme",
            date_sentence: "January 1–3, 2025",
            signatories: sigs,
            file_stem: None,
        }
    }

    #[test]
    fn sentences() {
        assert_eq!(event_sentence("Expo", "Acme"), "for participating in the Expo held by Acme");
        assert_eq!(event_sentence("Expo", "  "), "for participating in the Expo");
        assert_eq!(date_sentence("January 1, 2025").as_deref(), Some("on January 1, 2025"));
        assert_eq!(date_sentence(""), None);
    }

    #[test]
    fn render_writes_sanitized_pdf_and_creates_folder() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("certificates").join("20250101_120000");
        let sigs = signatories(vec![Signatory::new("Dr. Who", "Director")]);

        let path = renderer()
            .render(&TemplateImage::blank(), &job("Ada / Lovelace", &sigs), &out)
            .unwrap();
        assert_eq!(path, out.join("Ada_Lovelace.pdf"));
        assert!(fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn batch_stem_overrides_participant_name() {
        let dir = TempDir::new().unwrap();
        let sigs = signatories(vec![Signatory::new("A", "B")]);
        let mut job = job("Ada", &sigs);
        job.file_stem = Some("Ada_2");

        let path = renderer().render(&TemplateImage::blank(), &job, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Ada_2.pdf");
    }

    #[test]
    fn signature_is_scaled_and_centered_on_its_band() {
        let dir = TempDir::new().unwrap();
        let sig_path = dir.path().join("sig.png");
        RgbaImage::from_pixel(100, 50, Rgba([255, 0, 0, 255])).save(&sig_path).unwrap();

        let template = TemplateImage::from_canvas(RgbaImage::from_pixel(1000, 800, Rgba([255, 255, 255, 255])));
        let sigs = signatories(vec![Signatory::new("Dr. Who", "Director").with_signature(&sig_path)]);
        let canvas = renderer().compose(&template, &job("Ada", &sigs)).unwrap();

        // 18% of 1000 = 180 wide, 90 tall, centered at (500, 590).
        assert_eq!(canvas.get_pixel(500, 590).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(412, 590).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(405, 590).0, [255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(500, 540).0, [255, 255, 255, 255]);
    }

    #[test]
    fn missing_signature_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let sigs = signatories(vec![Signatory::new("A", "B").with_signature(dir.path().join("nope.png"))]);
        let canvas = renderer().compose(&TemplateImage::blank(), &job("Ada", &sigs)).unwrap();
        assert!(canvas.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn corrupt_signature_fails_only_this_participant() {
        let dir = TempDir::new().unwrap();
        let sig_path = dir.path().join("sig.png");
        fs::write(&sig_path, b"not an image").unwrap();
        let sigs = signatories(vec![Signatory::new("A", "B").with_signature(&sig_path)]);

        let err = renderer()
            .render(&TemplateImage::blank(), &job("Ada", &sigs), dir.path())
            .unwrap_err();
        match err {
            CertError::Render { participant, .. } => assert_eq!(participant, "Ada"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("Ada.pdf").exists());
    }
}
