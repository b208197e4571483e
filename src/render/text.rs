//! Text rasterization through `usvg`/`resvg`.
//!
//! Each string is laid out as a one-line SVG, rasterized, and cropped to its
//! inked pixels. The crop is the string's measured box, so centering uses
//! the real extent of that particular string.

use image::{imageops, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CertError, CertResult};
use crate::layout::Anchor;

const MAX_DIM: u32 = 16_384;

/// A string rendered and cropped to its ink bounds.
#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub image: RgbaImage,
}

impl GlyphBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

pub struct TextRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    font_family: String,
    color: [u8; 3],
}

impl TextRasterizer {
    /// System fonts plus every font file found in `font_dirs`.
    pub fn new(font_family: impl Into<String>, font_dirs: &[PathBuf]) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        for dir in font_dirs {
            load_fonts_from_dir(&mut db, dir);
        }
        tracing::debug!(faces = db.faces().count(), "font database ready");
        Self::with_database(Arc::new(db), font_family)
    }

    pub fn with_database(fontdb: Arc<usvg::fontdb::Database>, font_family: impl Into<String>) -> Self {
        Self {
            fontdb,
            font_family: font_family.into(),
            color: [0, 0, 0],
        }
    }

    pub fn face_count(&self) -> usize {
        self.fontdb.faces().count()
    }

    /// Rasterize `text`; `None` when nothing would be inked.
    pub fn rasterize(&self, text: &str, font_size: f32) -> CertResult<Option<GlyphBitmap>> {
        let text = text.trim();
        if text.is_empty() || self.fontdb.is_empty() {
            return Ok(None);
        }

        let size = font_size.max(1.0);
        let chars = text.chars().count() as f32;
        let width = (size * (chars + 2.0)).ceil() as u32;
        let height = (size * 3.0).ceil() as u32;
        if width > MAX_DIM || height > MAX_DIM {
            return Err(CertError::compose(format!(
                "text raster too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
            )));
        }

        let [r, g, b] = self.color;
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"><text x="{x}" y="{y}" font-family="{family}" font-size="{size}" fill="rgb({r},{g},{b})">{text}</text></svg>"#,
            x = size,
            y = size * 2.0,
            family = escape_xml(&self.font_family),
            text = escape_xml(text),
        );

        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            font_resolver: font_resolver(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts).map_err(|e| CertError::compose(format!("layout text: {e}")))?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| CertError::compose("failed to allocate text pixmap"))?;
        resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        Ok(crop_to_ink(pixmap.data(), width, height).map(|image| GlyphBitmap { image }))
    }

    /// Draw `text` so that its measured box is centered on `anchor`.
    pub fn draw_centered(&self, canvas: &mut RgbaImage, text: &str, font_size: f32, anchor: Anchor) -> CertResult<()> {
        if let Some(glyphs) = self.rasterize(text, font_size)? {
            let (x, y) = anchor.centered_origin(glyphs.width(), glyphs.height());
            imageops::overlay(canvas, &glyphs.image, x, y);
        }
        Ok(())
    }
}

/// Crop premultiplied RGBA8 data to the pixels with non-zero alpha and demultiply.
fn crop_to_ink(data: &[u8], width: u32, height: u32) -> Option<RgbaImage> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (i, px) in data.chunks_exact(4).enumerate() {
        if px[3] == 0 {
            continue;
        }
        let x = i as u32 % width;
        let y = i as u32 / width;
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let (x0, y0, x1, y1) = bounds?;
    debug_assert!(x1 < width && y1 < height);
    Some(RgbaImage::from_fn(x1 - x0 + 1, y1 - y0 + 1, |x, y| {
        let i = (((y + y0) * width + (x + x0)) * 4) as usize;
        let a = data[i + 3];
        let demul = |c: u8| -> u8 {
            if a == 0 {
                0
            } else {
                ((c as u16 * 255 + a as u16 / 2) / a as u16).min(255) as u8
            }
        };
        Rgba([demul(data[i]), demul(data[i + 1]), demul(data[i + 2]), a])
    }))
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        if let Err(e) = db.load_font_file(&path) {
            tracing::warn!(font = %path.display(), error = %e, "failed to load font");
        }
    }
}

/// Prefer the requested family, then generic sans-serif, then any face at all.
fn font_resolver() -> usvg::FontResolver<'static> {
    use usvg::FontResolver;

    FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families = Vec::<usvg::fontdb::Family<'_>>::new();
            for family in font.families() {
                families.push(match family {
                    usvg::FontFamily::Serif => usvg::fontdb::Family::Serif,
                    usvg::FontFamily::SansSerif => usvg::fontdb::Family::SansSerif,
                    usvg::FontFamily::Cursive => usvg::fontdb::Family::Cursive,
                    usvg::FontFamily::Fantasy => usvg::fontdb::Family::Fantasy,
                    usvg::FontFamily::Monospace => usvg::fontdb::Family::Monospace,
                    usvg::FontFamily::Named(s) => usvg::fontdb::Family::Name(s),
                });
            }
            families.push(usvg::fontdb::Family::SansSerif);

            let query = usvg::fontdb::Query {
                families: &families,
                weight: usvg::fontdb::Weight(font.weight()),
                stretch: usvg::fontdb::Stretch::Normal,
                style: usvg::fontdb::Style::Normal,
            };

            if let Some(id) = fontdb.query(&query) {
                return Some(id);
            }
            fontdb.faces().next().map(|f| f.id)
        }),
        select_fallback: FontResolver::default_fallback_selector(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_xml_handles_markup_characters() {
        assert_eq!(escape_xml(r#"A&B <"x"> 'y'"#), "A&amp;B &lt;&quot;x&quot;&gt; &apos;y&apos;");
        assert_eq!(escape_xml("tab\there"), "tabhere");
    }

    #[test]
    fn crop_finds_ink_bounds() {
        // 4x3 premultiplied image with two inked pixels at (1,0) and (2,2).
        let mut data = vec![0u8; 4 * 3 * 4];
        let set = |data: &mut Vec<u8>, x: usize, y: usize, a: u8| {
            let i = (y * 4 + x) * 4;
            data[i..i + 4].copy_from_slice(&[a / 2, 0, 0, a]);
        };
        set(&mut data, 1, 0, 200);
        set(&mut data, 2, 2, 100);

        let crop = crop_to_ink(&data, 4, 3).unwrap();
        assert_eq!(crop.dimensions(), (2, 3));
        assert_eq!(crop.get_pixel(0, 0)[3], 200);
        assert_eq!(crop.get_pixel(0, 0)[0], 128);
        assert_eq!(crop.get_pixel(1, 2)[3], 100);
        assert_eq!(crop.get_pixel(1, 1)[3], 0);
    }

    #[test]
    fn crop_of_blank_data_is_none() {
        assert!(crop_to_ink(&[0u8; 16], 2, 2).is_none());
    }

    #[test]
    fn empty_database_draws_nothing() {
        let text = TextRasterizer::with_database(Arc::new(usvg::fontdb::Database::new()), "Roboto");
        assert!(text.rasterize("Ada Lovelace", 40.0).unwrap().is_none());

        let mut canvas = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        text.draw_centered(&mut canvas, "Ada", 12.0, Anchor::new(10.0, 10.0)).unwrap();
        assert!(canvas.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn wider_strings_measure_wider() {
        let text = TextRasterizer::new("sans-serif", &[]);
        if text.face_count() == 0 {
            return;
        }
        let short = text.rasterize("Ada", 40.0).unwrap().unwrap();
        let long = text.rasterize("Ada Lovelace Byron", 40.0).unwrap().unwrap();
        assert!(long.width() > short.width());
        assert!(short.height() <= 80);
    }
}
