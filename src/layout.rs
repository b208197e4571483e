//! Layout Engine - deterministic anchors for every element of a certificate.
//!
//! Body anchors are defined on a 1200x900 reference template and scale with
//! the canvas. Signatory rows hang at fixed offsets from the bottom edge, and
//! the body block (name plus two sentence lines) is kept above them.

use serde::Serialize;

use crate::validation::{ValidationError, ValidationViolation};

pub const MAX_SIGNATORIES: usize = 3;

pub const REFERENCE_HEIGHT: f32 = 900.0;

const NAME_ANCHOR_X_RATIO: f32 = 0.625;
/// Reference-pixel gaps below the participant name.
const EVENT_LINE_GAP: f32 = 150.0;
const DATE_LINE_GAP: f32 = 220.0;
/// Reference pixels between the date line and the signature band center.
const BODY_CLEARANCE: f32 = 90.0;

pub const SIGNATURE_BAND_OFFSET: f32 = 210.0;
pub const SIGNATORY_NAME_OFFSET: f32 = 140.0;
pub const SIGNATORY_TITLE_OFFSET: f32 = 90.0;

pub const SIGNATURE_WIDTH_RATIO: f32 = 0.18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontSizes {
    pub participant_name: u32,
    pub sentence: u32,
    pub signatory_name: u32,
    pub signatory_title: u32,
}

pub const FONT_SIZES: FontSizes = FontSizes {
    participant_name: 70,
    sentence: 32,
    signatory_name: 40,
    signatory_title: 32,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Top-left corner that centers a `width` x `height` box on this anchor.
    pub fn centered_origin(&self, width: u32, height: u32) -> (i64, i64) {
        (
            (self.x - width as f32 / 2.0).round() as i64,
            (self.y - height as f32 / 2.0).round() as i64,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignatoryAnchors {
    pub signature: Anchor,
    pub name: Anchor,
    pub title: Anchor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateLayout {
    pub width: u32,
    pub height: u32,
    pub participant_name: Anchor,
    pub event_line: Anchor,
    pub date_line: Anchor,
    pub signatories: Vec<SignatoryAnchors>,
}

impl CertificateLayout {
    pub fn compute(width: u32, height: u32, signatory_count: usize) -> Result<Self, ValidationError> {
        let xs = signatory_xs(width, signatory_count)?;

        let h = height as f32;
        let sy = h / REFERENCE_HEIGHT;

        // The body block is stacked upward from the date line so it never
        // reaches the signature band.
        let date_floor = h - SIGNATURE_BAND_OFFSET - BODY_CLEARANCE * sy;
        let name = Anchor::new(NAME_ANCHOR_X_RATIO * width as f32, date_floor - DATE_LINE_GAP * sy);

        let signatories = xs
            .into_iter()
            .map(|x| SignatoryAnchors {
                signature: Anchor::new(x, h - SIGNATURE_BAND_OFFSET),
                name: Anchor::new(x, h - SIGNATORY_NAME_OFFSET),
                title: Anchor::new(x, h - SIGNATORY_TITLE_OFFSET),
            })
            .collect();

        let layout = Self {
            width,
            height,
            participant_name: name,
            event_line: Anchor::new(name.x, name.y + EVENT_LINE_GAP * sy),
            date_line: Anchor::new(name.x, name.y + DATE_LINE_GAP * sy),
            signatories,
        };
        tracing::debug!(width, height, signatory_count, "computed certificate layout");
        Ok(layout)
    }
}

/// Horizontal anchors for `count` signatories. Outer anchors mirror each
/// other so that `x[0] + x[count - 1] == width` holds exactly.
pub fn signatory_xs(width: u32, count: usize) -> Result<Vec<f32>, ValidationError> {
    let xs = match count {
        1 => vec![width / 2],
        2 => vec![width / 3, width - width / 3],
        3 => vec![width / 4, width / 2, width - width / 4],
        n => {
            return Err(ValidationViolation::new("signatory_count", "Signatory layout supports 1 to 3 entries")
                .expected(format!("1..={}", MAX_SIGNATORIES))
                .actual(n.to_string())
                .into())
        }
    };
    Ok(xs.into_iter().map(|x| x as f32).collect())
}

/// Target size for a signature image: 18% of the canvas width, aspect preserved.
pub fn signature_size(canvas_width: u32, image_width: u32, image_height: u32) -> (u32, u32) {
    let max_width = ((canvas_width as f32 * SIGNATURE_WIDTH_RATIO) as u32).max(1);
    let height = (image_height as u64 * max_width as u64 / image_width.max(1) as u64).max(1);
    (max_width, height.min(u32::MAX as u64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_signatory_is_centered() {
        assert_eq!(signatory_xs(1600, 1).unwrap(), vec![800.0]);
        assert_eq!(signatory_xs(1201, 1).unwrap(), vec![600.0]);
    }

    #[test]
    fn two_signatories_mirror_across_the_canvas() {
        for w in [900u32, 1000, 1201, 1600, 2481] {
            let xs = signatory_xs(w, 2).unwrap();
            assert_eq!(xs[0] + xs[1], w as f32);
        }
    }

    #[test]
    fn three_signatories_mirror_and_center() {
        for w in [900u32, 1000, 1202, 1600] {
            let xs = signatory_xs(w, 3).unwrap();
            assert_eq!(xs[0] + xs[2], w as f32);
            assert_eq!(xs[1], (w / 2) as f32);
        }
    }

    #[test]
    fn unsupported_counts_are_rejected() {
        assert!(signatory_xs(1000, 0).is_err());
        assert!(signatory_xs(1000, 4).is_err());
        assert!(CertificateLayout::compute(1000, 800, 5).is_err());
    }

    #[test]
    fn vertical_offsets_ignore_signatory_count() {
        for n in 1..=3 {
            let layout = CertificateLayout::compute(1600, 1000, n).unwrap();
            assert_eq!(layout.signatories.len(), n);
            for s in &layout.signatories {
                assert_eq!(s.signature.y, 790.0);
                assert_eq!(s.name.y, 860.0);
                assert_eq!(s.title.y, 910.0);
            }
        }
    }

    #[test]
    fn body_block_sits_above_the_signature_band() {
        let reference = CertificateLayout::compute(1200, 900, 1).unwrap();
        assert_eq!(reference.participant_name.x, 750.0);
        assert!((reference.participant_name.y - 380.0).abs() < 1e-3);
        assert!((reference.event_line.y - 530.0).abs() < 1e-3);
        assert!((reference.date_line.y - 600.0).abs() < 1e-3);

        let doubled = CertificateLayout::compute(2400, 1800, 1).unwrap();
        assert_eq!(doubled.participant_name.x, 2.0 * reference.participant_name.x);
        assert!((doubled.date_line.y - doubled.event_line.y - 140.0).abs() < 1e-2);
        assert!((doubled.event_line.y - doubled.participant_name.y - 300.0).abs() < 1e-2);
    }

    #[test]
    fn sentence_lines_clear_the_signature_band() {
        let half = FONT_SIZES.sentence as f32 / 2.0;
        for (w, h) in [(1600u32, 1000u32), (1200, 900), (2400, 1800)] {
            let layout = CertificateLayout::compute(w, h, 3).unwrap();
            let band = h as f32 - SIGNATURE_BAND_OFFSET;
            for line in [layout.event_line, layout.date_line] {
                assert!(line.y + half < band, "{w}x{h}: line at {} reaches band at {band}", line.y);
                assert!(line.y > layout.participant_name.y);
            }
            let name_half = FONT_SIZES.participant_name as f32 / 2.0;
            assert!(layout.participant_name.y - name_half > 0.0);
        }
    }

    #[test]
    fn signature_is_scaled_to_eighteen_percent() {
        assert_eq!(signature_size(1000, 400, 200), (180, 90));
        assert_eq!(signature_size(1600, 288, 100), (288, 100));
        assert_eq!(signature_size(10, 0, 0), (1, 1));
    }

    #[test]
    fn centered_origin_uses_box_size() {
        let a = Anchor::new(500.0, 300.0);
        assert_eq!(a.centered_origin(200, 40), (400, 280));
        assert_eq!(a.centered_origin(50, 10), (475, 295));
    }
}
