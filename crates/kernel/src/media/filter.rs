//! Rendition filter specs.
//!
//! A spec is a `|`-separated chain of operations:
//!
//! | Operation  | Effect                                              |
//! |------------|-----------------------------------------------------|
//! | `original` | no change                                           |
//! | `width-N`  | scale down to N pixels wide                         |
//! | `height-N` | scale down to N pixels high                         |
//! | `max-WxH`  | scale down to fit inside W×H                        |
//! | `min-WxH`  | scale down until one side matches, covering W×H     |
//! | `fill-WxH` | crop to the W:H ratio around the focal point, scale |
//! | `scale-P`  | scale to P percent                                  |
//!
//! Images are never scaled up.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use image::DynamicImage;
use image::imageops::FilterType;
use regex::Regex;
use thiserror::Error;

use crate::models::image::FocalPoint;

/// Maximum allowed output dimension.
pub const MAX_DIMENSION: u32 = 4096;

/// Maximum `scale-P` percentage.
const MAX_SCALE_PERCENT: u32 = 100;

#[allow(clippy::expect_used)]
static SINGLE_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(width|height|scale)-(\d{1,5})$").expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static BOX_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(max|min|fill)-(\d{1,5})x(\d{1,5})$").expect("valid regex literal")
});

/// Filter spec parse errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterSpecError {
    #[error("empty filter spec")]
    Empty,

    #[error("unknown filter operation '{0}'")]
    UnknownOperation(String),

    #[error("filter operation '{0}' needs dimensions between 1 and {MAX_DIMENSION}")]
    InvalidDimension(String),
}

/// A single resize operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Original,
    Width(u32),
    Height(u32),
    Max(u32, u32),
    Min(u32, u32),
    Fill(u32, u32),
    Scale(u32),
}

impl Operation {
    fn parse(op: &str) -> Result<Self, FilterSpecError> {
        if op == "original" {
            return Ok(Operation::Original);
        }
        let invalid = || FilterSpecError::InvalidDimension(op.to_string());

        if let Some(caps) = SINGLE_ARG.captures(op) {
            let n: u32 = caps[2].parse().map_err(|_| invalid())?;
            let limit = if &caps[1] == "scale" {
                MAX_SCALE_PERCENT
            } else {
                MAX_DIMENSION
            };
            if n == 0 || n > limit {
                return Err(invalid());
            }
            return Ok(match &caps[1] {
                "width" => Operation::Width(n),
                "height" => Operation::Height(n),
                _ => Operation::Scale(n),
            });
        }

        if let Some(caps) = BOX_ARG.captures(op) {
            let w: u32 = caps[2].parse().map_err(|_| invalid())?;
            let h: u32 = caps[3].parse().map_err(|_| invalid())?;
            if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
                return Err(invalid());
            }
            return Ok(match &caps[1] {
                "max" => Operation::Max(w, h),
                "min" => Operation::Min(w, h),
                _ => Operation::Fill(w, h),
            });
        }

        Err(FilterSpecError::UnknownOperation(op.to_string()))
    }

    /// Apply the operation. The focal point, in source pixels, is carried
    /// into the output's coordinates for the next operation in the chain.
    fn apply(
        self,
        img: DynamicImage,
        focal: Option<FocalPoint>,
    ) -> (DynamicImage, Option<FocalPoint>) {
        let (w, h) = (img.width().max(1), img.height().max(1));
        let out = match self {
            Operation::Original => img,
            Operation::Width(n) => downscale(img, ratio(n, w)),
            Operation::Height(n) => downscale(img, ratio(n, h)),
            Operation::Max(bw, bh) => downscale(img, ratio(bw, w).min(ratio(bh, h))),
            Operation::Min(bw, bh) => downscale(img, ratio(bw, w).max(ratio(bh, h))),
            Operation::Scale(p) => downscale(img, p as f64 / 100.0),
            Operation::Fill(bw, bh) => return fill(img, bw, bh, focal),
        };
        let focal = focal.map(|p| {
            project(p, (0, 0), ratio(out.width(), w), ratio(out.height(), h))
        });
        (out, focal)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Original => f.write_str("original"),
            Operation::Width(n) => write!(f, "width-{n}"),
            Operation::Height(n) => write!(f, "height-{n}"),
            Operation::Max(w, h) => write!(f, "max-{w}x{h}"),
            Operation::Min(w, h) => write!(f, "min-{w}x{h}"),
            Operation::Fill(w, h) => write!(f, "fill-{w}x{h}"),
            Operation::Scale(p) => write!(f, "scale-{p}"),
        }
    }
}

fn ratio(target: u32, actual: u32) -> f64 {
    target as f64 / actual as f64
}

fn scaled(v: u32, factor: f64) -> u32 {
    ((v as f64 * factor).round() as u32).clamp(1, MAX_DIMENSION)
}

/// Resize by `factor` when it shrinks the image.
fn downscale(img: DynamicImage, factor: f64) -> DynamicImage {
    if factor >= 1.0 {
        return img;
    }
    let (w, h) = (scaled(img.width(), factor), scaled(img.height(), factor));
    img.resize_exact(w, h, FilterType::Lanczos3)
}

/// Move `p` by `-offset`, then scale it by `sx`/`sy`.
fn project(p: FocalPoint, offset: (u32, u32), sx: f64, sy: f64) -> FocalPoint {
    let at = |v: i32, off: u32, factor: f64| ((v - off as i32) as f64 * factor).round() as i32;
    FocalPoint {
        x: at(p.x, offset.0, sx),
        y: at(p.y, offset.1, sy),
        width: at(p.width, 0, sx),
        height: at(p.height, 0, sy),
    }
}

/// Crop to the `bw:bh` ratio centred on the focal point, then shrink to `bw×bh`.
fn fill(
    img: DynamicImage,
    bw: u32,
    bh: u32,
    focal: Option<FocalPoint>,
) -> (DynamicImage, Option<FocalPoint>) {
    let (iw, ih) = (img.width().max(1), img.height().max(1));
    let target = bw as f64 / bh as f64;

    let (cw, ch) = if iw as f64 / ih as f64 > target {
        (((ih as f64 * target).round() as u32).clamp(1, iw), ih)
    } else {
        (iw, ((iw as f64 / target).round() as u32).clamp(1, ih))
    };

    let (cx, cy) = match focal {
        Some(p) => (p.x.max(0) as u32, p.y.max(0) as u32),
        None => (iw / 2, ih / 2),
    };
    let left = cx.saturating_sub(cw / 2).min(iw - cw);
    let top = cy.saturating_sub(ch / 2).min(ih - ch);

    let cropped = img.crop_imm(left, top, cw, ch);
    if cw <= bw {
        let focal = focal.map(|p| project(p, (left, top), 1.0, 1.0));
        (cropped, focal)
    } else {
        let focal = focal.map(|p| project(p, (left, top), ratio(bw, cw), ratio(bh, ch)));
        (cropped.resize_exact(bw, bh, FilterType::Lanczos3), focal)
    }
}

/// A parsed, canonicalised filter spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    operations: Vec<Operation>,
}

impl FilterSpec {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Whether the output depends on the image's focal point.
    pub fn uses_focal_point(&self) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op, Operation::Fill(..)))
    }

    /// Apply every operation in order. `focal` is in source image pixels.
    pub fn apply(&self, img: DynamicImage, focal: Option<&FocalPoint>) -> DynamicImage {
        let (img, _) = self
            .operations
            .iter()
            .fold((img, focal.copied()), |(img, focal), op| op.apply(img, focal));
        img
    }
}

impl FromStr for FilterSpec {
    type Err = FilterSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FilterSpecError::Empty);
        }
        let operations = s
            .split('|')
            .map(|op| Operation::parse(op.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { operations })
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.operations.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{op}")?;
        }
        Ok(())
    }
}
