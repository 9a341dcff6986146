use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometry of one OCR detection, in image pixels with the origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FragmentBox {
    /// Four corner points as emitted by quad-based detectors.
    Quad([[f64; 2]; 4]),
    Rect { x: f64, y: f64, w: f64, h: f64 },
}

impl FragmentBox {
    pub fn rect(x: f64, y: f64, w: f64, h: f64) -> Self {
        FragmentBox::Rect { x, y, w, h }
    }

    /// Axis-aligned bounds enclosing the box.
    pub fn bounds(&self) -> Bounds {
        match *self {
            FragmentBox::Quad(points) => {
                let init = Bounds {
                    left: f64::INFINITY,
                    top: f64::INFINITY,
                    right: f64::NEG_INFINITY,
                    bottom: f64::NEG_INFINITY,
                };
                points.iter().fold(init, |b, [x, y]| Bounds {
                    left: b.left.min(*x),
                    top: b.top.min(*y),
                    right: b.right.max(*x),
                    bottom: b.bottom.max(*y),
                })
            }
            FragmentBox::Rect { x, y, w, h } => Bounds {
                left: x,
                top: y,
                right: x + w,
                bottom: y + h,
            },
        }
    }

    fn coordinates(&self) -> Vec<f64> {
        match *self {
            FragmentBox::Quad(points) => points.iter().flatten().copied().collect(),
            FragmentBox::Rect { x, y, w, h } => vec![x, y, w, h],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union. Two degenerate boxes at the same spot count as identical.
    pub fn iou(&self, other: &Bounds) -> f64 {
        let inter = Bounds {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        if inter.width() < 0.0 || inter.height() < 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter.area();
        if union <= 0.0 {
            return if self == other { 1.0 } else { 0.0 };
        }
        inter.area() / union
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FragmentDefect {
    #[error("box has a non-finite coordinate")]
    NonFiniteCoordinate,
    #[error("box has negative width or height")]
    NegativeExtent,
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// One OCR detection: recognized text, where it was found, and how sure the engine was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    #[serde(rename = "box", alias = "bbox")]
    pub bbox: FragmentBox,
    pub confidence: f64,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, bbox: FragmentBox, confidence: f64) -> Self {
        Self { text: text.into(), bbox, confidence }
    }

    pub fn bounds(&self) -> Bounds {
        self.bbox.bounds()
    }

    pub fn center_x(&self) -> f64 {
        self.bounds().center_x()
    }

    pub fn center_y(&self) -> f64 {
        self.bounds().center_y()
    }

    pub fn height(&self) -> f64 {
        self.bounds().height()
    }

    /// Structural check applied before the pipeline runs. A defect here means
    /// the OCR collaborator broke its contract, not that the bill is noisy.
    pub fn check(&self) -> Result<(), FragmentDefect> {
        if self.bbox.coordinates().iter().any(|c| !c.is_finite()) {
            return Err(FragmentDefect::NonFiniteCoordinate);
        }
        if let FragmentBox::Rect { w, h, .. } = self.bbox {
            if w < 0.0 || h < 0.0 {
                return Err(FragmentDefect::NegativeExtent);
            }
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(FragmentDefect::ConfidenceOutOfRange(self.confidence));
        }
        Ok(())
    }
}
