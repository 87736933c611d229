use std::fmt;

use serde::{Deserialize, Serialize};

/// Label reserved for the uploaded original in every descriptor map.
pub const ORIGINAL_LABEL: &str = "original";

/// Pixel dimensions, width first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One configured derivative target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Carried through configuration only.
    #[serde(default)]
    pub cacheable: bool,
}

impl VariantSpec {
    pub fn new(label: impl Into<String>, size: impl Into<Size>, cacheable: bool) -> Self {
        let size = size.into();
        Self {
            label: label.into(),
            width: size.width,
            height: size.height,
            cacheable,
        }
    }

    pub fn target_size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// The stock variant list: thumbnail, small, medium, large.
pub fn default_variants() -> Vec<VariantSpec> {
    vec![
        VariantSpec::new("thumbnail", (20, 40), true),
        VariantSpec::new("small", (40, 30), true),
        VariantSpec::new("medium", (100, 60), false),
        VariantSpec::new("large", (200, 100), false),
    ]
}
