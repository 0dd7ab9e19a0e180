use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical food category identifier, stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DishLabel(String);

impl DishLabel {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DishLabel {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for DishLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<DishLabel> for String {
    fn from(value: DishLabel) -> Self {
        value.0
    }
}

impl fmt::Display for DishLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorName {
    Red,
    Green,
    Yellow,
    Orange,
    Blue,
    White,
    Black,
    Brown,
    Beige,
    Dark,
}

impl ColorName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Blue => "blue",
            Self::White => "white",
            Self::Black => "black",
            Self::Brown => "brown",
            Self::Beige => "beige",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureLevel {
    Smooth,
    Medium,
    Complex,
}

impl TextureLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }
}

impl fmt::Display for TextureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which step of the decision cascade produced a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    SushiOverride,
    OriginalFilenameHint,
    FilenameHint,
    Model,
    JapaneseToken,
    ColorTextureRule,
    ColorPool,
    CategoryFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: DishLabel,
    pub source: PredictionSource,
}

impl Prediction {
    pub fn new(label: DishLabel, source: PredictionSource) -> Self {
        Self { label, source }
    }
}
