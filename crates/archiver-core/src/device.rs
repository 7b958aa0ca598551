use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::date::Metadata;
use crate::media::{Category, MediaFile};

/// Inferred capture hardware, rendered into the destination filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Video,
    Camera,
    Drone,
    Audio,
    Image,
    Srt,
    Unknown,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Video => "video",
            DeviceType::Camera => "camera",
            DeviceType::Drone => "drone",
            DeviceType::Audio => "audio",
            DeviceType::Image => "image",
            DeviceType::Srt => "srt",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Prefix,
    Contains,
}

/// Filename convention of a particular device family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRule {
    pub pattern: String,
    #[serde(rename = "match", default = "default_match_kind")]
    pub kind: MatchKind,
    pub device: DeviceType,
    /// Categories the rule applies to; empty means all
    #[serde(default)]
    pub categories: Vec<Category>,
}

fn default_match_kind() -> MatchKind {
    MatchKind::Prefix
}

impl DeviceRule {
    fn matches(&self, file: &MediaFile) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&file.category) {
            return false;
        }
        let name = file.filename.to_lowercase();
        let pattern = self.pattern.to_lowercase();
        match self.kind {
            MatchKind::Prefix => name.starts_with(&pattern),
            MatchKind::Contains => name.contains(&pattern),
        }
    }
}

/// Brand keyword looked up in make/model text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerRule {
    pub keyword: String,
    pub device: DeviceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Tag for video files no rule matched
    pub video_default: DeviceType,
    pub image_default: DeviceType,
    pub filename_rules: Vec<DeviceRule>,
    pub manufacturer_rules: Vec<ManufacturerRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let drone = |keyword: &str| ManufacturerRule {
            keyword: keyword.to_string(),
            device: DeviceType::Drone,
        };
        Self {
            video_default: DeviceType::Video,
            image_default: DeviceType::Image,
            filename_rules: vec![DeviceRule {
                pattern: "DJI_".to_string(),
                kind: MatchKind::Prefix,
                device: DeviceType::Drone,
                categories: vec![Category::Video, Category::Image],
            }],
            manufacturer_rules: ["dji", "parrot", "skydio", "autel"]
                .into_iter()
                .map(drone)
                .collect(),
        }
    }
}

/// Rule order: sidecar, filename, manufacturer text, category default.
pub struct DeviceClassifier {
    config: ClassifierConfig,
}

impl DeviceClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, file: &MediaFile, metadata: Option<&Metadata>) -> DeviceType {
        if file.category == Category::Sidecar {
            return DeviceType::Srt;
        }

        if let Some(rule) = self.config.filename_rules.iter().find(|r| r.matches(file)) {
            return rule.device;
        }

        if let Some(text) = metadata.and_then(Metadata::manufacturer_text) {
            let text = text.to_lowercase();
            if let Some(rule) = self
                .config
                .manufacturer_rules
                .iter()
                .find(|r| !r.keyword.is_empty() && text.contains(&r.keyword.to_lowercase()))
            {
                return rule.device;
            }
        }

        match file.category {
            Category::Video => self.config.video_default,
            Category::Audio => DeviceType::Audio,
            Category::Image => self.config.image_default,
            Category::Sidecar => DeviceType::Unknown,
        }
    }
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
