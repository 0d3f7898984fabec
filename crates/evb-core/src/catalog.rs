//! Static content catalog: batch name -> ordered media references.
//!
//! The catalog is data, not code. A built-in copy ships inside the binary
//! (`assets/catalog.json`); `CATALOG_PATH` can point at a replacement with the
//! same shape.

use std::{collections::HashSet, fmt, path::Path, str::FromStr};

use serde::Deserialize;

use crate::{Error, Result};

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.json");

/// Handles that mark a slot whose real content was never filled in.
pub const PLACEHOLDER_SENTINELS: &[&str] = &["Your_Video_ID", "YOUR_VIDEO_ID_HERE"];

const INDEX_PLACEHOLDER: &str = "{index}";

/// Opaque content handle understood only by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        let v = self.0.trim();
        v.is_empty()
            || PLACEHOLDER_SENTINELS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(v))
    }
}

/// Upper bound of a batch range: a concrete label or an open-ended run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeEnd {
    Label(u32),
    Ongoing,
}

impl fmt::Display for RangeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeEnd::Label(n) => write!(f, "{n}"),
            RangeEnd::Ongoing => f.write_str("Ongoing"),
        }
    }
}

impl FromStr for RangeEnd {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "Ongoing" {
            return Ok(RangeEnd::Ongoing);
        }
        s.parse::<u32>()
            .map(RangeEnd::Label)
            .map_err(|_| Error::Config(format!("invalid batch range end: {s:?}")))
    }
}

/// One named, ordered group of media references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    pub name: String,
    pub start_label: u32,
    pub end: RangeEnd,
    pub items: Vec<MediaRef>,
}

impl Batch {
    /// `"<start>-<end>"`, shared by tokens and menu selection keys.
    pub fn range(&self) -> String {
        format!("{}-{}", self.start_label, self.end)
    }

    /// Empty, or nothing but placeholders.
    pub fn is_unconfigured(&self) -> bool {
        self.items.iter().all(MediaRef::is_placeholder)
    }
}

/// Per-item caption with an `{index}` slot for the running label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptionTemplate(String);

impl CaptionTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(INDEX_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "caption template must contain {INDEX_PLACEHOLDER}"
            )));
        }
        Ok(Self(template))
    }

    pub fn render(&self, index: u32) -> String {
        self.0.replace(INDEX_PLACEHOLDER, &index.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct Catalog {
    pub series_prefix: String,
    pub title: String,
    pub welcome: String,
    pub caption: CaptionTemplate,
    batches: Vec<Batch>,
}

#[derive(Deserialize)]
struct CatalogFile {
    series_prefix: String,
    title: String,
    welcome: String,
    caption: String,
    batches: Vec<BatchFile>,
}

#[derive(Deserialize)]
struct BatchFile {
    start: u32,
    end: String,
    #[serde(default)]
    items: Vec<MediaRef>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path)?;
        Self::from_json(&txt)
    }

    pub fn from_json(input: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(input)?;

        let prefix = file.series_prefix.trim().to_string();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Config(format!(
                "series_prefix must be non-empty ascii alphanumeric: {prefix:?}"
            )));
        }

        let mut batches = Vec::with_capacity(file.batches.len());
        let mut seen = HashSet::new();
        for raw in file.batches {
            let end: RangeEnd = raw.end.parse()?;
            if let RangeEnd::Label(n) = end {
                if n < raw.start {
                    return Err(Error::Config(format!(
                        "batch {}-{n}: end before start",
                        raw.start
                    )));
                }
            }
            let last_offset = u32::try_from(raw.items.len().saturating_sub(1)).ok();
            if last_offset.and_then(|o| raw.start.checked_add(o)).is_none() {
                return Err(Error::Config(format!(
                    "batch {}-{end}: item labels run past {}",
                    raw.start,
                    u32::MAX
                )));
            }
            let batch = Batch {
                name: format!("Episodes {}-{end}", raw.start),
                start_label: raw.start,
                end,
                items: raw.items,
            };
            if !seen.insert(batch.name.clone()) {
                return Err(Error::Config(format!("duplicate batch: {}", batch.name)));
            }
            batches.push(batch);
        }

        if batches.is_empty() {
            return Err(Error::Config("catalog has no batches".to_string()));
        }

        Ok(Self {
            series_prefix: prefix,
            title: file.title,
            welcome: file.welcome,
            caption: CaptionTemplate::new(file.caption)?,
            batches,
        })
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn get(&self, name: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads_all_batches() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.batches().len(), 12);
        assert_eq!(catalog.series_prefix, "onepiece");

        let first = catalog.get("Episodes 1-100").unwrap();
        assert_eq!(first.start_label, 1);
        assert_eq!(first.items.len(), 100);
        assert!(!first.is_unconfigured());

        let last = catalog.batches().last().unwrap();
        assert_eq!(last.name, "Episodes 1101-Ongoing");
        assert_eq!(last.end, RangeEnd::Ongoing);
        assert!(last.is_unconfigured());
    }

    #[test]
    fn placeholder_detection_ignores_case() {
        assert!(MediaRef("Your_Video_ID".into()).is_placeholder());
        assert!(MediaRef("your_video_id_here".into()).is_placeholder());
        assert!(MediaRef("  ".into()).is_placeholder());
        assert!(!MediaRef("BAACAgUAAxkBAAECL6Ro".into()).is_placeholder());
    }

    #[test]
    fn empty_batch_is_unconfigured() {
        let b = Batch {
            name: "Episodes 1-2".into(),
            start_label: 1,
            end: RangeEnd::Label(2),
            items: vec![],
        };
        assert!(b.is_unconfigured());
        assert_eq!(b.range(), "1-2");
    }

    #[test]
    fn caption_renders_index() {
        let t = CaptionTemplate::new("Episode {index}").unwrap();
        assert_eq!(t.render(101), "Episode 101");
        assert!(CaptionTemplate::new("Episode").is_err());
    }

    #[test]
    fn rejects_duplicate_batches() {
        let json = r#"{
            "series_prefix": "x", "title": "X", "welcome": "hi",
            "caption": "Ep {index}",
            "batches": [
                {"start": 1, "end": "10", "items": []},
                {"start": 1, "end": "10", "items": []}
            ]
        }"#;
        let err = Catalog::from_json(json).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_bad_prefix_and_range() {
        let bad_prefix = r#"{
            "series_prefix": "one piece", "title": "X", "welcome": "hi",
            "caption": "Ep {index}", "batches": [{"start": 1, "end": "10"}]
        }"#;
        assert!(Catalog::from_json(bad_prefix).is_err());

        let bad_range = r#"{
            "series_prefix": "x", "title": "X", "welcome": "hi",
            "caption": "Ep {index}", "batches": [{"start": 10, "end": "5"}]
        }"#;
        assert!(Catalog::from_json(bad_range).is_err());

        let bad_end = r#"{
            "series_prefix": "x", "title": "X", "welcome": "hi",
            "caption": "Ep {index}", "batches": [{"start": 1, "end": "later"}]
        }"#;
        assert!(Catalog::from_json(bad_end).is_err());
    }

    #[test]
    fn rejects_labels_past_u32_max() {
        let catalog = |start: u32, items: &str| {
            format!(
                r#"{{
                    "series_prefix": "x", "title": "X", "welcome": "hi",
                    "caption": "Ep {{index}}",
                    "batches": [{{"start": {start}, "end": "Ongoing", "items": {items}}}]
                }}"#
            )
        };

        let err = Catalog::from_json(&catalog(u32::MAX, r#"["a", "b"]"#)).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");

        let last = Catalog::from_json(&catalog(u32::MAX, r#"["a"]"#)).unwrap();
        assert_eq!(last.batches()[0].start_label, u32::MAX);
        assert!(Catalog::from_json(&catalog(u32::MAX - 1, r#"["a", "b"]"#)).is_ok());
    }
}
