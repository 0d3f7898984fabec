//! Menu surface: one selectable entry per catalog batch, and the shareable
//! deep link a selection turns into.

use std::sync::Arc;

use crate::{messaging::types::InlineKeyboard, payload::PayloadRouter, Result};

pub const DEFAULT_LINK_HOST: &str = "t.me";

const BUTTON_LABEL_MAX: usize = 48;
const SELECTION_PREFIX: &str = "ep_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuEntry {
    /// Callback data carried by the button (`ep_<start>-<end>`).
    pub key: String,
    pub label: String,
    pub batch_name: String,
}

pub struct Menu {
    router: Arc<PayloadRouter>,
    host: String,
    entries: Vec<MenuEntry>,
}

impl Menu {
    pub fn new(router: Arc<PayloadRouter>, host: impl Into<String>) -> Self {
        let catalog = router.catalog();
        let entries = catalog
            .batches()
            .iter()
            .map(|b| MenuEntry {
                key: format!("{SELECTION_PREFIX}{}", b.range()),
                label: format!("{} ({} - {})", catalog.title, b.start_label, b.end),
                batch_name: b.name.clone(),
            })
            .collect();
        Self {
            router,
            host: host.into(),
            entries,
        }
    }

    pub fn welcome(&self) -> &str {
        &self.router.catalog().welcome
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn keyboard(&self) -> InlineKeyboard {
        InlineKeyboard::one_per_row(
            self.entries
                .iter()
                .map(|e| (e.label.clone(), e.key.clone())),
            BUTTON_LABEL_MAX,
        )
    }

    pub fn entry(&self, key: &str) -> Option<&MenuEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// `https://<host>/<handle>?start=<token>`
    pub fn deep_link(&self, handle: &str, token: &str) -> String {
        let handle = handle.trim_start_matches('@');
        format!("https://{}/{handle}?start={token}", self.host)
    }

    /// Reply text for a selected entry.
    pub fn link_message(&self, handle: &str, entry: &MenuEntry) -> Result<String> {
        let token = self.router.encode(&entry.batch_name)?;
        Ok(format!(
            "{}: tap the link below to watch.\n\n{}",
            entry.batch_name,
            self.deep_link(handle, &token)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn menu() -> Menu {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let router = Arc::new(PayloadRouter::new(catalog).unwrap());
        Menu::new(router, DEFAULT_LINK_HOST)
    }

    #[test]
    fn one_entry_per_batch() {
        let m = menu();
        assert_eq!(m.entries().len(), 12);
        assert_eq!(m.keyboard().buttons.len(), 12);

        let first = &m.entries()[0];
        assert_eq!(first.key, "ep_1-100");
        assert_eq!(first.label, "One Piece (1 - 100)");
        assert_eq!(first.batch_name, "Episodes 1-100");

        let last = m.entries().last().unwrap();
        assert_eq!(last.key, "ep_1101-Ongoing");
        assert_eq!(last.label, "One Piece (1101 - Ongoing)");
    }

    #[test]
    fn selection_builds_deep_link() {
        let m = menu();
        let entry = m.entry("ep_1-100").unwrap();
        let text = m.link_message("ExampleBot", entry).unwrap();
        assert!(text.starts_with("Episodes 1-100: "));
        assert!(text.ends_with("https://t.me/ExampleBot?start=onepiece_1-100"));
    }

    #[test]
    fn deep_link_strips_at_sign() {
        let m = menu();
        assert_eq!(
            m.deep_link("@ExampleBot", "onepiece_101-200"),
            "https://t.me/ExampleBot?start=onepiece_101-200"
        );
    }

    #[test]
    fn unknown_key_has_no_entry() {
        let m = menu();
        assert!(m.entry("ep_0-0").is_none());
        assert!(m.entry("").is_none());
    }
}
