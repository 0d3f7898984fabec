//! Deep-link payload routing.
//!
//! Tokens look like `<series_prefix>_<start>-<end>` (`onepiece_101-200`) and are
//! matched against the exact set of catalog tokens. Nothing is parsed out of a
//! token: a string either is one of the catalog's tokens or it is refused.

use std::{collections::HashMap, sync::Arc};

use crate::{
    catalog::{Batch, Catalog},
    errors::{InvalidToken, InvalidTokenReason},
    Error, Result,
};

/// Telegram caps `start` parameters at 64 characters.
pub const MAX_TOKEN_LEN: usize = 64;

#[derive(Clone, Debug)]
pub struct PayloadRouter {
    catalog: Arc<Catalog>,
    by_token: HashMap<String, usize>,
    by_name: HashMap<String, String>,
}

impl PayloadRouter {
    pub fn new(catalog: Arc<Catalog>) -> Result<Self> {
        let mut by_token = HashMap::new();
        let mut by_name = HashMap::new();

        for (idx, batch) in catalog.batches().iter().enumerate() {
            let token = token_for(&catalog.series_prefix, batch);
            if token.len() > MAX_TOKEN_LEN {
                return Err(Error::Config(format!(
                    "token for {} exceeds {MAX_TOKEN_LEN} chars",
                    batch.name
                )));
            }
            if by_token.insert(token.clone(), idx).is_some() {
                return Err(Error::Config(format!("duplicate token: {token}")));
            }
            by_name.insert(batch.name.clone(), token);
        }

        Ok(Self {
            catalog,
            by_token,
            by_name,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Token for a catalog batch name.
    ///
    /// Callers only pass names enumerated from the catalog, so an unknown name
    /// is a programming error surfaced as [`Error::UnknownBatch`].
    pub fn encode(&self, batch_name: &str) -> Result<String> {
        self.by_name
            .get(batch_name)
            .cloned()
            .ok_or_else(|| Error::UnknownBatch(batch_name.to_string()))
    }

    /// `(batch name, start label)` for an externally supplied token.
    pub fn decode(&self, token: &str) -> std::result::Result<(&str, u32), InvalidToken> {
        self.resolve(token)
            .map(|batch| (batch.name.as_str(), batch.start_label))
    }

    /// Same as [`decode`](Self::decode) but hands back the whole batch.
    pub fn resolve(&self, token: &str) -> std::result::Result<&Batch, InvalidToken> {
        if token.is_empty() {
            return Err(InvalidToken::new(InvalidTokenReason::Empty));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(InvalidToken::new(InvalidTokenReason::TooLong));
        }
        self.by_token
            .get(token)
            .and_then(|idx| self.catalog.batches().get(*idx))
            .ok_or(InvalidToken::new(InvalidTokenReason::Unrecognized))
    }
}

fn token_for(prefix: &str, batch: &Batch) -> String {
    format!("{prefix}_{}", batch.range())
}
