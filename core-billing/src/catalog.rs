//! Catalog cache.
//!
//! Last-known product metadata keyed by product id. Launching a purchase
//! flow never waits on the network, so this cache is the only source of
//! truth for "is this item known". Entries live until overwritten;
//! freshness only tells the host whether a re-query is warranted.

use bridge_traits::billing::{ProductDetails, ProductKind};
use chrono::{DateTime, Utc};
use core_runtime::logging::ANOMALY_TARGET;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::CatalogStatus;

/// When the catalog last answered successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Freshness {
    /// No successful response yet, or the last response was a failure.
    NeverSucceeded,
    RespondedAt { at: DateTime<Utc> },
}

/// What a catalog response did to the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogUpdate {
    /// Ids written, in response order.
    pub written: Vec<String>,
    /// Requested ids the response did not contain.
    pub missing: Vec<String>,
    /// Returned ids nobody asked for. Still cached.
    pub unrequested: Vec<String>,
}

#[derive(Debug)]
pub struct CatalogCache {
    entries: HashMap<String, ProductDetails>,
    freshness: Freshness,
    requery_interval: Duration,
}

impl CatalogCache {
    pub fn new(requery_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            freshness: Freshness::NeverSucceeded,
            requery_interval,
        }
    }

    /// Applies one catalog response.
    ///
    /// A successful response overwrites each returned entry whole and advances
    /// freshness. A failed one leaves entries alone and resets freshness.
    pub fn record_response(
        &mut self,
        kind: ProductKind,
        requested: &[String],
        succeeded: bool,
        returned: Vec<ProductDetails>,
        now: DateTime<Utc>,
    ) -> CatalogUpdate {
        if !succeeded {
            self.freshness = Freshness::NeverSucceeded;
            debug!(%kind, "Catalog query failed, freshness reset");
            return CatalogUpdate::default();
        }

        let mut update = CatalogUpdate::default();
        for details in returned {
            let id = details.product_id.clone();
            if !requested.contains(&id) {
                update.unrequested.push(id.clone());
            }
            self.entries.insert(id.clone(), details);
            update.written.push(id);
        }
        update.missing = requested
            .iter()
            .filter(|id| !update.written.contains(*id))
            .cloned()
            .collect();

        self.freshness = Freshness::RespondedAt { at: now };

        if !update.missing.is_empty() {
            warn!(
                target: ANOMALY_TARGET,
                %kind,
                missing = ?update.missing,
                "Catalog response lacks requested items"
            );
        }
        if !update.unrequested.is_empty() {
            warn!(
                target: ANOMALY_TARGET,
                %kind,
                unrequested = ?update.unrequested,
                "Catalog response contains items that were not requested"
            );
        }
        debug!(%kind, written = update.written.len(), "Catalog cache updated");

        update
    }

    /// Cache-only read. Never triggers a query.
    pub fn lookup(&self, product_id: &str) -> Option<&ProductDetails> {
        self.entries.get(product_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.freshness {
            Freshness::NeverSucceeded => true,
            // A clock that moved backwards does not make entries stale.
            Freshness::RespondedAt { at } => (now - at)
                .to_std()
                .map(|elapsed| elapsed >= self.requery_interval)
                .unwrap_or(false),
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> CatalogStatus {
        CatalogStatus {
            entries: self.entries.len(),
            freshness: self.freshness,
            stale: self.is_stale(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    const FOUR_HOURS: Duration = Duration::from_secs(4 * 60 * 60);

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn product(id: &str, price: &str) -> ProductDetails {
        ProductDetails::new(id, ProductKind::InApp).with_metadata(json!({ "price": price }))
    }

    #[test]
    fn test_new_cache_is_empty_and_stale() {
        let cache = CatalogCache::new(FOUR_HOURS);
        assert!(cache.is_empty());
        assert!(cache.is_stale(Utc::now()));
        assert_eq!(cache.freshness(), Freshness::NeverSucceeded);
    }

    #[test]
    fn test_success_overwrites_entries_whole() {
        let mut cache = CatalogCache::new(FOUR_HOURS);
        let now = Utc::now();
        let first = ProductDetails::new("gas", ProductKind::InApp)
            .with_metadata(json!({ "price": "$1", "title": "Gas" }));
        cache.record_response(ProductKind::InApp, &ids(&["gas"]), true, vec![first], now);

        cache.record_response(
            ProductKind::InApp,
            &ids(&["gas"]),
            true,
            vec![product("gas", "$2")],
            now,
        );

        let entry = cache.lookup("gas").unwrap();
        assert_eq!(entry.metadata["price"], "$2");
        assert!(entry.metadata.get("title").is_none());
    }

    #[test]
    fn test_ids_not_returned_keep_prior_value() {
        let mut cache = CatalogCache::new(FOUR_HOURS);
        let now = Utc::now();
        cache.record_response(
            ProductKind::InApp,
            &ids(&["gas", "oil"]),
            true,
            vec![product("gas", "$1"), product("oil", "$5")],
            now,
        );

        let update = cache.record_response(
            ProductKind::InApp,
            &ids(&["gas", "oil"]),
            true,
            vec![product("gas", "$2")],
            now,
        );

        assert_eq!(update.written, ids(&["gas"]));
        assert_eq!(update.missing, ids(&["oil"]));
        assert_eq!(cache.lookup("oil").unwrap().metadata["price"], "$5");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_unrequested_ids_are_cached_and_reported() {
        let mut cache = CatalogCache::new(FOUR_HOURS);
        let update = cache.record_response(
            ProductKind::InApp,
            &ids(&["gas"]),
            true,
            vec![product("gas", "$1"), product("promo", "$0")],
            Utc::now(),
        );

        assert_eq!(update.unrequested, ids(&["promo"]));
        assert!(cache.lookup("promo").is_some());
    }

    #[test]
    fn test_failure_resets_freshness_but_keeps_entries() {
        let mut cache = CatalogCache::new(FOUR_HOURS);
        let now = Utc::now();
        cache.record_response(
            ProductKind::InApp,
            &ids(&["gas"]),
            true,
            vec![product("gas", "$1")],
            now,
        );
        assert!(!cache.is_stale(now));

        let update =
            cache.record_response(ProductKind::InApp, &ids(&["gas"]), false, vec![], now);

        assert!(update.written.is_empty());
        assert!(cache.is_stale(now));
        assert!(cache.lookup("gas").is_some());
    }

    #[test]
    fn test_staleness_window() {
        let mut cache = CatalogCache::new(FOUR_HOURS);
        let start = Utc::now();
        cache.record_response(ProductKind::Subs, &[], true, vec![], start);

        assert!(!cache.is_stale(start + ChronoDuration::hours(3)));
        assert!(cache.is_stale(start + ChronoDuration::hours(4)));
        assert!(!cache.is_stale(start - ChronoDuration::minutes(1)));

        let status = cache.status(start + ChronoDuration::hours(5));
        assert!(status.stale);
        assert_eq!(status.entries, 0);
        assert_eq!(status.freshness, Freshness::RespondedAt { at: start });
    }
}
