//! # Result Aggregator
//!
//! Merges the offers of every successful provider into one deduplicated,
//! ordered page.
//!
//! # Algorithm
//!
//! 1. Flatten the offers of successful results; drop offers priced in a
//!    currency other than the requested one.
//! 2. Group by [`DedupKey`]. Within a group the canonical offer is the
//!    cheapest; equal prices go to the provider with the higher windowed
//!    success rate, then the lower average latency, then the smaller
//!    provider id. The others become
//!    [`alternate_providers`](FlightOffer::alternate_providers) of the
//!    canonical offer.
//! 3. Sort by the requested [`SortOption`], falling back to price, dedup
//!    key and provider id so the order is total.
//! 4. Cap at `max_results`, then apply [`Pagination`].
//!
//! The output depends only on the inputs, never on the order in which
//! providers answered.

use crate::domain::entities::{AlternateProvider, DedupKey, FlightOffer};
use crate::domain::value_objects::{FlightSearchParams, Pagination, ProviderId, SortOption};
use crate::infrastructure::providers::traits::ProviderResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Ordering and paging requested for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Sort order of the result list.
    pub sort: SortOption,
    /// Page of the sorted list to return.
    pub pagination: Pagination,
}

impl SearchOptions {
    /// Options with the given sort and no paging.
    #[must_use]
    pub fn sorted_by(sort: SortOption) -> Self {
        Self {
            sort,
            pagination: Pagination::default(),
        }
    }

    /// Sets the page.
    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

/// Reliability figures used to break price ties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderStats {
    /// Windowed success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Windowed mean latency.
    pub average_latency_ms: f64,
}

impl Default for ProviderStats {
    fn default() -> Self {
        Self {
            success_rate: 1.0,
            average_latency_ms: 0.0,
        }
    }
}

/// Output of [`ResultAggregator::aggregate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedOffers {
    /// The requested page.
    pub offers: Vec<FlightOffer>,
    /// Distinct flights after the `max_results` cap, before paging.
    pub total_count: usize,
    /// Offers dropped for a currency mismatch.
    pub discarded: usize,
}

/// Dedup, rank and page provider results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Creates an aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Aggregates `results`. Failed results are ignored.
    #[must_use]
    pub fn aggregate(
        &self,
        results: &[ProviderResult<Vec<FlightOffer>>],
        params: &FlightSearchParams,
        options: &SearchOptions,
        stats: &HashMap<ProviderId, ProviderStats>,
    ) -> AggregatedOffers {
        let mut discarded = 0;
        let mut groups: BTreeMap<DedupKey, Vec<&FlightOffer>> = BTreeMap::new();
        for offer in results.iter().filter_map(ProviderResult::data).flatten() {
            if offer.price().currency() != params.currency() {
                warn!(
                    provider = %offer.provider(),
                    offer = %offer.id(),
                    currency = %offer.price().currency(),
                    expected = %params.currency(),
                    "offer dropped, currency mismatch"
                );
                discarded += 1;
                continue;
            }
            groups.entry(offer.dedup_key()).or_default().push(offer);
        }

        let mut merged: Vec<(DedupKey, FlightOffer)> = groups
            .into_iter()
            .filter_map(|(key, mut group)| {
                group.sort_by(|a, b| canonical_order(a, b, stats));
                let (canonical, rest) = group.split_first()?;
                let alternates = rest
                    .iter()
                    .map(|o| AlternateProvider {
                        provider: o.provider().clone(),
                        offer_id: o.id().clone(),
                        total_price: o.total_price(),
                    })
                    .collect();
                Some((key, canonical.with_alternates(alternates)))
            })
            .collect();

        merged.sort_by(|(ka, a), (kb, b)| {
            sort_order(options.sort, a, b)
                .then_with(|| a.total_price().cmp(&b.total_price()))
                .then_with(|| ka.cmp(kb))
                .then_with(|| a.provider().cmp(b.provider()))
        });
        merged.truncate(params.max_results());

        let total_count = merged.len();
        let Pagination { offset, limit } = options.pagination;
        let offers: Vec<FlightOffer> = merged
            .into_iter()
            .map(|(_, offer)| offer)
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        debug!(
            total = total_count,
            returned = offers.len(),
            discarded,
            sort = %options.sort,
            "offers aggregated"
        );
        AggregatedOffers {
            offers,
            total_count,
            discarded,
        }
    }
}

fn canonical_order(
    a: &FlightOffer,
    b: &FlightOffer,
    stats: &HashMap<ProviderId, ProviderStats>,
) -> Ordering {
    let sa = stats.get(a.provider()).copied().unwrap_or_default();
    let sb = stats.get(b.provider()).copied().unwrap_or_default();
    a.total_price()
        .cmp(&b.total_price())
        .then_with(|| sb.success_rate.total_cmp(&sa.success_rate))
        .then_with(|| sa.average_latency_ms.total_cmp(&sb.average_latency_ms))
        .then_with(|| a.provider().cmp(b.provider()))
        .then_with(|| a.id().cmp(b.id()))
}

fn sort_order(sort: SortOption, a: &FlightOffer, b: &FlightOffer) -> Ordering {
    match sort {
        SortOption::Price => a.total_price().cmp(&b.total_price()),
        SortOption::PriceDesc => b.total_price().cmp(&a.total_price()),
        SortOption::Duration => a.total_duration_minutes().cmp(&b.total_duration_minutes()),
        SortOption::Departure => match (a.departure_time(), b.departure_time()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortOption::Stops => a.total_stops().cmp(&b.total_stops()),
    }
}
