//! Cost estimation per category, per itinerary, and budget filtering.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{
    ComparisonEntry, ComparisonNote, CostLine, CostSummary, ItineraryCost, Place, PriceBand,
    PriceComparison, PriceEstimate, PriceSource, PriceTier,
};

/// Range used when neither the place nor the profile knows a price.
pub const FALLBACK_BAND: PriceBand = PriceBand::new(50_000, 200_000);
pub const DEFAULT_CURRENCY: &str = "VND";
pub const DEFAULT_TRANSPORT_BUDGET: u64 = 200_000;

const BUDGET_CEILING: u64 = 100_000;
const MODERATE_CEILING: u64 = 300_000;
const EXPENSIVE_CEILING: u64 = 500_000;

/// Category to per-person cost range, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPriceProfile {
    pub currency: String,
    pub categories: HashMap<String, PriceBand>,
}

impl Default for CategoryPriceProfile {
    fn default() -> Self {
        let table: [(&str, u64, u64); 22] = [
            ("restaurant", 80_000, 300_000),
            ("cafe", 30_000, 100_000),
            ("fast_food", 50_000, 150_000),
            ("street_food", 20_000, 50_000),
            ("bar", 50_000, 200_000),
            ("pub", 100_000, 300_000),
            ("museum", 0, 40_000),
            ("temple", 0, 30_000),
            ("park", 0, 20_000),
            ("zoo", 50_000, 100_000),
            ("theatre", 100_000, 500_000),
            ("cinema", 80_000, 150_000),
            ("hotel", 300_000, 2_000_000),
            ("hostel", 100_000, 400_000),
            ("guesthouse", 200_000, 800_000),
            ("shopping_mall", 100_000, 1_000_000),
            ("market", 50_000, 300_000),
            ("spa", 200_000, 1_000_000),
            ("massage", 150_000, 500_000),
            ("taxi", 30_000, 200_000),
            ("bus", 7_000, 15_000),
            ("motorbike_rental", 100_000, 150_000),
        ];

        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            categories: table
                .into_iter()
                .map(|(name, min, max)| (name.to_string(), PriceBand::new(min, max)))
                .collect(),
        }
    }
}

impl CategoryPriceProfile {
    /// Parses a profile from JSON; category keys are lowercased.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut profile: Self = serde_json::from_str(raw)?;
        profile.categories = profile
            .categories
            .into_iter()
            .map(|(key, band)| (key.trim().to_lowercase(), band))
            .collect();
        Ok(profile)
    }

    pub fn lookup(&self, category: &str) -> Option<PriceBand> {
        self.categories.get(&category.trim().to_lowercase()).copied()
    }
}

pub fn tier_for(avg_per_person: u64) -> PriceTier {
    if avg_per_person < BUDGET_CEILING {
        PriceTier::Budget
    } else if avg_per_person < MODERATE_CEILING {
        PriceTier::Moderate
    } else if avg_per_person < EXPENSIVE_CEILING {
        PriceTier::Expensive
    } else {
        PriceTier::Luxury
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriceEstimator {
    profile: CategoryPriceProfile,
}

impl PriceEstimator {
    pub fn new(profile: CategoryPriceProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &CategoryPriceProfile {
        &self.profile
    }

    /// Estimate for `num_people` visiting one place of `category`.
    ///
    /// The tier is always derived from the per-person average.
    pub fn estimate(&self, category: &str, num_people: u32, custom: Option<PriceBand>) -> PriceEstimate {
        let people = num_people.max(1);
        let (band, source) = match custom {
            Some(band) => (band.ordered(), PriceSource::Explicit),
            None => match self.profile.lookup(category) {
                Some(band) => (band, PriceSource::Category),
                None => (FALLBACK_BAND, PriceSource::Fallback),
            },
        };

        let per_person = summarize(band.min, band.max);
        let total = summarize(
            band.min.saturating_mul(u64::from(people)),
            band.max.saturating_mul(u64::from(people)),
        );

        PriceEstimate {
            category: category.to_string(),
            num_people: people,
            per_person,
            total,
            tier: tier_for(per_person.avg),
            currency: self.profile.currency.clone(),
            source,
        }
    }

    /// Explicit source price first, then the place's primary category.
    pub fn estimate_place(&self, place: &Place, num_people: u32) -> PriceEstimate {
        self.estimate(
            place.primary_category(),
            num_people,
            place.price_info.map(|price| price.band()),
        )
    }

    pub fn estimate_itinerary(
        &self,
        places: &[Place],
        num_people: u32,
        include_transport: bool,
        transport_budget: u64,
    ) -> ItineraryCost {
        let people = num_people.max(1);
        let mut total_min = 0_u64;
        let mut total_max = 0_u64;
        let mut breakdown = Vec::with_capacity(places.len() + 1);

        for place in places {
            let estimate = self.estimate_place(place, people);
            total_min = total_min.saturating_add(estimate.total.min);
            total_max = total_max.saturating_add(estimate.total.max);
            breakdown.push(CostLine {
                label: place.name.clone(),
                category: estimate.category.clone(),
                total: estimate.total,
                tier: Some(estimate.tier),
            });
        }

        // an empty plan does not travel anywhere
        if include_transport && !places.is_empty() {
            let transport_total = transport_budget.saturating_mul(u64::from(people));
            total_min = total_min.saturating_add(transport_total);
            total_max = total_max.saturating_add(transport_total);
            breakdown.push(CostLine {
                label: "Transportation".to_string(),
                category: "transport".to_string(),
                total: CostSummary {
                    min: transport_total,
                    max: transport_total,
                    avg: transport_total,
                },
                tier: None,
            });
        }

        let total = summarize(total_min, total_max);
        let divisor = u64::from(people);

        ItineraryCost {
            num_people: people,
            total_places: places.len(),
            total,
            per_person: CostSummary {
                min: total.min / divisor,
                max: total.max / divisor,
                avg: total.avg / divisor,
            },
            breakdown,
            currency: self.profile.currency.clone(),
        }
    }

    /// Keeps places whose per-person average fits the limit, in input order,
    /// with the computed estimate attached.
    pub fn filter_by_budget(&self, places: Vec<Place>, max_per_person: u64, num_people: u32) -> Vec<Place> {
        places
            .into_iter()
            .filter_map(|mut place| {
                let estimate = self.estimate_place(&place, num_people);
                if estimate.per_person.avg <= max_per_person {
                    place.price_estimate = Some(estimate);
                    Some(place)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn compare(&self, places: &[Place]) -> PriceComparison {
        let mut entries = places
            .iter()
            .map(|place| {
                let estimate = self.estimate_place(place, 1);
                ComparisonEntry {
                    place_id: place.place_id.clone(),
                    name: place.name.clone(),
                    category: estimate.category,
                    tier: estimate.tier,
                    avg_cost: estimate.per_person.avg,
                    rank: 0,
                    note: None,
                }
            })
            .collect::<Vec<_>>();

        // stable: equal costs keep input order
        entries.sort_by_key(|entry| entry.avg_cost);

        let count = entries.len();
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.rank = index + 1;
            entry.note = if index == 0 {
                Some(ComparisonNote::MostAffordable)
            } else if index + 1 == count {
                Some(ComparisonNote::MostExpensive)
            } else {
                None
            };
        }

        PriceComparison {
            total_compared: count,
            lowest: entries.first().map(|entry| entry.avg_cost).unwrap_or(0),
            highest: entries.last().map(|entry| entry.avg_cost).unwrap_or(0),
            entries,
        }
    }
}

fn summarize(min: u64, max: u64) -> CostSummary {
    CostSummary {
        min,
        max,
        avg: midpoint(min, max),
    }
}

/// Rounded-down mean of two amounts without overflowing.
pub(crate) fn midpoint(a: u64, b: u64) -> u64 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourcePrice;

    fn place(id: &str, category: &str) -> Place {
        Place::new(id, id).with_categories([category])
    }

    #[test]
    fn cafe_for_two_uses_per_person_tier() {
        let estimator = PriceEstimator::default();
        let estimate = estimator.estimate("cafe", 2, None);

        assert_eq!(estimate.per_person.min, 30_000);
        assert_eq!(estimate.per_person.max, 100_000);
        assert_eq!(estimate.per_person.avg, 65_000);
        assert_eq!(estimate.total.avg, 130_000);
        assert_eq!(estimate.tier, PriceTier::Budget);
        assert_eq!(estimate.source, PriceSource::Category);
    }

    #[test]
    fn tier_does_not_scale_with_group_size() {
        let estimator = PriceEstimator::default();
        let solo = estimator.estimate("restaurant", 1, None);
        let group = estimator.estimate("restaurant", 6, None);
        assert_eq!(solo.tier, group.tier);
        assert_eq!(group.tier, PriceTier::Moderate);
    }

    #[test]
    fn custom_range_beats_profile_and_unknown_uses_fallback() {
        let estimator = PriceEstimator::default();
        let custom = estimator.estimate("cafe", 1, Some(PriceBand::new(400_000, 800_000)));
        assert_eq!(custom.tier, PriceTier::Luxury);
        assert_eq!(custom.source, PriceSource::Explicit);

        let unknown = estimator.estimate("karaoke", 1, None);
        assert_eq!(unknown.per_person.min, 50_000);
        assert_eq!(unknown.per_person.max, 200_000);
        assert_eq!(unknown.source, PriceSource::Fallback);
    }

    #[test]
    fn zero_people_counts_as_one() {
        let estimate = PriceEstimator::default().estimate("cafe", 0, None);
        assert_eq!(estimate.num_people, 1);
        assert_eq!(estimate.total.avg, 65_000);
    }

    #[test]
    fn extreme_amounts_do_not_overflow() {
        let estimator = PriceEstimator::default();
        let half = u64::MAX / 2 + 1;
        let estimate = estimator.estimate("cafe", 1, Some(PriceBand::new(half, half)));
        assert_eq!(estimate.per_person.avg, half);
        assert_eq!(estimate.tier, PriceTier::Luxury);

        let top = estimator.estimate("cafe", 3, Some(PriceBand::new(u64::MAX, u64::MAX)));
        assert_eq!(top.per_person.avg, u64::MAX);
        assert_eq!(top.total.max, u64::MAX);

        let mut pricey = Place::new("p1", "Pricey");
        pricey.price_info = Some(SourcePrice {
            min: u64::MAX,
            max: Some(u64::MAX),
        });
        let cost = estimator.estimate_itinerary(&[pricey.clone(), pricey], 2, true, DEFAULT_TRANSPORT_BUDGET);
        assert_eq!(cost.total.min, u64::MAX);
        assert_eq!(cost.total.avg, u64::MAX);
    }

    #[test]
    fn reversed_custom_band_is_reordered() {
        let estimate = PriceEstimator::default().estimate("cafe", 1, Some(PriceBand::new(90_000, 30_000)));
        assert_eq!(estimate.per_person.min, 30_000);
        assert_eq!(estimate.per_person.max, 90_000);
        assert_eq!(estimate.per_person.avg, 60_000);
    }

    #[test]
    fn empty_itinerary_costs_nothing() {
        let estimator = PriceEstimator::default();
        for include_transport in [false, true] {
            let cost = estimator.estimate_itinerary(&[], 3, include_transport, DEFAULT_TRANSPORT_BUDGET);
            assert_eq!(cost.total, CostSummary::default());
            assert!(cost.breakdown.is_empty());
        }
    }

    #[test]
    fn itinerary_keeps_order_and_adds_transport() {
        let estimator = PriceEstimator::default();
        let places = vec![
            place("Breakfast Cafe", "cafe"),
            place("Temple of Literature", "museum"),
            Place::new("Nameless", "Nameless"),
        ];
        let cost = estimator.estimate_itinerary(&places, 2, true, 200_000);

        let labels = cost
            .breakdown
            .iter()
            .map(|line| line.label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            labels,
            ["Breakfast Cafe", "Temple of Literature", "Nameless", "Transportation"]
        );
        assert_eq!(cost.breakdown[2].category, "attraction");
        // cafe 60k-200k, museum 0-80k, fallback 100k-400k, transport 400k
        assert_eq!(cost.total.min, 560_000);
        assert_eq!(cost.total.max, 1_080_000);
        assert_eq!(cost.per_person.avg, 410_000);
    }

    #[test]
    fn budget_filter_scenario() {
        let estimator = PriceEstimator::default();
        let mut fits = Place::new("a", "Mid range");
        fits.price_info = Some(SourcePrice {
            min: 100_000,
            max: Some(200_000),
        });
        let mut too_expensive = Place::new("b", "Rooftop");
        too_expensive.price_info = Some(SourcePrice {
            min: 300_000,
            max: Some(500_000),
        });
        let no_category = Place::new("c", "Unknown spot");

        let kept = estimator.filter_by_budget(vec![fits, too_expensive, no_category], 150_000, 1);
        let ids = kept.iter().map(|p| p.place_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(kept[0].price_estimate.as_ref().unwrap().per_person.avg, 150_000);

        let fallback = kept[1].price_estimate.as_ref().unwrap();
        assert_eq!(fallback.source, PriceSource::Fallback);
        assert_eq!(fallback.per_person.avg, 125_000);
    }

    #[test]
    fn missing_source_max_doubles_min() {
        let estimator = PriceEstimator::default();
        let mut place = Place::new("a", "Bia hơi");
        place.price_info = Some(SourcePrice { min: 40_000, max: None });
        let estimate = estimator.estimate_place(&place, 1);
        assert_eq!(estimate.per_person.max, 80_000);
    }

    #[test]
    fn budget_filter_is_idempotent() {
        let estimator = PriceEstimator::default();
        let places = vec![
            place("Budget Cafe", "cafe"),
            place("Luxury Restaurant", "restaurant"),
            place("Free Museum", "museum"),
            place("Expensive Spa", "spa"),
        ];
        let once = estimator.filter_by_budget(places, 150_000, 1);
        let twice = estimator.filter_by_budget(once.clone(), 150_000, 1);
        assert_eq!(once, twice);
        let names = once.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Budget Cafe", "Free Museum"]);
    }

    #[test]
    fn compare_ranks_with_stable_ties() {
        let estimator = PriceEstimator::default();
        let comparison = estimator.compare(&[
            place("Spa", "spa"),
            place("Cafe A", "cafe"),
            place("Cafe B", "cafe"),
            place("Temple", "temple"),
        ]);

        let order = comparison
            .entries
            .iter()
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, ["Temple", "Cafe A", "Cafe B", "Spa"]);
        assert_eq!(comparison.entries[0].note, Some(ComparisonNote::MostAffordable));
        assert_eq!(comparison.entries[3].note, Some(ComparisonNote::MostExpensive));
        assert_eq!(comparison.entries[1].note, None);
        assert_eq!(comparison.entries[3].rank, 4);
        assert_eq!(comparison.lowest, 15_000);
        assert_eq!(comparison.highest, 600_000);
    }

    #[test]
    fn profile_from_json_lowercases_keys() {
        let profile = CategoryPriceProfile::from_json(
            r#"{"currency":"USD","categories":{"Cafe":{"min":3,"max":8}}}"#,
        )
        .unwrap();
        assert_eq!(profile.lookup("cafe"), Some(PriceBand::new(3, 8)));
        assert_eq!(profile.lookup("CAFE "), Some(PriceBand::new(3, 8)));
    }
}
