use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// Groups kept per breakdown, except card brands which are all reported
pub const TOP_GROUPS: usize = 10;

/// Label for a group whose key is empty or missing
pub const UNKNOWN_GROUP: &str = "Unknown";

/// Round to cents the way the report presents money
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Which field a breakdown groups transactions by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    City,
    State,
    Mcc,
    CardBrand,
    Channel,
}

impl GroupKind {
    /// Key the group's name is serialized under
    pub fn key(self) -> &'static str {
        match self {
            GroupKind::City => "city",
            GroupKind::State => "state",
            GroupKind::Mcc => "mcc",
            GroupKind::CardBrand => "brand",
            GroupKind::Channel => "type",
        }
    }

    fn ranked_by_amount(self) -> bool {
        matches!(self, GroupKind::Mcc | GroupKind::CardBrand)
    }

    fn limit(self) -> Option<usize> {
        match self {
            GroupKind::City | GroupKind::State | GroupKind::Mcc => Some(TOP_GROUPS),
            GroupKind::CardBrand | GroupKind::Channel => None,
        }
    }
}

/// Raw count and amount sum for one group, as a backend returns them
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupTotals {
    pub count: u64,
    pub amount: f64,
}

impl GroupTotals {
    pub fn new(count: u64, amount: f64) -> Self {
        Self { count, amount }
    }

    pub fn add(&mut self, amount: f64) {
        self.count += 1;
        self.amount += amount;
    }
}

/// One row of a breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub kind: GroupKind,
    pub name: String,
    pub count: u64,
    pub total_amount: f64,
    pub avg_amount: f64,
}

impl GroupStats {
    fn new(kind: GroupKind, name: String, totals: GroupTotals) -> Self {
        let avg = if totals.count == 0 {
            0.0
        } else {
            totals.amount / totals.count as f64
        };
        let name = if name.is_empty() {
            UNKNOWN_GROUP.to_string()
        } else {
            name
        };

        Self {
            kind,
            name,
            count: totals.count,
            total_amount: round2(totals.amount),
            avg_amount: round2(avg),
        }
    }
}

impl Serialize for GroupStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry(self.kind.key(), &self.name)?;
        map.serialize_entry("count", &self.count)?;
        map.serialize_entry("totalAmount", &self.total_amount)?;
        map.serialize_entry("avgAmount", &self.avg_amount)?;
        map.end()
    }
}

/// Sort groups the way the report ranks them, then keep the top ones
///
/// Ties fall back to the group name so every backend agrees on the order.
pub fn rank(
    kind: GroupKind,
    groups: impl IntoIterator<Item = (String, GroupTotals)>,
) -> Vec<GroupStats> {
    let mut groups: Vec<_> = groups.into_iter().filter(|(_, t)| t.count > 0).collect();
    groups.sort_by(|(a_name, a), (b_name, b)| {
        let primary = if kind.ranked_by_amount() {
            b.amount.total_cmp(&a.amount)
        } else {
            b.count.cmp(&a.count)
        };
        match primary {
            Ordering::Equal => a_name.cmp(b_name),
            other => other,
        }
    });
    if let Some(limit) = kind.limit() {
        groups.truncate(limit);
    }

    groups
        .into_iter()
        .map(|(name, totals)| GroupStats::new(kind, name, totals))
        .collect()
}

/// Whole-collection figures before rounding
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverviewTotals {
    pub transactions: u64,
    pub amount: f64,
    pub max_amount: Option<f64>,
    pub min_amount: Option<f64>,
    pub chip_transactions: u64,
    pub unique_clients: u64,
    pub unique_cards: u64,
    pub unique_merchants: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_transactions: u64,
    pub total_amount: f64,
    pub avg_amount: f64,
    pub max_amount: f64,
    pub min_amount: f64,
    pub chip_transactions: u64,
    /// Percent of transactions that used the chip
    pub chip_rate: f64,
    pub unique_clients: u64,
    pub unique_cards: u64,
    pub unique_merchants: u64,
}

impl From<OverviewTotals> for Overview {
    fn from(totals: OverviewTotals) -> Self {
        let (avg, chip_rate) = if totals.transactions == 0 {
            (0.0, 0.0)
        } else {
            let n = totals.transactions as f64;
            (totals.amount / n, totals.chip_transactions as f64 / n * 100.0)
        };

        Self {
            total_transactions: totals.transactions,
            total_amount: round2(totals.amount),
            avg_amount: round2(avg),
            max_amount: round2(totals.max_amount.unwrap_or(0.0)),
            min_amount: round2(totals.min_amount.unwrap_or(0.0)),
            chip_transactions: totals.chip_transactions,
            chip_rate: round2(chip_rate),
            unique_clients: totals.unique_clients,
            unique_cards: totals.unique_cards,
            unique_merchants: totals.unique_merchants,
        }
    }
}

/// Descriptive statistics over the loaded transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAnalytics {
    pub overview: Overview,
    pub by_city: Vec<GroupStats>,
    pub by_state: Vec<GroupStats>,
    #[serde(rename = "byMCC")]
    pub by_mcc: Vec<GroupStats>,
    pub by_card_brand: Vec<GroupStats>,
    pub chip_vs_swipe: Vec<GroupStats>,
}

/// Everything a backend has to supply; ranking and rounding happen here
#[derive(Debug, Clone, Default)]
pub struct AnalyticsParts {
    pub overview: OverviewTotals,
    pub cities: Vec<(String, GroupTotals)>,
    pub states: Vec<(String, GroupTotals)>,
    pub mccs: Vec<(String, GroupTotals)>,
    pub card_brands: Vec<(String, GroupTotals)>,
    pub chip: GroupTotals,
    pub swipe: GroupTotals,
}

impl From<AnalyticsParts> for TransactionAnalytics {
    fn from(parts: AnalyticsParts) -> Self {
        let channels = [
            ("Chip".to_string(), parts.chip),
            ("Swipe".to_string(), parts.swipe),
        ];

        Self {
            overview: parts.overview.into(),
            by_city: rank(GroupKind::City, parts.cities),
            by_state: rank(GroupKind::State, parts.states),
            by_mcc: rank(GroupKind::Mcc, parts.mccs),
            by_card_brand: rank(GroupKind::CardBrand, parts.card_brands),
            chip_vs_swipe: channels
                .into_iter()
                .filter(|(_, totals)| totals.count > 0)
                .map(|(name, totals)| GroupStats::new(GroupKind::Channel, name, totals))
                .collect(),
        }
    }
}

/// Fields of one transaction the analytics read
#[derive(Debug, Clone, Copy)]
pub struct TransactionFacts<'a> {
    pub client_id: &'a str,
    pub card_id: &'a str,
    pub merchant_id: &'a str,
    pub merchant_city: &'a str,
    pub merchant_state: &'a str,
    pub mcc: &'a str,
    pub amount: f64,
    pub use_chip: bool,
}

/// Fold transactions one at a time into `AnalyticsParts`
///
/// Card brands come from a card id lookup; transactions whose card is
/// unknown count everywhere except the brand breakdown.
#[derive(Debug, Default)]
pub struct AnalyticsBuilder {
    brands: HashMap<String, String>,
    overview: OverviewTotals,
    clients: HashSet<String>,
    cards: HashSet<String>,
    merchants: HashSet<String>,
    cities: HashMap<String, GroupTotals>,
    states: HashMap<String, GroupTotals>,
    mccs: HashMap<String, GroupTotals>,
    card_brands: HashMap<String, GroupTotals>,
    chip: GroupTotals,
    swipe: GroupTotals,
}

impl AnalyticsBuilder {
    /// Start with a card id to brand lookup
    pub fn with_card_brands(brands: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            brands: brands.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, tx: TransactionFacts<'_>) {
        let amount = tx.amount;
        let overview = &mut self.overview;
        overview.transactions += 1;
        overview.amount += amount;
        overview.max_amount = Some(overview.max_amount.map_or(amount, |max| max.max(amount)));
        overview.min_amount = Some(overview.min_amount.map_or(amount, |min| min.min(amount)));

        insert_owned(&mut self.clients, tx.client_id);
        insert_owned(&mut self.cards, tx.card_id);
        insert_owned(&mut self.merchants, tx.merchant_id);

        add_to(&mut self.cities, tx.merchant_city, amount);
        add_to(&mut self.states, tx.merchant_state, amount);
        add_to(&mut self.mccs, tx.mcc, amount);
        if let Some(brand) = self.brands.get(tx.card_id) {
            add_to(&mut self.card_brands, brand, amount);
        }

        if tx.use_chip {
            overview.chip_transactions += 1;
            self.chip.add(amount);
        } else {
            self.swipe.add(amount);
        }
    }

    pub fn finish(self) -> AnalyticsParts {
        let mut overview = self.overview;
        overview.unique_clients = self.clients.len() as u64;
        overview.unique_cards = self.cards.len() as u64;
        overview.unique_merchants = self.merchants.len() as u64;

        AnalyticsParts {
            overview,
            cities: self.cities.into_iter().collect(),
            states: self.states.into_iter().collect(),
            mccs: self.mccs.into_iter().collect(),
            card_brands: self.card_brands.into_iter().collect(),
            chip: self.chip,
            swipe: self.swipe,
        }
    }
}

fn insert_owned(set: &mut HashSet<String>, value: &str) {
    if !set.contains(value) {
        set.insert(value.to_string());
    }
}

fn add_to(groups: &mut HashMap<String, GroupTotals>, key: &str, amount: f64) {
    match groups.get_mut(key) {
        Some(totals) => totals.add(amount),
        None => {
            let mut totals = GroupTotals::default();
            totals.add(amount);
            groups.insert(key.to_string(), totals);
        }
    }
}
