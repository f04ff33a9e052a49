//! Comparison context shared by one run
//!
//! The phone names are fixed when the context is created. Feature text and the
//! final table accumulate in [`FeatureData`] behind a mutex, and every slot
//! write happens under that lock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::error::{AgentsError, Result};

/// The two phones being compared, parsed from the user's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub phone1: String,
    pub phone2: String,
}

/// Parse `"<phone A> vs <phone B>"`.
///
/// Requires the literal `" vs "`, splits on its first occurrence and trims
/// both halves. Returns `None` if either name ends up empty.
///
/// ```rust
/// use phone_compare::comparison::parse_comparison;
///
/// let req = parse_comparison("iPhone 13 vs Samsung S21").unwrap();
/// assert_eq!(req.phone1, "iPhone 13");
/// assert_eq!(req.phone2, "Samsung S21");
/// assert!(parse_comparison("iPhone 13 versus Samsung S21").is_none());
/// ```
pub fn parse_comparison(text: &str) -> Option<ComparisonRequest> {
    let (left, right) = text.split_once(" vs ")?;
    let phone1 = left.trim();
    let phone2 = right.trim();
    if phone1.is_empty() || phone2.is_empty() {
        return None;
    }
    Some(ComparisonRequest {
        phone1: phone1.to_string(),
        phone2: phone2.to_string(),
    })
}

/// Which phone a piece of feature text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSlot {
    Phone1,
    Phone2,
}

impl fmt::Display for FeatureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSlot::Phone1 => f.write_str("phone1"),
            FeatureSlot::Phone2 => f.write_str("phone2"),
        }
    }
}

/// How a search result is assigned to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPolicy {
    /// First empty slot wins, otherwise slot 2. Depends on call order.
    Positional,
    /// Slot chosen by which phone the query names.
    #[default]
    Keyed,
}

/// Mutable results of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureData {
    pub phone1: String,
    pub phone2: String,
    pub comparison_markdown: String,
}

impl FeatureData {
    pub fn slot(&self, slot: FeatureSlot) -> &str {
        match slot {
            FeatureSlot::Phone1 => &self.phone1,
            FeatureSlot::Phone2 => &self.phone2,
        }
    }

    fn slot_mut(&mut self, slot: FeatureSlot) -> &mut String {
        match slot {
            FeatureSlot::Phone1 => &mut self.phone1,
            FeatureSlot::Phone2 => &mut self.phone2,
        }
    }

    fn first_empty(&self) -> Option<FeatureSlot> {
        if self.phone1.is_empty() {
            Some(FeatureSlot::Phone1)
        } else if self.phone2.is_empty() {
            Some(FeatureSlot::Phone2)
        } else {
            None
        }
    }
}

/// Context for one comparison.
#[derive(Debug)]
pub struct ComparisonContext {
    request: ComparisonRequest,
    data: Mutex<FeatureData>,
}

impl ComparisonContext {
    pub fn new(request: ComparisonRequest) -> Self {
        Self {
            request,
            data: Mutex::new(FeatureData::default()),
        }
    }

    pub fn request(&self) -> &ComparisonRequest {
        &self.request
    }

    pub fn phone(&self, slot: FeatureSlot) -> &str {
        match slot {
            FeatureSlot::Phone1 => &self.request.phone1,
            FeatureSlot::Phone2 => &self.request.phone2,
        }
    }

    /// Copy of the current feature data.
    pub fn snapshot(&self) -> Result<FeatureData> {
        Ok(self.lock()?.clone())
    }

    /// The slot whose phone name `query` refers to, if any.
    ///
    /// Comparison ignores case and collapses whitespace. An exact match wins
    /// over containment. A query that contains a phone name refers to the
    /// longest name it contains, so `"Pixel 8 Pro camera"` resolves to
    /// `"Pixel 8 Pro"` over `"Pixel 8"`. A query that is only part of a name
    /// must be part of exactly one. Anything that fits both phones equally,
    /// including two identical names, is ambiguous and returns `None`.
    pub fn match_slot(&self, query: &str) -> Option<FeatureSlot> {
        let query = normalize(query);
        if query.is_empty() {
            return None;
        }
        let names = [
            (FeatureSlot::Phone1, normalize(&self.request.phone1)),
            (FeatureSlot::Phone2, normalize(&self.request.phone2)),
        ];

        let exact: Vec<FeatureSlot> = names
            .iter()
            .filter(|(_, name)| *name == query)
            .map(|(slot, _)| *slot)
            .collect();
        if !exact.is_empty() {
            return single(&exact);
        }

        let named: Vec<&(FeatureSlot, String)> = names
            .iter()
            .filter(|(_, name)| query.contains(name.as_str()))
            .collect();
        if let Some(longest) = named.iter().map(|(_, name)| name.len()).max() {
            let slots: Vec<FeatureSlot> = named
                .iter()
                .filter(|(_, name)| name.len() == longest)
                .map(|(slot, _)| *slot)
                .collect();
            return single(&slots);
        }

        let partial: Vec<FeatureSlot> = names
            .iter()
            .filter(|(_, name)| name.contains(query.as_str()))
            .map(|(slot, _)| *slot)
            .collect();
        single(&partial)
    }

    /// Store search results for `query` and return the slot written.
    ///
    /// Under [`SlotPolicy::Keyed`] a query that names neither phone, or both,
    /// takes the first empty slot. Once both slots are filled such a result is
    /// not recorded and `None` is returned; the caller still has the text.
    pub fn record_features(
        &self,
        query: &str,
        features: impl Into<String>,
        policy: SlotPolicy,
    ) -> Result<Option<FeatureSlot>> {
        let mut data = self.lock()?;
        let slot = match policy {
            SlotPolicy::Positional => Some(data.first_empty().unwrap_or(FeatureSlot::Phone2)),
            SlotPolicy::Keyed => self.match_slot(query).or_else(|| data.first_empty()),
        };
        if let Some(slot) = slot {
            *data.slot_mut(slot) = features.into();
        }
        Ok(slot)
    }

    /// Store feature text for a known slot.
    pub fn set_features(&self, slot: FeatureSlot, features: impl Into<String>) -> Result<()> {
        *self.lock()?.slot_mut(slot) = features.into();
        Ok(())
    }

    pub fn set_comparison_markdown(&self, markdown: impl Into<String>) -> Result<()> {
        self.lock()?.comparison_markdown = markdown.into();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, FeatureData>> {
        self.data
            .lock()
            .map_err(|_| AgentsError::Other("comparison context lock poisoned".to_string()))
    }
}

fn single(slots: &[FeatureSlot]) -> Option<FeatureSlot> {
    match slots {
        [only] => Some(*only),
        _ => None,
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx(a: &str, b: &str) -> ComparisonContext {
        ComparisonContext::new(ComparisonRequest {
            phone1: a.to_string(),
            phone2: b.to_string(),
        })
    }

    #[test]
    fn test_parse_trims_names() {
        let req = parse_comparison("A vs  B").unwrap();
        assert_eq!(req.phone1, "A");
        assert_eq!(req.phone2, "B");

        let req = parse_comparison("  Galaxy S24 Ultra   vs Pixel 8 Pro ").unwrap();
        assert_eq!(req.phone1, "Galaxy S24 Ultra");
        assert_eq!(req.phone2, "Pixel 8 Pro");
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        for input in ["", "iPhone 13", "iPhone 13 VS Samsung S21", "iPhone 13vs S21", "a vs"] {
            assert_eq!(parse_comparison(input), None, "input {:?}", input);
        }
    }

    #[test]
    fn test_parse_rejects_empty_halves() {
        assert_eq!(parse_comparison(" vs Pixel"), None);
        assert_eq!(parse_comparison("Pixel vs   "), None);
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let req = parse_comparison("Vsmart Joy 4 vs Pixel vs Nokia").unwrap();
        assert_eq!(req.phone1, "Vsmart Joy 4");
        assert_eq!(req.phone2, "Pixel vs Nokia");
    }

    #[test]
    fn test_positional_policy_follows_call_order() {
        let ctx = ctx("iPhone 13", "Samsung S21");

        let first = ctx
            .record_features("Samsung S21", "s21 specs", SlotPolicy::Positional)
            .unwrap();
        let second = ctx
            .record_features("anything", "other specs", SlotPolicy::Positional)
            .unwrap();
        let third = ctx
            .record_features("iPhone 13", "late", SlotPolicy::Positional)
            .unwrap();

        assert_eq!(first, Some(FeatureSlot::Phone1));
        assert_eq!(second, Some(FeatureSlot::Phone2));
        assert_eq!(third, Some(FeatureSlot::Phone2));

        let data = ctx.snapshot().unwrap();
        assert_eq!(data.phone1, "s21 specs");
        assert_eq!(data.phone2, "late");
    }

    #[test]
    fn test_keyed_policy_ignores_call_order() {
        let ctx = ctx("iPhone 13", "Samsung S21");

        ctx.record_features("samsung  s21", "s21 specs", SlotPolicy::Keyed)
            .unwrap();
        ctx.record_features("iPhone 13 specifications", "ip13 specs", SlotPolicy::Keyed)
            .unwrap();

        let data = ctx.snapshot().unwrap();
        assert_eq!(data.phone1, "ip13 specs");
        assert_eq!(data.phone2, "s21 specs");
    }

    #[test]
    fn test_keyed_policy_overwrites_same_phone() {
        let ctx = ctx("iPhone 13", "Samsung S21");
        ctx.record_features("iPhone 13", "old", SlotPolicy::Keyed).unwrap();
        ctx.record_features("iphone 13", "new", SlotPolicy::Keyed).unwrap();

        let data = ctx.snapshot().unwrap();
        assert_eq!(data.phone1, "new");
        assert_eq!(data.phone2, "");
    }

    #[test]
    fn test_keyed_unmatched_query_falls_back_then_is_dropped() {
        let ctx = ctx("iPhone 13", "Samsung S21");
        assert_eq!(
            ctx.record_features("Apple flagship", "x", SlotPolicy::Keyed)
                .unwrap(),
            Some(FeatureSlot::Phone1)
        );
        assert_eq!(
            ctx.record_features("Korean flagship", "y", SlotPolicy::Keyed)
                .unwrap(),
            Some(FeatureSlot::Phone2)
        );

        let slot = ctx
            .record_features("Finnish flagship", "z", SlotPolicy::Keyed)
            .unwrap();
        assert_eq!(slot, None);

        let data = ctx.snapshot().unwrap();
        assert_eq!(data.phone1, "x");
        assert_eq!(data.phone2, "y");
    }

    #[test]
    fn test_match_prefers_exact_then_longest() {
        let ctx = ctx("Pixel 8", "Pixel 8 Pro");
        assert_eq!(ctx.match_slot("pixel 8"), Some(FeatureSlot::Phone1));
        assert_eq!(ctx.match_slot("Pixel 8 Pro"), Some(FeatureSlot::Phone2));
        assert_eq!(ctx.match_slot("Pixel 8 Pro camera"), Some(FeatureSlot::Phone2));
        assert_eq!(ctx.match_slot("Pixel 8 battery"), Some(FeatureSlot::Phone1));
        assert_eq!(ctx.match_slot("Nokia"), None);
        assert_eq!(ctx.match_slot("   "), None);
    }

    #[test]
    fn test_match_is_none_when_ambiguous() {
        assert_eq!(ctx("Pixel 8", "Pixel 8 Pro").match_slot("Pixel"), None);

        let same = ctx("iPhone 13", "iphone  13");
        assert_eq!(same.match_slot("iPhone 13"), None);
        assert_eq!(same.match_slot("iPhone 13 review"), None);
    }

    #[test]
    fn test_keyed_identical_names_fill_both_slots() {
        let ctx = ctx("iPhone 13", "iphone 13");
        let first = ctx
            .record_features("iPhone 13", "x", SlotPolicy::Keyed)
            .unwrap();
        let second = ctx
            .record_features("iphone 13", "y", SlotPolicy::Keyed)
            .unwrap();

        assert_eq!(first, Some(FeatureSlot::Phone1));
        assert_eq!(second, Some(FeatureSlot::Phone2));
        let data = ctx.snapshot().unwrap();
        assert_eq!(data.phone1, "x");
        assert_eq!(data.phone2, "y");
    }

    #[test]
    fn test_keyed_ambiguous_part_takes_first_empty_slot() {
        let ctx = ctx("Pixel 8", "Pixel 8 Pro");
        ctx.record_features("Pixel 8", "eight", SlotPolicy::Keyed)
            .unwrap();
        let slot = ctx
            .record_features("Pixel", "pro", SlotPolicy::Keyed)
            .unwrap();
        assert_eq!(slot, Some(FeatureSlot::Phone2));
    }

    #[test]
    fn test_markdown_setter() {
        let ctx = ctx("A", "B");
        assert_eq!(ctx.snapshot().unwrap().comparison_markdown, "");
        ctx.set_comparison_markdown("| A | B |").unwrap();
        assert_eq!(ctx.snapshot().unwrap().comparison_markdown, "| A | B |");
    }

    #[test]
    fn test_slot_policy_serde() {
        assert_eq!(serde_json::to_string(&SlotPolicy::Keyed).unwrap(), "\"keyed\"");
        let p: SlotPolicy = serde_json::from_str("\"positional\"").unwrap();
        assert_eq!(p, SlotPolicy::Positional);
    }
}
