//! Repair cost lookup and claim totals.
//!
//! The cost table is built once at start-up and handed to whoever needs it.
//! Unknown labels are priced at zero so unexpected detector output never
//! blocks an estimate.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::detect::Detection;

/// Unit repair costs shipped with the demo models.
pub const DEFAULT_REPAIR_COSTS: [(&str, f64); 7] = [
    ("Broken light", 200.0),
    ("Broken mirror", 150.0),
    ("Cracked bumper", 500.0),
    ("Dent", 300.0),
    ("Scratch", 100.0),
    ("Shattered glass", 400.0),
    ("Tire puncture", 120.0),
];

/// Immutable mapping from damage label to unit repair cost.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CostTable {
    costs: BTreeMap<String, f64>,
}

impl CostTable {
    /// Build a table from label/cost pairs. Costs must be finite and non-negative.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut costs = BTreeMap::new();
        for (label, cost) in entries {
            let label = label.into();
            if label.trim().is_empty() {
                return Err(anyhow!("cost table label must not be empty"));
            }
            if !cost.is_finite() || cost < 0.0 {
                return Err(anyhow!(
                    "repair cost for '{}' must be a non-negative number, got {}",
                    label,
                    cost
                ));
            }
            costs.insert(label, cost);
        }
        Ok(Self { costs })
    }

    /// Cost for a label, zero when the label is not priced.
    pub fn get(&self, label: &str) -> f64 {
        self.unit_cost(label).unwrap_or(0.0)
    }

    pub fn unit_cost(&self, label: &str) -> Option<f64> {
        self.costs.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.costs.iter().map(|(label, cost)| (label.as_str(), *cost))
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            costs: DEFAULT_REPAIR_COSTS
                .iter()
                .map(|(label, cost)| (label.to_string(), *cost))
                .collect(),
        }
    }
}

/// Sum the unit cost of every label, counting repeats.
pub fn estimate<S: AsRef<str>>(detected_labels: &[S], cost_table: &CostTable) -> f64 {
    detected_labels
        .iter()
        .map(|label| cost_table.get(label.as_ref()))
        .sum()
}

/// Labels and total cost for one assessed photo.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClaimSummary {
    /// One entry per detection, in detector order.
    pub detected_labels: Vec<String>,
    pub total_cost: f64,
}

impl ClaimSummary {
    pub fn from_labels(detected_labels: Vec<String>, cost_table: &CostTable) -> Self {
        let total_cost = estimate(&detected_labels, cost_table);
        Self {
            detected_labels,
            total_cost,
        }
    }

    pub fn from_detections(detections: &[Detection], cost_table: &CostTable) -> Self {
        let labels = detections
            .iter()
            .map(|detection| detection.class_label.clone())
            .collect();
        Self::from_labels(labels, cost_table)
    }

    pub fn has_damage(&self) -> bool {
        !self.detected_labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_labels_cost_nothing() {
        let table = CostTable::default();
        let empty: [&str; 0] = [];
        let unpriced = CostTable::from_entries(Vec::<(String, f64)>::new()).unwrap();
        assert_eq!(estimate(&empty, &table), 0.0);
        assert_eq!(estimate(&empty, &unpriced), 0.0);
    }

    #[test]
    fn repeats_are_counted_per_detection() {
        let table = CostTable::default();
        assert_eq!(estimate(&["Dent", "Dent", "Scratch"], &table), 700.0);
    }

    #[test]
    fn unknown_labels_cost_zero() {
        let table = CostTable::default();
        assert_eq!(estimate(&["Dent", "Rust spot", "7"], &table), 300.0);
        assert_eq!(table.unit_cost("Rust spot"), None);
    }

    #[test]
    fn default_table_prices_seven_labels() {
        let table = CostTable::default();
        assert_eq!(table.len(), 7);
        assert_eq!(table.get("Broken light"), 200.0);
        assert_eq!(table.get("Tire puncture"), 120.0);
    }

    #[test]
    fn negative_costs_are_rejected() {
        let err = CostTable::from_entries([("Dent", -1.0)]).unwrap_err();
        assert!(err.to_string().contains("Dent"));
        assert!(CostTable::from_entries([("Dent", f64::NAN)]).is_err());
        assert!(CostTable::from_entries([(" ", 1.0)]).is_err());
    }

    #[test]
    fn summary_uses_detection_labels() {
        let table = CostTable::default();
        let summary = ClaimSummary::from_labels(
            vec!["Cracked bumper".to_string(), "Scratch".to_string()],
            &table,
        );
        assert_eq!(summary.total_cost, 600.0);
        assert!(summary.has_damage());
        assert!(!ClaimSummary::from_labels(Vec::new(), &table).has_damage());
    }
}
