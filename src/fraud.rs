//! Fraud rule checks over detected damage labels and the estimated total.
//!
//! Rules are an ordered table of independent checks. Every rule runs on every
//! claim; nothing short-circuits, and the flags come back in table order.
//!
//! The per-class rules compare the *total* claim cost, not the cost of that
//! class alone.

use serde::Serialize;

/// Warning produced by a single rule. Only the evaluator creates these.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FraudFlag {
    rule: &'static str,
    message: String,
}

impl FraudFlag {
    /// Identifier of the rule that fired.
    pub fn rule(&self) -> &'static str {
        self.rule
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for FraudFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Check {
    /// Total cost strictly above the threshold.
    TotalAbove(f64),
    /// `present` detected while `absent` is not.
    LabelWithout {
        present: &'static str,
        absent: &'static str,
    },
    /// Positive cost with no detections at all. Cannot fire while the total
    /// is computed from the same labels; kept for other cost sources.
    CostWithoutDamage,
    /// One flag per distinct label seen at least `min_count` times.
    RepeatedLabel { min_count: usize },
    /// Label detected and the total cost above the threshold.
    LabelCostAbove {
        label: &'static str,
        threshold: f64,
    },
    /// Label is the only detection and the total cost is above the threshold.
    SoleLabelCostAbove {
        label: &'static str,
        threshold: f64,
    },
}

/// One entry of the rule table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rule {
    id: &'static str,
    check: Check,
}

impl Rule {
    pub fn id(&self) -> &'static str {
        self.id
    }

    fn apply(&self, evidence: &Evidence<'_>, flags: &mut Vec<FraudFlag>) {
        let mut flag = |message: String| {
            flags.push(FraudFlag {
                rule: self.id,
                message,
            })
        };

        match self.check {
            Check::TotalAbove(threshold) => {
                if evidence.total_cost > threshold {
                    flag("overall repair cost unusually high.".to_string());
                }
            }
            Check::LabelWithout { present, absent } => {
                if evidence.contains(present) && !evidence.contains(absent) {
                    flag(format!(
                        "{} without {}s may be suspicious.",
                        present.to_lowercase(),
                        absent.to_lowercase()
                    ));
                }
            }
            Check::CostWithoutDamage => {
                if evidence.detections == 0 && evidence.total_cost > 0.0 {
                    flag("cost estimated but no damages detected.".to_string());
                }
            }
            Check::RepeatedLabel { min_count } => {
                for (label, count) in &evidence.counts {
                    if *count >= min_count {
                        flag(format!(
                            "many '{}' detections ({}); verify context.",
                            label, count
                        ));
                    }
                }
            }
            Check::LabelCostAbove { label, threshold } => {
                if evidence.contains(label) && evidence.total_cost > threshold {
                    flag(format!("{} repair cost unusually high.", label));
                }
            }
            Check::SoleLabelCostAbove { label, threshold } => {
                if evidence.detections == 1
                    && evidence.contains(label)
                    && evidence.total_cost > threshold
                {
                    flag(format!("single {} with very high cost.", label.to_lowercase()));
                }
            }
        }
    }
}

const fn class_cost(id: &'static str, label: &'static str, threshold: f64) -> Rule {
    Rule {
        id,
        check: Check::LabelCostAbove { label, threshold },
    }
}

/// The rule table, in evaluation order.
pub const DEFAULT_RULES: [Rule; 12] = [
    Rule {
        id: "high_total_cost",
        check: Check::TotalAbove(2000.0),
    },
    Rule {
        id: "glass_without_dent",
        check: Check::LabelWithout {
            present: "Shattered glass",
            absent: "Dent",
        },
    },
    Rule {
        id: "cost_without_damage",
        check: Check::CostWithoutDamage,
    },
    Rule {
        id: "repeated_label",
        check: Check::RepeatedLabel { min_count: 5 },
    },
    class_cost("broken_light_cost", "Broken light", 150.0),
    class_cost("broken_mirror_cost", "Broken mirror", 800.0),
    class_cost("cracked_bumper_cost", "Cracked bumper", 4000.0),
    class_cost("dent_cost", "Dent", 250.0),
    class_cost("scratch_cost", "Scratch", 1500.0),
    class_cost("shattered_glass_cost", "Shattered glass", 3000.0),
    class_cost("tire_puncture_cost", "Tire puncture", 600.0),
    Rule {
        id: "single_scratch_high_cost",
        check: Check::SoleLabelCostAbove {
            label: "Scratch",
            threshold: 2000.0,
        },
    },
];

/// Per-claim facts the rules look at.
struct Evidence<'a> {
    detections: usize,
    /// Distinct labels with their counts, in first-seen order.
    counts: Vec<(&'a str, usize)>,
    total_cost: f64,
}

impl<'a> Evidence<'a> {
    fn new<S: AsRef<str>>(detected_labels: &'a [S], total_cost: f64) -> Self {
        let mut counts: Vec<(&'a str, usize)> = Vec::new();
        for label in detected_labels {
            let label = label.as_ref();
            match counts.iter_mut().find(|(seen, _)| *seen == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label, 1)),
            }
        }
        Self {
            detections: detected_labels.len(),
            counts,
            total_cost,
        }
    }

    fn contains(&self, label: &str) -> bool {
        self.counts.iter().any(|(seen, _)| *seen == label)
    }
}

/// An ordered set of rules.
#[derive(Clone, Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run every rule and collect the flags in rule order.
    pub fn evaluate<S: AsRef<str>>(
        &self,
        detected_labels: &[S],
        total_cost: f64,
    ) -> Vec<FraudFlag> {
        run_rules(&self.rules, detected_labels, total_cost)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

/// Evaluate the default rule table.
pub fn evaluate<S: AsRef<str>>(detected_labels: &[S], total_cost: f64) -> Vec<FraudFlag> {
    run_rules(&DEFAULT_RULES, detected_labels, total_cost)
}

fn run_rules<S: AsRef<str>>(
    rules: &[Rule],
    detected_labels: &[S],
    total_cost: f64,
) -> Vec<FraudFlag> {
    let evidence = Evidence::new(detected_labels, total_cost);
    let mut flags = Vec::new();
    for rule in rules {
        rule.apply(&evidence, &mut flags);
    }
    flags
}
