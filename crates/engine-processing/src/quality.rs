use model::records::staged::PreStageRecord;

/// What to do with a record matched by a rule's predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Keep the record and stop evaluating further rules.
    Accept,
    /// Drop the record, keep the batch going.
    QuarantineRecord,
    /// Abort the whole batch; nothing reaches stage.
    RejectBatch,
}

/// One quality rule: a predicate over the raw record plus the action taken
/// when the predicate matches.
pub struct QualityRule {
    label: String,
    message: String,
    action: RuleAction,
    predicate: Box<dyn Fn(&PreStageRecord) -> bool + Send + Sync>,
}

impl QualityRule {
    pub fn new(
        label: &str,
        message: &str,
        action: RuleAction,
        predicate: impl Fn(&PreStageRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        QualityRule {
            label: label.to_string(),
            message: message.to_string(),
            action,
            predicate: Box::new(predicate),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn action(&self) -> RuleAction {
        self.action
    }

    pub fn matches(&self, record: &PreStageRecord) -> bool {
        (self.predicate)(record)
    }
}

/// Verdict for a single record after walking the rule list in order.
pub enum RuleVerdict<'a> {
    Pass,
    Quarantine(&'a QualityRule),
    Reject(&'a QualityRule),
}

/// Ordered rule list. The first rule whose predicate matches decides the
/// record; unmatched records pass.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<QualityRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, rule: QualityRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Default rules for the transaction feed: a broken natural key poisons
    /// the whole batch, value-level problems only cost the record.
    pub fn standard() -> Self {
        RuleSet::new()
            .add(QualityRule::new(
                "natural_key_present",
                "record id must be a positive integer",
                RuleAction::RejectBatch,
                |r| r.id <= 0,
            ))
            .add(QualityRule::new(
                "non_negative_amount",
                "transaction_amount must not be negative",
                RuleAction::QuarantineRecord,
                |r| r.transaction_amount < 0.0,
            ))
            .add(QualityRule::new(
                "status_present",
                "status must be set and non-empty",
                RuleAction::QuarantineRecord,
                |r| r.status.as_deref().is_none_or(|s| s.trim().is_empty()),
            ))
    }

    pub fn evaluate(&self, record: &PreStageRecord) -> RuleVerdict<'_> {
        for rule in &self.rules {
            if rule.matches(record) {
                return match rule.action {
                    RuleAction::Accept => RuleVerdict::Pass,
                    RuleAction::QuarantineRecord => RuleVerdict::Quarantine(rule),
                    RuleAction::RejectBatch => RuleVerdict::Reject(rule),
                };
            }
        }
        RuleVerdict::Pass
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, amount: f64, status: Option<&str>) -> PreStageRecord {
        PreStageRecord {
            id,
            customer_id: 1,
            product_id: 2,
            transaction_amount: amount,
            transaction_date: Utc::now(),
            status: status.map(str::to_string),
            source_system: "erp".into(),
            load_timestamp: Utc::now(),
            batch_id: "bat-1".into(),
        }
    }

    #[test]
    fn clean_record_passes_standard_rules() {
        let rules = RuleSet::standard();
        assert!(matches!(
            rules.evaluate(&record(1, 10.0, Some("NEW"))),
            RuleVerdict::Pass
        ));
    }

    #[test]
    fn missing_natural_key_rejects_batch() {
        let rules = RuleSet::standard();
        match rules.evaluate(&record(0, 10.0, Some("NEW"))) {
            RuleVerdict::Reject(rule) => assert_eq!(rule.label(), "natural_key_present"),
            _ => panic!("expected batch rejection"),
        }
    }

    #[test]
    fn negative_amount_quarantines_record() {
        let rules = RuleSet::standard();
        match rules.evaluate(&record(1, -5.0, Some("NEW"))) {
            RuleVerdict::Quarantine(rule) => assert_eq!(rule.label(), "non_negative_amount"),
            _ => panic!("expected record quarantine"),
        }
    }

    #[test]
    fn blank_status_quarantines_record() {
        let rules = RuleSet::standard();
        assert!(matches!(
            rules.evaluate(&record(1, 5.0, Some("   "))),
            RuleVerdict::Quarantine(_)
        ));
        assert!(matches!(
            rules.evaluate(&record(1, 5.0, None)),
            RuleVerdict::Quarantine(_)
        ));
    }

    #[test]
    fn first_matching_rule_wins() {
        // A record violating both the key rule and the amount rule is decided
        // by the earlier, batch-level rule.
        let rules = RuleSet::standard();
        assert!(matches!(
            rules.evaluate(&record(-1, -5.0, None)),
            RuleVerdict::Reject(_)
        ));
    }

    #[test]
    fn accept_rule_short_circuits_later_rules() {
        let rules = RuleSet::new()
            .add(QualityRule::new(
                "trusted_source",
                "records from the backfill customer are taken as-is",
                RuleAction::Accept,
                |r| r.customer_id == 999,
            ))
            .add(QualityRule::new(
                "non_negative_amount",
                "transaction_amount must not be negative",
                RuleAction::QuarantineRecord,
                |r| r.transaction_amount < 0.0,
            ));

        let mut rec = record(1, -5.0, Some("NEW"));
        rec.customer_id = 999;
        assert!(matches!(rules.evaluate(&rec), RuleVerdict::Pass));
    }
}
