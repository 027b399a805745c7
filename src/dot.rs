use crate::types::{DotRecord, Vec3};

/// One collectible. Identity and position are fixed at level load; only the
/// consumption claim ever changes, and once set it is never cleared.
#[derive(Clone, Debug, PartialEq)]
pub struct Dot {
    pub id: String,
    pub position: Vec3,
    pub is_power_dot: bool,
    pub pacman_id: Option<String>,
}

impl Dot {
    pub fn new(id: impl Into<String>, position: Vec3, is_power_dot: bool) -> Self {
        Self {
            id: id.into(),
            position,
            is_power_dot,
            pacman_id: None,
        }
    }

    pub fn is_eaten(&self) -> bool {
        self.pacman_id.is_some()
    }

    pub fn to_record(&self) -> DotRecord {
        DotRecord {
            id: self.id.clone(),
            position: self.position,
            is_power_dot: self.is_power_dot,
            pacman_id: self.pacman_id.clone(),
        }
    }

    pub fn from_record(record: &DotRecord) -> Self {
        Self {
            id: record.id.clone(),
            position: record.position,
            is_power_dot: record.is_power_dot,
            pacman_id: record.pacman_id.clone(),
        }
    }

    /// Applies the replicated claim; identity never changes and an existing
    /// claim is never un-eaten by a stale record. The claimant itself follows
    /// the record, so when two peers raced for the same dot every replica
    /// settles on the merge winner.
    pub fn copy_record(&mut self, record: &DotRecord) -> bool {
        if record.id != self.id {
            return false;
        }
        if record.pacman_id.is_some() {
            self.pacman_id = record.pacman_id.clone();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trip() {
        let mut dot = Dot::new("7", Vec3::new(4.0, -5.0, 0.0), true);
        dot.pacman_id = Some("p1".to_string());
        let rebuilt = Dot::from_record(&dot.to_record());
        assert_eq!(rebuilt, dot);
    }

    #[test]
    fn copy_record_rejects_other_identity() {
        let mut dot = Dot::new("1", Vec3::ZERO, false);
        let other = Dot::new("2", Vec3::ZERO, false).to_record();
        assert!(!dot.copy_record(&other));
        assert_eq!(dot.id, "1");
    }

    #[test]
    fn claim_is_one_shot() {
        let mut dot = Dot::new("1", Vec3::ZERO, false);
        dot.pacman_id = Some("p1".to_string());

        let mut stale = dot.to_record();
        stale.pacman_id = None;
        assert!(dot.copy_record(&stale));
        assert_eq!(dot.pacman_id.as_deref(), Some("p1"));
    }

    #[test]
    fn merged_claimant_overrides_local_claim() {
        // Two peers ate the same dot in the same tick; the replicated merge
        // picked one winner and every mirror must adopt it.
        let mut dot = Dot::new("1", Vec3::ZERO, false);
        dot.pacman_id = Some("p1".to_string());

        let mut winner = dot.to_record();
        winner.pacman_id = Some("p2".to_string());
        assert!(dot.copy_record(&winner));
        assert_eq!(dot.pacman_id.as_deref(), Some("p2"));
    }
}
