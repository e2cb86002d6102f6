//! Mentor tiers
//!
//! Individual contributors are mentored by leads, leads by heads, heads by
//! the top-level role. Which positions belong to which tier is configuration,
//! not a fixed rule; anything not listed is an individual contributor.

use super::seed::{MentorKind, PersonRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentorTier {
    IndividualContributor,
    Lead,
    Head,
    TopLevel,
}

impl MentorTier {
    /// Tier a mentor of this tier is expected to come from
    pub fn expected_mentor(self) -> Option<MentorTier> {
        match self {
            MentorTier::IndividualContributor => Some(MentorTier::Lead),
            MentorTier::Lead => Some(MentorTier::Head),
            MentorTier::Head => Some(MentorTier::TopLevel),
            MentorTier::TopLevel => None,
        }
    }
}

/// Position names per tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentorTiers {
    pub lead_positions: Vec<String>,
    pub head_positions: Vec<String>,
    pub top_positions: Vec<String>,
}

impl Default for MentorTiers {
    fn default() -> Self {
        let owned = |names: &[&str]| -> Vec<String> { names.iter().map(|s| s.to_string()).collect() };
        Self {
            lead_positions: owned(&[
                "Tech Lead",
                "Project Manager",
                "QA Lead",
                "Finance Manager",
                "HR Manager",
            ]),
            head_positions: owned(&["Department Head"]),
            top_positions: owned(&["CEO"]),
        }
    }
}

/// A mentorship that skips or inverts the tier order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierMismatch {
    pub kind: MentorKind,
    pub mentee: String,
    pub mentee_tier: MentorTier,
    pub mentor: String,
    pub mentor_tier: MentorTier,
}

impl MentorTiers {
    pub fn tier_of(&self, position: &str) -> MentorTier {
        let position = position.trim();
        let listed = |names: &[String]| names.iter().any(|n| n.eq_ignore_ascii_case(position));

        if listed(&self.top_positions) {
            MentorTier::TopLevel
        } else if listed(&self.head_positions) {
            MentorTier::Head
        } else if listed(&self.lead_positions) {
            MentorTier::Lead
        } else {
            MentorTier::IndividualContributor
        }
    }

    /// Mentorships whose mentor is not in the tier above the mentee.
    /// Mentors without their own seed row have no known position and are not
    /// checked.
    pub fn mismatches(&self, records: &[PersonRecord]) -> Vec<TierMismatch> {
        let positions: HashMap<&str, &str> = records
            .iter()
            .map(|r| (r.full_name.trim(), r.position.as_str()))
            .collect();

        let mut found = Vec::new();
        for record in records {
            let mentee_tier = self.tier_of(&record.position);
            for kind in MentorKind::ALL {
                let Some(mentor) = record.mentor(kind) else {
                    continue;
                };
                let Some(position) = positions.get(mentor) else {
                    continue;
                };
                let mentor_tier = self.tier_of(position);
                if mentee_tier.expected_mentor() != Some(mentor_tier) {
                    found.push(TierMismatch {
                        kind,
                        mentee: record.full_name.clone(),
                        mentee_tier,
                        mentor: mentor.to_string(),
                        mentor_tier,
                    });
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_of_positions() {
        let tiers = MentorTiers::default();
        assert_eq!(tiers.tier_of("Developer"), MentorTier::IndividualContributor);
        assert_eq!(tiers.tier_of("qa lead"), MentorTier::Lead);
        assert_eq!(tiers.tier_of("Department Head"), MentorTier::Head);
        assert_eq!(tiers.tier_of("CEO"), MentorTier::TopLevel);
    }

    #[test]
    fn test_mismatches() {
        let records = vec![
            PersonRecord::new(1, "Grace Hopper", "CEO", ""),
            PersonRecord::new(2, "Alan Turing", "Department Head", "Engineering")
                .with_mentor(MentorKind::Career, "Grace Hopper"),
            PersonRecord::new(3, "Ada Lovelace", "Developer", "Engineering")
                // skips the lead tier
                .with_mentor(MentorKind::Tech, "Alan Turing")
                // unknown mentor position, not checked
                .with_mentor(MentorKind::Career, "Charles Babbage"),
        ];

        let found = MentorTiers::default().mismatches(&records);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].mentee, "Ada Lovelace");
        assert_eq!(found[0].kind, MentorKind::Tech);
        assert_eq!(found[0].mentor_tier, MentorTier::Head);
    }

    #[test]
    fn test_custom_tiers() {
        let tiers = MentorTiers {
            lead_positions: vec!["Staff Engineer".to_string()],
            head_positions: vec![],
            top_positions: vec![],
        };
        assert_eq!(tiers.tier_of("Staff Engineer"), MentorTier::Lead);
        assert_eq!(tiers.tier_of("Tech Lead"), MentorTier::IndividualContributor);
    }
}
