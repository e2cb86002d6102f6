//! Canonical question forms used by the rephrasing pass

use regex::Regex;
use std::sync::LazyLock;

/// Question shapes the generation prompt handles reliably
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalTemplate {
    TechMentorOf,
    CareerMentorOf,
    TechMenteesOf,
    CareerMenteesOf,
    ProjectOf,
    WorksOn,
    PositionOf,
    DepartmentOf,
}

impl CanonicalTemplate {
    pub const ALL: [CanonicalTemplate; 8] = [
        CanonicalTemplate::TechMentorOf,
        CanonicalTemplate::CareerMentorOf,
        CanonicalTemplate::TechMenteesOf,
        CanonicalTemplate::CareerMenteesOf,
        CanonicalTemplate::ProjectOf,
        CanonicalTemplate::WorksOn,
        CanonicalTemplate::PositionOf,
        CanonicalTemplate::DepartmentOf,
    ];

    /// Text around the entity
    fn parts(self) -> (&'static str, &'static str) {
        match self {
            CanonicalTemplate::TechMentorOf => ("Who is the tech mentor of ", "?"),
            CanonicalTemplate::CareerMentorOf => ("Who is the career mentor of ", "?"),
            CanonicalTemplate::TechMenteesOf => ("Who are the tech mentees of ", "?"),
            CanonicalTemplate::CareerMenteesOf => ("Who are the career mentees of ", "?"),
            CanonicalTemplate::ProjectOf => ("Which projects does ", " work on?"),
            CanonicalTemplate::WorksOn => ("Who works on ", "?"),
            CanonicalTemplate::PositionOf => ("What is the position of ", "?"),
            CanonicalTemplate::DepartmentOf => ("What is the department of ", "?"),
        }
    }

    pub fn render(self, entity: &str) -> String {
        let (prefix, suffix) = self.parts();
        format!("{}{}{}", prefix, entity, suffix)
    }
}

static MATCHERS: LazyLock<Vec<(CanonicalTemplate, Regex)>> = LazyLock::new(|| {
    CanonicalTemplate::ALL
        .iter()
        .map(|&template| {
            let (prefix, suffix) = template.parts();
            let suffix = regex::escape(suffix.trim_end_matches('?'));
            let pattern = format!(r"(?i)^{}(.+?){}\s*\??$", regex::escape(prefix), suffix);
            (template, Regex::new(&pattern).expect("static template pattern"))
        })
        .collect()
});

/// Outcome of the rephrasing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rephrased {
    /// The model produced one of the canonical forms
    Canonical {
        template: CanonicalTemplate,
        entity: String,
        text: String,
    },
    /// Anything else; used as the question as-is
    Passthrough(String),
}

impl Rephrased {
    /// Match model output against the canonical forms
    pub fn classify(output: &str) -> Self {
        let text = output.trim().trim_matches('"').trim();
        for (template, regex) in MATCHERS.iter() {
            let Some(caps) = regex.captures(text) else {
                continue;
            };
            let entity = caps[1].trim().trim_matches(|c| c == '\'' || c == '"').trim();
            if entity.is_empty() || entity.starts_with('<') {
                break;
            }
            return Rephrased::Canonical {
                template: *template,
                entity: entity.to_string(),
                text: template.render(entity),
            };
        }
        Rephrased::Passthrough(text.to_string())
    }

    pub fn text(&self) -> &str {
        match self {
            Rephrased::Canonical { text, .. } => text,
            Rephrased::Passthrough(text) => text,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Rephrased::Canonical { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_canonical_forms() {
        let rephrased = Rephrased::classify("who is the TECH mentor of Ada Lovelace");
        assert_eq!(
            rephrased,
            Rephrased::Canonical {
                template: CanonicalTemplate::TechMentorOf,
                entity: "Ada Lovelace".to_string(),
                text: "Who is the tech mentor of Ada Lovelace?".to_string(),
            }
        );

        let rephrased = Rephrased::classify("  \"Which projects does Grace Hopper work on?\" ");
        assert!(matches!(
            rephrased,
            Rephrased::Canonical { template: CanonicalTemplate::ProjectOf, ref entity, .. } if entity == "Grace Hopper"
        ));
    }

    #[test]
    fn test_mentor_and_mentees_are_distinct() {
        let mentor = Rephrased::classify("Who is the career mentor of Alan Turing?");
        let mentees = Rephrased::classify("Who are the career mentees of Alan Turing?");
        assert!(matches!(mentor, Rephrased::Canonical { template: CanonicalTemplate::CareerMentorOf, .. }));
        assert!(matches!(mentees, Rephrased::Canonical { template: CanonicalTemplate::CareerMenteesOf, .. }));
    }

    #[test]
    fn test_other_text_passes_through() {
        let rephrased = Rephrased::classify("How many people are in Finance?");
        assert_eq!(rephrased, Rephrased::Passthrough("How many people are in Finance?".to_string()));
        assert!(!rephrased.is_canonical());

        // placeholder echoed back is not a real entity
        let rephrased = Rephrased::classify("Who works on <name>?");
        assert!(!rephrased.is_canonical());
    }

    #[test]
    fn test_render_round_trips_through_classify() {
        for template in CanonicalTemplate::ALL {
            let text = template.render("Inventory Management System");
            match Rephrased::classify(&text) {
                Rephrased::Canonical { template: found, text: rendered, .. } => {
                    assert_eq!(found, template);
                    assert_eq!(rendered, text);
                }
                other => panic!("{:?} not recognised: {:?}", template, other),
            }
        }
    }
}
