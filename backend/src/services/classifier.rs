use crate::models::VideoMetadata;
use crate::utils::publication_day;

pub const UNCLASSIFIED: &str = "unclassified";

/// A named group of lowercase keywords.
#[derive(Debug, Clone)]
pub struct KeywordGroup {
    pub name: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        KeywordGroup {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Total number of keyword occurrences in an already lowercased text.
    fn occurrences(&self, text: &str) -> usize {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| text.matches(k.as_str()).count())
            .sum()
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(k.as_str()))
    }
}

/// Ordered groups where the first match wins, with a fallback category.
#[derive(Debug, Clone)]
pub struct FirstMatch {
    pub groups: Vec<KeywordGroup>,
    pub default: String,
}

impl FirstMatch {
    fn pick(&self, text: &str) -> &str {
        self.groups
            .iter()
            .find(|g| g.matches(text))
            .map(|g| g.name.as_str())
            .unwrap_or(&self.default)
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub pillars: Vec<KeywordGroup>,
    pub hook_types: FirstMatch,
    pub content_formats: FirstMatch,
    pub cta: FirstMatch,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            pillars: vec![
                KeywordGroup::new(
                    "Agilité",
                    &[
                        "agile",
                        "agilité",
                        "scrum",
                        "kanban",
                        "sprint",
                        "product owner",
                        "rétrospective",
                        "backlog",
                    ],
                ),
                KeywordGroup::new(
                    "Leadership",
                    &["leader", "management", "manager", "équipe", "coaching", "feedback"],
                ),
                KeywordGroup::new(
                    "Productivité",
                    &["productivité", "priorit", "organisation", "focus", "efficacité"],
                ),
                KeywordGroup::new(
                    "Carrière",
                    &["carrière", "certification", "entretien", "salaire", "freelance", "reconversion"],
                ),
                KeywordGroup::new("Outils", &["jira", "notion", "trello", "miro", "outil", "template"]),
            ],
            hook_types: FirstMatch {
                groups: vec![
                    KeywordGroup::new("Question", &["?", "comment ", "pourquoi", "quel ", "quelle "]),
                    KeywordGroup::new("Négatif", &["erreur", "piège", "arrêtez", "stop", "jamais", "ne faites pas"]),
                    KeywordGroup::new("Liste", &["top ", "astuces", "étapes", "raisons", "conseils"]),
                    KeywordGroup::new("Histoire", &["mon histoire", "j'ai ", "retour d'expérience", "témoignage"]),
                ],
                default: "Affirmation".to_string(),
            },
            content_formats: FirstMatch {
                groups: vec![
                    KeywordGroup::new("Short", &["#shorts", "#short"]),
                    KeywordGroup::new("Interview", &["interview", "rencontre", "podcast"]),
                    KeywordGroup::new("Live", &["live", "webinar", "direct"]),
                    KeywordGroup::new("Tutoriel", &["tuto", "formation", "cours", "apprendre", "guide"]),
                    KeywordGroup::new("Tips", &["tip", "astuce", "conseil"]),
                ],
                default: "Standard".to_string(),
            },
            cta: FirstMatch {
                groups: vec![
                    KeywordGroup::new("Abonnement", &["abonne", "subscribe"]),
                    KeywordGroup::new("Lien", &["lien", "http", "télécharge", "inscri"]),
                    KeywordGroup::new("Commentaire", &["commentaire", "dites-moi"]),
                ],
                default: "Aucun".to_string(),
            },
        }
    }
}

/// Every text-derived field of one video.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub pillar: String,
    pub secondary_topics: Vec<String>,
    pub hook_type: String,
    pub content_format: String,
    pub cta_presence: String,
    pub publication_day: String,
}

#[derive(Debug, Clone)]
pub struct ContentClassifier {
    config: ClassifierConfig,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl ContentClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        ContentClassifier { config }
    }

    fn pillar_scores(&self, lowered_title: &str) -> Vec<(&str, usize)> {
        self.config
            .pillars
            .iter()
            .map(|p| (p.name.as_str(), p.occurrences(lowered_title)))
            .collect()
    }

    pub fn classify_pillar(&self, title: &str) -> String {
        let scores = self.pillar_scores(&title.to_lowercase());
        best_pillar(&scores).to_string()
    }

    pub fn hook_type(&self, title: &str) -> String {
        self.config.hook_types.pick(&title.to_lowercase()).to_string()
    }

    pub fn content_format(&self, title: &str, tags: &[String]) -> String {
        let mut text = title.to_lowercase();
        for tag in tags {
            text.push(' ');
            text.push_str(&tag.to_lowercase());
        }
        self.config.content_formats.pick(&text).to_string()
    }

    pub fn cta_presence(&self, description: &str) -> String {
        self.config.cta.pick(&description.to_lowercase()).to_string()
    }

    pub fn classify(&self, video: &VideoMetadata) -> Classification {
        let scores = self.pillar_scores(&video.title.to_lowercase());
        let pillar = best_pillar(&scores).to_string();
        let secondary_topics = scores
            .iter()
            .filter(|(name, score)| *score > 0 && *name != pillar)
            .map(|(name, _)| name.to_string())
            .collect();

        Classification {
            pillar,
            secondary_topics,
            hook_type: self.hook_type(&video.title),
            content_format: self.content_format(&video.title, &video.tags),
            cta_presence: self.cta_presence(&video.description_snippet),
            publication_day: publication_day(&video.publish_date),
        }
    }
}

/// Derives every text field of a video in one call.
pub trait VideoClassifier {
    fn classify_video(&self, video: &VideoMetadata) -> Classification;
}

impl VideoClassifier for ContentClassifier {
    fn classify_video(&self, video: &VideoMetadata) -> Classification {
        self.classify(video)
    }
}

// Strictly highest score wins, so the first declared pillar keeps a tie.
fn best_pillar<'a>(scores: &[(&'a str, usize)]) -> &'a str {
    let mut best: Option<(&str, usize)> = None;
    for &(name, score) in scores {
        if score == 0 {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((name, score)),
        }
    }
    best.map(|(name, _)| name).unwrap_or(UNCLASSIFIED)
}
