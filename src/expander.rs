use crate::{error::ValidationError, models::MAX_IDEA_CHARS};

/// Descriptors layered around the user's idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Enrichment {
    style: &'static str,
    lighting: &'static str,
    composition: &'static str,
    quality: &'static str,
}

struct CategoryRule {
    keywords: &'static [&'static str],
    enrichment: Enrichment,
}

const DEFAULT_ENRICHMENT: Enrichment = Enrichment {
    style: "highly detailed, photorealistic",
    lighting: "dramatic lighting",
    composition: "rule of thirds composition",
    quality: "professional photography",
};

// Evaluated in order, first match wins.
const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        keywords: &["portrait", "person", "face"],
        enrichment: Enrichment {
            style: "highly detailed, photorealistic",
            lighting: "soft natural lighting",
            composition: "portrait composition with shallow depth of field",
            quality: "professional portrait photography",
        },
    },
    CategoryRule {
        keywords: &["landscape", "nature", "mountain", "forest"],
        enrichment: Enrichment {
            style: "highly detailed, photorealistic",
            lighting: "golden hour lighting",
            composition: "sweeping vista composition",
            quality: "award-winning landscape photography",
        },
    },
    CategoryRule {
        keywords: &["abstract", "geometric"],
        enrichment: Enrichment {
            style: "artistic masterpiece, highly detailed",
            lighting: "dramatic lighting",
            composition: "dynamic geometric composition",
            quality: "contemporary digital art",
        },
    },
    CategoryRule {
        keywords: &[
            "animal", "wildlife", "cat", "dog", "bird", "tiger", "lion", "elephant", "wolf",
            "bear", "fox", "horse", "deer", "owl", "eagle", "jungle", "safari", "savanna",
        ],
        enrichment: Enrichment {
            style: "highly detailed, photorealistic",
            lighting: "natural lighting",
            composition: "close-up shot with telephoto lens",
            quality: "award-winning wildlife photography",
        },
    },
];

// Independent of the category; first match wins.
const COLOR_RULES: &[(&[&str], &str)] = &[
    (&["sunset", "warm"], "warm, golden tones"),
    (&["ocean", "water", "cool"], "cool blue tones"),
    (&["monochrome", "black and white", "black-and-white"], "monochromatic tones with high contrast"),
];

const DEFAULT_COLOR: &str = "vibrant colors";

/// Rule-based prompt enrichment. Pure and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptExpander;

impl PromptExpander {
    pub fn new() -> Self { Self }

    pub fn expand(&self, user_idea: &str) -> Result<String, ValidationError> {
        // trimmed text only drives validation and keyword matching; the output keeps the idea verbatim
        let idea = user_idea.trim();
        if idea.is_empty() {
            return Err(ValidationError::Empty);
        }
        if user_idea.chars().count() > MAX_IDEA_CHARS {
            return Err(ValidationError::TooLong { max: MAX_IDEA_CHARS });
        }

        let lowered = idea.to_lowercase();
        let mentions = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

        let e = CATEGORY_RULES
            .iter()
            .find(|rule| mentions(rule.keywords))
            .map(|rule| rule.enrichment)
            .unwrap_or(DEFAULT_ENRICHMENT);
        let color = COLOR_RULES
            .iter()
            .find(|(keywords, _)| mentions(*keywords))
            .map(|(_, color)| *color)
            .unwrap_or(DEFAULT_COLOR);

        Ok(format!(
            "{} image of {}, {}, {}, {}, {} trending on artstation",
            e.style, user_idea, e.lighting, color, e.composition, e.quality
        ))
    }
}
