//! crates/readtention_core/src/lens.rs
//!
//! The reading-lens table, weighted lens selections and the named presets.
//!
//! A lens is a thematic perspective that biases mind-map generation. Callers
//! weight one or more lenses with an intensity in `[0, 1]`; the resolver here
//! turns those weights into a primary lens, per-lens emphasis tiers and a
//! ranking that the prompt builder consumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intensity at or above which a lens is "strongly emphasized".
pub const STRONG_THRESHOLD: f64 = 0.8;
/// Intensity at or above which a lens is a "focus".
pub const FOCUS_THRESHOLD: f64 = 0.5;
/// Intensity at or above which a ranked lens also contributes its secondary section.
pub const SECONDARY_SECTION_THRESHOLD: f64 = 0.7;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LensError {
    #[error("Unknown lens '{0}'")]
    UnknownLens(String),
    #[error("Invalid intensity for lens '{0}': {1}")]
    InvalidIntensity(String, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lens {
    Analytical,
    Character,
    Philosophical,
    Creative,
    Practical,
    Emotional,
    Historical,
    Connective,
}

/// Static description of a lens.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LensConfig {
    pub key: Lens,
    pub display_name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    /// Phrase spliced into prompts after the emphasis verb.
    pub focus: &'static str,
    /// Candidate `##` headings, most important first.
    pub sections: [&'static str; 4],
}

static LENS_TABLE: [LensConfig; 8] = [
    LensConfig {
        key: Lens::Analytical,
        display_name: "Analytical",
        icon: "🧠",
        description: "Logic, evidence, cause-effect relationships, and structured reasoning",
        focus: "logical structure, cause-effect relationships, evidence-based reasoning, systematic analysis",
        sections: ["Logic & Structure", "Evidence & Analysis", "Cause-Effect Chains", "Systematic Breakdown"],
    },
    LensConfig {
        key: Lens::Character,
        display_name: "Character-Focused",
        icon: "👥",
        description: "People, relationships, motivations, and character development",
        focus: "characters, relationships, motivations, personal development, human dynamics",
        sections: ["Key Characters", "Character Development", "Relationships & Dynamics", "Motivations & Goals"],
    },
    LensConfig {
        key: Lens::Philosophical,
        display_name: "Philosophical",
        icon: "✨",
        description: "Big ideas, ethics, worldview concepts, and deeper meaning",
        focus: "big ideas, ethical implications, worldview concepts, deeper meaning, wisdom",
        sections: ["Core Philosophy", "Ethical Dimensions", "Big Ideas", "Universal Truths"],
    },
    LensConfig {
        key: Lens::Creative,
        display_name: "Creative",
        icon: "🎨",
        description: "Innovation, artistic elements, inspiration, and imaginative connections",
        focus: "innovation, artistic elements, creative thinking, inspiration, imaginative connections",
        sections: ["Creative Concepts", "Innovative Ideas", "Artistic Elements", "Inspiration Points"],
    },
    LensConfig {
        key: Lens::Practical,
        display_name: "Practical",
        icon: "⚙️",
        description: "Actionable insights, implementation steps, and how-to guidance",
        focus: "actionable insights, implementation steps, how-to guidance, real-world applications",
        sections: ["Action Steps", "Implementation Guide", "Practical Tools", "Real-World Applications"],
    },
    LensConfig {
        key: Lens::Emotional,
        display_name: "Emotional",
        icon: "❤️",
        description: "Feelings, psychological impact, personal resonance, and emotional intelligence",
        focus: "feelings, psychological impact, emotional intelligence, personal resonance",
        sections: ["Emotional Journey", "Psychological Insights", "Personal Impact", "Feeling States"],
    },
    LensConfig {
        key: Lens::Historical,
        display_name: "Historical",
        icon: "📚",
        description: "Context, timeline, influence, evolution of ideas over time",
        focus: "historical context, timeline, evolution of ideas, cultural background, influence over time",
        sections: ["Historical Context", "Timeline & Evolution", "Cultural Background", "Legacy & Influence"],
    },
    LensConfig {
        key: Lens::Connective,
        display_name: "Connective",
        icon: "🔗",
        description: "Links to other books, cross-connections, and knowledge synthesis",
        focus: "connections to other ideas, cross-references, synthesis, broader knowledge networks",
        sections: ["Connections & Links", "Cross-References", "Knowledge Networks", "Synthesis Points"],
    },
];

impl Lens {
    pub const ALL: [Lens; 8] = [
        Lens::Analytical,
        Lens::Character,
        Lens::Philosophical,
        Lens::Creative,
        Lens::Practical,
        Lens::Emotional,
        Lens::Historical,
        Lens::Connective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lens::Analytical => "analytical",
            Lens::Character => "character",
            Lens::Philosophical => "philosophical",
            Lens::Creative => "creative",
            Lens::Practical => "practical",
            Lens::Emotional => "emotional",
            Lens::Historical => "historical",
            Lens::Connective => "connective",
        }
    }

    pub fn config(&self) -> &'static LensConfig {
        // LENS_TABLE is laid out in the same order as `Lens::ALL`.
        &LENS_TABLE[*self as usize]
    }

    pub fn primary_section(&self) -> &'static str {
        self.config().sections[0]
    }

    pub fn secondary_section(&self) -> &'static str {
        self.config().sections[1]
    }
}

impl fmt::Display for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lens {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lens::ALL
            .iter()
            .copied()
            .find(|lens| lens.as_str() == s)
            .ok_or_else(|| LensError::UnknownLens(s.to_string()))
    }
}

/// Returns the full lens table in canonical order.
pub fn lens_table() -> &'static [LensConfig] {
    &LENS_TABLE
}

/// How strongly a lens should be reflected in generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmphasisTier {
    Strong,
    Focus,
    Touch,
}

impl EmphasisTier {
    pub fn for_intensity(intensity: f64) -> Self {
        if intensity >= STRONG_THRESHOLD {
            EmphasisTier::Strong
        } else if intensity >= FOCUS_THRESHOLD {
            EmphasisTier::Focus
        } else {
            EmphasisTier::Touch
        }
    }

    /// The verb phrase used in prompts for this tier.
    pub fn phrase(&self) -> &'static str {
        match self {
            EmphasisTier::Strong => "strongly emphasize",
            EmphasisTier::Focus => "focus on",
            EmphasisTier::Touch => "touch on",
        }
    }
}

/// An ordered lens → intensity mapping.
///
/// Insertion order is significant: it breaks ties for the primary lens and is
/// the order in which lenses are listed back to the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LensSelection {
    entries: Vec<(Lens, f64)>,
}

impl LensSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection from `(key, intensity)` pairs, validating every key.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, LensError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut selection = Self::new();
        for (key, intensity) in pairs {
            let lens = key.parse::<Lens>()?;
            selection.set(lens, intensity)?;
        }
        Ok(selection)
    }

    /// Sets a lens weight, clamping it into `[0, 1]`. Re-setting a lens keeps
    /// its original position.
    pub fn set(&mut self, lens: Lens, intensity: f64) -> Result<(), LensError> {
        if !intensity.is_finite() {
            return Err(LensError::InvalidIntensity(lens.to_string(), intensity));
        }
        let intensity = intensity.clamp(0.0, 1.0);
        match self.entries.iter_mut().find(|(l, _)| *l == lens) {
            Some(entry) => entry.1 = intensity,
            None => self.entries.push((lens, intensity)),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, lens: Lens) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == lens)
            .map(|(_, intensity)| *intensity)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(Lens, f64)] {
        &self.entries
    }

    pub fn lenses(&self) -> impl Iterator<Item = Lens> + '_ {
        self.entries.iter().map(|(lens, _)| *lens)
    }

    /// The first-encountered entry with the maximum intensity.
    pub fn primary(&self) -> Option<(Lens, f64)> {
        let mut best: Option<(Lens, f64)> = None;
        for &(lens, intensity) in &self.entries {
            match best {
                Some((_, max)) if intensity <= max => {}
                _ => best = Some((lens, intensity)),
            }
        }
        best
    }

    pub fn tier(&self, lens: Lens) -> Option<EmphasisTier> {
        self.get(lens).map(EmphasisTier::for_intensity)
    }

    /// Entries sorted by descending intensity. Equal intensities keep their
    /// insertion order.
    pub fn ranked(&self) -> Vec<(Lens, f64)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Serializes the selection as a JSON object, preserving order.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(lens, intensity)| (lens.as_str().to_string(), serde_json::json!(intensity)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// A named, fixed bundle of lens weights offered as a one-click choice.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
    pub modes: &'static [(Lens, f64)],
}

impl Preset {
    pub fn selection(&self) -> LensSelection {
        LensSelection {
            entries: self.modes.to_vec(),
        }
    }
}

pub static PRESETS: [Preset; 3] = [
    Preset {
        id: "deep-thinker",
        name: "Deep Thinker",
        icon: "🤔",
        description: "Perfect for complex ideas and philosophical exploration",
        tags: &["Analysis", "Big Ideas", "Context"],
        modes: &[
            (Lens::Analytical, 0.7),
            (Lens::Philosophical, 1.0),
            (Lens::Historical, 0.3),
        ],
    },
    Preset {
        id: "people-person",
        name: "People Person",
        icon: "💝",
        description: "Focus on relationships, emotions, and human connections",
        tags: &["Characters", "Emotions", "Relationships"],
        modes: &[
            (Lens::Character, 1.0),
            (Lens::Emotional, 0.7),
            (Lens::Connective, 0.3),
        ],
    },
    Preset {
        id: "action-oriented",
        name: "Action Oriented",
        icon: "🚀",
        description: "Actionable insights and creative implementation",
        tags: &["How-to", "Creative", "Results"],
        modes: &[
            (Lens::Practical, 1.0),
            (Lens::Creative, 0.7),
            (Lens::Analytical, 0.3),
        ],
    },
];

pub fn preset_by_id(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.id == id)
}

/// The lens part of a generation request: the weights plus the preset the
/// user picked, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LensRequest {
    pub selection: LensSelection,
    /// `None` means the user built a custom combination.
    pub preset: Option<String>,
}

impl LensRequest {
    pub fn custom(selection: LensSelection) -> Self {
        Self {
            selection,
            preset: None,
        }
    }

    /// Builds a request from a preset's fixed weights.
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            selection: preset.selection(),
            preset: Some(preset.id.to_string()),
        }
    }

    /// Resolves the raw payload. A known preset with no explicit weights
    /// substitutes the preset's mapping.
    pub fn resolve(selection: LensSelection, preset: Option<String>) -> Self {
        let preset = preset.filter(|p| !p.is_empty() && p != "custom");
        match preset.as_deref().and_then(preset_by_id) {
            Some(known) if selection.is_empty() => Self::from_preset(known),
            _ => Self { selection, preset },
        }
    }

    pub fn preset_label(&self) -> &str {
        self.preset.as_deref().unwrap_or("custom")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_enum_order() {
        for lens in Lens::ALL {
            assert_eq!(lens.config().key, lens);
        }
    }

    #[test]
    fn unknown_lens_keys_are_rejected() {
        let err = LensSelection::from_pairs([("analytical", 0.5), ("mystical", 0.9)]).unwrap_err();
        assert_eq!(err, LensError::UnknownLens("mystical".to_string()));
    }

    #[test]
    fn intensities_are_clamped_and_nan_rejected() {
        let selection = LensSelection::from_pairs([("creative", 1.7), ("emotional", -0.2)]).unwrap();
        assert_eq!(selection.get(Lens::Creative), Some(1.0));
        assert_eq!(selection.get(Lens::Emotional), Some(0.0));

        let mut selection = LensSelection::new();
        assert!(selection.set(Lens::Creative, f64::NAN).is_err());
    }

    #[test]
    fn primary_prefers_first_encountered_maximum() {
        let selection =
            LensSelection::from_pairs([("historical", 0.9), ("character", 0.9), ("creative", 0.2)]).unwrap();
        assert_eq!(selection.primary(), Some((Lens::Historical, 0.9)));
        assert_eq!(LensSelection::new().primary(), None);
    }

    #[test]
    fn tiers_follow_thresholds() {
        assert_eq!(EmphasisTier::for_intensity(0.8), EmphasisTier::Strong);
        assert_eq!(EmphasisTier::for_intensity(0.79), EmphasisTier::Focus);
        assert_eq!(EmphasisTier::for_intensity(0.5), EmphasisTier::Focus);
        assert_eq!(EmphasisTier::for_intensity(0.49), EmphasisTier::Touch);
        assert_eq!(EmphasisTier::Strong.phrase(), "strongly emphasize");
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let selection =
            LensSelection::from_pairs([("emotional", 0.4), ("practical", 0.9), ("character", 0.4)]).unwrap();
        let ranked: Vec<Lens> = selection.ranked().into_iter().map(|(l, _)| l).collect();
        assert_eq!(ranked, vec![Lens::Practical, Lens::Emotional, Lens::Character]);
    }

    #[test]
    fn resetting_a_lens_keeps_its_position() {
        let mut selection = LensSelection::from_pairs([("analytical", 0.7), ("creative", 0.3)]).unwrap();
        selection.set(Lens::Analytical, 0.2).unwrap();
        assert_eq!(selection.entries(), &[(Lens::Analytical, 0.2), (Lens::Creative, 0.3)]);
    }

    #[test]
    fn preset_substitutes_only_when_no_weights_given() {
        let resolved = LensRequest::resolve(LensSelection::new(), Some("deep-thinker".to_string()));
        assert_eq!(resolved.selection.get(Lens::Philosophical), Some(1.0));
        assert_eq!(resolved.preset_label(), "deep-thinker");

        let explicit = LensSelection::from_pairs([("creative", 0.6)]).unwrap();
        let resolved = LensRequest::resolve(explicit.clone(), Some("deep-thinker".to_string()));
        assert_eq!(resolved.selection, explicit);

        let resolved = LensRequest::resolve(explicit, Some("custom".to_string()));
        assert_eq!(resolved.preset, None);
    }
}
