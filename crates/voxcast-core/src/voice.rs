//! Voice catalog and pass-through voice parameters.
//!
//! The catalog is advisory: it drives voice pickers and usage displays, but
//! submission never validates the voice id against it. Whatever
//! [`VoiceParams`] carries goes to the backend untouched.

use crate::error::{VoxcastError, VoxcastResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Gender classification for voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male voice
    Male,
    /// Female voice
    Female,
    /// Non-binary or neutral voice
    Neutral,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

/// A catalog entry describing one synthesizable voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine voice identifier (e.g. "hi-IN-MadhurNeural")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Language the voice speaks (e.g. "Hindi", "English")
    pub language: String,
    /// Voice gender
    pub gender: Gender,
}

impl Voice {
    /// Create a new voice entry
    #[must_use]
    pub fn new(id: String, name: String, language: String, gender: Gender) -> Self {
        Self {
            id,
            name,
            language,
            gender,
        }
    }

    /// Check if this voice speaks the given language
    #[must_use]
    pub fn supports_language(&self, language: &str) -> bool {
        self.language.eq_ignore_ascii_case(language)
    }

    /// Validate the voice entry
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::InvalidInput`] when a required field is empty.
    pub fn validate(&self) -> VoxcastResult<()> {
        if self.id.is_empty() {
            return Err(VoxcastError::invalid_input("Voice ID cannot be empty"));
        }
        if self.name.is_empty() {
            return Err(VoxcastError::invalid_input("Voice name cannot be empty"));
        }
        if self.language.is_empty() {
            return Err(VoxcastError::invalid_input(
                "Voice language cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new(
            crate::DEFAULT_VOICE_ID.to_string(),
            "Madhur".to_string(),
            "Hindi".to_string(),
            Gender::Male,
        )
    }
}

/// Voice parameters handed to the backend exactly as given.
///
/// `rate` and `pitch` are engine strings ("0%", "-50%", "5Hz"); the core never
/// parses or interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Engine voice identifier
    pub voice_id: String,
    /// Speaking rate adjustment, e.g. "0%" or "-50%"
    pub rate: String,
    /// Pitch adjustment, e.g. "0Hz" or "5Hz"
    pub pitch: String,
}

impl VoiceParams {
    /// Create parameters for a voice at neutral rate and pitch
    pub fn new<S: Into<String>>(voice_id: S) -> Self {
        Self {
            voice_id: voice_id.into(),
            rate: "0%".to_string(),
            pitch: "0Hz".to_string(),
        }
    }

    /// Build parameters from picker values: a speed multiplier and a pitch
    /// shift in hertz
    ///
    /// Speed 1.0 maps to "0%", 0.5 to "-50%", 2.0 to "100%".
    ///
    /// # Errors
    ///
    /// Returns [`VoxcastError::InvalidInput`] when speed is outside 0.5..=2.0
    /// or pitch is outside -20..=20.
    pub fn from_sliders<S: Into<String>>(
        voice_id: S,
        speed: f32,
        pitch_hz: i32,
    ) -> VoxcastResult<Self> {
        if !(0.5..=2.0).contains(&speed) {
            return Err(VoxcastError::invalid_input(format!(
                "Speed must be between 0.5 and 2.0, got {speed}"
            )));
        }
        if !(-20..=20).contains(&pitch_hz) {
            return Err(VoxcastError::invalid_input(format!(
                "Pitch must be between -20 and 20 Hz, got {pitch_hz}"
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let rate_percent = ((speed - 1.0) * 100.0) as i32;
        Ok(Self {
            voice_id: voice_id.into(),
            rate: format!("{rate_percent}%"),
            pitch: format!("{pitch_hz}Hz"),
        })
    }

    /// Set a raw rate string
    #[must_use]
    pub fn with_rate<S: Into<String>>(mut self, rate: S) -> Self {
        self.rate = rate.into();
        self
    }

    /// Set a raw pitch string
    #[must_use]
    pub fn with_pitch<S: Into<String>>(mut self, pitch: S) -> Self {
        self.pitch = pitch.into();
        self
    }
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self::new(crate::DEFAULT_VOICE_ID)
    }
}

/// Catalog of voices available for synthesis
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    voices: Arc<HashMap<String, Voice>>,
}

impl VoiceCatalog {
    /// Create the catalog with the stock voices
    #[must_use]
    pub fn new() -> Self {
        let stock = [
            Voice::new(
                "hi-IN-MadhurNeural".to_string(),
                "Madhur".to_string(),
                "Hindi".to_string(),
                Gender::Male,
            ),
            Voice::new(
                "hi-IN-SwaraNeural".to_string(),
                "Swara".to_string(),
                "Hindi".to_string(),
                Gender::Female,
            ),
            Voice::new(
                "en-US-AdamMultilingual".to_string(),
                "Adam".to_string(),
                "English".to_string(),
                Gender::Male,
            ),
            Voice::new(
                "en-US-BellaNeural".to_string(),
                "Bella".to_string(),
                "English".to_string(),
                Gender::Female,
            ),
        ];

        let mut voices = HashMap::new();
        for voice in stock {
            voices.insert(voice.id.clone(), voice);
        }

        Self {
            voices: Arc::new(voices),
        }
    }

    /// Create a catalog with custom voices
    #[must_use]
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let voice_map = voices
            .into_iter()
            .map(|voice| (voice.id.clone(), voice))
            .collect();

        Self {
            voices: Arc::new(voice_map),
        }
    }

    /// Look up a voice by engine id
    #[must_use]
    pub fn get(&self, voice_id: &str) -> Option<Voice> {
        self.voices.get(voice_id).cloned()
    }

    /// Check if the catalog knows a voice id
    #[must_use]
    pub fn contains(&self, voice_id: &str) -> bool {
        self.voices.contains_key(voice_id)
    }

    /// All voices, sorted by name for stable display
    #[must_use]
    pub fn all_voices(&self) -> Vec<Voice> {
        let mut voices: Vec<Voice> = self.voices.values().cloned().collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        voices
    }

    /// Voices filtered by language
    #[must_use]
    pub fn by_language(&self, language: &str) -> Vec<Voice> {
        let mut voices: Vec<Voice> = self
            .voices
            .values()
            .filter(|voice| voice.supports_language(language))
            .cloned()
            .collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        voices
    }

    /// The voice used when the caller does not pick one
    #[must_use]
    pub fn default_voice(&self) -> Voice {
        self.get(crate::DEFAULT_VOICE_ID)
            .unwrap_or_else(Voice::default)
    }

    /// Number of voices in the catalog
    #[must_use]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Languages covered by the catalog, sorted and deduplicated
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .voices
            .values()
            .map(|voice| voice.language.clone())
            .collect();
        languages.sort();
        languages.dedup();
        languages
    }
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_display() {
        assert_eq!(Gender::Male.to_string(), "Male");
        assert_eq!(Gender::Female.to_string(), "Female");
        assert_eq!(Gender::Neutral.to_string(), "Neutral");
    }

    #[test]
    fn test_voice_supports_language() {
        let voice = Voice::default();
        assert!(voice.supports_language("Hindi"));
        assert!(voice.supports_language("hindi"));
        assert!(!voice.supports_language("English"));
    }

    #[test]
    fn test_voice_validation() {
        assert!(Voice::default().validate().is_ok());

        let mut voice = Voice::default();
        voice.id.clear();
        assert!(voice.validate().is_err());

        let mut voice = Voice::default();
        voice.name.clear();
        assert!(voice.validate().is_err());

        let mut voice = Voice::default();
        voice.language.clear();
        assert!(voice.validate().is_err());
    }

    #[test]
    fn test_voice_params_new_is_neutral() {
        let params = VoiceParams::new("en-US-BellaNeural");
        assert_eq!(params.voice_id, "en-US-BellaNeural");
        assert_eq!(params.rate, "0%");
        assert_eq!(params.pitch, "0Hz");
    }

    #[test]
    fn test_voice_params_from_sliders() {
        let params = VoiceParams::from_sliders("hi-IN-SwaraNeural", 1.0, 0).unwrap();
        assert_eq!(params.rate, "0%");
        assert_eq!(params.pitch, "0Hz");

        let params = VoiceParams::from_sliders("hi-IN-SwaraNeural", 0.5, -10).unwrap();
        assert_eq!(params.rate, "-50%");
        assert_eq!(params.pitch, "-10Hz");

        let params = VoiceParams::from_sliders("hi-IN-SwaraNeural", 2.0, 20).unwrap();
        assert_eq!(params.rate, "100%");
        assert_eq!(params.pitch, "20Hz");
    }

    #[test]
    fn test_voice_params_from_sliders_invalid() {
        assert!(VoiceParams::from_sliders("v", 0.4, 0).is_err());
        assert!(VoiceParams::from_sliders("v", 2.5, 0).is_err());
        assert!(VoiceParams::from_sliders("v", 1.0, 21).is_err());
        assert!(VoiceParams::from_sliders("v", 1.0, -21).is_err());
    }

    #[test]
    fn test_voice_params_raw_setters() {
        let params = VoiceParams::new("v").with_rate("15%").with_pitch("-3Hz");
        assert_eq!(params.rate, "15%");
        assert_eq!(params.pitch, "-3Hz");
    }

    #[test]
    fn test_catalog_stock_voices() {
        let catalog = VoiceCatalog::new();
        assert_eq!(catalog.voice_count(), 4);
        assert!(catalog.contains("hi-IN-MadhurNeural"));
        assert!(catalog.contains("hi-IN-SwaraNeural"));
        assert!(catalog.contains("en-US-AdamMultilingual"));
        assert!(catalog.contains("en-US-BellaNeural"));
    }

    #[test]
    fn test_catalog_get() {
        let catalog = VoiceCatalog::new();
        let voice = catalog.get("en-US-BellaNeural").unwrap();
        assert_eq!(voice.name, "Bella");
        assert_eq!(voice.gender, Gender::Female);
        assert!(catalog.get("nonexistent").is_none());
    }

    #[test]
    fn test_catalog_by_language() {
        let catalog = VoiceCatalog::new();
        let hindi = catalog.by_language("Hindi");
        assert_eq!(hindi.len(), 2);
        assert!(hindi.iter().all(|v| v.language == "Hindi"));

        assert!(catalog.by_language("French").is_empty());
    }

    #[test]
    fn test_catalog_languages_sorted() {
        let catalog = VoiceCatalog::new();
        assert_eq!(catalog.languages(), vec!["English", "Hindi"]);
    }

    #[test]
    fn test_catalog_default_voice() {
        let catalog = VoiceCatalog::new();
        assert_eq!(catalog.default_voice().id, crate::DEFAULT_VOICE_ID);
    }

    #[test]
    fn test_catalog_all_voices_sorted_by_name() {
        let catalog = VoiceCatalog::new();
        let names: Vec<String> = catalog.all_voices().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["Adam", "Bella", "Madhur", "Swara"]);
    }

    #[test]
    fn test_catalog_with_voices() {
        let custom = Voice::new(
            "custom".to_string(),
            "Custom".to_string(),
            "Spanish".to_string(),
            Gender::Neutral,
        );
        let catalog = VoiceCatalog::with_voices(vec![custom.clone()]);
        assert_eq!(catalog.voice_count(), 1);
        assert_eq!(catalog.get("custom"), Some(custom));
    }

    #[test]
    fn test_voice_serialization() {
        let voice = Voice::default();
        let json = serde_json::to_string(&voice).expect("Should serialize");
        let deserialized: Voice = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(voice, deserialized);
    }

    #[test]
    fn test_voice_params_serialization() {
        let params = VoiceParams::from_sliders("en-US-AdamMultilingual", 1.5, 5).unwrap();
        let json = serde_json::to_string(&params).expect("Should serialize");
        let deserialized: VoiceParams = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(params, deserialized);
    }
}
