//! AI personality configuration loaded from TOML
//!
//! Personalities tune how boldly a commander attacks, how readily it digs
//! in, and how much it trusts old reports.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::core::error::{MatchError, Result};

/// Commander tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiPersonality {
    /// Name of this personality (set from filename)
    pub name: String,
    /// Tendency to attack (0.0 = timid, 1.0 = reckless); lowers the odds
    /// demanded before attacking
    pub aggression: f64,
    /// Tendency to avoid risk (0.0 = careless, 1.0 = skittish); raises how
    /// readily a threatened unit holds
    pub caution: f64,
    /// Estimated strength ratio wanted over a target before committing
    pub attack_ratio: f64,
    /// Fraction of a report's weight lost per turn of age
    pub stale_discount: f64,
    /// Defence assumed for an enemy region with no contact reports
    pub unknown_region_strength: f64,
}

impl Default for AiPersonality {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            aggression: 0.5,
            caution: 0.5,
            attack_ratio: 1.3,
            stale_discount: 0.2,
            unknown_region_strength: 8.0,
        }
    }
}

impl AiPersonality {
    /// Parse a personality from TOML; missing fields keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let personality: AiPersonality = toml::from_str(contents)?;
        personality.validate()?;
        Ok(personality)
    }

    /// Multiplier applied to a report `age` turns old
    pub fn report_weight(&self, age: u32) -> f64 {
        (1.0 - self.stale_discount).max(0.0).powi(age as i32)
    }

    /// Strength a unit wants to bring against an estimated defence
    pub fn required_strength(&self, estimated_defense: f64) -> f64 {
        estimated_defense * self.attack_ratio * (1.5 - self.aggression)
    }

    /// Is a threat of `threat` enough to make a unit of `strength` hold?
    pub fn feels_threatened(&self, strength: f64, threat: f64) -> bool {
        threat * (0.5 + self.caution) > strength
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("aggression", self.aggression),
            ("caution", self.caution),
            ("stale_discount", self.stale_discount),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MatchError::config(format!(
                    "personality '{}': {} must be within [0, 1], got {}",
                    self.name, field, value
                )));
            }
        }
        if self.attack_ratio <= 0.0 || self.unknown_region_strength < 0.0 {
            return Err(MatchError::config(format!(
                "personality '{}': attack_ratio must be positive and unknown_region_strength non-negative",
                self.name
            )));
        }
        Ok(())
    }
}

/// Load personality from TOML file
///
/// Loads from `data/ai_personalities/{name}.toml`
pub fn load_personality(name: &str) -> Result<AiPersonality> {
    let path = personality_path(name);
    let contents = fs::read_to_string(&path)?;

    let mut personality = AiPersonality::from_toml_str(&contents)?;
    personality.name = name.to_string();
    Ok(personality)
}

/// Get path to personality file
fn personality_path(name: &str) -> PathBuf {
    PathBuf::from("data/ai_personalities").join(format!("{}.toml", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_personality() {
        let personality = load_personality("default").expect("Should load default personality");
        assert_eq!(personality.name, "default");
        assert!(personality.aggression >= 0.0 && personality.aggression <= 1.0);
    }

    #[test]
    fn test_load_aggressive_personality() {
        let personality = load_personality("aggressive").expect("Should load aggressive personality");
        assert!(personality.aggression > 0.5, "Aggressive should have high aggression");
        assert!(personality.caution < 0.5, "Aggressive should have low caution");
    }

    #[test]
    fn test_load_cautious_personality() {
        let personality = load_personality("cautious").expect("Should load cautious personality");
        assert!(personality.caution > 0.5);
        assert!(personality.required_strength(10.0) > AiPersonality::default().required_strength(10.0));
    }

    #[test]
    fn test_missing_personality_is_io_error() {
        assert!(matches!(load_personality("no_such_commander"), Err(MatchError::Io(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let personality = AiPersonality::from_toml_str("aggression = 0.9").unwrap();
        assert_eq!(personality.aggression, 0.9);
        assert_eq!(personality.attack_ratio, AiPersonality::default().attack_ratio);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(AiPersonality::from_toml_str("caution = 1.5").is_err());
    }

    #[test]
    fn test_report_weight_decays() {
        let personality = AiPersonality::default();
        assert_eq!(personality.report_weight(0), 1.0);
        assert!(personality.report_weight(2) < personality.report_weight(1));
    }
}
