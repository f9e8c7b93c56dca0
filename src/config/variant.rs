//! Generation modes and model variants
//!
//! Both are parsed from user input with exact matching. Variant strings are
//! canonicalized through a fixed alias table rather than substring guessing,
//! so equivalent spellings always land on the same variant.

use std::fmt;
use std::str::FromStr;

/// Generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GenerationMode {
    /// Text + audio
    #[default]
    Ta,
    /// Text + image + audio
    Tia,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Ta => "TA",
            GenerationMode::Tia => "TIA",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TA" => Ok(GenerationMode::Ta),
            "TIA" => Ok(GenerationMode::Tia),
            _ => Err(format!(
                "Unknown generation mode: {}. Valid modes: TA, TIA",
                s
            )),
        }
    }
}

/// HuMo model capacity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelVariant {
    /// 1.3B parameters
    #[default]
    Small,
    /// 14B parameters
    Large,
}

/// Normalized spellings accepted for each variant.
///
/// `1.7` and `17` are the labels older front ends used for the same two
/// tiers.
const VARIANT_ALIASES: &[(&str, ModelVariant)] = &[
    ("1.3", ModelVariant::Small),
    ("13", ModelVariant::Small),
    ("1.7", ModelVariant::Small),
    ("14", ModelVariant::Large),
    ("17", ModelVariant::Large),
];

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Small => "1.3B",
            ModelVariant::Large => "14B",
        }
    }

    /// Canonicalize a free-form variant string.
    ///
    /// Returns `None` for anything outside the alias table.
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let token = normalize_variant_token(raw);
        VARIANT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, variant)| *variant)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelVariant::canonicalize(s).ok_or_else(|| {
            format!(
                "Unknown model variant: {}. Valid variants: 1.3B, 14B",
                s
            )
        })
    }
}

/// Lower-case, drop whitespace, read `_`/`-` between digits as a decimal
/// point, drop other separators and a trailing `b`.
fn normalize_variant_token(raw: &str) -> String {
    let chars: Vec<char> = raw
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut token = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            let after_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let before_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
            if after_digit && before_digit {
                token.push('.');
            }
            continue;
        }
        token.push(c);
    }

    match token.strip_suffix('b') {
        Some(stripped) => stripped.to_string(),
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("TA".parse::<GenerationMode>().unwrap(), GenerationMode::Ta);
        assert_eq!("ta".parse::<GenerationMode>().unwrap(), GenerationMode::Ta);
        assert_eq!(
            "Tia".parse::<GenerationMode>().unwrap(),
            GenerationMode::Tia
        );
        assert!("T2V".parse::<GenerationMode>().is_err());
        assert!("".parse::<GenerationMode>().is_err());
    }

    #[test]
    fn test_variant_mapping_is_pinned() {
        let small = ["1.3B", "1.3b", "1.7B", "1_7b", "1-7B", "1.7", " 1.3 b "];
        for raw in small {
            assert_eq!(
                ModelVariant::canonicalize(raw),
                Some(ModelVariant::Small),
                "{raw}"
            );
        }

        let large = ["14B", "14b", "17B", "17b", "14", "17"];
        for raw in large {
            assert_eq!(
                ModelVariant::canonicalize(raw),
                Some(ModelVariant::Large),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_unknown_variants_are_rejected() {
        for raw in ["abc", "7B", "1.37B", "114B", "", "b", "1.3B-large"] {
            assert_eq!(ModelVariant::canonicalize(raw), None, "{raw}");
            assert!(raw.parse::<ModelVariant>().is_err());
        }
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for variant in [ModelVariant::Small, ModelVariant::Large] {
            assert_eq!(ModelVariant::canonicalize(variant.as_str()), Some(variant));
        }
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_variant_token("1_7B"), "1.7");
        assert_eq!(normalize_variant_token("17B"), "17");
        assert_eq!(normalize_variant_token("Wan-14B"), "wan14");
    }
}
