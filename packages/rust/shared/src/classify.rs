//! Field-completeness classifier and technical-product detection.

use crate::config::ClassifierConfig;

/// Name keywords that mark a product as technical.
pub const NAME_KEYWORDS: &[&str] = &[
    "station",
    "engine",
    "motor",
    "drive",
    "spindle",
    "chuck",
    "cutter",
    "drill",
    "blade",
    "disc",
    "wheel",
    "blade-strip",
    "pump",
    "compressor",
    "generator",
    "transformer",
    "reducer",
    "gearbox",
    "mechanism",
    "device",
    "instrument",
    "tool",
    "equipment",
    "machine",
];

/// Category keywords that mark a product as technical.
pub const CATEGORY_KEYWORDS: &[&str] = &["machines", "equipment", "tool", "mechanism"];

/// A value counts as present only if it is non-null and not blank after trimming.
pub fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Case-insensitive substring classifier for "technical" products.
#[derive(Debug, Clone)]
pub struct TechnicalClassifier {
    name_keywords: Vec<String>,
    category_keywords: Vec<String>,
}

impl Default for TechnicalClassifier {
    fn default() -> Self {
        Self::new(NAME_KEYWORDS.iter().copied(), CATEGORY_KEYWORDS.iter().copied())
    }
}

impl From<&ClassifierConfig> for TechnicalClassifier {
    fn from(config: &ClassifierConfig) -> Self {
        Self::new(
            config.name_keywords.iter().map(String::as_str),
            config.category_keywords.iter().map(String::as_str),
        )
    }
}

impl TechnicalClassifier {
    pub fn new<'a>(
        name_keywords: impl IntoIterator<Item = &'a str>,
        category_keywords: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let normalize = |k: &str| k.trim().to_lowercase();
        Self {
            name_keywords: name_keywords
                .into_iter()
                .map(normalize)
                .filter(|k| !k.is_empty())
                .collect(),
            category_keywords: category_keywords
                .into_iter()
                .map(normalize)
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// `true` if the name or category contains any configured keyword.
    pub fn is_technical(&self, name: Option<&str>, category: Option<&str>) -> bool {
        let matches = |text: Option<&str>, keywords: &[String]| {
            text.map(str::to_lowercase)
                .is_some_and(|t| keywords.iter().any(|k| t.contains(k.as_str())))
        };
        matches(name, &self.name_keywords)
            || matches(category, &self.category_keywords)
            || matches(category, &self.name_keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_is_binary() {
        assert!(!is_present(None));
        assert!(!is_present(Some("")));
        assert!(!is_present(Some("   ")));
        assert!(!is_present(Some("\t\n")));
        assert!(is_present(Some("x")));
        assert!(is_present(Some("  x  ")));
    }

    #[test]
    fn technical_by_name_keyword() {
        let c = TechnicalClassifier::default();
        assert!(c.is_technical(Some("Bench DRILL press"), None));
        assert!(c.is_technical(Some("Water pump 1kW"), Some("Garden")));
        assert!(!c.is_technical(Some("Cotton gloves"), Some("Workwear")));
    }

    #[test]
    fn technical_by_category_keyword() {
        let c = TechnicalClassifier::default();
        assert!(c.is_technical(Some("DSO-1000"), Some("Catalog >> Woodworking machines")));
        assert!(!c.is_technical(None, None));
    }

    #[test]
    fn configured_keywords_are_case_insensitive() {
        let c = TechnicalClassifier::new(["Станок"], ["оборудование"]);
        assert!(c.is_technical(Some("Токарный станок"), None));
        assert!(c.is_technical(None, Some("Деревообрабатывающее Оборудование")));
        assert!(!c.is_technical(Some("Perchatki"), None));
    }
}
