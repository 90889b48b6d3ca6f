//! Aggregate metrics and the source fields that make them up.
//!
//! The registry is an immutable table keyed by [`CategoryId`]. Every id must
//! be present and every definition must pass validation before a registry
//! can be constructed, so lookups afterwards are infallible.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ParseError;

/// Known aggregate metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryId {
    DamageDealt,
    CoinsEarned,
    EnemiesDestroyed,
}

impl CategoryId {
    pub const ALL: [Self; 3] = [Self::DamageDealt, Self::CoinsEarned, Self::EnemiesDestroyed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DamageDealt => "damage-dealt",
            Self::CoinsEarned => "coins-earned",
            Self::EnemiesDestroyed => "enemies-destroyed",
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "damagedealt" | "damage" => Ok(Self::DamageDealt),
            "coinsearned" | "coins" => Ok(Self::CoinsEarned),
            "enemiesdestroyed" | "enemies" => Ok(Self::EnemiesDestroyed),
            _ => Err(ParseError::Category(s.to_string())),
        }
    }
}

/// One field expected to contribute to a category total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceField {
    pub field_name: String,
    pub display_name: String,
    pub color: String,
}

impl SourceField {
    #[must_use]
    pub fn new(field_name: &str, display_name: &str, color: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            display_name: display_name.to_string(),
            color: color.to_string(),
        }
    }
}

/// An aggregate metric and its ordered sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub name: String,
    /// Field holding the authoritative aggregate
    pub total_field: String,
    pub sources: Vec<SourceField>,
}

/// Errors raised when a category table violates its invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryConfigError {
    #[error("category table is not valid JSON: {0}")]
    Json(String),
    #[error("category {0} is missing from the table")]
    MissingCategory(CategoryId),
    #[error("category {category} has no sources")]
    NoSources { category: CategoryId },
    #[error("category {category} has an empty total field")]
    EmptyTotalField { category: CategoryId },
    #[error("category {category} lists source '{field}' more than once")]
    DuplicateSource { category: CategoryId, field: String },
    #[error("category {category} lists its total field '{field}' as a source")]
    TotalFieldAsSource { category: CategoryId, field: String },
    #[error("source '{field}' in category {category} has invalid color '{color}'")]
    InvalidColor {
        category: CategoryId,
        field: String,
        color: String,
    },
}

fn is_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

impl CategoryDefinition {
    /// Check the definition's own invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self, category: CategoryId) -> Result<(), CategoryConfigError> {
        if self.total_field.trim().is_empty() {
            return Err(CategoryConfigError::EmptyTotalField { category });
        }
        if self.sources.is_empty() {
            return Err(CategoryConfigError::NoSources { category });
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.field_name == self.total_field {
                return Err(CategoryConfigError::TotalFieldAsSource {
                    category,
                    field: source.field_name.clone(),
                });
            }
            if !seen.insert(source.field_name.as_str()) {
                return Err(CategoryConfigError::DuplicateSource {
                    category,
                    field: source.field_name.clone(),
                });
            }
            if !is_hex_color(&source.color) {
                return Err(CategoryConfigError::InvalidColor {
                    category,
                    field: source.field_name.clone(),
                    color: source.color.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Validated, immutable lookup table of category definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryRegistry {
    categories: BTreeMap<CategoryId, CategoryDefinition>,
}

impl CategoryRegistry {
    /// Build a registry, checking that every id is present and valid.
    ///
    /// # Errors
    ///
    /// Returns the first missing category or invalid definition.
    pub fn from_definitions(
        categories: BTreeMap<CategoryId, CategoryDefinition>,
    ) -> Result<Self, CategoryConfigError> {
        for id in CategoryId::ALL {
            let definition = categories
                .get(&id)
                .ok_or(CategoryConfigError::MissingCategory(id))?;
            definition.validate(id)?;
        }
        log::debug!("category registry loaded with {} categories", categories.len());
        Ok(Self { categories })
    }

    /// Parse and validate a JSON object keyed by camelCase category id.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or any definition is invalid.
    pub fn from_json(json: &str) -> Result<Self, CategoryConfigError> {
        let categories: BTreeMap<CategoryId, CategoryDefinition> =
            serde_json::from_str(json).map_err(|err| CategoryConfigError::Json(err.to_string()))?;
        Self::from_definitions(categories)
    }

    /// The built-in table shipped with the dashboard.
    ///
    /// Validated with the same rules as a loaded table; a violation is a
    /// programming error and fails debug builds.
    #[must_use]
    pub fn builtin() -> Self {
        let categories: BTreeMap<CategoryId, CategoryDefinition> = CategoryId::ALL
            .into_iter()
            .map(|id| (id, builtin_definition(id)))
            .collect();
        for (id, definition) in &categories {
            let outcome = definition.validate(*id);
            debug_assert!(outcome.is_ok(), "built-in category table: {outcome:?}");
            if let Err(err) = outcome {
                log::error!("built-in category table is invalid: {err}");
            }
        }
        Self { categories }
    }

    #[must_use]
    pub fn get(&self, id: CategoryId) -> &CategoryDefinition {
        // Construction guarantees every id is present.
        &self.categories[&id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &CategoryDefinition)> {
        self.categories.iter().map(|(id, def)| (*id, def))
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn definition(name: &str, total_field: &str, sources: &[(&str, &str, &str)]) -> CategoryDefinition {
    CategoryDefinition {
        name: name.to_string(),
        total_field: total_field.to_string(),
        sources: sources
            .iter()
            .map(|(field, display, color)| SourceField::new(field, display, color))
            .collect(),
    }
}

fn builtin_definition(id: CategoryId) -> CategoryDefinition {
    match id {
        CategoryId::DamageDealt => definition(
            "Damage Dealt",
            "damageDealt",
            &[
                ("projectilesDamage", "Projectiles", "#3b82f6"),
                ("thornDamage", "Thorns", "#22c55e"),
                ("orbDamage", "Orbs", "#a855f7"),
                ("landMineDamage", "Land Mines", "#f97316"),
                ("innerLandMineDamage", "Inner Land Mines", "#fb923c"),
                ("chainLightningDamage", "Chain Lightning", "#eab308"),
                ("deathWaveDamage", "Death Wave", "#dc2626"),
                ("smartMissileDamage", "Smart Missiles", "#0ea5e9"),
                ("blackHoleDamage", "Black Hole", "#1e293b"),
                ("swampDamage", "Poison Swamp", "#65a30d"),
                ("electronsDamage", "Electrons", "#06b6d4"),
                ("rendArmorDamage", "Rend Armor", "#be185d"),
                ("deathRayDamage", "Death Ray", "#7c3aed"),
                ("flameBotDamage", "Flame Bot", "#ea580c"),
            ],
        ),
        CategoryId::CoinsEarned => definition(
            "Coins Earned",
            "coinsEarned",
            &[
                ("coinsFromDeathWave", "Death Wave", "#dc2626"),
                ("coinsFromGoldenTower", "Golden Tower", "#facc15"),
                ("coinsFromBlackHole", "Black Hole", "#1e293b"),
                ("coinsFromSpotlight", "Spotlight", "#fde047"),
                ("coinsFromOrb", "Orbs", "#a855f7"),
                ("coinsFromCoinUpgrade", "Coin Upgrade", "#f59e0b"),
                ("coinsFromCoinBonuses", "Coin Bonuses", "#d97706"),
                ("goldenBotCoinsEarned", "Golden Bot", "#ca8a04"),
            ],
        ),
        CategoryId::EnemiesDestroyed => definition(
            "Enemies Destroyed",
            "totalEnemies",
            &[
                ("basic", "Basic", "#9ca3af"),
                ("fast", "Fast", "#38bdf8"),
                ("tank", "Tank", "#f87171"),
                ("ranged", "Ranged", "#4ade80"),
                ("boss", "Boss", "#7f1d1d"),
                ("protector", "Protector", "#c084fc"),
                ("vampires", "Vampires", "#991b1b"),
                ("rays", "Rays", "#fbbf24"),
                ("scatters", "Scatters", "#2dd4bf"),
                ("saboteur", "Saboteurs", "#6366f1"),
                ("commander", "Commanders", "#0f766e"),
                ("overcharge", "Overcharge", "#e11d48"),
            ],
        ),
    }
}
