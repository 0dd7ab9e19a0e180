use crate::models::{ColorName, DishLabel, TextureLevel};
use serde::{Deserialize, Serialize};

/// What a matched color/texture rule yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RuleOutcome {
    /// Uniform pick from a named category pool.
    Category(String),
    /// Uniform pick from an inline list.
    Choice(Vec<DishLabel>),
    /// Always this label.
    Fixed(DishLabel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicRule {
    pub name: String,
    pub colors: Vec<ColorName>,
    pub textures: Vec<TextureLevel>,
    pub outcome: RuleOutcome,
}

impl HeuristicRule {
    pub fn new(
        name: &str,
        colors: &[ColorName],
        textures: &[TextureLevel],
        outcome: RuleOutcome,
    ) -> Self {
        Self {
            name: name.to_string(),
            colors: colors.to_vec(),
            textures: textures.to_vec(),
            outcome,
        }
    }

    pub fn matches(&self, color: ColorName, texture: TextureLevel) -> bool {
        self.colors.contains(&color) && self.textures.contains(&texture)
    }

    pub fn referenced_labels(&self) -> Vec<&DishLabel> {
        match &self.outcome {
            RuleOutcome::Category(_) => Vec::new(),
            RuleOutcome::Choice(labels) => labels.iter().collect(),
            RuleOutcome::Fixed(label) => vec![label],
        }
    }
}

/// Ordered (color, texture) rules; the first match wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<HeuristicRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<HeuristicRule>) -> Self {
        Self { rules }
    }

    pub fn first_match(&self, color: ColorName, texture: TextureLevel) -> Option<&HeuristicRule> {
        self.rules.iter().find(|rule| rule.matches(color, texture))
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeuristicRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub fn default_rules() -> RuleTable {
    use ColorName::*;
    use TextureLevel::*;
    let labels = |names: &[&str]| names.iter().map(|n| DishLabel::new(n)).collect::<Vec<_>>();
    RuleTable::new(vec![
        HeuristicRule::new(
            "leafy_salad",
            &[Green],
            &[Complex],
            RuleOutcome::Category("salad".into()),
        ),
        HeuristicRule::new(
            "bread",
            &[Beige],
            &[Medium],
            RuleOutcome::Category("bread".into()),
        ),
        HeuristicRule::new(
            "dark_soup",
            &[Dark],
            &[Smooth],
            RuleOutcome::Category("soup".into()),
        ),
        HeuristicRule::new(
            "pasta",
            &[Brown, Beige],
            &[Medium],
            RuleOutcome::Category("pasta".into()),
        ),
        HeuristicRule::new(
            "frozen_dessert",
            &[White],
            &[Smooth],
            RuleOutcome::Choice(labels(&["ice_cream", "frozen_yogurt"])),
        ),
        HeuristicRule::new(
            "red_meat",
            &[Red],
            &[Medium, Complex],
            RuleOutcome::Choice(labels(&["steak", "baby_back_ribs", "chicken_curry"])),
        ),
        HeuristicRule::new(
            "sushi_platter",
            &[White, Beige],
            &[Complex],
            RuleOutcome::Fixed(DishLabel::new("sushi")),
        ),
    ])
}
