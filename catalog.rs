use crate::error::{Error, Result};
use crate::models::{ColorName, DishLabel};
use crate::rules::{default_rules, RuleOutcome, RuleTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub dish: DishLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorFoods {
    pub color: ColorName,
    pub dishes: Vec<DishLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub dishes: Vec<DishLabel>,
}

/// Every lookup table the classifier consults. Built once at startup and
/// handed to the engine by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodCatalog {
    /// Model output index -> label. Also the master label enumeration.
    pub class_labels: Vec<DishLabel>,
    /// Hand-curated keywords, consulted before `keyword_overrides`.
    pub custom_keywords: Vec<KeywordEntry>,
    pub keyword_overrides: Vec<KeywordEntry>,
    pub color_foods: Vec<ColorFoods>,
    pub categories: Vec<Category>,
    pub rules: RuleTable,
    pub override_keyword: String,
    pub override_dish: DishLabel,
    pub japan_tokens: Vec<String>,
    pub japanese_category: String,
}

impl Default for FoodCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FoodCatalog {
    pub fn builtin() -> Self {
        Self {
            class_labels: labels(CLASS_LABELS),
            custom_keywords: keywords(CUSTOM_KEYWORDS),
            keyword_overrides: keywords(KEYWORD_OVERRIDES),
            color_foods: COLOR_FOODS
                .iter()
                .map(|(color, dishes)| ColorFoods {
                    color: *color,
                    dishes: labels(dishes),
                })
                .collect(),
            categories: CATEGORIES
                .iter()
                .map(|(name, dishes)| Category {
                    name: name.to_string(),
                    dishes: labels(dishes),
                })
                .collect(),
            rules: default_rules(),
            override_keyword: "sushi".into(),
            override_dish: DishLabel::new("sushi"),
            japan_tokens: JAPAN_TOKENS.iter().map(|t| t.to_string()).collect(),
            japanese_category: "japanese".into(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let catalog: FoodCatalog = serde_json::from_str(&data)?;
        Ok(catalog.normalized())
    }

    fn normalized(mut self) -> Self {
        for entry in self
            .custom_keywords
            .iter_mut()
            .chain(self.keyword_overrides.iter_mut())
        {
            entry.keyword = entry.keyword.to_lowercase();
        }
        self.override_keyword = self.override_keyword.to_lowercase();
        for token in self.japan_tokens.iter_mut() {
            *token = token.to_lowercase();
        }
        self
    }

    pub fn with_class_labels(mut self, class_labels: Vec<DishLabel>) -> Self {
        self.class_labels = class_labels;
        self
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    pub fn class_label(&self, index: usize) -> Option<&DishLabel> {
        self.class_labels.get(index)
    }

    pub fn contains(&self, label: &DishLabel) -> bool {
        self.class_labels.contains(label)
    }

    pub fn category(&self, name: &str) -> Option<&[DishLabel]> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.dishes.as_slice())
    }

    pub fn foods_for_color(&self, color: ColorName) -> Option<&[DishLabel]> {
        self.color_foods
            .iter()
            .find(|c| c.color == color)
            .map(|c| c.dishes.as_slice())
    }

    /// Checks the table invariants: the class table is non-empty and
    /// injective, every referenced label is a class label, and every
    /// category a rule or the japanese step names exists and is non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.class_labels.is_empty() {
            return Err(Error::Config("class label table is empty".into()));
        }
        let mut seen = HashSet::new();
        for (idx, label) in self.class_labels.iter().enumerate() {
            if !seen.insert(label) {
                return Err(Error::Config(format!(
                    "class label '{label}' at index {idx} is a duplicate"
                )));
            }
        }

        let mut unknown = BTreeSet::new();
        let mut check = |table: &str, label: &DishLabel| {
            if !seen.contains(label) {
                unknown.insert(format!("{label} ({table})"));
            }
        };
        for entry in &self.custom_keywords {
            check("custom keywords", &entry.dish);
        }
        for entry in &self.keyword_overrides {
            check("keyword overrides", &entry.dish);
        }
        for entry in &self.color_foods {
            entry.dishes.iter().for_each(|d| check("color foods", d));
        }
        for category in &self.categories {
            category.dishes.iter().for_each(|d| check("categories", d));
        }
        for rule in self.rules.iter() {
            rule.referenced_labels()
                .into_iter()
                .for_each(|d| check("rules", d));
        }
        check("override", &self.override_dish);
        if !unknown.is_empty() {
            let list = unknown.into_iter().collect::<Vec<_>>().join(", ");
            return Err(Error::Config(format!(
                "labels missing from class table: {list}"
            )));
        }

        if self.categories.iter().all(|c| c.dishes.is_empty()) {
            return Err(Error::Config("no non-empty category pool".into()));
        }
        let mut required: Vec<&str> = vec![self.japanese_category.as_str()];
        for rule in self.rules.iter() {
            match &rule.outcome {
                RuleOutcome::Category(name) => required.push(name),
                RuleOutcome::Choice(labels) if labels.is_empty() => {
                    return Err(Error::Config(format!(
                        "rule '{}' has an empty choice list",
                        rule.name
                    )));
                }
                _ => {}
            }
        }
        for name in required {
            match self.category(name) {
                Some(pool) if !pool.is_empty() => {}
                _ => {
                    return Err(Error::Config(format!(
                        "category '{name}' is missing or empty"
                    )))
                }
            }
        }
        Ok(())
    }
}

/// The `<model>.labels.txt` sidecar next to the model file, if present.
pub fn resolve_labels_path(model_path: &Path) -> Option<PathBuf> {
    let labels_path = model_path.with_extension("labels.txt");
    labels_path.is_file().then_some(labels_path)
}

/// Reads a labels sidecar, one label per line in class index order.
/// Returns `None` when no sidecar exists or it holds no labels.
pub fn load_class_labels(model_path: &Path) -> Result<Option<Vec<DishLabel>>> {
    let Some(labels_path) = resolve_labels_path(model_path) else {
        log::debug!("No labels sidecar for {}", model_path.display());
        return Ok(None);
    };
    let contents = std::fs::read_to_string(&labels_path)?;
    let labels: Vec<DishLabel> = contents
        .lines()
        .filter_map(normalize_label)
        .map(DishLabel::new)
        .collect();
    if labels.is_empty() {
        log::warn!(
            "Labels file is empty or invalid: {}",
            labels_path.display()
        );
        return Ok(None);
    }
    log::info!(
        "Loaded {} class labels from {}",
        labels.len(),
        labels_path.display()
    );
    Ok(Some(labels))
}

/// One sidecar line to a label: `# comment` and blank lines are skipped,
/// an `N:` or `N ` index prefix and surrounding quotes are dropped.
fn normalize_label(line: &str) -> Option<String> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let label = strip_index_prefix(line)
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'');
    (!label.is_empty()).then(|| label.to_lowercase())
}

fn strip_index_prefix(line: &str) -> &str {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return line;
    }
    let rest = &line[digits..];
    match rest.chars().next() {
        Some(':') => &rest[1..],
        Some(c) if c.is_whitespace() && !rest.trim().is_empty() => rest,
        _ => line,
    }
}

fn labels(names: &[&str]) -> Vec<DishLabel> {
    names.iter().map(|n| DishLabel::new(n)).collect()
}

fn keywords(pairs: &[(&str, &str)]) -> Vec<KeywordEntry> {
    pairs
        .iter()
        .map(|(keyword, dish)| KeywordEntry {
            keyword: keyword.to_string(),
            dish: DishLabel::new(dish),
        })
        .collect()
}

const CLASS_LABELS: &[&str] = &[
    "apple_pie",
    "baby_back_ribs",
    "beef_tartare",
    "beignets",
    "bruschetta",
    "caesar_salad",
    "cannoli",
    "caprese_salad",
    "carrot_cake",
    "chicken_curry",
    "chicken_quesadilla",
    "chicken_wings",
    "chocolate_cake",
    "creme_brulee",
    "cup_cakes",
    "deviled_eggs",
    "donuts",
    "dumplings",
    "edamame",
    "eggs_benedict",
    "french_fries",
    "fried_rice",
    "frozen_yogurt",
    "garlic_bread",
    "greek_salad",
    "grilled_cheese_sandwich",
    "hamburger",
    "ice_cream",
    "lasagne",
    "macaroni_cheese",
    "macarons",
    "miso_soup",
    "mussels",
    "nachos",
    "omelette",
    "onion_rings",
    "oysters",
    "pizza",
    "ramen",
    "spaghetti_bolognese",
    "spaghetti_carbonara",
    "steak",
    "strawberry_shortcake",
    "sushi",
];

const CUSTOM_KEYWORDS: &[(&str, &str)] = &[
    ("sushi", "sushi"),
    ("ramen", "ramen"),
    ("curry", "chicken_curry"),
    ("pizza", "pizza"),
    ("burger", "hamburger"),
    ("lasagna", "lasagne"),
    ("lasagne", "lasagne"),
    ("carbonara", "spaghetti_carbonara"),
    ("bolognese", "spaghetti_bolognese"),
    ("miso", "miso_soup"),
    ("macaron", "macarons"),
    ("cupcake", "cup_cakes"),
];

// Matched by substring in this order; earlier entries shadow later ones.
const KEYWORD_OVERRIDES: &[(&str, &str)] = &[
    ("apple_pie", "apple_pie"),
    ("apple", "apple_pie"),
    ("ribs", "baby_back_ribs"),
    ("tartare", "beef_tartare"),
    ("beignet", "beignets"),
    ("bruschetta", "bruschetta"),
    ("caesar", "caesar_salad"),
    ("cannoli", "cannoli"),
    ("caprese", "caprese_salad"),
    ("carrot_cake", "carrot_cake"),
    ("quesadilla", "chicken_quesadilla"),
    ("wings", "chicken_wings"),
    ("chicken", "chicken_wings"),
    ("chocolate", "chocolate_cake"),
    ("brulee", "creme_brulee"),
    ("cup_cake", "cup_cakes"),
    ("deviled", "deviled_eggs"),
    ("donut", "donuts"),
    ("doughnut", "donuts"),
    ("dumpling", "dumplings"),
    ("gyoza", "dumplings"),
    ("edamame", "edamame"),
    ("benedict", "eggs_benedict"),
    ("fries", "french_fries"),
    ("fried_rice", "fried_rice"),
    ("frozen_yogurt", "frozen_yogurt"),
    ("yogurt", "frozen_yogurt"),
    ("garlic_bread", "garlic_bread"),
    ("bread", "garlic_bread"),
    ("greek", "greek_salad"),
    ("salad", "greek_salad"),
    ("grilled_cheese", "grilled_cheese_sandwich"),
    ("sandwich", "grilled_cheese_sandwich"),
    ("hamburger", "hamburger"),
    ("ice_cream", "ice_cream"),
    ("gelato", "ice_cream"),
    ("macaroni", "macaroni_cheese"),
    ("mussel", "mussels"),
    ("nacho", "nachos"),
    ("omelet", "omelette"),
    ("onion_ring", "onion_rings"),
    ("oyster", "oysters"),
    ("spaghetti", "spaghetti_bolognese"),
    ("pasta", "spaghetti_bolognese"),
    ("steak", "steak"),
    ("shortcake", "strawberry_shortcake"),
    ("strawberry", "strawberry_shortcake"),
    ("cake", "chocolate_cake"),
    ("sashimi", "sushi"),
    ("maki", "sushi"),
    ("nigiri", "sushi"),
    ("temaki", "sushi"),
    ("uramaki", "sushi"),
    ("chirashi", "sushi"),
    ("california", "sushi"),
    ("dragon", "sushi"),
    ("philadelphia", "sushi"),
    ("salmon", "sushi"),
    ("tuna", "sushi"),
    ("unagi", "sushi"),
    ("wasabi", "sushi"),
    ("noodles_cn", "ramen"),
    ("udon", "ramen"),
    ("soba", "ramen"),
    ("rice", "fried_rice"),
    ("flatbread", "pizza"),
];

const COLOR_FOODS: &[(ColorName, &[&str])] = &[
    (
        ColorName::Red,
        &["chicken_curry", "pizza", "steak", "strawberry_shortcake"],
    ),
    (
        ColorName::Green,
        &["caesar_salad", "caprese_salad", "greek_salad", "edamame"],
    ),
    (
        ColorName::Yellow,
        &["apple_pie", "carrot_cake", "frozen_yogurt", "ice_cream", "omelette"],
    ),
    (ColorName::Orange, &["carrot_cake", "chicken_curry", "nachos"]),
    (
        ColorName::Brown,
        &[
            "baby_back_ribs",
            "lasagne",
            "spaghetti_bolognese",
            "spaghetti_carbonara",
            "chocolate_cake",
            "hamburger",
        ],
    ),
    (
        ColorName::White,
        &["cup_cakes", "macarons", "omelette", "fried_rice"],
    ),
    (
        ColorName::Beige,
        &["french_fries", "onion_rings", "garlic_bread", "dumplings", "fried_rice"],
    ),
    (
        ColorName::Dark,
        &["chocolate_cake", "mussels", "beef_tartare"],
    ),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "japanese",
        &["sushi", "ramen", "miso_soup", "edamame", "dumplings"],
    ),
    ("salad", &["caesar_salad", "greek_salad", "caprese_salad"]),
    (
        "bread",
        &["garlic_bread", "bruschetta", "grilled_cheese_sandwich"],
    ),
    ("soup", &["miso_soup", "ramen"]),
    (
        "pasta",
        &[
            "lasagne",
            "spaghetti_bolognese",
            "spaghetti_carbonara",
            "macaroni_cheese",
        ],
    ),
    (
        "dessert",
        &[
            "apple_pie",
            "carrot_cake",
            "chocolate_cake",
            "cup_cakes",
            "creme_brulee",
            "ice_cream",
            "frozen_yogurt",
            "macarons",
            "strawberry_shortcake",
            "donuts",
            "cannoli",
        ],
    ),
    (
        "meat",
        &["steak", "baby_back_ribs", "chicken_wings", "hamburger"],
    ),
    (
        "asian",
        &["fried_rice", "dumplings", "edamame", "chicken_curry"],
    ),
    (
        "italian",
        &["pizza", "lasagne", "spaghetti_bolognese", "bruschetta"],
    ),
    (
        "american",
        &[
            "hamburger",
            "french_fries",
            "onion_rings",
            "nachos",
            "chicken_quesadilla",
        ],
    ),
    (
        "breakfast",
        &["omelette", "eggs_benedict", "deviled_eggs", "beignets"],
    ),
    ("seafood", &["mussels", "oysters", "sushi"]),
];

const JAPAN_TOKENS: &[&str] = &["japan", "japanese", "nihon", "nippon", "tokyo"];
