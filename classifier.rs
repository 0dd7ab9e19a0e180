use crate::analysis::{analyze_image, ImageSignals};
use crate::catalog::FoodCatalog;
use crate::error::{Error, Result};
use crate::hints;
use crate::models::{ColorName, DishLabel, Prediction, PredictionSource};
use crate::onnx::model_input;
use crate::rules::RuleOutcome;
use image::DynamicImage;
use ndarray::Array4;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;

/// A trained classifier: one score per class, in class index order.
pub trait DishModel {
    fn predict(&mut self, input: Array4<f32>) -> Result<Vec<f32>>;
}

/// Decision engine. Filename evidence is preferred over image statistics,
/// and every path ends in a label drawn from the catalog.
pub struct ClassifierEngine<'a> {
    catalog: &'a FoodCatalog,
    model: Option<Box<dyn DishModel>>,
    model_input_size: u32,
    analysis_size: u32,
}

impl<'a> ClassifierEngine<'a> {
    pub fn new(catalog: &'a FoodCatalog, analysis_size: u32) -> Self {
        Self {
            catalog,
            model: None,
            model_input_size: 224,
            analysis_size,
        }
    }

    pub fn with_model(mut self, model: Box<dyn DishModel>, input_size: u32) -> Self {
        self.model = Some(model);
        self.model_input_size = input_size;
        self
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn classify<R: Rng + ?Sized>(
        &mut self,
        image_path: &Path,
        original_filename: Option<&str>,
        rng: &mut R,
    ) -> Prediction {
        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();
        let original = original_filename.map(str::to_lowercase);

        if let Some(prediction) = self.from_filenames(&file_name, original.as_deref()) {
            return prediction;
        }

        let image = match image::open(image_path) {
            Ok(img) => Some(img),
            Err(err) => {
                log::warn!(
                    "Could not decode {} for analysis: {}; using default signals",
                    image_path.display(),
                    err
                );
                None
            }
        };

        if let Some(img) = image.as_ref() {
            if let Some(prediction) = self.from_model(img) {
                return prediction;
            }
        }

        let signals = image
            .as_ref()
            .map(|img| analyze_image(img, self.analysis_size))
            .unwrap_or_default();
        log::info!(
            "Image signals for {}: color={} texture={}",
            image_path.display(),
            signals.color,
            signals.texture
        );

        let mut names = vec![file_name.as_str()];
        names.extend(original.as_deref());
        self.from_signals(&names, signals, rng)
    }

    /// Steps driven purely by the current and original filenames.
    fn from_filenames(&self, file_name: &str, original: Option<&str>) -> Option<Prediction> {
        let catalog = self.catalog;
        let override_tokens = std::slice::from_ref(&catalog.override_keyword);
        if hints::contains_any(file_name, override_tokens) {
            log::info!("Detected '{}' in filename: {}", catalog.override_keyword, file_name);
            return Some(Prediction::new(
                catalog.override_dish.clone(),
                PredictionSource::SushiOverride,
            ));
        }
        if let Some(original) = original {
            if hints::contains_any(original, override_tokens) {
                log::info!(
                    "Detected '{}' in original filename: {}",
                    catalog.override_keyword,
                    original
                );
                return Some(Prediction::new(
                    catalog.override_dish.clone(),
                    PredictionSource::SushiOverride,
                ));
            }
            if let Some(label) = hints::hint(catalog, original) {
                log::info!("Original filename '{original}' hints {label}");
                return Some(Prediction::new(label, PredictionSource::OriginalFilenameHint));
            }
        }
        if let Some(label) = hints::hint(catalog, file_name) {
            log::info!("Filename '{file_name}' hints {label}");
            return Some(Prediction::new(label, PredictionSource::FilenameHint));
        }
        None
    }

    fn from_model(&mut self, img: &DynamicImage) -> Option<Prediction> {
        let model = self.model.as_mut()?;
        let result = model_input(img, self.model_input_size)
            .and_then(|input| model.predict(input))
            .and_then(|scores| label_for_scores(self.catalog, &scores));
        match result {
            Ok(label) => {
                log::info!("Model predicted {label}");
                Some(Prediction::new(label, PredictionSource::Model))
            }
            Err(err) => {
                log::warn!("Model prediction rejected: {err}; using heuristics");
                None
            }
        }
    }

    fn from_signals<R: Rng + ?Sized>(
        &self,
        names: &[&str],
        signals: ImageSignals,
        rng: &mut R,
    ) -> Prediction {
        let catalog = self.catalog;
        if names
            .iter()
            .any(|name| hints::contains_any(name, &catalog.japan_tokens))
        {
            if let Some(label) = pick_category(catalog, &catalog.japanese_category, rng) {
                log::info!("Japanese token in filename; picked {label}");
                return Prediction::new(label, PredictionSource::JapaneseToken);
            }
        }

        if let Some(rule) = catalog.rules.first_match(signals.color, signals.texture) {
            let picked = match &rule.outcome {
                RuleOutcome::Category(name) => pick_category(catalog, name, rng),
                RuleOutcome::Choice(labels) => labels.choose(rng).cloned(),
                RuleOutcome::Fixed(label) => Some(label.clone()),
            };
            if let Some(label) = picked {
                log::info!("Rule '{}' matched; picked {label}", rule.name);
                return Prediction::new(label, PredictionSource::ColorTextureRule);
            }
            log::warn!("Rule '{}' matched but yielded no label", rule.name);
        }

        if let Some(label) = pick_for_color(catalog, signals.color, rng) {
            log::info!("Color {} pool; picked {label}", signals.color);
            return Prediction::new(label, PredictionSource::ColorPool);
        }

        let label = pick_any(catalog, rng);
        log::info!("No signal matched; random category pick {label}");
        Prediction::new(label, PredictionSource::CategoryFallback)
    }
}

/// Maps a score vector to a label by argmax. The vector must be exactly
/// as wide as the class table.
pub fn label_for_scores(catalog: &FoodCatalog, scores: &[f32]) -> Result<DishLabel> {
    if scores.len() != catalog.num_classes() {
        return Err(Error::Model(format!(
            "model output width {} does not match {} classes",
            scores.len(),
            catalog.num_classes()
        )));
    }
    // Ties keep the lowest index.
    let (index, _) = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
            Some((_, top)) if s <= top => best,
            _ => Some((i, s)),
        })
        .ok_or_else(|| Error::Model("model output has no finite scores".into()))?;
    catalog
        .class_label(index)
        .cloned()
        .ok_or_else(|| Error::Model(format!("no class label for index {index}")))
}

fn pick_category<R: Rng + ?Sized>(
    catalog: &FoodCatalog,
    name: &str,
    rng: &mut R,
) -> Option<DishLabel> {
    catalog.category(name)?.choose(rng).cloned()
}

fn pick_for_color<R: Rng + ?Sized>(
    catalog: &FoodCatalog,
    color: ColorName,
    rng: &mut R,
) -> Option<DishLabel> {
    catalog.foods_for_color(color)?.choose(rng).cloned()
}

/// Random category, then a random dish from it. Categories with empty
/// pools are skipped so the pick always succeeds for a validated catalog.
fn pick_any<R: Rng + ?Sized>(catalog: &FoodCatalog, rng: &mut R) -> DishLabel {
    let pools: Vec<&[DishLabel]> = catalog
        .categories
        .iter()
        .map(|c| c.dishes.as_slice())
        .filter(|d| !d.is_empty())
        .collect();
    pools
        .choose(rng)
        .and_then(|pool| pool.choose(rng))
        .or_else(|| catalog.class_labels.choose(rng))
        .cloned()
        .unwrap_or_else(|| catalog.override_dish.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use image::{ImageBuffer, Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;

    struct StubModel {
        scores: Vec<f32>,
        calls: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl DishModel for StubModel {
        fn predict(&mut self, input: Array4<f32>) -> Result<Vec<f32>> {
            assert_eq!(input.shape(), &[1, 224, 224, 3]);
            self.calls.set(self.calls.get() + 1);
            Ok(self.scores.clone())
        }
    }

    fn save(dir: &tempfile::TempDir, name: &str, img: RgbImage) -> PathBuf {
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    fn solid(r: u8, g: u8, b: u8) -> RgbImage {
        ImageBuffer::from_pixel(100, 100, Rgb([r, g, b]))
    }

    fn checker(a: [u8; 3], b: [u8; 3]) -> RgbImage {
        ImageBuffer::from_fn(100, 100, |x, y| {
            if ((x / 4) + (y / 4)) % 2 == 0 {
                Rgb(a)
            } else {
                Rgb(b)
            }
        })
    }

    fn in_pool(catalog: &FoodCatalog, category: &str, label: &DishLabel) -> bool {
        catalog.category(category).unwrap().contains(label)
    }

    #[test]
    fn sushi_in_filename_overrides_everything() {
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let prediction = engine.classify(
            Path::new("uploads/my_SUSHI_photo.png"),
            Some("pizza.jpg"),
            &mut rng,
        );
        assert_eq!(prediction.label.as_str(), "sushi");
        assert_eq!(prediction.source, PredictionSource::SushiOverride);
    }

    #[test]
    fn sushi_in_original_filename_overrides() {
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let prediction =
            engine.classify(Path::new("uploads/image.jpg"), Some("Sushi-Night.jpg"), &mut rng);
        assert_eq!(prediction.label.as_str(), "sushi");
        assert_eq!(prediction.source, PredictionSource::SushiOverride);
    }

    #[test]
    fn original_filename_hint_beats_current_filename_hint() {
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let prediction =
            engine.classify(Path::new("uploads/pizza.jpg"), Some("ramen_bowl.jpg"), &mut rng);
        assert_eq!(prediction.label.as_str(), "ramen");
        assert_eq!(prediction.source, PredictionSource::OriginalFilenameHint);
    }

    #[test]
    fn chicken_curry_filename_hint() {
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(1);
        let prediction =
            engine.classify(Path::new("chicken_curry_dinner.jpg"), None, &mut rng);
        assert_eq!(prediction.label.as_str(), "chicken_curry");
        assert_eq!(prediction.source, PredictionSource::FilenameHint);
    }

    #[test]
    fn japanese_token_picks_from_japanese_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "tokyo_trip.png", solid(40, 40, 200));
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(3);
        let prediction = engine.classify(&path, None, &mut rng);
        assert_eq!(prediction.source, PredictionSource::JapaneseToken);
        assert!(in_pool(&catalog, "japanese", &prediction.label));
    }

    #[test]
    fn green_complex_image_is_salad() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0001.png", checker([0, 255, 0], [80, 120, 80]));
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(5);
        let prediction = engine.classify(&path, None, &mut rng);
        assert_eq!(prediction.source, PredictionSource::ColorTextureRule);
        assert!(in_pool(&catalog, "salad", &prediction.label));
    }

    #[test]
    fn beige_complex_image_is_sushi() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0002.png", checker([220, 200, 180], [160, 140, 120]));
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(5);
        let prediction = engine.classify(&path, None, &mut rng);
        assert_eq!(prediction.label.as_str(), "sushi");
        assert_eq!(prediction.source, PredictionSource::ColorTextureRule);
    }

    #[test]
    fn white_smooth_image_is_frozen_dessert() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0003.png", solid(245, 245, 245));
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(9);
        let label = engine.classify(&path, None, &mut rng).label;
        assert!(["ice_cream", "frozen_yogurt"].contains(&label.as_str()));
    }

    #[test]
    fn red_smooth_image_uses_color_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0004.png", solid(230, 30, 30));
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(11);
        let prediction = engine.classify(&path, None, &mut rng);
        assert_eq!(prediction.source, PredictionSource::ColorPool);
        assert!(catalog
            .foods_for_color(ColorName::Red)
            .unwrap()
            .contains(&prediction.label));
    }

    #[test]
    fn blue_image_falls_back_to_random_category() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0005.png", solid(30, 30, 220));
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(13);
        let prediction = engine.classify(&path, None, &mut rng);
        assert_eq!(prediction.source, PredictionSource::CategoryFallback);
        assert!(catalog.contains(&prediction.label));
    }

    #[test]
    fn undecodable_image_uses_default_signals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0006.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0x00, 0x13, 0x37]).unwrap();
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(17);
        let prediction = engine.classify(&path, None, &mut rng);
        // beige + medium hits the bread rule.
        assert_eq!(prediction.source, PredictionSource::ColorTextureRule);
        assert!(in_pool(&catalog, "bread", &prediction.label));
    }

    #[test]
    fn same_seed_gives_same_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0007.png", solid(30, 30, 220));
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        for seed in 0..20 {
            let first = engine.classify(&path, None, &mut StdRng::seed_from_u64(seed));
            let second = engine.classify(&path, None, &mut StdRng::seed_from_u64(seed));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn injected_catalog_changes_fallback_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0008.png", solid(30, 30, 220));
        let mut catalog = FoodCatalog::builtin();
        catalog.categories = vec![
            Category {
                name: "japanese".into(),
                dishes: vec![DishLabel::new("sushi")],
            },
            Category {
                name: "only".into(),
                dishes: vec![DishLabel::new("oysters")],
            },
        ];
        catalog.rules = crate::rules::RuleTable::default();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(21);
        let labels: Vec<String> = (0..10)
            .map(|_| engine.classify(&path, None, &mut rng).label.to_string())
            .collect();
        assert!(labels.iter().all(|l| l == "sushi" || l == "oysters"));
    }

    #[test]
    fn model_prediction_replaces_image_heuristics() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0009.png", solid(30, 30, 220));
        let catalog = FoodCatalog::builtin();
        let mut scores = vec![0.0f32; catalog.num_classes()];
        scores[37] = 0.9;
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let model = StubModel {
            scores,
            calls: calls.clone(),
        };
        let mut engine = ClassifierEngine::new(&catalog, 100).with_model(Box::new(model), 224);
        let mut rng = StdRng::seed_from_u64(1);
        let prediction = engine.classify(&path, None, &mut rng);
        assert_eq!(prediction.label.as_str(), "pizza");
        assert_eq!(prediction.source, PredictionSource::Model);

        let hinted = engine.classify(Path::new("ramen.png"), None, &mut rng);
        assert_eq!(hinted.source, PredictionSource::FilenameHint);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn mismatched_model_width_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&dir, "IMG_0010.png", solid(230, 30, 30));
        let catalog = FoodCatalog::builtin();
        let model = StubModel {
            scores: vec![1.0; 43],
            calls: Default::default(),
        };
        let mut engine = ClassifierEngine::new(&catalog, 100).with_model(Box::new(model), 224);
        let mut rng = StdRng::seed_from_u64(1);
        let prediction = engine.classify(&path, None, &mut rng);
        assert_eq!(prediction.source, PredictionSource::ColorPool);
    }

    #[test]
    fn argmax_maps_through_class_table() {
        let catalog = FoodCatalog::builtin();
        let mut scores = vec![0.01f32; 44];
        scores[9] = 0.7;
        scores[10] = f32::NAN;
        assert_eq!(
            label_for_scores(&catalog, &scores).unwrap().as_str(),
            "chicken_curry"
        );
        assert!(label_for_scores(&catalog, &scores[..40]).is_err());
    }

    #[test]
    fn tied_scores_pick_lowest_index() {
        let catalog = FoodCatalog::builtin();
        let flat = vec![0.5f32; 44];
        assert_eq!(label_for_scores(&catalog, &flat).unwrap().as_str(), "apple_pie");
        let mut tied = vec![0.1f32; 44];
        tied[37] = 0.8;
        tied[43] = 0.8;
        assert_eq!(label_for_scores(&catalog, &tied).unwrap().as_str(), "pizza");
        assert!(label_for_scores(&catalog, &[f32::NAN; 44]).is_err());
    }

    #[test]
    fn fuzzed_inputs_always_yield_a_known_label() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FoodCatalog::builtin();
        let mut engine = ClassifierEngine::new(&catalog, 100);
        let mut rng = StdRng::seed_from_u64(2024);
        let alphabet: Vec<char> = "abcdefghijklmnopqrstuvwxyz0123456789_-".chars().collect();
        for i in 0..1000 {
            let len = rng.gen_range(1..24);
            let stem: String = (0..len)
                .map(|_| *alphabet.choose(&mut rng).unwrap())
                .collect();
            let path = dir.path().join(format!("{i}_{stem}.jpg"));
            let mut bytes = vec![0xFF, 0xD8, 0xFF];
            let body_len = rng.gen_range(0..256);
            bytes.extend((0..body_len).map(|_| rng.gen::<u8>()));
            std::fs::write(&path, &bytes).unwrap();
            let original = if rng.gen_bool(0.3) {
                Some(format!("{stem}.png"))
            } else {
                None
            };
            let prediction = engine.classify(&path, original.as_deref(), &mut rng);
            assert!(
                catalog.contains(&prediction.label),
                "unknown label {} for {}",
                prediction.label,
                path.display()
            );
            std::fs::remove_file(&path).unwrap();
        }
    }
}
