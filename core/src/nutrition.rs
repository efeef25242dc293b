use std::collections::BTreeMap;

use anyhow::Result;

use crate::error::PlanError;
use crate::models::{Ingredient, IngredientLine, normalize_ingredient_name};

/// Calories-per-unit lookup keyed by lower-cased ingredient name.
///
/// Iteration is alphabetical by key.
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    entries: BTreeMap<String, Ingredient>,
}

impl NutritionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ingredients(ingredients: impl IntoIterator<Item = Ingredient>) -> Self {
        let mut table = Self::new();
        for ingredient in ingredients {
            table.insert(ingredient);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&Ingredient> {
        self.entries.get(&normalize_ingredient_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Validate a new entry against the table without inserting it.
    pub fn check_new(&self, name: &str, calories_per_unit: f64, unit: &str) -> Result<Ingredient> {
        let key = normalize_ingredient_name(name);
        if key.is_empty() || unit.trim().is_empty() {
            return Err(
                PlanError::InvalidInput("Ingredient name and unit are required".to_string()).into(),
            );
        }
        if !calories_per_unit.is_finite() {
            return Err(PlanError::InvalidInput(format!(
                "Calories for '{key}' must be a finite number"
            ))
            .into());
        }
        if self.entries.contains_key(&key) {
            return Err(PlanError::DuplicateKey(key).into());
        }
        Ok(Ingredient {
            name: key,
            calories_per_unit,
            unit: unit.trim().to_string(),
        })
    }

    pub fn add(&mut self, name: &str, calories_per_unit: f64, unit: &str) -> Result<Ingredient> {
        let ingredient = self.check_new(name, calories_per_unit, unit)?;
        self.insert(ingredient.clone());
        Ok(ingredient)
    }

    /// Insert or replace an entry that has already been validated (e.g. loaded from storage).
    pub fn insert(&mut self, mut ingredient: Ingredient) {
        ingredient.name = normalize_ingredient_name(&ingredient.name);
        self.entries.insert(ingredient.name.clone(), ingredient);
    }

    pub fn remove(&mut self, name: &str) -> Option<Ingredient> {
        self.entries.remove(&normalize_ingredient_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ingredient> {
        self.entries.values()
    }

    pub fn search(&self, query: &str) -> Vec<&Ingredient> {
        let query = normalize_ingredient_name(query);
        self.entries
            .values()
            .filter(|i| i.name.contains(&query))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Calories contributed by a single line; zero when the ingredient is unknown
/// or the amount is missing.
pub fn line_calories(line: &IngredientLine, table: &NutritionTable) -> f64 {
    match (table.get(&line.name), line.amount) {
        (Some(ingredient), Some(amount)) if amount.is_finite() => {
            ingredient.calories_per_unit * amount
        }
        _ => 0.0,
    }
}

pub fn compute_calories(lines: &[IngredientLine], table: &NutritionTable) -> f64 {
    lines.iter().map(|line| line_calories(line, table)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> NutritionTable {
        let mut table = NutritionTable::new();
        table.add("Rice", 1.3, "100g").unwrap();
        table.add("egg", 78.0, "pcs").unwrap();
        table
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = sample_table();
        assert_eq!(table.get("RICE").unwrap().name, "rice");
        assert_eq!(table.get(" rice ").unwrap().unit, "100g");
        assert!(table.get("bread").is_none());
    }

    #[test]
    fn test_add_duplicate_is_rejected() {
        let mut table = sample_table();
        let err = table.add("rIcE", 2.0, "100g").unwrap_err();
        assert_eq!(
            err.downcast_ref::<PlanError>(),
            Some(&PlanError::DuplicateKey("rice".to_string()))
        );
        assert!((table.get("rice").unwrap().calories_per_unit - 1.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_add_rejects_non_finite_calories() {
        let mut table = NutritionTable::new();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = table.add("oil", bad, "tbsp").unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PlanError>(),
                Some(PlanError::InvalidInput(_))
            ));
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_add_requires_name_and_unit() {
        let mut table = NutritionTable::new();
        assert!(table.add("  ", 10.0, "g").is_err());
        assert!(table.add("oil", 10.0, "").is_err());
    }

    #[test]
    fn test_iteration_is_alphabetical() {
        let mut table = NutritionTable::new();
        table.add("tomato", 0.2, "g").unwrap();
        table.add("Apple", 52.0, "pcs").unwrap();
        table.add("milk", 0.6, "ml").unwrap();
        let names: Vec<&str> = table.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "milk", "tomato"]);
    }

    #[test]
    fn test_remove_and_search() {
        let mut table = sample_table();
        table.add("brown rice", 1.1, "100g").unwrap();
        let found: Vec<&str> = table.search("RICE").iter().map(|i| i.name.as_str()).collect();
        assert_eq!(found, vec!["brown rice", "rice"]);

        assert!(table.remove("Rice").is_some());
        assert!(table.remove("rice").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unknown_ingredient_contributes_zero() {
        let mut table = NutritionTable::new();
        table.add("rice", 1.3, "100g").unwrap();
        let lines = vec![
            IngredientLine::new("rice", 2.0, "100g"),
            IngredientLine::new("unknown", 5.0, ""),
        ];
        let total = compute_calories(&lines, &table);
        assert!((total - 2.6).abs() < 1e-9);
    }

    #[test]
    fn test_missing_amount_contributes_zero() {
        let table = sample_table();
        let lines = vec![
            IngredientLine {
                name: "egg".to_string(),
                amount: None,
                unit: "pcs".to_string(),
            },
            IngredientLine::new("Egg", 2.0, "pcs"),
        ];
        assert!((compute_calories(&lines, &table) - 156.0).abs() < 1e-9);
        assert!(line_calories(&lines[0], &table).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_lines_total_zero() {
        let table = sample_table();
        assert!(compute_calories(&[], &table).abs() < f64::EPSILON);
    }
}
