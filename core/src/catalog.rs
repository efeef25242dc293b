use anyhow::Result;

use crate::error::PlanError;
use crate::models::{
    CardDraft, CategoryFilter, FoodCard, MealType, NewFoodCard, StaleCard,
    normalize_ingredient_name,
};
use crate::nutrition::{NutritionTable, compute_calories};

/// Validate a draft and compute its calories.
///
/// Incomplete ingredient lines (no name or no amount) are dropped silently;
/// the draft is only rejected when none remain. Units are refreshed from the
/// nutrition table for every line whose ingredient is known.
pub fn prepare_card(draft: &CardDraft, table: &NutritionTable) -> Result<NewFoodCard> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(PlanError::Validation("Food card name is required".to_string()).into());
    }
    if draft.categories.is_empty() {
        return Err(PlanError::Validation("At least one category is required".to_string()).into());
    }

    let ingredients: Vec<_> = draft
        .ingredients
        .iter()
        .filter(|line| line.is_complete())
        .map(|line| {
            let mut line = line.clone();
            line.name = line.name.trim().to_string();
            if let Some(known) = table.get(&line.name) {
                line.unit.clone_from(&known.unit);
            }
            line
        })
        .collect();

    if ingredients.is_empty() {
        return Err(PlanError::Validation(
            "At least one ingredient with a name and amount is required".to_string(),
        )
        .into());
    }

    let calories = compute_calories(&ingredients, table);
    if !calories.is_finite() {
        return Err(PlanError::InvalidInput(
            "Card calories are out of range; check ingredient amounts".to_string(),
        )
        .into());
    }
    Ok(NewFoodCard {
        name: name.to_string(),
        categories: draft.categories.clone(),
        ingredients,
        calories,
    })
}

/// In-memory view of the stored food cards, newest first.
#[derive(Debug, Clone, Default)]
pub struct FoodCardCatalog {
    cards: Vec<FoodCard>,
}

impl FoodCardCatalog {
    pub fn from_cards(mut cards: Vec<FoodCard>) -> Self {
        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { cards }
    }

    pub fn get(&self, id: &str) -> Option<&FoodCard> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&FoodCard> {
        self.get(id)
            .ok_or_else(|| PlanError::NotFound(format!("Food card {id}")).into())
    }

    pub fn insert(&mut self, card: FoodCard) {
        self.cards.insert(0, card);
    }

    /// Replace the card with the same id. Returns false if it was not present.
    pub fn replace(&mut self, card: FoodCard) -> bool {
        match self.cards.iter_mut().find(|c| c.id == card.id) {
            Some(slot) => {
                *slot = card;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<FoodCard> {
        let idx = self.cards.iter().position(|c| c.id == id)?;
        Some(self.cards.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FoodCard> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn filter(&self, category: CategoryFilter, query: &str) -> Vec<&FoodCard> {
        self.cards
            .iter()
            .filter(|c| category.matches(&c.categories) && c.matches_query(query))
            .collect()
    }

    pub fn category_count(&self, category: CategoryFilter) -> usize {
        self.cards
            .iter()
            .filter(|c| category.matches(&c.categories))
            .count()
    }

    /// Cards that may be placed into a `meal_type` slot.
    pub fn for_slot(&self, meal_type: MealType, query: &str) -> Vec<&FoodCard> {
        self.filter(CategoryFilter::Only(meal_type), query)
    }

    /// Number of cards with at least one line naming this ingredient.
    pub fn references_to(&self, ingredient: &str) -> usize {
        let key = normalize_ingredient_name(ingredient);
        self.cards
            .iter()
            .filter(|c| {
                c.ingredients
                    .iter()
                    .any(|line| normalize_ingredient_name(&line.name) == key)
            })
            .count()
    }

    pub fn stale(&self, table: &NutritionTable) -> Vec<StaleCard> {
        self.cards
            .iter()
            .filter_map(|c| {
                let current = compute_calories(&c.ingredients, table);
                ((current - c.calories).abs() > 1e-9).then(|| StaleCard {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    cached_calories: c.calories,
                    current_calories: current,
                })
            })
            .collect()
    }
}
