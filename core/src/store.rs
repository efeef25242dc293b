use std::collections::BTreeSet;

use anyhow::Result;

use crate::models::{FoodCard, Ingredient, MealType, NewFoodCard, ScheduleEntry, ScheduleRow};
use crate::schedule::DateRange;

/// Persistence collaborator behind [`crate::service::PlanService`].
///
/// Implemented by [`crate::db::Database`] for SQLite; tests substitute their
/// own. Every method is a single request/response call, and the multi-row
/// operations (`update_food_card`, `delete_food_card`, `move_schedule_entry`)
/// must be all-or-nothing.
pub trait PlanStore {
    // --- Ingredients ---

    /// All ingredients ordered by name.
    fn list_ingredients(&self) -> Result<Vec<Ingredient>>;
    fn insert_ingredient(&self, ingredient: &Ingredient) -> Result<Ingredient>;
    /// Returns false if no ingredient had this name.
    fn delete_ingredient(&self, name: &str) -> Result<bool>;

    // --- Food cards ---

    /// All cards, newest first.
    fn list_food_cards(&self) -> Result<Vec<FoodCard>>;
    fn insert_food_card(&self, card: &NewFoodCard) -> Result<FoodCard>;
    /// Save the card and, in the same transaction, delete its schedule rows
    /// for every meal type in `removed`.
    fn update_food_card(
        &self,
        id: &str,
        card: &NewFoodCard,
        removed: &BTreeSet<MealType>,
    ) -> Result<FoodCard>;
    /// Delete the card and every schedule row referencing it.
    fn delete_food_card(&self, id: &str) -> Result<bool>;

    // --- Schedule ---

    fn list_schedule(&self, range: &DateRange) -> Result<Vec<ScheduleEntry>>;
    /// Every row for one card, regardless of date.
    fn list_schedule_for_card(&self, card_id: &str) -> Result<Vec<ScheduleRow>>;
    /// Returns false if the row already existed.
    fn insert_schedule_entry(&self, row: &ScheduleRow) -> Result<bool>;
    fn delete_schedule_entry(&self, row: &ScheduleRow) -> Result<bool>;
    /// Delete all rows for a card, optionally only for the given meal types.
    fn delete_schedule_entries_for_card(
        &self,
        card_id: &str,
        meal_types: Option<&BTreeSet<MealType>>,
    ) -> Result<usize>;
    /// Remove `from` and insert `to` atomically. Fails with `NotFound` when
    /// `from` does not exist.
    fn move_schedule_entry(&self, from: &ScheduleRow, to: &ScheduleRow) -> Result<()>;
}
