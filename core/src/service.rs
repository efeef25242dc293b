use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::catalog::{FoodCardCatalog, prepare_card};
use crate::db::Database;
use crate::error::PlanError;
use crate::models::{
    CardDraft, CascadePreview, CategoryFilter, Cell, DayPlan, FoodCard, Ingredient, MealType,
    ScheduleRow, StaleCard,
};
use crate::nutrition::{NutritionTable, line_calories};
use crate::schedule::{DateRange, ScheduleGrid};
use crate::store::PlanStore;

/// Meal planner session: nutrition table, card catalog and the schedule grid
/// for one visible window, kept consistent with the backing store.
///
/// Every mutation goes to the store first and only touches memory once the
/// store call succeeded, so a persistence failure leaves the session as it
/// was.
pub struct PlanService<S: PlanStore = Database> {
    store: S,
    nutrition: NutritionTable,
    catalog: FoodCardCatalog,
    grid: ScheduleGrid,
}

impl PlanService<Database> {
    pub fn new(db_path: &str, range: DateRange) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Self::with_store(db, range)
    }

    pub fn new_in_memory(range: DateRange) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Self::with_store(db, range)
    }
}

impl<S: PlanStore> PlanService<S> {
    pub fn with_store(store: S, range: DateRange) -> Result<Self> {
        let mut service = Self {
            store,
            nutrition: NutritionTable::new(),
            catalog: FoodCardCatalog::default(),
            grid: ScheduleGrid::new(range),
        };
        service.reload()?;
        Ok(service)
    }

    /// Re-read everything from the store.
    pub fn reload(&mut self) -> Result<()> {
        let nutrition = NutritionTable::from_ingredients(self.store.list_ingredients()?);
        let catalog = FoodCardCatalog::from_cards(self.store.list_food_cards()?);
        let range = self.grid.range();
        let grid = ScheduleGrid::from_entries(range, self.store.list_schedule(&range)?);

        self.nutrition = nutrition;
        self.catalog = catalog;
        self.grid = grid;
        debug!(
            ingredients = self.nutrition.len(),
            cards = self.catalog.len(),
            "plan reloaded"
        );
        Ok(())
    }

    /// Change the visible window and load its schedule. Reversed or
    /// over-long windows are rejected and the current one is kept.
    pub fn set_range(&mut self, range: DateRange) -> Result<()> {
        range.validate()?;
        let entries = self.store.list_schedule(&range)?;
        self.grid = ScheduleGrid::from_entries(range, entries);
        Ok(())
    }

    pub fn range(&self) -> DateRange {
        self.grid.range()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn nutrition(&self) -> &NutritionTable {
        &self.nutrition
    }

    pub fn catalog(&self) -> &FoodCardCatalog {
        &self.catalog
    }

    pub fn grid(&self) -> &ScheduleGrid {
        &self.grid
    }

    // --- Ingredients ---

    pub fn list_ingredients(&self, query: Option<&str>) -> Vec<&Ingredient> {
        match query {
            Some(q) if !q.trim().is_empty() => self.nutrition.search(q),
            _ => self.nutrition.iter().collect(),
        }
    }

    pub fn add_ingredient(
        &mut self,
        name: &str,
        calories_per_unit: f64,
        unit: &str,
    ) -> Result<Ingredient> {
        let ingredient = self.nutrition.check_new(name, calories_per_unit, unit)?;
        let saved = self.store.insert_ingredient(&ingredient)?;
        self.nutrition.insert(saved.clone());
        info!(ingredient = %saved.name, "ingredient added");
        Ok(saved)
    }

    /// Remove an ingredient. Cards that still list it keep their cached
    /// calories until they are next saved.
    pub fn remove_ingredient(&mut self, name: &str) -> Result<bool> {
        let removed = self.store.delete_ingredient(name)?;
        self.nutrition.remove(name);
        let references = self.catalog.references_to(name);
        if removed && references > 0 {
            warn!(ingredient = name, cards = references, "removed ingredient is still referenced");
        }
        Ok(removed)
    }

    /// Number of cards with a line naming this ingredient.
    pub fn ingredient_references(&self, name: &str) -> usize {
        self.catalog.references_to(name)
    }

    // --- Food cards ---

    pub fn get_card(&self, id: &str) -> Result<&FoodCard> {
        self.catalog.require(id)
    }

    pub fn filter_cards(&self, category: CategoryFilter, query: &str) -> Vec<&FoodCard> {
        self.catalog.filter(category, query)
    }

    pub fn cards_for_slot(&self, meal_type: MealType, query: &str) -> Vec<&FoodCard> {
        self.catalog.for_slot(meal_type, query)
    }

    /// Calories contributed by each of the card's lines, in order.
    pub fn line_breakdown(&self, card: &FoodCard) -> Vec<f64> {
        card.ingredients
            .iter()
            .map(|line| line_calories(line, &self.nutrition))
            .collect()
    }

    pub fn stale_cards(&self) -> Vec<StaleCard> {
        self.catalog.stale(&self.nutrition)
    }

    pub fn create_card(&mut self, draft: &CardDraft) -> Result<FoodCard> {
        let new_card = prepare_card(draft, &self.nutrition)?;
        let card = self.store.insert_food_card(&new_card)?;
        self.catalog.insert(card.clone());
        info!(card_id = %card.id, name = %card.name, calories = card.calories, "food card created");
        Ok(card)
    }

    /// What saving `id` with `categories` would unschedule, across all dates.
    pub fn preview_cascade(
        &self,
        id: &str,
        categories: &BTreeSet<MealType>,
    ) -> Result<CascadePreview> {
        let card = self.catalog.require(id)?;
        let removed: BTreeSet<MealType> = card.categories.difference(categories).copied().collect();
        let affected = if removed.is_empty() {
            Vec::new()
        } else {
            self.store
                .list_schedule_for_card(id)?
                .into_iter()
                .filter(|row| removed.contains(&row.meal_type))
                .collect()
        };
        Ok(CascadePreview {
            card_id: id.to_string(),
            removed_categories: removed.into_iter().collect(),
            affected,
        })
    }

    /// Save an edited card.
    ///
    /// Dropping categories requires `confirmed`; without it the call fails
    /// with [`PlanError::ConfirmationRequired`] and nothing is saved. On
    /// commit the card is unscheduled from every cell of a removed meal type
    /// in the same store transaction, and the cached copy in every retained
    /// cell is refreshed.
    pub fn update_card(&mut self, id: &str, draft: &CardDraft, confirmed: bool) -> Result<FoodCard> {
        let new_card = prepare_card(draft, &self.nutrition)?;
        let preview = self.preview_cascade(id, &new_card.categories)?;
        if preview.requires_confirmation() && !confirmed {
            debug!(card_id = id, removed = ?preview.removed_categories, "category removal not confirmed");
            return Err(PlanError::ConfirmationRequired {
                removed: preview.removed_categories,
                affected: preview.affected.len(),
            }
            .into());
        }

        let removed: BTreeSet<MealType> = preview.removed_categories.iter().copied().collect();
        let card = self.store.update_food_card(id, &new_card, &removed)?;
        self.catalog.replace(card.clone());
        let visible = self.grid.refresh_card(&card, &removed);
        info!(
            card_id = id,
            unscheduled = preview.affected.len(),
            visible,
            "food card updated"
        );
        Ok(card)
    }

    /// Delete a card and every schedule entry that references it. Deleting an
    /// unknown id is a no-op returning `false`.
    pub fn delete_card(&mut self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_food_card(id)?;
        self.catalog.remove(id);
        let visible = self.grid.purge_card(id);
        if deleted {
            info!(card_id = id, visible, "food card deleted");
        }
        Ok(deleted)
    }

    // --- Schedule ---

    /// Place a card into a cell. Returns `Ok(false)` if it was already there.
    pub fn place(&mut self, cell: Cell, card_id: &str) -> Result<bool> {
        let card = self.catalog.require(card_id)?.clone();
        ScheduleGrid::check_placement(cell.meal_type, &card)?;
        let inserted = self
            .store
            .insert_schedule_entry(&ScheduleRow::new(cell, card_id))?;
        if self.grid.range().contains(cell.date) {
            self.grid.place(cell, &card)?;
        }
        debug!(%cell, card_id, inserted, "placed");
        Ok(inserted)
    }

    /// Remove a card from a cell. Returns `Ok(false)` if it was not there.
    pub fn remove_entry(&mut self, cell: Cell, card_id: &str) -> Result<bool> {
        let removed = self
            .store
            .delete_schedule_entry(&ScheduleRow::new(cell, card_id))?;
        self.grid.remove(cell, card_id);
        debug!(%cell, card_id, removed, "unplaced");
        Ok(removed)
    }

    /// Move a card between cells. The destination is validated before the
    /// source is touched; the store applies both halves atomically.
    pub fn move_entry(&mut self, card_id: &str, from: Cell, to: Cell) -> Result<()> {
        let card = self.catalog.require(card_id)?.clone();
        ScheduleGrid::check_placement(to.meal_type, &card)?;
        self.store.move_schedule_entry(
            &ScheduleRow::new(from, card_id),
            &ScheduleRow::new(to, card_id),
        )?;
        self.grid.remove(from, card_id);
        if self.grid.range().contains(to.date) {
            self.grid.place(to, &card)?;
        }
        debug!(%from, %to, card_id, "moved");
        Ok(())
    }

    pub fn daily_total(&self, date: NaiveDate) -> Result<f64> {
        if self.grid.range().contains(date) {
            return Ok(self.grid.daily_total(date));
        }
        Ok(self.day_plan(date)?.total_calories)
    }

    /// Per-meal breakdown for a date. Dates outside the visible window are
    /// read from the store.
    pub fn day_plan(&self, date: NaiveDate) -> Result<DayPlan> {
        if self.grid.range().contains(date) {
            return Ok(self.grid.day_plan(date));
        }
        let range = DateRange::single(date);
        let grid = ScheduleGrid::from_entries(range, self.store.list_schedule(&range)?);
        Ok(grid.day_plan(date))
    }
}
