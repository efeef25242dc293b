use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::models::{
    Cell, DayPlan, FoodCard, MEAL_TYPES, MealSlot, MealType, ScheduleEntry, ScheduleRow,
};

/// Longest window the grid will load.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Inclusive calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// `days` consecutive days starting at `start`.
    pub fn starting_at(start: NaiveDate, days: u64) -> Self {
        let end = days
            .checked_sub(1)
            .and_then(|n| start.checked_add_days(Days::new(n)))
            .unwrap_or(start);
        Self::new(start, end)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered; zero when end precedes start.
    pub fn len_days(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        (self.end - self.start).num_days() + 1
    }

    /// Reject reversed windows and windows longer than [`MAX_RANGE_DAYS`].
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(PlanError::InvalidInput("End date is before start date".to_string()).into());
        }
        if self.len_days() > MAX_RANGE_DAYS {
            return Err(PlanError::InvalidInput(format!(
                "Date range spans {} days; at most {MAX_RANGE_DAYS} allowed",
                self.len_days()
            ))
            .into());
        }
        Ok(())
    }

    /// Every day from start to end; empty when end precedes start.
    pub fn dates(&self) -> Vec<NaiveDate> {
        if self.is_empty() {
            return Vec::new();
        }
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .collect()
    }
}

/// Cards placed into (date, meal type) cells for the loaded window.
///
/// Cells hold full copies of the cards so the grid can be rendered and
/// totalled without the catalog; [`ScheduleGrid::refresh_card`] keeps those
/// copies current after an edit.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleGrid {
    range: DateRange,
    cells: BTreeMap<NaiveDate, BTreeMap<MealType, Vec<FoodCard>>>,
}

impl ScheduleGrid {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            cells: BTreeMap::new(),
        }
    }

    /// Build a grid from stored rows, keeping their order and dropping duplicates.
    pub fn from_entries(range: DateRange, entries: impl IntoIterator<Item = ScheduleEntry>) -> Self {
        let mut grid = Self::new(range);
        for entry in entries {
            let cell = grid
                .cells
                .entry(entry.date)
                .or_default()
                .entry(entry.meal_type)
                .or_default();
            if !cell.iter().any(|c| c.id == entry.card.id) {
                cell.push(entry.card);
            }
        }
        grid
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn check_placement(meal_type: MealType, card: &FoodCard) -> Result<()> {
        if card.allows(meal_type) {
            Ok(())
        } else {
            Err(PlanError::CategoryMismatch {
                card: card.name.clone(),
                meal_type,
            }
            .into())
        }
    }

    /// Append `card` to the cell. Returns `Ok(false)` if it was already there.
    pub fn place(&mut self, cell: Cell, card: &FoodCard) -> Result<bool> {
        Self::check_placement(cell.meal_type, card)?;
        let slot = self
            .cells
            .entry(cell.date)
            .or_default()
            .entry(cell.meal_type)
            .or_default();
        if slot.iter().any(|c| c.id == card.id) {
            return Ok(false);
        }
        slot.push(card.clone());
        Ok(true)
    }

    pub fn contains(&self, cell: Cell, card_id: &str) -> bool {
        self.cell(cell).iter().any(|c| c.id == card_id)
    }

    pub fn remove(&mut self, cell: Cell, card_id: &str) -> bool {
        let Some(slot) = self
            .cells
            .get_mut(&cell.date)
            .and_then(|day| day.get_mut(&cell.meal_type))
        else {
            return false;
        };
        let before = slot.len();
        slot.retain(|c| c.id != card_id);
        slot.len() != before
    }

    pub fn cell(&self, cell: Cell) -> &[FoodCard] {
        self.cells
            .get(&cell.date)
            .and_then(|day| day.get(&cell.meal_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn daily_total(&self, date: NaiveDate) -> f64 {
        self.cells.get(&date).map_or(0.0, |day| {
            day.values().flatten().map(|c| c.calories).sum()
        })
    }

    pub fn day_plan(&self, date: NaiveDate) -> DayPlan {
        let mut meals = Vec::new();
        for meal_type in MEAL_TYPES {
            let cards = self.cell(Cell { date, meal_type }).to_vec();
            if cards.is_empty() {
                continue;
            }
            let subtotal_calories = cards.iter().map(|c| c.calories).sum();
            meals.push(MealSlot {
                meal_type,
                cards,
                subtotal_calories,
            });
        }
        let total_calories = meals.iter().map(|m| m.subtotal_calories).sum();
        DayPlan {
            date: date.format("%Y-%m-%d").to_string(),
            meals,
            total_calories,
        }
    }

    /// Apply an edited card: drop it from cells whose meal type is in
    /// `removed`, refresh the copy everywhere else. Returns how many cells lost
    /// the card.
    pub fn refresh_card(&mut self, card: &FoodCard, removed: &BTreeSet<MealType>) -> usize {
        let mut unscheduled = 0;
        for day in self.cells.values_mut() {
            for (meal_type, slot) in day.iter_mut() {
                if removed.contains(meal_type) {
                    let before = slot.len();
                    slot.retain(|c| c.id != card.id);
                    unscheduled += before - slot.len();
                } else {
                    for existing in slot.iter_mut().filter(|c| c.id == card.id) {
                        existing.clone_from(card);
                    }
                }
            }
        }
        unscheduled
    }

    /// Remove the card from every cell. Returns how many cells held it.
    pub fn purge_card(&mut self, card_id: &str) -> usize {
        let mut removed = 0;
        for slot in self.cells.values_mut().flat_map(BTreeMap::values_mut) {
            let before = slot.len();
            slot.retain(|c| c.id != card_id);
            removed += before - slot.len();
        }
        removed
    }

    pub fn rows(&self) -> Vec<ScheduleRow> {
        let mut rows = Vec::new();
        for (date, day) in &self.cells {
            for (meal_type, slot) in day {
                for card in slot {
                    rows.push(ScheduleRow {
                        date: *date,
                        meal_type: *meal_type,
                        food_card_id: card.id.clone(),
                    });
                }
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientLine;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cell(d: &str, meal_type: MealType) -> Cell {
        Cell {
            date: date(d),
            meal_type,
        }
    }

    fn card(id: &str, meals: &[MealType], calories: f64) -> FoodCard {
        FoodCard {
            id: id.to_string(),
            name: format!("Card {id}"),
            categories: meals.iter().copied().collect(),
            ingredients: vec![IngredientLine::new("rice", 1.0, "100g")],
            calories,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn window() -> DateRange {
        DateRange::new(date("2024-12-26"), date("2025-01-03"))
    }

    #[test]
    fn test_date_range_dates() {
        let dates = window().dates();
        assert_eq!(dates.len(), 9);
        assert_eq!(dates[0], date("2024-12-26"));
        assert_eq!(dates[6], date("2025-01-01"));
        assert_eq!(dates[8], date("2025-01-03"));
    }

    #[test]
    fn test_date_range_reversed_is_empty() {
        let range = DateRange::new(date("2025-01-03"), date("2024-12-26"));
        assert!(range.is_empty());
        assert!(range.dates().is_empty());
        assert!(!range.contains(date("2024-12-30")));
    }

    #[test]
    fn test_date_range_single_and_starting_at() {
        assert_eq!(DateRange::single(date("2024-02-28")).dates().len(), 1);
        let week = DateRange::starting_at(date("2024-02-26"), 7);
        assert_eq!(week.end, date("2024-03-03"));
        assert_eq!(DateRange::starting_at(date("2024-02-26"), 0).end, date("2024-02-26"));
    }

    #[test]
    fn test_date_range_validate_limits_span() {
        assert!(window().validate().is_ok());
        let year = DateRange::starting_at(date("2024-01-01"), 366);
        assert_eq!(year.len_days(), 366);
        assert!(year.validate().is_ok());

        let too_long = DateRange::new(date("1000-01-01"), date("2999-12-31"));
        let err = too_long.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::InvalidInput(_))
        ));

        let reversed = DateRange::new(date("2025-01-03"), date("2024-12-26"));
        assert_eq!(reversed.len_days(), 0);
        assert!(reversed.validate().is_err());
    }

    #[test]
    fn test_place_rejects_category_mismatch() {
        let mut grid = ScheduleGrid::new(window());
        let breakfast_only = card("a", &[MealType::Breakfast], 300.0);
        let target = cell("2024-12-26", MealType::Dinner);

        let err = grid.place(target, &breakfast_only).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::CategoryMismatch {
                meal_type: MealType::Dinner,
                ..
            })
        ));
        assert!(grid.cell(target).is_empty());
        assert!(grid.rows().is_empty());
    }

    #[test]
    fn test_place_is_idempotent() {
        let mut grid = ScheduleGrid::new(window());
        let c = card("a", &[MealType::Lunch], 250.0);
        let target = cell("2024-12-27", MealType::Lunch);

        assert!(grid.place(target, &c).unwrap());
        assert!(!grid.place(target, &c).unwrap());
        assert_eq!(grid.cell(target).len(), 1);
    }

    #[test]
    fn test_place_preserves_insertion_order() {
        let mut grid = ScheduleGrid::new(window());
        let target = cell("2024-12-27", MealType::Snack);
        for id in ["c", "a", "b"] {
            grid.place(target, &card(id, &[MealType::Snack], 10.0)).unwrap();
        }
        let ids: Vec<&str> = grid.cell(target).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut grid = ScheduleGrid::new(window());
        assert!(!grid.remove(cell("2024-12-26", MealType::Lunch), "nope"));

        let c = card("a", &[MealType::Lunch], 100.0);
        let target = cell("2024-12-26", MealType::Lunch);
        grid.place(target, &c).unwrap();
        assert!(grid.remove(target, "a"));
        assert!(!grid.remove(target, "a"));
        assert!(grid.cell(target).is_empty());
    }

    #[test]
    fn test_daily_total_sums_all_meals() {
        let mut grid = ScheduleGrid::new(window());
        let b = card("b", &[MealType::Breakfast], 320.5);
        let l = card("l", &[MealType::Lunch, MealType::Dinner], 610.0);
        grid.place(cell("2024-12-28", MealType::Breakfast), &b).unwrap();
        grid.place(cell("2024-12-28", MealType::Lunch), &l).unwrap();
        grid.place(cell("2024-12-28", MealType::Dinner), &l).unwrap();
        grid.place(cell("2024-12-29", MealType::Dinner), &l).unwrap();

        assert!((grid.daily_total(date("2024-12-28")) - 1540.5).abs() < 1e-9);
        assert!((grid.daily_total(date("2024-12-29")) - 610.0).abs() < 1e-9);
        assert!(grid.daily_total(date("2024-12-30")).abs() < f64::EPSILON);
    }

    #[test]
    fn test_daily_total_zero_after_emptying_cells() {
        let mut grid = ScheduleGrid::new(window());
        let target = cell("2024-12-28", MealType::Snack);
        grid.place(target, &card("s", &[MealType::Snack], 90.0)).unwrap();
        grid.remove(target, "s");
        assert!(grid.daily_total(date("2024-12-28")).abs() < f64::EPSILON);
    }

    #[test]
    fn test_day_plan_groups_by_meal() {
        let mut grid = ScheduleGrid::new(window());
        let l = card("l", &[MealType::Lunch, MealType::Dinner], 500.0);
        grid.place(cell("2024-12-30", MealType::Dinner), &l).unwrap();
        grid.place(cell("2024-12-30", MealType::Lunch), &l).unwrap();

        let plan = grid.day_plan(date("2024-12-30"));
        assert_eq!(plan.date, "2024-12-30");
        let meals: Vec<MealType> = plan.meals.iter().map(|m| m.meal_type).collect();
        assert_eq!(meals, vec![MealType::Lunch, MealType::Dinner]);
        assert!((plan.total_calories - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_refresh_card_drops_removed_and_updates_retained() {
        let mut grid = ScheduleGrid::new(window());
        let original = card("a", &[MealType::Lunch, MealType::Dinner], 400.0);
        grid.place(cell("2024-12-26", MealType::Lunch), &original).unwrap();
        grid.place(cell("2024-12-27", MealType::Dinner), &original).unwrap();
        grid.place(cell("2024-12-28", MealType::Dinner), &original).unwrap();

        let mut edited = card("a", &[MealType::Lunch], 450.0);
        edited.name = "Renamed".to_string();
        let removed: BTreeSet<MealType> = [MealType::Dinner].into_iter().collect();

        assert_eq!(grid.refresh_card(&edited, &removed), 2);
        assert!(!grid.contains(cell("2024-12-27", MealType::Dinner), "a"));
        assert!(!grid.contains(cell("2024-12-28", MealType::Dinner), "a"));
        let kept = &grid.cell(cell("2024-12-26", MealType::Lunch))[0];
        assert_eq!(kept.name, "Renamed");
        assert!((kept.calories - 450.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_purge_card() {
        let mut grid = ScheduleGrid::new(window());
        let a = card("a", &[MealType::Lunch, MealType::Snack], 100.0);
        let b = card("b", &[MealType::Lunch], 200.0);
        grid.place(cell("2024-12-26", MealType::Lunch), &a).unwrap();
        grid.place(cell("2024-12-26", MealType::Lunch), &b).unwrap();
        grid.place(cell("2024-12-31", MealType::Snack), &a).unwrap();

        assert_eq!(grid.purge_card("a"), 2);
        let rows = grid.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].food_card_id, "b");
    }

    #[test]
    fn test_from_entries_dedups() {
        let c = card("a", &[MealType::Lunch], 100.0);
        let entry = ScheduleEntry {
            date: date("2024-12-26"),
            meal_type: MealType::Lunch,
            card: c,
        };
        let grid = ScheduleGrid::from_entries(window(), vec![entry.clone(), entry]);
        assert_eq!(grid.cell(cell("2024-12-26", MealType::Lunch)).len(), 1);
    }
}
