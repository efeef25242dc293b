use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PlanError;

/// Decoded through [`FromStr`], so JSON accepts any casing the CLI does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// Meal slots in display order.
pub const MEAL_TYPES: [MealType; 4] = [
    MealType::Breakfast,
    MealType::Lunch,
    MealType::Dinner,
    MealType::Snack,
];

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Lunch => "Lunch",
            Self::Dinner => "Dinner",
            Self::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        MEAL_TYPES
            .into_iter()
            .find(|m| m.as_str().to_lowercase() == lower)
            .ok_or_else(|| {
                let valid = MEAL_TYPES.map(MealType::as_str).join(", ");
                PlanError::InvalidInput(format!("Invalid meal type '{s}'. Must be one of: {valid}"))
            })
    }
}

impl TryFrom<String> for MealType {
    type Error = PlanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

pub fn validate_meal_type(meal: &str) -> Result<MealType> {
    Ok(meal.parse::<MealType>()?)
}

/// Category selector used when browsing the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(MealType),
}

impl CategoryFilter {
    pub fn matches(self, categories: &BTreeSet<MealType>) -> bool {
        match self {
            Self::All => true,
            Self::Only(meal) => categories.contains(&meal),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

/// Lookup key for the nutrition table.
pub fn normalize_ingredient_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse a calories-per-unit value, rejecting anything that is not a finite number.
pub fn parse_calories(s: &str) -> Result<f64> {
    let value = s
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PlanError::InvalidInput(format!("Invalid calorie value: '{s}'")))?;
    Ok(value)
}

/// Lenient amount parsing: anything unparseable or non-finite is treated as missing.
pub fn parse_amount(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub calories_per_unit: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: String,
}

impl IngredientLine {
    pub fn new(name: &str, amount: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            amount: Some(amount),
            unit: unit.to_string(),
        }
    }

    /// A line counts toward a card only with a non-empty name and a usable amount.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && self.amount.is_some_and(f64::is_finite)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

// Amounts arrive as numbers or as form text ("2", "", "abc").
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawAmount> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|r| match r {
        RawAmount::Number(n) => Some(n).filter(|v| v.is_finite()),
        RawAmount::Text(s) => parse_amount(&s),
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodCard {
    pub id: String,
    pub name: String,
    pub categories: BTreeSet<MealType>,
    pub ingredients: Vec<IngredientLine>,
    pub calories: f64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl FoodCard {
    pub fn allows(&self, meal_type: MealType) -> bool {
        self.categories.contains(&meal_type)
    }

    /// Case-insensitive match against the card name or any ingredient name.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self
                .ingredients
                .iter()
                .any(|line| line.name.to_lowercase().contains(&query))
    }
}

/// User-supplied card fields, before validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardDraft {
    pub name: String,
    #[serde(default)]
    pub categories: BTreeSet<MealType>,
    #[serde(default)]
    pub ingredients: Vec<IngredientLine>,
}

impl From<&FoodCard> for CardDraft {
    fn from(card: &FoodCard) -> Self {
        Self {
            name: card.name.clone(),
            categories: card.categories.clone(),
            ingredients: card.ingredients.clone(),
        }
    }
}

/// A validated card ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFoodCard {
    pub name: String,
    pub categories: BTreeSet<MealType>,
    pub ingredients: Vec<IngredientLine>,
    pub calories: f64,
}

/// One (date, meal type) slot of the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub date: NaiveDate,
    pub meal_type: MealType,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.date.format("%Y-%m-%d"), self.meal_type)
    }
}

/// Stored schedule row: a card reference placed into a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub food_card_id: String,
}

impl ScheduleRow {
    pub fn new(cell: Cell, food_card_id: &str) -> Self {
        Self {
            date: cell.date,
            meal_type: cell.meal_type,
            food_card_id: food_card_id.to_string(),
        }
    }

    pub fn cell(&self) -> Cell {
        Cell {
            date: self.date,
            meal_type: self.meal_type,
        }
    }
}

/// Schedule row joined with the card it references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub card: FoodCard,
}

/// What committing a category change would unschedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadePreview {
    pub card_id: String,
    pub removed_categories: Vec<MealType>,
    pub affected: Vec<ScheduleRow>,
}

impl CascadePreview {
    pub fn requires_confirmation(&self) -> bool {
        !self.removed_categories.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MealSlot {
    pub meal_type: MealType,
    pub cards: Vec<FoodCard>,
    pub subtotal_calories: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub date: String,
    pub meals: Vec<MealSlot>,
    pub total_calories: f64,
}

/// A card whose cached calories no longer match the nutrition table.
#[derive(Debug, Clone, Serialize)]
pub struct StaleCard {
    pub id: String,
    pub name: String,
    pub cached_calories: f64,
    pub current_calories: f64,
}
