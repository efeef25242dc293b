use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, types::Type};
use tracing::debug;
use uuid::Uuid;

use crate::error::PlanError;
use crate::models::{
    FoodCard, Ingredient, MealType, NewFoodCard, ScheduleEntry, ScheduleRow,
    normalize_ingredient_name,
};
use crate::schedule::DateRange;
use crate::store::PlanStore;

const DATE_FORMAT: &str = "%Y-%m-%d";

// Retry window for a locked database before a write gives up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CARD_COLUMNS: &str =
    "c.id, c.name, c.categories, c.ingredients, c.calories, c.created_at, c.updated_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS ingredients (
                    name TEXT PRIMARY KEY,
                    calories_per_unit REAL NOT NULL,
                    unit TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_cards (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    categories TEXT NOT NULL,
                    ingredients TEXT NOT NULL,
                    calories REAL NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS schedules (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL,
                    meal_type TEXT NOT NULL,
                    food_card_id TEXT NOT NULL REFERENCES food_cards(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    UNIQUE (date, meal_type, food_card_id)
                );

                CREATE INDEX IF NOT EXISTS idx_schedules_date ON schedules(date);
                CREATE INDEX IF NOT EXISTS idx_schedules_card ON schedules(food_card_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects CARD_COLUMNS starting at `offset`.
    fn card_from_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<FoodCard> {
        let categories: String = row.get(offset + 2)?;
        let ingredients: String = row.get(offset + 3)?;
        Ok(FoodCard {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            categories: serde_json::from_str(&categories)
                .map_err(|e| conversion_error(offset + 2, e))?,
            ingredients: serde_json::from_str(&ingredients)
                .map_err(|e| conversion_error(offset + 3, e))?,
            calories: row.get(offset + 4)?,
            created_at: row.get(offset + 5)?,
            updated_at: row.get(offset + 6)?,
        })
    }

    fn schedule_row_from_row(row: &rusqlite::Row) -> rusqlite::Result<ScheduleRow> {
        Ok(ScheduleRow {
            date: date_column(row, 0)?,
            meal_type: meal_column(row, 1)?,
            food_card_id: row.get(2)?,
        })
    }

    pub fn get_food_card(&self, id: &str) -> Result<Option<FoodCard>> {
        let card = self
            .conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM food_cards c WHERE c.id = ?1"),
                params![id],
                |row| Self::card_from_row(row, 0),
            )
            .optional()?;
        Ok(card)
    }

    pub fn count_schedule_rows(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM schedules", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn meal_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<MealType> {
    let raw: String = row.get(idx)?;
    raw.parse::<MealType>().map_err(|e| conversion_error(idx, e))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn insert_schedule_row(conn: &Connection, row: &ScheduleRow) -> Result<bool> {
    let now = Local::now().to_rfc3339();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO schedules (date, meal_type, food_card_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            format_date(row.date),
            row.meal_type.as_str(),
            row.food_card_id,
            now
        ],
    )?;
    Ok(inserted > 0)
}

fn delete_schedule_row(conn: &Connection, row: &ScheduleRow) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM schedules WHERE date = ?1 AND meal_type = ?2 AND food_card_id = ?3",
        params![
            format_date(row.date),
            row.meal_type.as_str(),
            row.food_card_id
        ],
    )?;
    Ok(deleted > 0)
}

// `Some(empty)` deletes nothing; `None` deletes every row for the card.
fn delete_schedule_rows(
    conn: &Connection,
    card_id: &str,
    meal_types: Option<&BTreeSet<MealType>>,
) -> Result<usize> {
    let Some(meal_types) = meal_types else {
        let deleted = conn.execute(
            "DELETE FROM schedules WHERE food_card_id = ?1",
            params![card_id],
        )?;
        return Ok(deleted);
    };
    let mut deleted = 0;
    for meal_type in meal_types {
        deleted += conn.execute(
            "DELETE FROM schedules WHERE food_card_id = ?1 AND meal_type = ?2",
            params![card_id, meal_type.as_str()],
        )?;
    }
    Ok(deleted)
}

impl PlanStore for Database {
    // --- Ingredients ---

    fn list_ingredients(&self) -> Result<Vec<Ingredient>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, calories_per_unit, unit FROM ingredients ORDER BY name")?;
        let ingredients = stmt
            .query_map([], |row| {
                Ok(Ingredient {
                    name: row.get(0)?,
                    calories_per_unit: row.get(1)?,
                    unit: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    fn insert_ingredient(&self, ingredient: &Ingredient) -> Result<Ingredient> {
        let now = Local::now().to_rfc3339();
        let name = normalize_ingredient_name(&ingredient.name);
        let result = self.conn.execute(
            "INSERT INTO ingredients (name, calories_per_unit, unit, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, ingredient.calories_per_unit, ingredient.unit, now],
        );
        match result {
            Ok(_) => Ok(Ingredient {
                name,
                calories_per_unit: ingredient.calories_per_unit,
                unit: ingredient.unit.clone(),
            }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(PlanError::DuplicateKey(name).into())
            }
            Err(e) => Err(e).context("Failed to insert ingredient"),
        }
    }

    fn delete_ingredient(&self, name: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM ingredients WHERE name = ?1",
            params![normalize_ingredient_name(name)],
        )?;
        Ok(rows > 0)
    }

    // --- Food cards ---

    fn list_food_cards(&self) -> Result<Vec<FoodCard>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM food_cards c ORDER BY c.created_at DESC, c.rowid DESC"
        ))?;
        let cards = stmt
            .query_map([], |row| Self::card_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    fn insert_food_card(&self, card: &NewFoodCard) -> Result<FoodCard> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO food_cards (id, name, categories, ingredients, calories, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                card.name,
                serde_json::to_string(&card.categories)?,
                serde_json::to_string(&card.ingredients)?,
                card.calories,
                now,
                now,
            ],
        )?;
        self.get_food_card(&id)?
            .context("Food card missing after insert")
    }

    fn update_food_card(
        &self,
        id: &str,
        card: &NewFoodCard,
        removed: &BTreeSet<MealType>,
    ) -> Result<FoodCard> {
        let now = Local::now().to_rfc3339();
        let categories = serde_json::to_string(&card.categories)?;
        let ingredients = serde_json::to_string(&card.ingredients)?;

        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE food_cards
             SET name = ?1, categories = ?2, ingredients = ?3, calories = ?4, updated_at = ?5
             WHERE id = ?6",
            params![card.name, categories, ingredients, card.calories, now, id],
        )?;
        if rows == 0 {
            return Err(PlanError::NotFound(format!("Food card {id}")).into());
        }
        let unscheduled = delete_schedule_rows(&tx, id, Some(removed))?;
        tx.commit().context("Failed to commit food card update")?;
        debug!(card_id = id, unscheduled, "food card updated");

        self.get_food_card(id)?
            .with_context(|| format!("Food card {id} missing after update"))
    }

    fn delete_food_card(&self, id: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let unscheduled = delete_schedule_rows(&tx, id, None)?;
        let rows = tx.execute("DELETE FROM food_cards WHERE id = ?1", params![id])?;
        tx.commit().context("Failed to commit food card delete")?;
        debug!(card_id = id, unscheduled, deleted = rows > 0, "food card delete");
        Ok(rows > 0)
    }

    // --- Schedule ---

    fn list_schedule(&self, range: &DateRange) -> Result<Vec<ScheduleEntry>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT s.date, s.meal_type, {CARD_COLUMNS}
             FROM schedules s
             JOIN food_cards c ON c.id = s.food_card_id
             WHERE s.date >= ?1 AND s.date <= ?2
             ORDER BY s.date, s.id"
        ))?;
        let entries = stmt
            .query_map(
                params![format_date(range.start), format_date(range.end)],
                |row| {
                    Ok(ScheduleEntry {
                        date: date_column(row, 0)?,
                        meal_type: meal_column(row, 1)?,
                        card: Self::card_from_row(row, 2)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn list_schedule_for_card(&self, card_id: &str) -> Result<Vec<ScheduleRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, meal_type, food_card_id FROM schedules
             WHERE food_card_id = ?1
             ORDER BY date, id",
        )?;
        let rows = stmt
            .query_map(params![card_id], Self::schedule_row_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_schedule_entry(&self, row: &ScheduleRow) -> Result<bool> {
        insert_schedule_row(&self.conn, row)
    }

    fn delete_schedule_entry(&self, row: &ScheduleRow) -> Result<bool> {
        delete_schedule_row(&self.conn, row)
    }

    fn delete_schedule_entries_for_card(
        &self,
        card_id: &str,
        meal_types: Option<&BTreeSet<MealType>>,
    ) -> Result<usize> {
        delete_schedule_rows(&self.conn, card_id, meal_types)
    }

    fn move_schedule_entry(&self, from: &ScheduleRow, to: &ScheduleRow) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        if !delete_schedule_row(&tx, from)? {
            return Err(PlanError::NotFound(format!("Schedule entry {}", from.cell())).into());
        }
        insert_schedule_row(&tx, to)?;
        tx.commit().context("Failed to commit schedule move")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientLine;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn meals(list: &[MealType]) -> BTreeSet<MealType> {
        list.iter().copied().collect()
    }

    fn sample_card(name: &str, categories: &[MealType]) -> NewFoodCard {
        NewFoodCard {
            name: name.to_string(),
            categories: meals(categories),
            ingredients: vec![
                IngredientLine::new("rice", 2.0, "100g"),
                IngredientLine::new("egg", 1.0, "pcs"),
            ],
            calories: 80.6,
        }
    }

    fn row(d: &str, meal_type: MealType, card_id: &str) -> ScheduleRow {
        ScheduleRow {
            date: date(d),
            meal_type,
            food_card_id: card_id.to_string(),
        }
    }

    #[test]
    fn test_migration_sets_version_and_foreign_keys() {
        let db = Database::open_in_memory().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
        let fk: i64 = db
            .conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_insert_and_list_ingredients() {
        let db = Database::open_in_memory().unwrap();
        for (name, cal, unit) in [("Tomato", 0.2, "g"), ("apple", 52.0, "pcs")] {
            db.insert_ingredient(&Ingredient {
                name: name.to_string(),
                calories_per_unit: cal,
                unit: unit.to_string(),
            })
            .unwrap();
        }
        let all = db.list_ingredients().unwrap();
        let names: Vec<&str> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "tomato"]);
    }

    #[test]
    fn test_insert_ingredient_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let rice = Ingredient {
            name: "rice".to_string(),
            calories_per_unit: 1.3,
            unit: "100g".to_string(),
        };
        db.insert_ingredient(&rice).unwrap();
        let err = db
            .insert_ingredient(&Ingredient {
                name: "RICE".to_string(),
                ..rice
            })
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PlanError>(),
            Some(&PlanError::DuplicateKey("rice".to_string()))
        );
        assert_eq!(db.list_ingredients().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_ingredient() {
        let db = Database::open_in_memory().unwrap();
        db.insert_ingredient(&Ingredient {
            name: "rice".to_string(),
            calories_per_unit: 1.3,
            unit: "100g".to_string(),
        })
        .unwrap();
        assert!(db.delete_ingredient("Rice").unwrap());
        assert!(!db.delete_ingredient("rice").unwrap());
    }

    #[test]
    fn test_insert_and_get_food_card() {
        let db = Database::open_in_memory().unwrap();
        let card = db
            .insert_food_card(&sample_card("Fried Rice", &[MealType::Lunch, MealType::Dinner]))
            .unwrap();

        assert!(!card.id.is_empty());
        assert_eq!(card.name, "Fried Rice");
        assert_eq!(card.categories, meals(&[MealType::Lunch, MealType::Dinner]));
        assert_eq!(card.ingredients.len(), 2);
        assert_eq!(card.ingredients[0].amount, Some(2.0));
        assert!((card.calories - 80.6).abs() < f64::EPSILON);
        assert_eq!(card.created_at, card.updated_at);

        let fetched = db.get_food_card(&card.id).unwrap().unwrap();
        assert_eq!(fetched, card);
        assert!(db.get_food_card("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_food_cards_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food_card(&sample_card("First", &[MealType::Lunch]))
            .unwrap();
        db.insert_food_card(&sample_card("Second", &[MealType::Lunch]))
            .unwrap();
        let names: Vec<String> = db
            .list_food_cards()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[test]
    fn test_update_food_card_cascades_removed_meal_types() {
        let db = Database::open_in_memory().unwrap();
        let card = db
            .insert_food_card(&sample_card("Soup", &[MealType::Lunch, MealType::Dinner]))
            .unwrap();
        db.insert_schedule_entry(&row("2024-01-01", MealType::Lunch, &card.id))
            .unwrap();
        db.insert_schedule_entry(&row("2024-01-01", MealType::Dinner, &card.id))
            .unwrap();
        db.insert_schedule_entry(&row("2030-06-15", MealType::Dinner, &card.id))
            .unwrap();

        let mut edited = sample_card("Tomato Soup", &[MealType::Lunch]);
        edited.calories = 120.0;
        let updated = db
            .update_food_card(&card.id, &edited, &meals(&[MealType::Dinner]))
            .unwrap();

        assert_eq!(updated.id, card.id);
        assert_eq!(updated.name, "Tomato Soup");
        assert_eq!(updated.created_at, card.created_at);
        let remaining = db.list_schedule_for_card(&card.id).unwrap();
        assert_eq!(remaining, vec![row("2024-01-01", MealType::Lunch, &card.id)]);
    }

    #[test]
    fn test_update_missing_card_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let card = db
            .insert_food_card(&sample_card("Soup", &[MealType::Dinner]))
            .unwrap();
        db.insert_schedule_entry(&row("2024-01-01", MealType::Dinner, &card.id))
            .unwrap();

        let err = db
            .update_food_card(
                "no-such-card",
                &sample_card("Ghost", &[MealType::Lunch]),
                &meals(&[MealType::Dinner]),
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::NotFound(_))
        ));
        assert_eq!(db.count_schedule_rows().unwrap(), 1);
    }

    #[test]
    fn test_delete_food_card_cascades_everywhere() {
        let db = Database::open_in_memory().unwrap();
        let keep = db
            .insert_food_card(&sample_card("Keep", &[MealType::Snack]))
            .unwrap();
        let gone = db
            .insert_food_card(&sample_card("Gone", &[MealType::Snack, MealType::Lunch]))
            .unwrap();
        db.insert_schedule_entry(&row("2020-02-02", MealType::Snack, &gone.id))
            .unwrap();
        db.insert_schedule_entry(&row("2024-12-26", MealType::Lunch, &gone.id))
            .unwrap();
        db.insert_schedule_entry(&row("2024-12-26", MealType::Snack, &keep.id))
            .unwrap();

        assert!(db.delete_food_card(&gone.id).unwrap());
        assert!(!db.delete_food_card(&gone.id).unwrap());
        assert!(db.list_schedule_for_card(&gone.id).unwrap().is_empty());
        assert_eq!(db.count_schedule_rows().unwrap(), 1);

        let everything = DateRange::new(date("2000-01-01"), date("2100-01-01"));
        let entries = db.list_schedule(&everything).unwrap();
        assert!(entries.iter().all(|e| e.card.id != gone.id));
    }

    #[test]
    fn test_insert_schedule_entry_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let card = db
            .insert_food_card(&sample_card("Oats", &[MealType::Breakfast]))
            .unwrap();
        let r = row("2024-03-01", MealType::Breakfast, &card.id);
        assert!(db.insert_schedule_entry(&r).unwrap());
        assert!(!db.insert_schedule_entry(&r).unwrap());
        assert_eq!(db.count_schedule_rows().unwrap(), 1);
    }

    #[test]
    fn test_insert_schedule_entry_unknown_card_fails() {
        let db = Database::open_in_memory().unwrap();
        let r = row("2024-03-01", MealType::Breakfast, "ghost");
        assert!(db.insert_schedule_entry(&r).is_err());
    }

    #[test]
    fn test_list_schedule_filters_range_and_keeps_order() {
        let db = Database::open_in_memory().unwrap();
        let a = db
            .insert_food_card(&sample_card("A", &[MealType::Lunch]))
            .unwrap();
        let b = db
            .insert_food_card(&sample_card("B", &[MealType::Lunch]))
            .unwrap();
        db.insert_schedule_entry(&row("2024-12-27", MealType::Lunch, &b.id))
            .unwrap();
        db.insert_schedule_entry(&row("2024-12-27", MealType::Lunch, &a.id))
            .unwrap();
        db.insert_schedule_entry(&row("2025-02-01", MealType::Lunch, &a.id))
            .unwrap();

        let range = DateRange::new(date("2024-12-26"), date("2025-01-03"));
        let entries = db.list_schedule(&range).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.card.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(entries.iter().all(|e| e.date == date("2024-12-27")));

        let reversed = DateRange::new(date("2025-01-03"), date("2024-12-26"));
        assert!(db.list_schedule(&reversed).unwrap().is_empty());
    }

    #[test]
    fn test_delete_schedule_entries_for_card() {
        let db = Database::open_in_memory().unwrap();
        let card = db
            .insert_food_card(&sample_card("Wrap", &[MealType::Lunch, MealType::Dinner]))
            .unwrap();
        db.insert_schedule_entry(&row("2024-01-01", MealType::Lunch, &card.id))
            .unwrap();
        db.insert_schedule_entry(&row("2024-01-02", MealType::Dinner, &card.id))
            .unwrap();

        assert_eq!(
            db.delete_schedule_entries_for_card(&card.id, Some(&BTreeSet::new()))
                .unwrap(),
            0
        );
        assert_eq!(
            db.delete_schedule_entries_for_card(&card.id, Some(&meals(&[MealType::Dinner])))
                .unwrap(),
            1
        );
        assert_eq!(db.delete_schedule_entries_for_card(&card.id, None).unwrap(), 1);
        assert_eq!(db.count_schedule_rows().unwrap(), 0);
    }

    #[test]
    fn test_delete_schedule_entry() {
        let db = Database::open_in_memory().unwrap();
        let card = db
            .insert_food_card(&sample_card("Wrap", &[MealType::Lunch]))
            .unwrap();
        let r = row("2024-01-01", MealType::Lunch, &card.id);
        db.insert_schedule_entry(&r).unwrap();
        assert!(db.delete_schedule_entry(&r).unwrap());
        assert!(!db.delete_schedule_entry(&r).unwrap());
    }

    #[test]
    fn test_move_schedule_entry() {
        let db = Database::open_in_memory().unwrap();
        let card = db
            .insert_food_card(&sample_card("Wrap", &[MealType::Lunch, MealType::Dinner]))
            .unwrap();
        let from = row("2024-01-01", MealType::Lunch, &card.id);
        let to = row("2024-01-05", MealType::Dinner, &card.id);
        db.insert_schedule_entry(&from).unwrap();

        db.move_schedule_entry(&from, &to).unwrap();
        assert_eq!(db.list_schedule_for_card(&card.id).unwrap(), vec![to.clone()]);

        // source is gone now: the move must fail and leave the destination alone
        let elsewhere = row("2024-01-09", MealType::Lunch, &card.id);
        let err = db.move_schedule_entry(&from, &elsewhere).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::NotFound(_))
        ));
        assert_eq!(db.list_schedule_for_card(&card.id).unwrap(), vec![to]);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mealgrid.db");
        let id = {
            let db = Database::open(&path).unwrap();
            db.insert_food_card(&sample_card("Persisted", &[MealType::Snack]))
                .unwrap()
                .id
        };
        let db = Database::open(&path).unwrap();
        let card = db.get_food_card(&id).unwrap().unwrap();
        assert_eq!(card.name, "Persisted");
    }
}
