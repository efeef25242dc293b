use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealgrid_core::error::{PlanError, plan_error};
use mealgrid_core::models::{
    Cell, FoodCard, Ingredient, IngredientLine, MealType, validate_meal_type,
};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse a "date:meal" cell reference, e.g. "today:lunch" or "2024-12-26:dinner".
pub(crate) fn parse_cell(s: &str) -> Result<Cell> {
    let parts: Vec<&str> = s.splitn(2, ':').collect();
    if parts.len() != 2 {
        bail!("Invalid cell '{s}'. Use format 'date:meal' (e.g. 'today:lunch')");
    }
    let date = parse_date(Some(parts[0].to_string()))?;
    let meal_type = validate_meal_type(parts[1])?;
    Ok(Cell { date, meal_type })
}

/// Parse an ingredient line given as "name=amount". The unit is filled in
/// from the nutrition table when the card is saved.
pub(crate) fn parse_ingredient_arg(s: &str) -> Result<IngredientLine> {
    let Some((name, amount)) = s.rsplit_once('=') else {
        bail!("Invalid ingredient '{s}'. Use 'name=amount' (e.g. 'rice=2')");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid ingredient '{s}': name is empty");
    }
    let amount: f64 = amount
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .with_context(|| format!("Invalid amount in '{s}'"))?;
    Ok(IngredientLine {
        name: name.to_string(),
        amount: Some(amount),
        unit: String::new(),
    })
}

pub(crate) fn parse_categories(values: &[String]) -> Result<BTreeSet<MealType>> {
    values.iter().map(|v| validate_meal_type(v)).collect()
}

pub(crate) fn prompt_confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Pass the result through, but exit with status 2 on a not-found error.
pub(crate) fn or_not_found<T>(result: Result<T>, json: bool) -> Result<T> {
    match result {
        Err(e) if matches!(plan_error(&e), Some(PlanError::NotFound(_))) => {
            exit_not_found(&e.to_string(), json)
        }
        other => other,
    }
}

pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn format_calories(v: f64) -> String {
    format!("{:.0}", no_neg_zero(v.round()))
}

pub(crate) fn format_categories(categories: &BTreeSet<MealType>) -> String {
    categories
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn print_card_table(cards: &[&FoodCard]) {
    #[derive(Tabled)]
    struct CardRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Categories")]
        categories: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
        #[tabled(rename = "kcal")]
        calories: String,
    }

    let rows: Vec<CardRow> = cards
        .iter()
        .map(|c| CardRow {
            id: c.id.clone(),
            name: truncate(&c.name, 35),
            categories: format_categories(&c.categories),
            ingredients: c.ingredients.len(),
            calories: format_calories(c.calories),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_ingredient_table(ingredients: &[&Ingredient]) {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal/unit")]
        calories: String,
        #[tabled(rename = "Unit")]
        unit: String,
    }

    let rows: Vec<IngredientRow> = ingredients
        .iter()
        .map(|i| IngredientRow {
            name: truncate(&i.name, 35),
            calories: format!("{:.2}", no_neg_zero(i.calories_per_unit)),
            unit: i.unit.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
