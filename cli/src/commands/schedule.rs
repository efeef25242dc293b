use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealgrid_core::models::{Cell, MEAL_TYPES, validate_meal_type};
use mealgrid_core::schedule::DateRange;
use mealgrid_core::service::PlanService;

use super::helpers::{format_calories, json_error, or_not_found, parse_cell, parse_date, truncate};

const DEFAULT_DAYS: u64 = 7;

pub(crate) fn cmd_schedule_place(
    svc: &mut PlanService,
    date: Option<String>,
    meal: &str,
    card_id: &str,
    json: bool,
) -> Result<()> {
    let cell = Cell {
        date: parse_date(date)?,
        meal_type: validate_meal_type(meal)?,
    };
    let inserted = or_not_found(svc.place(cell, card_id), json)?;
    let total = svc.daily_total(cell.date)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "cell": cell.to_string(),
                "food_card_id": card_id,
                "inserted": inserted,
                "daily_total": total,
            })
        );
    } else if inserted {
        let name = &svc.get_card(card_id)?.name;
        println!(
            "Placed {name} in {cell} (day total {} kcal)",
            format_calories(total)
        );
    } else {
        println!("Already placed in {cell}");
    }
    Ok(())
}

pub(crate) fn cmd_schedule_remove(
    svc: &mut PlanService,
    date: Option<String>,
    meal: &str,
    card_id: &str,
    json: bool,
) -> Result<()> {
    let cell = Cell {
        date: parse_date(date)?,
        meal_type: validate_meal_type(meal)?,
    };
    let removed = svc.remove_entry(cell, card_id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "cell": cell.to_string(), "food_card_id": card_id, "removed": removed })
        );
    } else if removed {
        println!("Removed {card_id} from {cell}");
    } else {
        println!("{card_id} was not scheduled in {cell}");
    }
    Ok(())
}

pub(crate) fn cmd_schedule_move(
    svc: &mut PlanService,
    from: &str,
    to: &str,
    card_id: &str,
    json: bool,
) -> Result<()> {
    let from = parse_cell(from)?;
    let to = parse_cell(to)?;
    or_not_found(svc.move_entry(card_id, from, to), json)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "from": from.to_string(), "to": to.to_string(), "food_card_id": card_id })
        );
    } else {
        println!("Moved {card_id} from {from} to {to}");
    }
    Ok(())
}

pub(crate) fn cmd_schedule_show(
    svc: &mut PlanService,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let start = parse_date(start)?;
    let range = match end {
        Some(end) => DateRange::new(start, parse_date(Some(end))?),
        None => DateRange::starting_at(start, DEFAULT_DAYS),
    };
    if let Err(e) = range.validate() {
        if json {
            println!("{}", json_error(&e.to_string()));
            std::process::exit(1);
        }
        return Err(e);
    }
    svc.set_range(range)?;
    let plans: Vec<_> = range
        .dates()
        .into_iter()
        .map(|d| svc.day_plan(d))
        .collect::<Result<_>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct GridRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Breakfast")]
        breakfast: String,
        #[tabled(rename = "Lunch")]
        lunch: String,
        #[tabled(rename = "Dinner")]
        dinner: String,
        #[tabled(rename = "Snack")]
        snack: String,
        #[tabled(rename = "kcal")]
        total: String,
    }

    let rows: Vec<GridRow> = range
        .dates()
        .into_iter()
        .zip(&plans)
        .map(|(date, plan)| {
            let [breakfast, lunch, dinner, snack] = MEAL_TYPES.map(|meal_type| {
                svc.grid()
                    .cell(Cell { date, meal_type })
                    .iter()
                    .map(|c| truncate(&c.name, 20))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            GridRow {
                date: date.format("%a %Y-%m-%d").to_string(),
                breakfast,
                lunch,
                dinner,
                snack,
                total: format_calories(plan.total_calories),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_schedule_day(svc: &PlanService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let plan = svc.day_plan(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{}", date.format("%A %Y-%m-%d"));
    if plan.meals.is_empty() {
        println!("  Nothing scheduled");
    }
    for slot in &plan.meals {
        println!(
            "  {} ({} kcal)",
            slot.meal_type,
            format_calories(slot.subtotal_calories)
        );
        for card in &slot.cards {
            println!(
                "    {:<30} {:>6} kcal",
                truncate(&card.name, 30),
                format_calories(card.calories)
            );
        }
    }
    println!("Total: {} kcal", format_calories(plan.total_calories));
    Ok(())
}
