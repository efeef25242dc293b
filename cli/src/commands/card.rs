use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealgrid_core::error::{PlanError, plan_error};
use mealgrid_core::models::{CardDraft, CategoryFilter, MEAL_TYPES, MealType};
use mealgrid_core::service::PlanService;

use super::helpers::{
    exit_not_found, format_calories, format_categories, or_not_found,
    parse_categories, parse_ingredient_arg, print_card_table, prompt_confirm,
};

pub(crate) fn cmd_card_create(
    svc: &mut PlanService,
    name: &str,
    categories: &[String],
    ingredients: &[String],
    json: bool,
) -> Result<()> {
    let draft = CardDraft {
        name: name.to_string(),
        categories: parse_categories(categories)?,
        ingredients: ingredients
            .iter()
            .map(|s| parse_ingredient_arg(s))
            .collect::<Result<_>>()?,
    };
    let card = svc.create_card(&draft)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&card)?);
    } else {
        println!(
            "Created {} ({}): {} kcal [{}]",
            card.name,
            card.id,
            format_calories(card.calories),
            format_categories(&card.categories)
        );
    }
    Ok(())
}

pub(crate) fn cmd_card_update(
    svc: &mut PlanService,
    id: &str,
    name: Option<String>,
    categories: &[String],
    ingredients: &[String],
    yes: bool,
    json: bool,
) -> Result<()> {
    let existing = or_not_found(svc.get_card(id), json)?;
    let mut draft = CardDraft::from(existing);
    if let Some(name) = name {
        draft.name = name;
    }
    if !categories.is_empty() {
        draft.categories = parse_categories(categories)?;
    }
    if !ingredients.is_empty() {
        draft.ingredients = ingredients
            .iter()
            .map(|s| parse_ingredient_arg(s))
            .collect::<Result<_>>()?;
    }

    let card = match svc.update_card(id, &draft, yes) {
        Ok(card) => card,
        Err(e) if matches!(plan_error(&e), Some(PlanError::ConfirmationRequired { .. })) => {
            if json {
                let preview = svc.preview_cascade(id, &draft.categories)?;
                println!(
                    "{}",
                    serde_json::json!({ "error": e.to_string(), "preview": preview })
                );
                std::process::exit(1);
            }
            eprintln!("{e}");
            if !prompt_confirm("Save and unschedule?")? {
                eprintln!("Aborted; card not saved");
                return Ok(());
            }
            svc.update_card(id, &draft, true)?
        }
        Err(e) => or_not_found(Err(e), json)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&card)?);
    } else {
        println!(
            "Updated {}: {} kcal [{}]",
            card.name,
            format_calories(card.calories),
            format_categories(&card.categories)
        );
    }
    Ok(())
}

pub(crate) fn cmd_card_preview(
    svc: &PlanService,
    id: &str,
    categories: &[String],
    json: bool,
) -> Result<()> {
    let categories = parse_categories(categories)?;
    let preview = or_not_found(svc.preview_cascade(id, &categories), json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else if !preview.requires_confirmation() {
        println!("No categories removed; nothing would be unscheduled");
    } else {
        let removed: Vec<&str> = preview
            .removed_categories
            .iter()
            .map(|m| m.as_str())
            .collect();
        println!(
            "Removing {} would unschedule {} cell(s):",
            removed.join(", "),
            preview.affected.len()
        );
        for row in &preview.affected {
            println!("  {}", row.cell());
        }
    }
    Ok(())
}

pub(crate) fn cmd_card_show(svc: &PlanService, id: &str, json: bool) -> Result<()> {
    let card = or_not_found(svc.get_card(id), json)?;
    let breakdown = svc.line_breakdown(card);

    if json {
        println!(
            "{}",
            serde_json::json!({ "card": card, "line_calories": breakdown })
        );
        return Ok(());
    }

    #[derive(Tabled)]
    struct LineRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Unit")]
        unit: String,
        #[tabled(rename = "kcal")]
        calories: String,
    }

    println!("{} ({})", card.name, card.id);
    println!("Categories: {}", format_categories(&card.categories));
    let rows: Vec<LineRow> = card
        .ingredients
        .iter()
        .zip(&breakdown)
        .map(|(line, kcal)| LineRow {
            name: if svc.nutrition().contains(&line.name) {
                line.name.clone()
            } else {
                format!("{} (unknown)", line.name)
            },
            amount: line.amount.map_or("-".into(), |a| format!("{a}")),
            unit: line.unit.clone(),
            calories: format_calories(*kcal),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("Total: {} kcal", format_calories(card.calories));
    Ok(())
}

pub(crate) fn cmd_card_list(
    svc: &PlanService,
    category: Option<&str>,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let filter = match category {
        Some(c) => c.parse::<CategoryFilter>()?,
        None => CategoryFilter::All,
    };
    let cards = svc.filter_cards(filter, search.unwrap_or(""));

    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }

    let counts: Vec<String> = std::iter::once(("All".to_string(), CategoryFilter::All))
        .chain(
            MEAL_TYPES
                .iter()
                .map(|m| (m.to_string(), CategoryFilter::Only(*m))),
        )
        .map(|(label, f)| format!("{label} {}", svc.catalog().category_count(f)))
        .collect();
    println!("{}", counts.join(" | "));

    if cards.is_empty() {
        eprintln!("No food cards found. Use `mealgrid card create` to add one.");
    } else {
        print_card_table(&cards);
    }
    Ok(())
}

pub(crate) fn cmd_card_slot(
    svc: &PlanService,
    meal_type: MealType,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let cards = svc.cards_for_slot(meal_type, search.unwrap_or(""));
    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
    } else if cards.is_empty() {
        eprintln!("No food cards available for {meal_type}");
    } else {
        print_card_table(&cards);
    }
    Ok(())
}

pub(crate) fn cmd_card_delete(svc: &mut PlanService, id: &str, json: bool) -> Result<()> {
    if svc.delete_card(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted food card {id} and all of its schedule entries");
        }
        Ok(())
    } else {
        exit_not_found(&format!("Food card {id} not found"), json)
    }
}

pub(crate) fn cmd_card_stale(svc: &PlanService, json: bool) -> Result<()> {
    let stale = svc.stale_cards();

    if json {
        println!("{}", serde_json::to_string_pretty(&stale)?);
    } else if stale.is_empty() {
        println!("All food card calories match the nutrition table");
    } else {
        #[derive(Tabled)]
        struct StaleRow {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Saved kcal")]
            cached: String,
            #[tabled(rename = "Current kcal")]
            current: String,
        }

        let rows: Vec<StaleRow> = stale
            .iter()
            .map(|s| StaleRow {
                id: s.id.clone(),
                name: s.name.clone(),
                cached: format_calories(s.cached_calories),
                current: format_calories(s.current_calories),
            })
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
        eprintln!("Re-save a card with `mealgrid card update <id>` to recompute it.");
    }
    Ok(())
}
