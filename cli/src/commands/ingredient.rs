use anyhow::{Result, bail};

use mealgrid_core::models::parse_calories;
use mealgrid_core::service::PlanService;

use super::helpers::{exit_not_found, print_ingredient_table, prompt_confirm};

pub(crate) fn cmd_ingredient_add(
    svc: &mut PlanService,
    name: &str,
    calories: &str,
    unit: &str,
    json: bool,
) -> Result<()> {
    let calories_per_unit = parse_calories(calories)?;
    let ingredient = svc.add_ingredient(name, calories_per_unit, unit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        println!(
            "Added {}: {} kcal per {}",
            ingredient.name, ingredient.calories_per_unit, ingredient.unit
        );
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(
    svc: &PlanService,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let ingredients = svc.list_ingredients(search);

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
    } else if ingredients.is_empty() {
        eprintln!("No ingredients found. Use `mealgrid ingredient add` to create one.");
    } else {
        print_ingredient_table(&ingredients);
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_refs(svc: &PlanService, name: &str, json: bool) -> Result<()> {
    let references = svc.ingredient_references(name);
    if json {
        println!(
            "{}",
            serde_json::json!({ "ingredient": name, "referenced_by": references })
        );
    } else {
        println!("'{name}' is used by {references} food card(s)");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_remove(
    svc: &mut PlanService,
    name: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    if !svc.nutrition().contains(name) {
        exit_not_found(&format!("Ingredient '{name}' not found"), json);
    }

    let references = svc.ingredient_references(name);
    if references > 0 && !yes {
        if json {
            bail!("'{name}' is used by {references} food card(s); pass --yes to remove it anyway");
        }
        eprintln!(
            "'{name}' is used by {references} food card(s). Their calories will count it as 0 once they are saved again."
        );
        if !prompt_confirm("Remove it anyway?")? {
            eprintln!("Aborted");
            return Ok(());
        }
    }

    if !svc.remove_ingredient(name)? {
        exit_not_found(&format!("Ingredient '{name}' not found"), json);
    }

    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": name, "referenced_by": references })
        );
    } else {
        println!("Removed ingredient '{name}'");
    }
    Ok(())
}
