use thiserror::Error;

use crate::models::MealType;

/// Domain failures raised by the planner.
///
/// These travel inside `anyhow::Error`; callers that need to branch on them
/// use `err.downcast_ref::<PlanError>()`. Any error that does not downcast is a
/// persistence failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Ingredient '{0}' already exists")]
    DuplicateKey(String),

    #[error("Food card '{card}' is not available for {meal_type}")]
    CategoryMismatch { card: String, meal_type: MealType },

    #[error("{0} not found")]
    NotFound(String),

    #[error(
        "Removing {} unschedules the card from {} cell(s); confirmation required",
        join_meals(.removed),
        .affected
    )]
    ConfirmationRequired {
        removed: Vec<MealType>,
        affected: usize,
    },
}

fn join_meals(meals: &[MealType]) -> String {
    meals
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Find the `PlanError` carried by an `anyhow::Error`, if any.
pub fn plan_error(err: &anyhow::Error) -> Option<&PlanError> {
    err.downcast_ref::<PlanError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_message_lists_meals() {
        let err = PlanError::ConfirmationRequired {
            removed: vec![MealType::Lunch, MealType::Dinner],
            affected: 3,
        };
        assert_eq!(
            err.to_string(),
            "Removing Lunch, Dinner unschedules the card from 3 cell(s); confirmation required"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = PlanError::DuplicateKey("rice".to_string()).into();
        assert_eq!(
            plan_error(&err),
            Some(&PlanError::DuplicateKey("rice".to_string()))
        );

        let other = anyhow::anyhow!("disk full");
        assert!(plan_error(&other).is_none());
    }
}
