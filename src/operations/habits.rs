/// Habit operations: create, read, update and delete
///
/// Statistics are never written here; they only move through the
/// completion operations.

use serde_json::Value;

use crate::domain::{Frequency, Habit, HabitId, TargetDaySchedule};
use crate::operations::{load_owned_habit, OperationError, RequestContext};
use crate::storage::HabitStorage;

/// Color given to habits created without one
pub const DEFAULT_COLOR: &str = "#4A90D9";

/// Everything needed to create a habit
#[derive(Debug, Clone, Default)]
pub struct NewHabit {
    pub name: String,
    pub frequency: String,
    /// Defaults to 1
    pub target_count: Option<u32>,
    pub description: Option<String>,
    pub motivation: Option<String>,
    pub category: Option<String>,
    /// Defaults to [`DEFAULT_COLOR`]
    pub color: Option<String>,
    /// Raw day markers, e.g. `["monday", "friday"]` or `[1, 15, "last"]`
    pub target_days: Option<Value>,
}

/// Changes to apply to an existing habit; `None` leaves a field alone
///
/// Blank description, motivation or category clears the field.
#[derive(Debug, Clone, Default)]
pub struct HabitChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub motivation: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub frequency: Option<String>,
    pub target_count: Option<u32>,
    pub target_days: Option<Value>,
    pub is_active: Option<bool>,
}

impl HabitChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.motivation.is_none()
            && self.category.is_none()
            && self.color.is_none()
            && self.frequency.is_none()
            && self.target_count.is_none()
            && self.target_days.is_none()
            && self.is_active.is_none()
    }
}

fn parse_schedule(raw: Option<&Value>) -> Result<Option<TargetDaySchedule>, OperationError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(TargetDaySchedule::parse(value)?)),
    }
}

/// Create a habit owned by the requesting user
pub fn create_habit<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    request: NewHabit,
) -> Result<Habit, OperationError> {
    let frequency: Frequency = request.frequency.parse()?;
    let target_days = parse_schedule(request.target_days.as_ref())?;

    let habit = Habit::new(
        HabitId::new(),
        ctx.user_id.clone(),
        &request.name,
        frequency,
        request.target_count.unwrap_or(1),
        request.description.as_deref(),
        request.motivation.as_deref(),
        request.category.as_deref(),
        target_days,
        request.color.as_deref().unwrap_or(DEFAULT_COLOR),
    )?;

    storage.transaction(ctx.deadline, |repo| repo.insert_habit(&habit))?;

    tracing::info!("Created habit '{}' ({}) for user {}", habit.name, habit.id(), ctx.user_id);
    Ok(habit)
}

pub fn get_habit<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    habit_id: &HabitId,
) -> Result<Habit, OperationError> {
    storage.read(|repo| load_owned_habit(repo, ctx, habit_id))
}

/// The requesting user's habits, newest first
pub fn list_habits<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    active_only: bool,
) -> Result<Vec<Habit>, OperationError> {
    storage.read(|repo| Ok(repo.find_habits_by_user(&ctx.user_id, active_only)?))
}

/// Apply `changes` to a habit and persist its configuration
///
/// The whole habit is re-validated before anything is written. A new
/// frequency without a new schedule must still fit the existing schedule.
pub fn update_habit<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    habit_id: &HabitId,
    changes: HabitChanges,
) -> Result<Habit, OperationError> {
    let new_frequency = changes.frequency.as_deref().map(str::parse::<Frequency>).transpose()?;
    let new_schedule = parse_schedule(changes.target_days.as_ref())?;

    let habit = storage.transaction(ctx.deadline, |repo| {
        let mut habit = load_owned_habit(repo, ctx, habit_id)?;

        if let Some(name) = &changes.name {
            habit.name = name.trim().to_string();
        }
        if let Some(description) = &changes.description {
            habit.set_description(description);
        }
        if let Some(motivation) = &changes.motivation {
            habit.set_motivation(motivation);
        }
        if let Some(color) = &changes.color {
            habit.color = color.trim().to_string();
        }
        if let Some(category) = &changes.category {
            habit.set_category(category);
        }
        if let Some(frequency) = new_frequency {
            habit.frequency = frequency;
        }
        if let Some(target_count) = changes.target_count {
            habit.target_count = target_count;
        }

        if changes.target_days.is_some() {
            habit.set_target_days(new_schedule)?;
        } else if new_frequency.is_some() {
            let current = habit.target_days().cloned();
            habit.set_target_days(current)?;
        }

        if let Some(is_active) = changes.is_active {
            if is_active {
                habit.activate();
            } else {
                habit.deactivate();
            }
        }

        habit.touch(ctx.now);
        habit.validate()?;

        repo.update_habit(&habit)?;
        Ok::<_, OperationError>(habit)
    })?;

    tracing::info!("Updated habit '{}' ({})", habit.name, habit.id());
    Ok(habit)
}

/// Delete a habit and every completion recorded for it
pub fn delete_habit<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    habit_id: &HabitId,
) -> Result<(), OperationError> {
    storage.transaction(ctx.deadline, |repo| {
        load_owned_habit(repo, ctx, habit_id)?;
        repo.delete_habit(habit_id)?;
        Ok::<_, OperationError>(())
    })?;

    tracing::info!("Deleted habit {}", habit_id);
    Ok(())
}
