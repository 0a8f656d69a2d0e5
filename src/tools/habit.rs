/// Habit tools: habit_create, habit_get, habit_list, habit_update and
/// habit_delete

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::operations::{
    self, parse_habit_id, HabitChanges, NewHabit, OperationError, RequestContext,
};
use crate::storage::HabitStorage;
use crate::tools::ToolResponse;

/// Parameters for creating a habit
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateHabitParams {
    /// Name of the habit, e.g. "Morning Run"
    pub name: String,
    /// One of daily, weekly or monthly
    pub frequency: String,
    /// Times per scheduled day (defaults to 1)
    pub target_count: Option<u32>,
    pub description: Option<String>,
    /// Why this habit matters
    pub motivation: Option<String>,
    pub category: Option<String>,
    /// Display color as #RRGGBB
    pub color: Option<String>,
    /// Weekday names for weekly habits, or day numbers 1-28 and "last"
    /// for monthly habits
    pub target_days: Option<Value>,
}

/// Parameters naming a single habit
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HabitIdParams {
    pub habit_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListHabitsParams {
    /// Show only active habits (defaults to true)
    pub active_only: Option<bool>,
}

/// Parameters for updating a habit; omitted fields are left unchanged
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateHabitParams {
    pub habit_id: String,
    pub name: Option<String>,
    /// Empty text clears the description
    pub description: Option<String>,
    pub motivation: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub frequency: Option<String>,
    pub target_count: Option<u32>,
    /// New schedule; null clears it
    #[serde(default, deserialize_with = "deserialize_present")]
    #[schemars(with = "Option<Value>")]
    pub target_days: Option<Value>,
    /// Pause (false) or resume (true) the habit
    pub is_active: Option<bool>,
}

/// Keep an explicit `null` as `Some(Value::Null)` so it can clear a field
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub fn habit_create<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: CreateHabitParams,
) -> Result<ToolResponse, OperationError> {
    let request = NewHabit {
        name: params.name,
        frequency: params.frequency,
        target_count: params.target_count,
        description: params.description,
        motivation: params.motivation,
        category: params.category,
        color: params.color,
        target_days: params.target_days,
    };

    let habit = operations::create_habit(storage, ctx, request)?;
    Ok(ToolResponse::new(
        format!("✅ Created habit '{}'\nHabit ID: {}", habit.name, habit.id()),
        &habit,
    ))
}

pub fn habit_get<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: HabitIdParams,
) -> Result<ToolResponse, OperationError> {
    let habit_id = parse_habit_id(&params.habit_id)?;
    let habit = operations::get_habit(storage, ctx, &habit_id)?;

    Ok(ToolResponse::new(
        format!(
            "🎯 {} ({}) | 🔥 Streak: {} (best {}) | ✅ Total: {}{}",
            habit.name,
            habit.frequency,
            habit.current_streak(),
            habit.best_streak(),
            habit.total_completions(),
            if habit.is_active { "" } else { " ⏸️ (paused)" }
        ),
        &habit,
    ))
}

pub fn habit_list<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: ListHabitsParams,
) -> Result<ToolResponse, OperationError> {
    let habits = operations::list_habits(storage, ctx, params.active_only.unwrap_or(true))?;

    if habits.is_empty() {
        return Ok(ToolResponse::message_only(
            "No habits found. Create your first habit to get started!",
        ));
    }

    let summary = habits
        .iter()
        .map(|h| format!("🎯 {} ({}) | 🔥 {} | ✅ {} | {}", h.name, h.frequency, h.current_streak(), h.total_completions(), h.id()))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ToolResponse::new(
        format!("📋 {} habit(s)\n\n{}", habits.len(), summary),
        &habits,
    ))
}

pub fn habit_update<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: UpdateHabitParams,
) -> Result<ToolResponse, OperationError> {
    let habit_id = parse_habit_id(&params.habit_id)?;
    let changes = HabitChanges {
        name: params.name,
        description: params.description,
        motivation: params.motivation,
        category: params.category,
        color: params.color,
        frequency: params.frequency,
        target_count: params.target_count,
        target_days: params.target_days,
        is_active: params.is_active,
    };

    if changes.is_empty() {
        return Err(OperationError::InvalidInput(
            "nothing to update: supply at least one field".to_string(),
        ));
    }

    let habit = operations::update_habit(storage, ctx, &habit_id, changes)?;
    Ok(ToolResponse::new(format!("✏️ Updated habit '{}'", habit.name), &habit))
}

pub fn habit_delete<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: HabitIdParams,
) -> Result<ToolResponse, OperationError> {
    let habit_id = parse_habit_id(&params.habit_id)?;
    operations::delete_habit(storage, ctx, &habit_id)?;

    Ok(ToolResponse::message_only(format!(
        "🗑️ Deleted habit {} and its completions",
        habit_id
    )))
}
