/// Completion tools: completion_create, completion_get, completion_list,
/// completion_update and completion_delete

use schemars::JsonSchema;
use serde::Deserialize;

use crate::operations::{
    self, parse_completion_id, parse_habit_id, CompletionChanges, CompletionPage, CompletionQuery,
    NewCompletion, OperationError, RequestContext,
};
use crate::storage::HabitStorage;
use crate::tools::ToolResponse;

/// Parameters for recording a completion
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateCompletionParams {
    /// ID of the habit that was done
    pub habit_id: String,
    /// Day the completion counts for (YYYY-MM-DD, defaults to today)
    pub completion_date: Option<String>,
    /// How many times it was done that day (defaults to 1)
    pub count: Option<u32>,
    pub notes: Option<String>,
}

/// Parameters naming a single completion
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompletionIdParams {
    pub completion_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListCompletionsParams {
    /// Only completions of this habit
    pub habit_id: Option<String>,
    /// Earliest completion date to include (YYYY-MM-DD)
    pub start_date: Option<String>,
    /// Latest completion date to include (YYYY-MM-DD)
    pub end_date: Option<String>,
    /// Page size, 1-1000 (defaults to 50)
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Parameters for editing a completion; omitted fields are left unchanged
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateCompletionParams {
    pub completion_id: String,
    pub count: Option<u32>,
    /// Empty text clears the notes
    pub notes: Option<String>,
}

pub fn completion_create<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: CreateCompletionParams,
) -> Result<ToolResponse, OperationError> {
    let request = NewCompletion {
        habit_id: parse_habit_id(&params.habit_id)?,
        completion_date: params.completion_date,
        count: params.count.unwrap_or(1),
        notes: params.notes,
    };

    let outcome = operations::create_completion(storage, ctx, request)?;
    Ok(ToolResponse::new(
        format!(
            "✅ Logged completion for {}\nCompletion ID: {}\n🔥 Current streak: {} (best {}) | Total: {}",
            outcome.completion.completion_date,
            outcome.completion.id,
            outcome.habit_stats.current_streak,
            outcome.habit_stats.best_streak,
            outcome.habit_stats.total_completions
        ),
        &outcome,
    ))
}

pub fn completion_get<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: CompletionIdParams,
) -> Result<ToolResponse, OperationError> {
    let completion_id = parse_completion_id(&params.completion_id)?;
    let completion = operations::get_completion(storage, ctx, &completion_id)?;

    Ok(ToolResponse::new(
        format!(
            "Completion of habit {} on {} (count {})",
            completion.habit_id, completion.completion_date, completion.count
        ),
        &completion,
    ))
}

pub fn completion_list<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: ListCompletionsParams,
) -> Result<ToolResponse, OperationError> {
    let habit_id = params.habit_id.as_deref().map(parse_habit_id).transpose()?;
    let query = CompletionQuery {
        habit_id: None,
        start_date: params.start_date,
        end_date: params.end_date,
        limit: params.limit,
        offset: params.offset,
    };

    let page = match &habit_id {
        Some(habit_id) => operations::list_habit_completions(storage, ctx, habit_id, query)?,
        None => operations::list_completions(storage, ctx, query)?,
    };

    Ok(ToolResponse::new(page_summary(&page), &page))
}

pub fn completion_update<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: UpdateCompletionParams,
) -> Result<ToolResponse, OperationError> {
    let completion_id = parse_completion_id(&params.completion_id)?;
    let changes = CompletionChanges {
        count: params.count,
        notes: params.notes,
    };

    let outcome = operations::update_completion(storage, ctx, &completion_id, changes)?;
    Ok(ToolResponse::new(
        format!(
            "✏️ Updated completion {} | Habit total: {}",
            completion_id, outcome.habit_stats.total_completions
        ),
        &outcome,
    ))
}

pub fn completion_delete<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    params: CompletionIdParams,
) -> Result<ToolResponse, OperationError> {
    let completion_id = parse_completion_id(&params.completion_id)?;
    let stats = operations::delete_completion(storage, ctx, &completion_id)?;

    Ok(ToolResponse::new(
        format!(
            "🗑️ Deleted completion {} | Habit total: {}",
            completion_id, stats.total_completions
        ),
        &stats,
    ))
}

fn page_summary(page: &CompletionPage) -> String {
    if page.completions.is_empty() {
        return format!("No completions found ({} total)", page.total);
    }
    let first = u64::from(page.offset) + 1;
    let last = u64::from(page.offset) + page.completions.len() as u64;
    format!("📅 Completions {}-{} of {}", first, last, page.total)
}
