/// Completion lifecycle: record, edit, remove and look up completions
///
/// Each write loads the owning habit, applies the statistics change in
/// memory and then stores the completion and the habit's statistics in the
/// same transaction. Either both land or neither does.

use serde::Serialize;

use crate::domain::{parse_date, Completion, CompletionId, HabitId, HabitStats};
use crate::operations::{load_owned_habit, OperationError, RequestContext};
use crate::storage::{CompletionFilter, HabitRepository, HabitStorage};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A completion to record
#[derive(Debug, Clone)]
pub struct NewCompletion {
    pub habit_id: HabitId,
    /// `YYYY-MM-DD`; the requester's current UTC day when absent
    pub completion_date: Option<String>,
    pub count: u32,
    pub notes: Option<String>,
}

/// Changes to an existing completion; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct CompletionChanges {
    pub count: Option<u32>,
    /// Blank notes clear the field
    pub notes: Option<String>,
}

/// Filters and paging for completion listings
#[derive(Debug, Clone, Default)]
pub struct CompletionQuery {
    pub habit_id: Option<HabitId>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One page of completions plus the number of matches overall
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPage {
    pub completions: Vec<Completion>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// A completion write and the owning habit's statistics after it
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub completion: Completion,
    pub habit_stats: HabitStats,
}

/// Record that a habit was done on a day
///
/// Fails with `AlreadyExists` when the habit already has a completion for
/// that date. The habit's total grows by `count`; its streak moves as the
/// request's [`crate::domain::StreakPolicy`] decides.
pub fn create_completion<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    request: NewCompletion,
) -> Result<CompletionOutcome, OperationError> {
    let outcome = storage.transaction(ctx.deadline, |repo| {
        let mut habit = load_owned_habit(repo, ctx, &request.habit_id)?;

        let completion_date = match request.completion_date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => ctx.today(),
        };

        if repo.find_completion_by_date(habit.id(), completion_date)?.is_some() {
            return Err(OperationError::AlreadyExists(format!(
                "habit {} already has a completion on {}",
                habit.id(),
                completion_date
            )));
        }

        let completion = Completion::new(
            CompletionId::new(),
            habit.id().clone(),
            ctx.user_id.clone(),
            completion_date,
            request.count,
            request.notes.as_deref(),
        )?;

        let previous = if ctx.streak_policy.needs_previous_completion() {
            repo.latest_completion_date_before(habit.id(), completion_date)?
        } else {
            None
        };

        habit.increment_completions(completion.count);
        ctx.streak_policy
            .evaluate(completion_date, ctx.now, previous, habit.current_streak())
            .apply(&mut habit);
        habit.touch(ctx.now);

        repo.insert_completion(&completion)?;
        repo.update_habit_stats(&habit)?;

        Ok::<_, OperationError>(CompletionOutcome {
            completion,
            habit_stats: habit.stats(),
        })
    })?;

    tracing::info!(
        "Recorded completion {} for habit {} on {} (streak {})",
        outcome.completion.id,
        outcome.completion.habit_id,
        outcome.completion.completion_date,
        outcome.habit_stats.current_streak
    );
    Ok(outcome)
}

/// Change a completion's count or notes
///
/// The habit's total shifts by the difference between the new and the old
/// count. Streaks are not touched.
pub fn update_completion<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    completion_id: &CompletionId,
    changes: CompletionChanges,
) -> Result<CompletionOutcome, OperationError> {
    let outcome = storage.transaction(ctx.deadline, |repo| {
        let original = load_owned_completion(repo, ctx, completion_id)?;

        let mut updated = original.clone();
        if let Some(count) = changes.count {
            updated.count = count;
        }
        if let Some(notes) = &changes.notes {
            updated.set_notes(notes);
        }
        updated.validate()?;

        let mut habit = repo
            .find_habit(&updated.habit_id)?
            .ok_or_else(|| OperationError::habit_not_found(&updated.habit_id))?;
        habit.adjust_completions(original.count, updated.count);
        habit.touch(ctx.now);

        repo.update_completion(&updated)?;
        repo.update_habit_stats(&habit)?;

        Ok::<_, OperationError>(CompletionOutcome {
            completion: updated,
            habit_stats: habit.stats(),
        })
    })?;

    tracing::info!("Updated completion {}", completion_id);
    Ok(outcome)
}

/// Remove a completion and take its count off the habit's total
///
/// The total never drops below zero. A streak the completion extended is
/// left as it is.
pub fn delete_completion<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    completion_id: &CompletionId,
) -> Result<HabitStats, OperationError> {
    let stats = storage.transaction(ctx.deadline, |repo| {
        let completion = load_owned_completion(repo, ctx, completion_id)?;

        let mut habit = repo
            .find_habit(&completion.habit_id)?
            .ok_or_else(|| OperationError::habit_not_found(&completion.habit_id))?;
        habit.decrement_completions(completion.count);
        habit.touch(ctx.now);

        repo.delete_completion(completion_id)?;
        repo.update_habit_stats(&habit)?;

        Ok::<_, OperationError>(habit.stats())
    })?;

    tracing::info!("Deleted completion {}", completion_id);
    Ok(stats)
}

pub fn get_completion<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    completion_id: &CompletionId,
) -> Result<Completion, OperationError> {
    storage.read(|repo| load_owned_completion(repo, ctx, completion_id))
}

/// The requesting user's completions, newest completion date first
pub fn list_completions<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    query: CompletionQuery,
) -> Result<CompletionPage, OperationError> {
    let (filter, limit, offset) = build_filter(ctx, query)?;

    storage.read(|repo| fetch_page(repo, &filter, limit, offset))
}

/// Completions of one habit, after checking the requester owns it
pub fn list_habit_completions<S: HabitStorage>(
    storage: &S,
    ctx: &RequestContext,
    habit_id: &HabitId,
    query: CompletionQuery,
) -> Result<CompletionPage, OperationError> {
    let (mut filter, limit, offset) = build_filter(ctx, query)?;
    filter.habit_id = Some(habit_id.clone());

    storage.read(|repo| {
        load_owned_habit(repo, ctx, habit_id)?;
        fetch_page(repo, &filter, limit, offset)
    })
}

fn load_owned_completion(
    repo: &dyn HabitRepository,
    ctx: &RequestContext,
    completion_id: &CompletionId,
) -> Result<Completion, OperationError> {
    let completion = repo
        .find_completion(completion_id)?
        .ok_or_else(|| OperationError::completion_not_found(completion_id))?;

    if !completion.is_owned_by(&ctx.user_id) {
        tracing::warn!("User {} denied access to completion {}", ctx.user_id, completion_id);
        return Err(OperationError::Forbidden(format!(
            "completion {} belongs to another user",
            completion_id
        )));
    }

    Ok(completion)
}

fn build_filter(
    ctx: &RequestContext,
    query: CompletionQuery,
) -> Result<(CompletionFilter, u32, u32), OperationError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(OperationError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let start_date = query.start_date.as_deref().map(parse_date).transpose()?;
    let end_date = query.end_date.as_deref().map(parse_date).transpose()?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(OperationError::InvalidInput(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
    }

    let filter = CompletionFilter {
        user_id: ctx.user_id.clone(),
        habit_id: query.habit_id,
        start_date,
        end_date,
    };
    Ok((filter, limit, query.offset.unwrap_or(0)))
}

fn fetch_page(
    repo: &dyn HabitRepository,
    filter: &CompletionFilter,
    limit: u32,
    offset: u32,
) -> Result<CompletionPage, OperationError> {
    Ok(CompletionPage {
        completions: repo.list_completions(filter, limit, offset)?,
        total: repo.count_completions(filter)?,
        limit,
        offset,
    })
}
