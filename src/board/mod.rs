//! In-memory kanban board state.
//!
//! The store holds the expanded issue list plus the active filters, and
//! applies drag-and-drop moves optimistically: the in-memory card moves
//! first, persistence runs second, and a persistence failure puts the
//! card back exactly where it was. Observers are told about every state
//! change so a frontend can re-render without polling.

use uuid::Uuid;

use crate::db::DONE_BOARD_COLUMN;
use crate::error::Result;
use crate::types::{IssueDetails, IssueState, Priority};

pub const BOARD_COLUMNS: [&str; 5] = ["backlog", "todo", "in-progress", "review", "done"];

pub trait IssueFeed {
    fn fetch_board(&self, sync: bool) -> Result<Vec<IssueDetails>>;
}

pub trait MovePersister {
    fn persist_move(
        &self,
        issue_id: Uuid,
        column: &str,
        position: i64,
        state: IssueState,
    ) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    Loading,
    Loaded { count: usize },
    LoadFailed { error: String },
    MoveApplied { issue_id: Uuid },
    MoveReverted { issue_id: Uuid, error: String },
}

/// `None` in the state and priority slots means "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardFilters {
    pub state: Option<IssueState>,
    pub priority: Option<Priority>,
    pub tag_ids: Vec<Uuid>,
    pub group_ids: Vec<Uuid>,
    pub assignee_ids: Vec<Uuid>,
    pub text: Option<String>,
}

impl BoardFilters {
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.priority.is_none()
            && self.tag_ids.is_empty()
            && self.group_ids.is_empty()
            && self.assignee_ids.is_empty()
            && self.text.as_deref().is_none_or(str::is_empty)
    }
}

/// Whether a card passes the active filters. Dimensions combine with AND;
/// state and priority are exact matches, inside the tag, group and
/// assignee sets any one match is enough, and the text filter is a
/// case-insensitive substring search over title and body.
pub fn matches_filters(details: &IssueDetails, filters: &BoardFilters) -> bool {
    if let Some(state) = filters.state
        && details.issue.state != state
    {
        return false;
    }

    if let Some(priority) = filters.priority
        && details.issue.priority != priority
    {
        return false;
    }

    if !filters.tag_ids.is_empty()
        && !details
            .tags
            .iter()
            .any(|tag| filters.tag_ids.contains(&tag.id))
    {
        return false;
    }

    if !filters.group_ids.is_empty()
        && !details
            .groups
            .iter()
            .any(|group| filters.group_ids.contains(&group.id))
    {
        return false;
    }

    if !filters.assignee_ids.is_empty()
        && !details
            .assignees
            .iter()
            .any(|assignee| filters.assignee_ids.contains(&assignee.id))
    {
        return false;
    }

    if let Some(text) = filters.text.as_deref()
        && !text.is_empty()
    {
        let needle = text.to_lowercase();
        let in_title = details.issue.title.to_lowercase().contains(&needle);
        let in_body = details
            .issue
            .body
            .as_deref()
            .is_some_and(|body| body.to_lowercase().contains(&needle));
        if !in_title && !in_body {
            return false;
        }
    }

    true
}

pub fn filter_issues<'a>(
    issues: &'a [IssueDetails],
    filters: &BoardFilters,
) -> Vec<&'a IssueDetails> {
    issues
        .iter()
        .filter(|details| matches_filters(details, filters))
        .collect()
}

/// Bucket cards into the fixed column order. Cards with an unknown column
/// value land in backlog; inside a column cards sort by position, ties
/// broken by issue number for a stable layout.
pub fn group_by_column<'a>(issues: &[&'a IssueDetails]) -> Vec<(&'static str, Vec<&'a IssueDetails>)> {
    let mut columns: Vec<(&'static str, Vec<&IssueDetails>)> = BOARD_COLUMNS
        .iter()
        .map(|name| (*name, Vec::new()))
        .collect();

    for details in issues {
        let idx = BOARD_COLUMNS
            .iter()
            .position(|name| *name == details.issue.board_column)
            .unwrap_or(0);
        columns[idx].1.push(details);
    }

    for (_, cards) in &mut columns {
        cards.sort_by_key(|details| (details.issue.board_position, details.issue.github_number));
    }
    columns
}

type Observer = Box<dyn Fn(&BoardEvent)>;

#[derive(Default)]
pub struct BoardStore {
    issues: Vec<IssueDetails>,
    filters: BoardFilters,
    loading: bool,
    error: Option<String>,
    observers: Vec<Observer>,
}

impl BoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issues(&self) -> &[IssueDetails] {
        &self.issues
    }

    pub fn filters(&self) -> &BoardFilters {
        &self.filters
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    fn notify(&self, event: &BoardEvent) {
        for observer in &self.observers {
            observer(event);
        }
    }

    pub fn set_filters(&mut self, filters: BoardFilters) {
        self.filters = filters;
    }

    pub fn visible(&self) -> Vec<&IssueDetails> {
        filter_issues(&self.issues, &self.filters)
    }

    pub fn columns(&self) -> Vec<(&'static str, Vec<&IssueDetails>)> {
        group_by_column(&self.visible())
    }

    /// Replace the board contents from the feed, optionally asking it to
    /// pull from the remote first. On failure the previous contents stay
    /// visible and the error is surfaced instead.
    pub fn refresh(&mut self, feed: &dyn IssueFeed, sync: bool) -> Result<()> {
        self.loading = true;
        self.notify(&BoardEvent::Loading);

        match feed.fetch_board(sync) {
            Ok(issues) => {
                self.loading = false;
                self.error = None;
                self.issues = issues;
                self.notify(&BoardEvent::Loaded {
                    count: self.issues.len(),
                });
                Ok(())
            }
            Err(err) => {
                self.loading = false;
                let message = err.to_string();
                self.error = Some(message.clone());
                self.notify(&BoardEvent::LoadFailed { error: message });
                Err(err)
            }
        }
    }

    /// Optimistically move a card. The in-memory card is updated before
    /// persistence runs; if persistence fails the card is restored to its
    /// captured pre-move column, position and state, and the error is
    /// both stored and returned.
    ///
    /// Landing in the done column closes the issue; landing anywhere else
    /// reopens it.
    pub fn move_issue(
        &mut self,
        persister: &dyn MovePersister,
        issue_id: Uuid,
        column: &str,
        position: i64,
    ) -> Result<()> {
        let Some(idx) = self
            .issues
            .iter()
            .position(|details| details.issue.id == issue_id)
        else {
            return Err(crate::error::Error::NotFound(format!("issue {issue_id}")));
        };

        let previous_column = self.issues[idx].issue.board_column.clone();
        let previous_position = self.issues[idx].issue.board_position;
        let previous_state = self.issues[idx].issue.state;

        let new_state = if column == DONE_BOARD_COLUMN {
            IssueState::Closed
        } else {
            IssueState::Open
        };

        {
            let issue = &mut self.issues[idx].issue;
            issue.board_column = column.to_string();
            issue.board_position = position;
            issue.state = new_state;
        }
        self.notify(&BoardEvent::MoveApplied { issue_id });

        match persister.persist_move(issue_id, column, position, new_state) {
            Ok(()) => {
                self.error = None;
                Ok(())
            }
            Err(err) => {
                let issue = &mut self.issues[idx].issue;
                issue.board_column = previous_column;
                issue.board_position = previous_position;
                issue.state = previous_state;

                let message = err.to_string();
                self.error = Some(message.clone());
                self.notify(&BoardEvent::MoveReverted {
                    issue_id,
                    error: message,
                });
                Err(err)
            }
        }
    }
}
