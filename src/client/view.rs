use tracing::{debug, warn};
use uuid::Uuid;

use super::{api::HistoryApi, api::HistorySummary, ClientError};
use crate::history::repo_types::HistoryEntry;

/// Identifies one load request. Only the most recently issued ticket may
/// change what a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
struct Sequencer {
    issued: u64,
}

impl Sequencer {
    fn next(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Ready(Vec<HistorySummary>),
}

/// Snapshot taken before an optimistic delete.
#[derive(Debug)]
#[must_use = "settle the delete once the request finishes"]
pub struct PendingDelete {
    pub id: Uuid,
    snapshot: ListState,
    issued: u64,
    removed: Option<(usize, HistorySummary)>,
}

/// Sidebar list of past searches.
#[derive(Debug)]
pub struct HistoryView {
    state: ListState,
    seq: Sequencer,
}

impl Default for HistoryView {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryView {
    pub fn new() -> Self {
        Self {
            state: ListState::Loading,
            seq: Sequencer::default(),
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn entries(&self) -> &[HistorySummary] {
        match &self.state {
            ListState::Ready(entries) => entries,
            ListState::Loading => &[],
        }
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.seq.next()
    }

    /// Returns `false` when the response was stale and ignored.
    pub fn apply_load(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<HistorySummary>, ClientError>,
    ) -> bool {
        if !self.seq.is_current(ticket) {
            debug!(?ticket, "dropping stale history list response");
            return false;
        }
        self.state = match result {
            Ok(entries) => ListState::Ready(entries),
            Err(e) => {
                warn!(error = %e, "failed to fetch history");
                ListState::Ready(Vec::new())
            }
        };
        true
    }

    /// Without a token there is nothing to fetch; the list is shown empty.
    pub async fn load(&mut self, api: &dyn HistoryApi, token: Option<&str>) {
        let ticket = self.begin_load();
        let result = match token {
            Some(token) => api.list_history(token).await,
            None => Ok(Vec::new()),
        };
        self.apply_load(ticket, result);
    }

    /// Remove `id` from the displayed list right away.
    pub fn begin_delete(&mut self, id: Uuid) -> PendingDelete {
        let snapshot = self.state.clone();
        let mut removed = None;
        if let ListState::Ready(entries) = &mut self.state {
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                removed = Some((pos, entries.remove(pos)));
            }
        }
        PendingDelete {
            id,
            snapshot,
            issued: self.seq.issued,
            removed,
        }
    }

    /// On failure the list goes back to what it was before the delete. If a
    /// load was issued in the meantime only the removed entry is put back.
    pub fn settle_delete(
        &mut self,
        pending: PendingDelete,
        result: Result<(), ClientError>,
    ) -> Result<(), ClientError> {
        let Err(e) = result else {
            return Ok(());
        };
        warn!(error = %e, id = %pending.id, "delete failed; restoring list");
        if self.seq.issued == pending.issued {
            self.state = pending.snapshot;
            return Err(e);
        }
        if let (ListState::Ready(entries), Some((pos, item))) = (&mut self.state, pending.removed) {
            if !entries.iter().any(|e| e.id == item.id) {
                entries.insert(pos.min(entries.len()), item);
            }
        }
        Err(e)
    }

    pub async fn delete(
        &mut self,
        api: &dyn HistoryApi,
        token: Option<&str>,
        id: Uuid,
    ) -> Result<(), ClientError> {
        let pending = self.begin_delete(id);
        let result = match token {
            Some(token) => api.delete_history(token, id).await,
            None => Err(ClientError::NotSignedIn),
        };
        self.settle_delete(pending, result)
    }

    /// Route of the detail view for an entry.
    pub fn select(&self, id: Uuid) -> String {
        format!("/history/{id}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    Loaded(HistoryEntry),
    Missing,
}

/// Full view of one entry, fetched independently of the list.
#[derive(Debug)]
pub struct DetailView {
    state: DetailState,
    seq: Sequencer,
}

impl Default for DetailView {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailView {
    pub fn new() -> Self {
        Self {
            state: DetailState::Loading,
            seq: Sequencer::default(),
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn begin_load(&mut self) -> Ticket {
        self.state = DetailState::Loading;
        self.seq.next()
    }

    pub fn apply_load(
        &mut self,
        ticket: Ticket,
        result: Result<HistoryEntry, ClientError>,
    ) -> bool {
        if !self.seq.is_current(ticket) {
            debug!(?ticket, "dropping stale history detail response");
            return false;
        }
        self.state = match result {
            Ok(entry) => DetailState::Loaded(entry),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(error = %e, "failed to fetch history entry");
                }
                DetailState::Missing
            }
        };
        true
    }

    pub async fn load(&mut self, api: &dyn HistoryApi, token: Option<&str>, id: Uuid) {
        let ticket = self.begin_load();
        let result = match token {
            Some(token) => api.get_history(token, id).await,
            None => Err(ClientError::NotSignedIn),
        };
        self.apply_load(ticket, result);
    }
}
