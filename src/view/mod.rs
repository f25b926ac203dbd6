pub mod pipeline;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    filter::{DateRange, SortConfig, SortField},
    trip::Trip,
};

/// Everything one viewer's dashboard holds. Only [`ViewState::apply`] mutates
/// it; the displayed list is derived by [`ViewState::visible`] on read.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub authenticated: bool,
    pub trips: Vec<Trip>,
    pub applied_seq: u64,
    pub search: String,
    pub date_range: DateRange,
    pub sort: SortConfig,
    pub auto_refresh: bool,
    pub initial_loading: bool,
    pub error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum Action {
    Authenticated,
    LoggedOut,
    FetchStarted {
        loud: bool,
    },
    FetchSucceeded {
        seq: u64,
        trips: Vec<Trip>,
        at: DateTime<Utc>,
    },
    FetchFailed {
        seq: u64,
        message: String,
    },
    FetchFinished {
        loud: bool,
    },
    SetSearch(String),
    SetDateFrom(Option<NaiveDate>),
    SetDateTo(Option<NaiveDate>),
    ClearFilters,
    SortBy(SortField),
    SetAutoRefresh(bool),
}

/// Whether an action changed the state. Fetch results older than the applied
/// one come back as `Stale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Stale,
}

impl ViewState {
    pub fn apply(&mut self, action: Action) -> Applied {
        match action {
            Action::Authenticated => self.authenticated = true,
            Action::LoggedOut => {
                self.authenticated = false;
                self.auto_refresh = false;
            }
            Action::FetchStarted { loud } => {
                if loud {
                    self.initial_loading = true;
                }
                self.error = None;
            }
            Action::FetchSucceeded { seq, trips, at } => {
                if seq <= self.applied_seq {
                    return Applied::Stale;
                }
                self.applied_seq = seq;
                self.trips = trips;
                self.last_refresh = Some(at);
            }
            Action::FetchFailed { seq, message } => {
                if seq <= self.applied_seq {
                    return Applied::Stale;
                }
                self.error = Some(message);
            }
            Action::FetchFinished { loud } => {
                if loud {
                    self.initial_loading = false;
                }
            }
            Action::SetSearch(term) => self.search = term,
            Action::SetDateFrom(from) => self.date_range.from = from,
            Action::SetDateTo(to) => self.date_range.to = to,
            Action::ClearFilters => {
                self.search.clear();
                self.date_range = DateRange::default();
            }
            Action::SortBy(field) => self.sort = self.sort.toggled(field),
            Action::SetAutoRefresh(enabled) => self.auto_refresh = enabled,
        }
        Applied::Changed
    }

    pub fn visible(&self) -> Vec<&Trip> {
        pipeline::visible_trips(&self.trips, &self.search, &self.date_range, self.sort)
    }

    pub fn filters_active(&self) -> bool {
        !self.search.is_empty() || !self.date_range.is_empty()
    }
}
