//! Derivation of the displayed trip list from raw data plus filter and sort
//! inputs. Everything here is pure.

use std::cmp::Ordering;

use crate::models::{
    filter::{DateRange, SortConfig, SortDirection, SortField},
    trip::Trip,
};

/// Case-insensitive substring match on the account identifier.
pub fn matches_search(trip: &Trip, term: &str) -> bool {
    term.is_empty() || trip.user_cpan.to_lowercase().contains(&term.to_lowercase())
}

pub fn filter_trips<'a>(trips: &'a [Trip], term: &str, range: &DateRange) -> Vec<&'a Trip> {
    trips
        .iter()
        .filter(|trip| matches_search(trip, term))
        .filter(|trip| range.contains(trip.created_at))
        .collect()
}

pub fn compare(a: &Trip, b: &Trip, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Amount => compare_optional(a.charged_amount(), b.charged_amount()),
        SortField::FinalAmount => a.final_amount().total_cmp(&b.final_amount()),
        SortField::Id => a.id.cmp(&b.id),
        SortField::UserCpan => a.user_cpan.cmp(&b.user_cpan),
    }
}

// missing amounts sort below every present one
fn compare_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_trips(trips: &mut [&Trip], sort: SortConfig) {
    trips.sort_by(|a, b| {
        let ordering = compare(a, b, sort.field);
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

pub fn visible_trips<'a>(
    trips: &'a [Trip],
    term: &str,
    range: &DateRange,
    sort: SortConfig,
) -> Vec<&'a Trip> {
    let mut visible = filter_trips(trips, term, range);
    sort_trips(&mut visible, sort);
    visible
}
