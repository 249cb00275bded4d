//! Display ordering for message histories.
//!
//! Histories are kept in arrival order; these helpers derive the
//! chronological view used for rendering.

use chrono::NaiveDate;
use school_client::Message;

/// Messages of one calendar day (UTC).
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    /// `None` for messages whose timestamp could not be parsed.
    pub day: Option<NaiveDate>,
    pub messages: Vec<Message>,
}

/// Sort by `created_at`. The sort is stable; messages with an unparseable
/// timestamp keep their arrival order and go last.
pub fn chronological(messages: &[Message]) -> Vec<Message> {
    let mut sorted = messages.to_vec();
    sorted.sort_by_cached_key(|m| {
        let at = m.created_at_utc();
        (at.is_none(), at)
    });
    sorted
}

/// Chronological messages bucketed by consecutive UTC day.
pub fn group_by_day(messages: &[Message]) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for message in chronological(messages) {
        let day = message.created_at_utc().map(|at| at.date_naive());
        match groups.last_mut() {
            Some(group) if group.day == day => group.messages.push(message),
            _ => groups.push(DayGroup {
                day,
                messages: vec![message],
            }),
        }
    }
    groups
}
