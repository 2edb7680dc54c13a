//! Slot feed continuation.
//!
//! The portal answers a slot request with only the first few slots of each
//! day and a `next_start_time` per day. Asking its "more slots" endpoint
//! from that time returns the following slots under `appt_more_slots`,
//! again with a `next_start_time`, until it comes back empty.
//!
//! These helpers find the days still pending in a response and splice the
//! extra slots into them, so the document handed to the parser reads as if
//! the portal had sent the whole day at once.

use serde_json::{Map, Value};
use url::Url;

/// Where and how to ask for the rest of a truncated day.
#[derive(Debug, Clone)]
pub struct SlotContinuation {
    /// The "more slots" endpoint, always POSTed.
    pub url: Url,

    /// Fixed form fields sent with every continuation request.
    pub form: Vec<(String, String)>,

    /// Request form fields copied into the continuation form, as
    /// `(request field, continuation field)`.
    pub carry: Vec<(String, String)>,

    /// Upper bound on continuation requests per provider day.
    pub max_requests: usize,
}

impl SlotContinuation {
    /// Default per-day request bound.
    pub const DEFAULT_MAX_REQUESTS: usize = 20;

    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(url.as_ref())?,
            form: Vec::new(),
            carry: Vec::new(),
            max_requests: Self::DEFAULT_MAX_REQUESTS,
        })
    }

    /// Adds a fixed form field.
    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Copies request field `from` into continuation field `to`.
    pub fn with_carried_field(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.carry.push((from.into(), to.into()));
        self
    }

    pub fn with_max_requests(mut self, max: usize) -> Self {
        self.max_requests = max.max(1);
        self
    }

    /// The form for continuing `date` from `start`, given the fields of the
    /// request that produced the truncated response.
    pub fn form_for(
        &self,
        request_form: &[(String, String)],
        date: &str,
        start: &str,
    ) -> Vec<(String, String)> {
        let mut form = self.form.clone();
        for (from, to) in &self.carry {
            if let Some((_, value)) = request_form.iter().find(|(key, _)| key == from) {
                form.push((to.clone(), value.clone()));
            }
        }
        form.push(("appt_date".to_string(), date.to_string()));
        form.push(("start_time".to_string(), start.to_string()));
        form
    }
}

/// The `prov_slots` blocks of a slot response.
pub(crate) fn blocks_mut(doc: &mut Value) -> Vec<&mut Value> {
    let root = if doc.get("response").is_some() {
        &mut doc["response"]
    } else {
        doc
    };
    match root.get_mut("prov_slots") {
        Some(Value::Array(items)) => items.iter_mut().collect(),
        Some(block) if block.is_object() => vec![block],
        _ => Vec::new(),
    }
}

/// The day objects of one provider block.
pub(crate) fn days_mut(block: &mut Value) -> Vec<&mut Map<String, Value>> {
    match block.get_mut("appt_slots") {
        Some(Value::Array(days)) => days.iter_mut().filter_map(Value::as_object_mut).collect(),
        _ => Vec::new(),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The date and continuation start of a day, if the day is truncated.
pub(crate) fn pending(day: &Map<String, Value>) -> Option<(String, String)> {
    Some((text(day.get("appt_date"))?, text(day.get("next_start_time"))?))
}

/// Appends the slots of a continuation reply to `day` and stores the reply's
/// `next_start_time`. Returns how many slots were added.
pub(crate) fn extend_day(day: &mut Map<String, Value>, reply: &Value) -> usize {
    let more = reply
        .get("response")
        .unwrap_or(reply)
        .get("appt_more_slots");
    let slots: Vec<Value> = more
        .and_then(|m| m.get("appt_slots"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let next = text(more.and_then(|m| m.get("next_start_time")));

    let added = slots.len();
    match day.get_mut("appt_slots") {
        Some(Value::Array(existing)) => existing.extend(slots),
        _ => {
            day.insert("appt_slots".to_string(), Value::Array(slots));
        }
    }
    day.insert(
        "next_start_time".to_string(),
        next.map_or(Value::Null, Value::String),
    );
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn continuation_form_carries_request_fields() {
        let more = SlotContinuation::new("https://portal.example.com/more")
            .unwrap()
            .with_form_field("end_time", "23:59:00")
            .with_carried_field("provider_npi", "npi")
            .with_carried_field("missing", "ignored");
        let request = vec![
            ("provider_npi".to_string(), "123".to_string()),
            ("facility_id".to_string(), "13".to_string()),
        ];
        let form = more.form_for(&request, "2025-02-03", "10:45:00");
        let form: Vec<(&str, &str)> = form.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            form,
            vec![
                ("end_time", "23:59:00"),
                ("npi", "123"),
                ("appt_date", "2025-02-03"),
                ("start_time", "10:45:00"),
            ]
        );
    }

    #[test]
    fn finds_pending_days_in_object_and_array_responses() {
        let mut single = json!({"response": {"prov_slots": {"appt_slots": [
            {"appt_date": "2025-02-03", "next_start_time": "10:45:00", "appt_slots": []},
            {"appt_date": "2025-02-04", "next_start_time": null, "appt_slots": []},
            "junk"
        ]}}});
        let pending_days: Vec<(String, String)> = blocks_mut(&mut single)
            .into_iter()
            .flat_map(|block| days_mut(block).into_iter().filter_map(|d| pending(d)).collect::<Vec<_>>())
            .collect();
        assert_eq!(
            pending_days,
            vec![("2025-02-03".to_string(), "10:45:00".to_string())]
        );

        let mut many = json!({"prov_slots": [{"appt_slots": []}, {"appt_slots": []}]});
        assert_eq!(blocks_mut(&mut many).len(), 2);
        assert!(blocks_mut(&mut json!({"status": "error"})).is_empty());
    }

    #[test]
    fn extends_day_until_reply_has_no_next_start() {
        let mut day = json!({"appt_date": "2025-02-03", "next_start_time": "09:45:00",
                             "appt_slots": [{"time": "09:00:00"}]});
        let day = day.as_object_mut().unwrap();

        let reply = json!({"response": {"appt_more_slots": {
            "appt_slots": [{"time": "09:45:00"}, {"time": "10:00:00"}],
            "next_start_time": "10:15:00"}}});
        assert_eq!(extend_day(day, &reply), 2);
        assert_eq!(pending(day), Some(("2025-02-03".to_string(), "10:15:00".to_string())));

        let last = json!({"response": {"appt_more_slots": {
            "appt_slots": [{"time": "10:15:00"}]}}});
        assert_eq!(extend_day(day, &last), 1);
        assert_eq!(pending(day), None);
        assert_eq!(day["appt_slots"].as_array().unwrap().len(), 4);
        assert!(day["next_start_time"].is_null());
    }
}
