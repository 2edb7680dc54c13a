//! Parser for the portal's JSON appointment-slot feed.
//!
//! The feed reports, per provider and facility, the dates a provider sees
//! patients and the slot start times on each date:
//!
//! ```json
//! {"status": "success",
//!  "response": {"prov_slots": {
//!     "provider_name": "Jane Smith",
//!     "provider_degree": "MD",
//!     "facility_name": "Main Street",
//!     "appt_slots": [{"appt_date": "2025-02-03",
//!                     "next_start_time": null,
//!                     "appt_slots": [{"time": "09:15:00"}]}]}}}
//! ```
//!
//! `prov_slots` may also be an array. A top-level array may hold either
//! `prov_slots` objects or whole responses, one per request of a fanned-out
//! fetch.
//!
//! Only a document without any `prov_slots` is malformed. A slot without a
//! usable time or a day without a usable date still becomes a record, with
//! an empty label the normalizer drops and reports. A day whose
//! `next_start_time` is set was cut short by the portal and is reported as
//! truncated.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{DocumentParser, ParsedDocument};
use crate::error::{CoreError, CoreResult};
use crate::identity::normalize_ws;
use crate::normalize::IngestWarning;
use crate::raw_record::RawRecord;

/// Slot length assumed for feeds when `slot_minutes` is not configured.
pub const DEFAULT_SLOT_MINUTES: u32 = 15;

#[derive(Debug, Deserialize)]
struct ProviderSlots {
    #[serde(default)]
    provider_name: Option<String>,
    #[serde(default)]
    provider_fname: Option<String>,
    #[serde(default)]
    provider_lname: Option<String>,
    #[serde(default)]
    provider_degree: Option<String>,
    #[serde(default)]
    facility_name: Option<String>,
    #[serde(default)]
    facility_id: Option<Value>,
    #[serde(default)]
    appt_slots: Value,
}

impl ProviderSlots {
    /// The provider's name with the degree appended, as the portal shows it.
    fn provider_label(&self) -> String {
        let name = match &self.provider_name {
            Some(name) => normalize_ws(name),
            None => normalize_ws(
                &[&self.provider_fname, &self.provider_lname]
                    .into_iter()
                    .flatten()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        };
        match self.provider_degree.as_deref().map(str::trim) {
            Some(degree)
                if !degree.is_empty()
                    && !name.is_empty()
                    && !name.to_lowercase().ends_with(&degree.to_lowercase()) =>
            {
                format!("{name}, {degree}")
            }
            _ => name,
        }
    }

    fn location_label(&self) -> Option<String> {
        if let Some(name) = self.facility_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        match self.facility_id.as_ref()? {
            Value::String(id) if !id.trim().is_empty() => Some(format!("Facility {}", id.trim())),
            Value::Number(id) => Some(format!("Facility {id}")),
            _ => None,
        }
    }
}

fn text_of(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn is_response(value: &Value) -> bool {
    ["status", "response", "prov_slots"]
        .iter()
        .any(|key| value.get(key).is_some())
}

/// Extracts one record per appointment slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotFeedParser;

impl SlotFeedParser {
    pub fn new() -> Self {
        Self
    }

    /// The `prov_slots` entries of one response.
    fn response_blocks(mut doc: Value) -> CoreResult<Vec<Value>> {
        if let Some(status) = doc.get("status").and_then(Value::as_str) {
            if status != "success" {
                return Err(CoreError::malformed(format!("slot feed status {status:?}")));
            }
        }
        if let Some(response) = doc.get_mut("response").map(Value::take) {
            doc = response;
        }

        match doc {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => match map.remove("prov_slots") {
                Some(Value::Array(items)) => Ok(items),
                Some(item @ Value::Object(_)) => Ok(vec![item]),
                _ => Err(CoreError::malformed("slot feed has no prov_slots")),
            },
            _ => Err(CoreError::malformed("slot feed is not a JSON object")),
        }
    }

    /// Provider blocks of the whole document. Failed responses inside a
    /// batch are reported and skipped.
    fn provider_blocks(doc: Value, parsed: &mut ParsedDocument) -> CoreResult<Vec<Value>> {
        let items = match doc {
            Value::Array(items) => items,
            other => return Self::response_blocks(other),
        };
        if !items.iter().any(is_response) {
            return Ok(items);
        }

        let mut blocks = Vec::new();
        let mut failures = Vec::new();
        for (idx, item) in items.into_iter().enumerate() {
            if !is_response(&item) {
                blocks.push(item);
                continue;
            }
            match Self::response_blocks(item) {
                Ok(found) => blocks.extend(found),
                Err(e) => failures.push((idx, e)),
            }
        }
        if blocks.is_empty() {
            if let Some((_, e)) = failures.into_iter().next() {
                return Err(e);
            }
            return Ok(blocks);
        }
        for (idx, e) in failures {
            parsed.skip(format!("response {}", idx + 1), e.to_string());
        }
        Ok(blocks)
    }

    fn parse_block(entry: &str, block: Value, parsed: &mut ParsedDocument) {
        let block: ProviderSlots = match serde_json::from_value(block) {
            Ok(block) => block,
            Err(e) => {
                parsed.skip(entry, format!("invalid provider entry: {e}"));
                return;
            }
        };
        let provider = block.provider_label();
        let location = block.location_label();

        let days: &[Value] = match &block.appt_slots {
            Value::Array(days) => days.as_slice(),
            Value::Null => &[],
            _ => {
                parsed.skip(entry, "appt_slots is not a list");
                return;
            }
        };

        for (day_no, day) in days.iter().enumerate() {
            let date = text_of(day.get("appt_date"));
            let slots: &[Value] = match day.get("appt_slots") {
                Some(Value::Array(slots)) => slots.as_slice(),
                None | Some(Value::Null) => &[],
                Some(_) => {
                    parsed.skip(
                        format!("{entry} day {}", day_no + 1),
                        "appt_slots is not a list",
                    );
                    continue;
                }
            };

            for slot in slots {
                let time = match slot {
                    Value::String(time) => time.trim().to_string(),
                    other => text_of(other.get("time")),
                };
                let mut record = RawRecord::new(0, provider.clone(), date.clone(), time);
                record.location_label = location.clone();
                parsed.push(record);
            }

            let next_start = text_of(day.get("next_start_time"));
            if !next_start.is_empty() {
                let warning = IngestWarning::Truncated {
                    provider: provider.clone(),
                    date: date.clone(),
                    next_start,
                };
                tracing::warn!(%warning, "slot feed truncated");
                parsed.warnings.push(warning);
            }
        }
    }
}

impl DocumentParser for SlotFeedParser {
    fn name(&self) -> &'static str {
        "slots"
    }

    fn parse(&self, raw: &str) -> CoreResult<ParsedDocument> {
        let doc: Value = serde_json::from_str(raw)
            .map_err(|e| CoreError::malformed(format!("slot feed is not JSON: {e}")))?;

        let mut parsed = ParsedDocument::default();
        for (idx, block) in Self::provider_blocks(doc, &mut parsed)?.into_iter().enumerate() {
            Self::parse_block(&format!("prov_slots[{idx}]"), block, &mut parsed);
        }

        debug!(
            records = parsed.records.len(),
            warnings = parsed.warnings.len(),
            "parsed slot feed"
        );
        Ok(parsed)
    }

    fn implied_slot_minutes(&self) -> Option<u32> {
        Some(DEFAULT_SLOT_MINUTES)
    }
}
