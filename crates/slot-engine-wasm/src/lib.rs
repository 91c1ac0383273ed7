//! WASM bindings for slot-engine.
//!
//! Exposes grouping, validation, recurrence expansion, window splitting and
//! viewer-zone rendering to the mobile client via `wasm-bindgen`. Slots cross
//! the boundary as JSON strings in the engine's camelCase serde shape.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p slot-engine-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target nodejs --out-dir packages/slot-engine-js/wasm/ \
//!   target/wasm32-unknown-unknown/release/slot_engine_wasm.wasm
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use slot_engine::expander::{expand, RecurrenceRequest};
use slot_engine::proposal::{generate_range, RangeProposal};
use slot_engine::timezone::{self, DisplaySlot};
use slot_engine::validator::{partition, DurationRule};
use slot_engine::{AvailabilitySlot, ConfigurationError, EngineConfig, SlotId};
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionDto {
    id: SlotId,
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationDto {
    accepted: Vec<SlotId>,
    rejected: Vec<RejectionDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalTimeDto {
    local: String,
    warning: Option<ConfigurationError>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplayDto {
    slots: Vec<DisplaySlot>,
    warning: Option<ConfigurationError>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RangeDto {
    slots: Vec<AvailabilitySlot>,
    warning: Option<ConfigurationError>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_slots(json: &str) -> Result<Vec<AvailabilitySlot>, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid slots JSON: {}", e))
}

fn parse_config(toml: Option<&str>) -> Result<EngineConfig, String> {
    match toml {
        Some(raw) => EngineConfig::from_toml_str(raw).map_err(|e| e.to_string()),
        None => Ok(EngineConfig::default()),
    }
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DDTHH:MM:SS`, read as UTC.
fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| format!("Invalid datetime '{}': {}", s, e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))
}

fn group_slots_impl(slots_json: &str) -> Result<String, String> {
    let slots = parse_slots(slots_json)?;
    to_json(&slot_engine::group(&slots))
}

fn validate_slots_impl(
    candidates_json: &str,
    existing_json: &str,
    config_toml: Option<&str>,
) -> Result<String, String> {
    let candidates = parse_slots(candidates_json)?;
    let existing = parse_slots(existing_json)?;
    let config = parse_config(config_toml)?;

    let result = partition(candidates, &existing, DurationRule::exact(&config));
    to_json(&ValidationDto {
        accepted: result.accepted.iter().map(|s| s.id.clone()).collect(),
        rejected: result
            .rejected
            .iter()
            .map(|(slot, e)| RejectionDto {
                id: slot.id.clone(),
                error: e.to_string(),
            })
            .collect(),
    })
}

fn expand_recurrence_impl(
    request_json: &str,
    existing_json: &str,
    config_toml: Option<&str>,
) -> Result<String, String> {
    let request: RecurrenceRequest = serde_json::from_str(request_json)
        .map_err(|e| format!("Invalid recurrence request JSON: {}", e))?;
    let mut existing = parse_slots(existing_json)?;
    existing.extend(request.source_slots.iter().cloned());
    let config = parse_config(config_toml)?;

    let expansion = expand(&request, &existing, &config).map_err(|e| e.to_string())?;
    to_json(&expansion)
}

fn to_viewer_local_impl(instant: &str, viewer_zone: &str) -> Result<String, String> {
    let resolved = timezone::to_viewer_local(parse_instant(instant)?, viewer_zone);
    to_json(&LocalTimeDto {
        local: resolved.value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        warning: resolved.warning,
    })
}

fn display_slots_impl(slots_json: &str, viewer_zone: &str) -> Result<String, String> {
    let slots = parse_slots(slots_json)?;
    let mut warning = None;
    let mut shown = Vec::with_capacity(slots.len());
    for slot in &slots {
        let rendered = timezone::display(slot, viewer_zone);
        warning = warning.or(rendered.warning);
        shown.push(rendered.value);
    }
    to_json(&DisplayDto {
        slots: shown,
        warning,
    })
}

fn generate_range_impl(proposal_json: &str, config_toml: Option<&str>) -> Result<String, String> {
    let proposal: RangeProposal = serde_json::from_str(proposal_json)
        .map_err(|e| format!("Invalid range proposal JSON: {}", e))?;
    let config = parse_config(config_toml)?;
    let resolved = generate_range(&proposal, config.range_bucket_minutes);
    to_json(&RangeDto {
        slots: resolved.value,
        warning: resolved.warning,
    })
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Group a JSON array of slots into contiguous same-status runs.
///
/// Returns a JSON array of `{slots}` objects ordered by start time.
#[wasm_bindgen(js_name = "groupSlots")]
pub fn group_slots(slots_json: &str) -> Result<String, JsValue> {
    group_slots_impl(slots_json).map_err(|e| JsValue::from_str(&e))
}

/// Check candidate slots one by one against existing slots and the accepted
/// candidates before them.
///
/// Returns `{accepted: [id], rejected: [{id, error}]}`. `config_toml`
/// overrides the allowed durations.
#[wasm_bindgen(js_name = "validateSlots")]
pub fn validate_slots(
    candidates_json: &str,
    existing_json: &str,
    config_toml: Option<String>,
) -> Result<String, JsValue> {
    validate_slots_impl(candidates_json, existing_json, config_toml.as_deref())
        .map_err(|e| JsValue::from_str(&e))
}

/// Expand a recurrence request (`{sourceSlots, mode}`) into new slots.
///
/// Returns `{slots, skipped, warnings}`. Nothing is persisted; the caller
/// saves the slots it wants.
#[wasm_bindgen(js_name = "expandRecurrence")]
pub fn expand_recurrence(
    request_json: &str,
    existing_json: &str,
    config_toml: Option<String>,
) -> Result<String, JsValue> {
    expand_recurrence_impl(request_json, existing_json, config_toml.as_deref())
        .map_err(|e| JsValue::from_str(&e))
}

/// Convert a UTC instant to wall-clock time in `viewer_zone`.
///
/// Returns `{local, warning}`; an unknown zone falls back to UTC and sets
/// `warning`.
#[wasm_bindgen(js_name = "toViewerLocal")]
pub fn to_viewer_local(instant: &str, viewer_zone: &str) -> Result<String, JsValue> {
    to_viewer_local_impl(instant, viewer_zone).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen(js_name = "displaySlots")]
pub fn display_slots(slots_json: &str, viewer_zone: &str) -> Result<String, JsValue> {
    display_slots_impl(slots_json, viewer_zone).map_err(|e| JsValue::from_str(&e))
}

/// Split a local window (`{trainerId, date, from, to, timeZone}`) into
/// bucket-sized slots.
#[wasm_bindgen(js_name = "generateRange")]
pub fn generate_range_slots(
    proposal_json: &str,
    config_toml: Option<String>,
) -> Result<String, JsValue> {
    generate_range_impl(proposal_json, config_toml.as_deref()).map_err(|e| JsValue::from_str(&e))
}
