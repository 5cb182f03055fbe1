//! Calendar endpoints: discovery of vdir calendars and windowed event reads,
//! both with a gateway-chat fallback when no ICS directory is reachable.

use super::SharedState;
use crate::calendar::{self, PathSource};
use crate::gateway::{khal, GatewayClient};
use crate::store::settings::DashboardSettings;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

const DEFAULT_DAYS: u32 = 7;
const MAX_DAYS: u32 = 90;

pub async fn discover(State(state): State<SharedState>) -> Json<Value> {
    let settings = DashboardSettings::load(&state.store);

    if let Some((path, source)) = calendar::find_calendar_path(&settings.calendar_path) {
        let calendars = calendar::discover_calendars(&path);

        // Remember an auto-detected path so later reads skip the fallback chain
        if source == PathSource::AutoDetected && Path::new(&settings.calendar_path) != path {
            let mut updated = settings;
            updated.calendar_path = path.display().to_string();
            if let Err(e) = updated.save(&state.store) {
                tracing::warn!("Failed to persist auto-detected calendar path: {:#}", e);
            }
        }

        return Json(json!({
            "calendars": calendars,
            "calendar_path": path.display().to_string(),
            "source": source,
            "found": !calendars.is_empty(),
        }));
    }

    if let Some(client) = GatewayClient::from_settings(&settings) {
        let names = khal::calendars_via_gateway(&client).await;
        if !names.is_empty() {
            let calendars: Vec<Value> = names
                .into_iter()
                .map(|name| {
                    json!({
                        "id": name.to_lowercase().replace([' ', '/'], "_"),
                        "name": name,
                        "event_count": "?",
                        "color": Value::Null,
                    })
                })
                .collect();
            return Json(json!({
                "calendars": calendars,
                "calendar_path": "gateway",
                "source": "gateway",
                "found": true,
            }));
        }
    }

    Json(json!({
        "calendars": [],
        "calendar_path": settings.calendar_path,
        "source": "none",
        "found": false,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub days: Option<u32>,
}

pub async fn events(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
) -> Json<Value> {
    let settings = DashboardSettings::load(&state.store);
    let days = query.days.unwrap_or(DEFAULT_DAYS).min(MAX_DAYS);

    if let Some((path, _)) = calendar::find_calendar_path(&settings.calendar_path) {
        let events = calendar::read_calendar_events(&path, &settings.enabled_calendars, days);
        if !events.is_empty() {
            return Json(json!({
                "events": events,
                "count": events.len(),
                "source": "ics",
            }));
        }
        tracing::debug!("ICS path {} yielded no events, trying gateway", path.display());
    }

    let events = match GatewayClient::from_settings(&settings) {
        Some(client) => khal::events_via_gateway(&client, days).await,
        None => Vec::new(),
    };
    let source = if events.is_empty() { "none" } else { "gateway" };
    Json(json!({
        "events": events,
        "count": events.len(),
        "source": source,
    }))
}
