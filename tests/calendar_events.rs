//! Calendar endpoints over a temp vdir layout.

mod test_utils;

use chrono::{Local, TimeDelta};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_utils::{request, Fixture};

fn setup_calendars(fixture: &Fixture) -> std::path::PathBuf {
    let base = fixture.root.path().join("calendars");
    let personal = base.join("personal");
    std::fs::create_dir_all(&personal).unwrap();
    std::fs::write(personal.join("displayname"), "Personal").unwrap();

    let tomorrow = (Local::now().date_naive() + TimeDelta::days(1)).format("%Y%m%d");
    std::fs::write(
        personal.join("dentist.ics"),
        format!(
            "BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:Dentist\nDTSTART:{tomorrow}T140000\nDTEND:{tomorrow}T143000\nEND:VEVENT\nEND:VCALENDAR\n"
        ),
    )
    .unwrap();

    let far = (Local::now().date_naive() + TimeDelta::days(30)).format("%Y%m%d");
    std::fs::write(
        personal.join("far.ics"),
        format!(
            "BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:Far away\nDTSTART:{far}T090000\nEND:VEVENT\nEND:VCALENDAR\n"
        ),
    )
    .unwrap();

    base
}

async fn set_calendar_path(fixture: &Fixture, path: &std::path::Path) {
    let (router, _rx) = fixture.router();
    let (status, _) = request(
        router,
        "POST",
        "/api/settings",
        Some(json!({"calendar_path": path.to_str().unwrap()})),
    )
    .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn discover_lists_calendars_with_metadata() {
    let fixture = Fixture::new();
    let base = setup_calendars(&fixture);
    set_calendar_path(&fixture, &base).await;

    let (router, _rx) = fixture.router();
    let (status, body) = request(router, "GET", "/api/calendars/discover", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["found"], true);
    assert_eq!(body["source"], "configured");
    let calendars = body["calendars"].as_array().unwrap();
    assert_eq!(calendars.len(), 1);
    assert_eq!(calendars[0]["id"], "personal");
    assert_eq!(calendars[0]["name"], "Personal");
    assert_eq!(calendars[0]["event_count"], 2);
}

#[tokio::test]
async fn events_windowed_and_sourced_from_ics() {
    let fixture = Fixture::new();
    let base = setup_calendars(&fixture);
    set_calendar_path(&fixture, &base).await;

    let (router, _rx) = fixture.router();
    let (status, body) = request(router, "GET", "/api/calendars/events?days=7", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["source"], "ics");
    assert_eq!(body["count"], 1);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events[0]["title"], "Dentist");
    assert_eq!(events[0]["time"], "14:00");
    assert_eq!(events[0]["end"], "14:30");
    assert_eq!(events[0]["calendar"], "Personal");
}

#[tokio::test]
async fn wider_window_includes_far_event() {
    let fixture = Fixture::new();
    let base = setup_calendars(&fixture);
    set_calendar_path(&fixture, &base).await;

    let (router, _rx) = fixture.router();
    let (_, body) = request(router, "GET", "/api/calendars/events?days=45", None).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn no_calendars_and_no_gateway_reports_none() {
    let fixture = Fixture::new();
    let empty = fixture.root.path().join("nothing-here");
    std::fs::create_dir_all(&empty).unwrap();
    set_calendar_path(&fixture, &empty).await;

    let (router, _rx) = fixture.router();
    let (status, body) = request(router, "GET", "/api/calendars/events", None).await;
    assert_eq!(status, 200);
    // A dev machine may carry real vdirsyncer calendars in the fallback
    // chain; in that case the source is still ics, otherwise none
    let source = body["source"].as_str().unwrap();
    assert!(source == "none" || source == "ics");
    if source == "none" {
        assert_eq!(body["count"], 0);
    }
}
