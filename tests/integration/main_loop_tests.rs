//! Main-loop integration tests.
//!
//! Drive `AppService::iterate` against the mock ports and check the
//! iteration order, the frame-budget gate, and each scheduled task.

use powermeter::api::{Method, Route};
use powermeter::app::events::AppEvent;
use powermeter::app::ports::{ButtonId, EnvReading, LinkStatus};
use powermeter::app::service::{AppService, MAX_REQUESTS_PER_ITERATION};
use powermeter::config::MeterConfig;
use powermeter::drivers::button::ButtonEvent;
use powermeter::error::{SensorError, StorageError};
use powermeter::logbook::LogRecord;
use powermeter::metering::PulseCounter;
use powermeter::metering::activity::ActivityState;
use powermeter::scheduler::TaskId;

use crate::mock_ports::{meter_at, Rig};

const EPOCH: u32 = 1_700_000_000;

fn service(link: LinkStatus) -> (&'static PulseCounter, AppService, Rig) {
    let (counter, meter) = meter_at(0);
    let mut rig = Rig::new(link);
    let mut app = AppService::new(meter, MeterConfig::DEFAULT, 0);
    app.start(0, &mut rig.ports());
    (counter, app, rig)
}

fn last_run(app: &AppService, id: TaskId) -> Option<u32> {
    app.tasks().get(id).and_then(|t| t.last_run_ms())
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_emits_started() {
    let (_, _app, rig) = service(LinkStatus::Disconnected);
    assert_eq!(rig.sink.events, vec![AppEvent::Started { now_ms: 0 }]);
}

#[test]
fn task_table_seeded_at_boot() {
    let (_, app, _) = service(LinkStatus::Disconnected);
    assert_eq!(app.tasks().len(), 4);
    assert_eq!(last_run(&app, TaskId::Reconnect), None);
    assert_eq!(last_run(&app, TaskId::Log), Some(0));
    assert_eq!(last_run(&app, TaskId::Sample), Some(0));
    assert!(!app.tasks().get(TaskId::LogIndicator).unwrap().is_enabled());
}

// ── Connectivity ──────────────────────────────────────────────

#[test]
fn reconnect_attempted_at_boot_then_backs_off() {
    let (_, mut app, mut rig) = service(LinkStatus::Disconnected);

    let report = app.iterate(0, &mut rig.ports());
    assert_eq!(report.housekeeping_run, 1);
    assert_eq!(rig.link.connect_calls, 1);
    assert!(rig.sink.contains(&AppEvent::Connecting));

    app.iterate(4_999, &mut rig.ports());
    assert_eq!(rig.link.connect_calls, 1);

    app.iterate(5_000, &mut rig.ports());
    assert_eq!(rig.link.connect_calls, 2);
}

#[test]
fn connected_link_skips_reconnect_and_starts_services_once() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);

    let report = app.iterate(0, &mut rig.ports());
    assert_eq!(report.housekeeping_run, 0);
    assert_eq!(rig.link.connect_calls, 0);
    assert_eq!(rig.services.starts, 1);
    assert_eq!(rig.clock.begins, 1);
    assert_eq!(app.link(), LinkStatus::Connected);

    // Drop and recover the link: one LinkDown, a second LinkUp, no restart.
    rig.link.status = LinkStatus::Disconnected;
    app.iterate(100, &mut rig.ports());
    assert_eq!(rig.link.connect_calls, 1);
    rig.link.status = LinkStatus::Connected;
    app.iterate(200, &mut rig.ports());

    assert_eq!(rig.services.starts, 1);
    assert_eq!(rig.clock.begins, 1);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::LinkUp), 2);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::LinkDown), 1);
}

#[test]
fn service_start_failure_does_not_stop_the_loop() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.services.fail_start = true;
    app.iterate(0, &mut rig.ports());
    app.iterate(10, &mut rig.ports());
    assert_eq!(rig.services.starts, 1);
    assert_eq!(rig.services.maintains, 2);
    assert_eq!(app.iterations(), 2);
}

#[test]
fn access_point_never_reconnects() {
    let (_, mut app, mut rig) = service(LinkStatus::AccessPoint);
    for now in [0, 5_000, 10_000, 60_000] {
        app.iterate(now, &mut rig.ports());
    }
    assert_eq!(rig.link.connect_calls, 0);
    assert_eq!(last_run(&app, TaskId::Reconnect), None);
    assert_eq!(rig.services.starts, 0);
}

// ── Frame budget ──────────────────────────────────────────────

#[test]
fn zero_budget_defers_secondary_work() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.clock.epoch = Some(EPOCH);
    rig.render.budget_ms = 0;

    let report = app.iterate(10_000, &mut rig.ports());
    assert!(!report.secondary_phase);
    assert_eq!(report.deferred_run, 0);
    assert_eq!(rig.render.advances, 1);
    assert_eq!(rig.battery.updates, 0);
    assert_eq!(rig.alert.updates, 0);
    assert_eq!(rig.clock.updates, 0);
    assert!(rig.log_store.records.is_empty());
    assert_eq!(last_run(&app, TaskId::Log), Some(0));

    // Budget returns: the overdue log runs and its timer restarts from now.
    rig.render.budget_ms = 20;
    let report = app.iterate(10_050, &mut rig.ports());
    assert!(report.secondary_phase);
    assert_eq!(rig.log_store.records.len(), 1);
    assert_eq!(last_run(&app, TaskId::Log), Some(10_050));
    assert_eq!(rig.battery.updates, 1);
}

#[test]
fn primary_work_runs_without_budget() {
    let (_, mut app, mut rig) = service(LinkStatus::Disconnected);
    rig.render.budget_ms = 0;
    rig.requests.pending.push_back(Route::Watts);
    rig.input.press(ButtonId::Menu, ButtonEvent::ShortPress);

    let report = app.iterate(0, &mut rig.ports());
    assert_eq!(report.housekeeping_run, 1);
    assert_eq!(report.requests_served, 1);
    assert_eq!(rig.render.next_frames, 1);
    assert_eq!(rig.services.maintains, 1);
}

// ── Logging ───────────────────────────────────────────────────

#[test]
fn log_written_when_clock_synced() {
    let (counter, mut app, mut rig) = service(LinkStatus::Connected);
    rig.clock.epoch = Some(EPOCH);
    counter.on_edge(5_000);
    counter.on_edge(5_360);

    app.iterate(9_999, &mut rig.ports());
    assert!(rig.log_store.records.is_empty());

    app.iterate(10_000, &mut rig.ports());
    assert_eq!(rig.clock.updates, 1);
    assert_eq!(rig.log_store.records, vec![LogRecord::new(EPOCH, 1_000)]);
    assert!(rig.sink.contains(&AppEvent::LogWritten {
        epoch_secs: EPOCH,
        watts: 1_000
    }));
    assert!(app.log_written());
    assert!(rig.render.last_view.is_some_and(|v| !v.log_written));

    // Indicator shows for 500 ms after the write.
    app.iterate(10_499, &mut rig.ports());
    assert!(app.log_written());
    assert!(rig.render.last_view.is_some_and(|v| v.log_written));
    app.iterate(10_500, &mut rig.ports());
    assert!(!app.log_written());
}

#[test]
fn log_slot_skipped_without_time() {
    let (_, mut app, mut rig) = service(LinkStatus::Disconnected);

    app.iterate(10_000, &mut rig.ports());
    assert!(rig.log_store.records.is_empty());
    assert!(rig.sink.contains(&AppEvent::LogSkipped));
    assert_eq!(last_run(&app, TaskId::Log), Some(10_000));

    // Next slot is a full interval later even though nothing was written.
    rig.clock.epoch = Some(EPOCH);
    app.iterate(15_000, &mut rig.ports());
    assert!(rig.log_store.records.is_empty());
    app.iterate(20_000, &mut rig.ports());
    assert_eq!(rig.log_store.records.len(), 1);
}

#[test]
fn log_failure_is_reported_and_retried_next_slot() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.clock.epoch = Some(EPOCH);
    rig.log_store.fail_with = Some(StorageError::Full);

    app.iterate(10_000, &mut rig.ports());
    assert!(rig.sink.contains(&AppEvent::LogFailed(StorageError::Full)));
    assert!(!app.log_written());
    assert!(!app.tasks().get(TaskId::LogIndicator).unwrap().is_enabled());

    rig.log_store.fail_with = None;
    app.iterate(20_000, &mut rig.ports());
    assert_eq!(rig.log_store.records.len(), 1);
}

// ── Buttons ───────────────────────────────────────────────────

#[test]
fn menu_button_cycles_frames() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.input.press(ButtonId::Menu, ButtonEvent::ShortPress);
    app.iterate(0, &mut rig.ports());
    rig.input.press(ButtonId::Menu, ButtonEvent::LongPress);
    app.iterate(10, &mut rig.ports());
    assert_eq!(rig.render.next_frames, 1);
    assert_eq!(rig.render.previous_frames, 1);
}

#[test]
fn enter_short_press_toggles_display() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.input.press(ButtonId::Enter, ButtonEvent::ShortPress);
    app.iterate(0, &mut rig.ports());
    assert!(!app.display_on());
    assert_eq!(rig.render.power, vec![false]);
    assert!(rig.sink.contains(&AppEvent::DisplayToggled { on: false }));

    rig.input.press(ButtonId::Enter, ButtonEvent::DoublePress);
    app.iterate(10, &mut rig.ports());
    assert!(app.display_on());
    assert_eq!(rig.render.power, vec![false, true]);
}

#[test]
fn enter_long_press_clears_meter_and_log() {
    let (counter, mut app, mut rig) = service(LinkStatus::Connected);
    counter.on_edge(1_000);
    counter.on_edge(1_360);
    rig.log_store.records.push(LogRecord::new(EPOCH, 1_000));

    rig.input.press(ButtonId::Enter, ButtonEvent::LongPress);
    app.iterate(2_000, &mut rig.ports());

    assert_eq!(app.meter().count(), 0);
    assert_eq!(app.meter().instant_power(), 0);
    assert_eq!(rig.log_store.removes, 1);
    assert!(rig.log_store.records.is_empty());
    assert!(rig.sink.contains(&AppEvent::MeterCleared { pulses: 2 }));
    assert_eq!(rig.render.last_view.map(|v| v.pulse_count), Some(0));

    // The next edge is measured from the last real edge.
    counter.on_edge(1_720);
    assert_eq!(app.meter().count(), 1);
    assert_eq!(app.meter().instant_power(), 1_000);
}

#[test]
fn failed_log_removal_still_clears_meter() {
    let (counter, mut app, mut rig) = service(LinkStatus::Connected);
    counter.on_edge(500);
    rig.log_store.fail_with = Some(StorageError::Io);

    rig.input.press(ButtonId::Enter, ButtonEvent::LongPress);
    app.iterate(1_000, &mut rig.ports());

    assert_eq!(app.meter().count(), 0);
    assert!(rig.sink.contains(&AppEvent::LogFailed(StorageError::Io)));
    assert!(rig.sink.contains(&AppEvent::MeterCleared { pulses: 1 }));
}

// ── HTTP ──────────────────────────────────────────────────────

#[test]
fn requests_bounded_per_iteration() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    for _ in 0..MAX_REQUESTS_PER_ITERATION + 2 {
        rig.requests.pending.push_back(Route::Watts);
    }

    let first = app.iterate(0, &mut rig.ports());
    assert_eq!(first.requests_served, MAX_REQUESTS_PER_ITERATION);
    assert_eq!(rig.requests.pending.len(), 2);

    let second = app.iterate(10, &mut rig.ports());
    assert_eq!(second.requests_served, 2);
    assert_eq!(rig.requests.responses.len(), MAX_REQUESTS_PER_ITERATION + 2);
}

#[test]
fn watts_endpoint_reports_instant_power() {
    let (counter, mut app, mut rig) = service(LinkStatus::Connected);
    counter.on_edge(1_000);
    counter.on_edge(1_360);
    rig.requests.pending.push_back(Route::Watts);
    app.iterate(1_400, &mut rig.ports());
    assert_eq!(rig.requests.responses[0].body, br#"{"watts":1000}"#);
}

#[test]
fn environment_endpoints_null_until_sampled() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.requests.pending.push_back(Route::Temperature);
    app.iterate(0, &mut rig.ports());
    assert_eq!(rig.requests.responses[0].body, br#"{"temperature":null}"#);

    app.iterate(2_000, &mut rig.ports());
    rig.requests.pending.push_back(Route::Humidity);
    app.iterate(2_010, &mut rig.ports());
    assert_eq!(rig.requests.responses[1].body, br#"{"humidity":45.0}"#);
}

#[test]
fn beeper_endpoint_queues_sequence() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.requests.pending.push_back(Route::Beeper { count: Some(3) });
    rig.requests.pending.push_back(Route::Beeper { count: None });
    app.iterate(0, &mut rig.ports());

    assert_eq!(rig.alert.requests, vec![3]);
    assert_eq!(rig.requests.responses[0].body, br#"{"success":1}"#);
    assert_eq!(rig.requests.responses[1].body, br#"{"no count specified":1}"#);

    rig.alert.busy = true;
    rig.requests.pending.push_back(Route::Beeper { count: Some(2) });
    app.iterate(10, &mut rig.ports());
    assert_eq!(rig.requests.responses[2].body, br#"{"busy":1}"#);
    assert_eq!(rig.alert.requests, vec![3]);
}

#[test]
fn unknown_route_is_not_found() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.requests.pending.push_back(Route::NotFound {
        method: Method::Get,
        path: "/nope".to_owned(),
    });
    app.iterate(0, &mut rig.ports());
    let response = &rig.requests.responses[0];
    assert_eq!(response.status, 404);
    assert!(response.body.starts_with(b"File Not Detected"));
}

#[test]
fn root_redirect_leads_to_web_ui() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.log_store
        .files
        .insert("index.html".to_owned(), b"<html>meter</html>".to_vec());
    rig.requests.pending.push_back(Route::parse(Method::Get, "/"));
    app.iterate(0, &mut rig.ports());
    let redirect = &rig.requests.responses[0];
    assert_eq!((redirect.status, redirect.location), (302, Some("/index.html")));
    let location = redirect.location.unwrap();

    rig.requests.pending.push_back(Route::parse(Method::Get, location));
    app.iterate(10, &mut rig.ports());
    let page = &rig.requests.responses[1];
    assert_eq!(page.status, 200);
    assert_eq!(page.content_type, "text/html");
    assert_eq!(page.body, b"<html>meter</html>");
}

#[test]
fn web_chart_reads_back_written_log() {
    let (counter, mut app, mut rig) = service(LinkStatus::Connected);
    rig.clock.epoch = Some(EPOCH);
    counter.on_edge(5_000);
    counter.on_edge(5_360);

    rig.requests.pending.push_back(Route::parse(Method::Get, "/log.csv"));
    app.iterate(5_400, &mut rig.ports());
    assert_eq!(rig.requests.responses[0].status, 200);
    assert!(rig.requests.responses[0].body.is_empty());

    app.iterate(10_000, &mut rig.ports());
    rig.requests.pending.push_back(Route::parse(Method::Get, "/log.csv"));
    app.iterate(10_010, &mut rig.ports());
    let log = &rig.requests.responses[1];
    assert_eq!(log.status, 200);
    assert_eq!(log.body, format!("{EPOCH},1000\n").into_bytes());
}

#[test]
fn missing_web_file_is_not_found() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);
    rig.requests.pending.push_back(Route::parse(Method::Get, "/powerGraph.js"));
    app.iterate(0, &mut rig.ports());
    assert_eq!(rig.requests.responses[0].status, 404);
}

// ── Environment & activity ────────────────────────────────────

#[test]
fn environment_sampled_on_schedule() {
    let (_, mut app, mut rig) = service(LinkStatus::Connected);

    app.iterate(1_999, &mut rig.ports());
    assert_eq!(rig.environment.samples, 0);
    assert_eq!(app.environment(), None);

    app.iterate(2_000, &mut rig.ports());
    assert_eq!(rig.environment.samples, 1);
    let reading = EnvReading {
        temperature_c: 21.5,
        humidity_pct: 45.0,
    };
    assert_eq!(app.environment(), Some(reading));

    // A failed read keeps the previous sample.
    rig.environment.next = Err(SensorError::Checksum);
    app.iterate(4_000, &mut rig.ports());
    assert!(rig.sink.contains(&AppEvent::SensorFailed(SensorError::Checksum)));
    assert_eq!(app.environment(), Some(reading));
}

#[test]
fn activity_icon_follows_pulse_bursts() {
    let (counter, mut app, mut rig) = service(LinkStatus::Connected);
    for t in [100, 200, 300] {
        counter.on_edge(t);
    }

    app.iterate(400, &mut rig.ports());
    assert!(rig.sink.contains(&AppEvent::ActivityChanged(ActivityState::Active)));
    assert!(rig.render.last_view.is_some_and(|v| !v.activity));
    app.iterate(410, &mut rig.ports());
    assert!(rig.render.last_view.is_some_and(|v| v.activity));

    app.iterate(2_399, &mut rig.ports());
    assert!(app.meter().activity_status());
    app.iterate(2_400, &mut rig.ports());
    assert!(rig.sink.contains(&AppEvent::ActivityChanged(ActivityState::Idle)));
}

#[test]
fn ui_view_reflects_ports() {
    let (counter, mut app, mut rig) = service(LinkStatus::Connected);
    rig.battery.percent = Some(80);
    counter.on_edge(1_000);
    app.iterate(1_100, &mut rig.ports());

    let view = rig.render.last_view.unwrap();
    assert_eq!(view.pulse_count, 1);
    assert!(view.connected);
    assert_eq!(view.battery_percent, Some(80));
    assert_eq!(view.energy_wh, 0);
    assert_eq!(view.temperature_c, None);
}
