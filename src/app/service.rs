//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the pulse meter handle, the task table, and the small
//! amount of loop state the UI needs (display power, "log written" flag,
//! last environment sample).  [`AppService::iterate`] is one pass of the
//! cooperative main loop.  All I/O flows through the port bundle passed in
//! on each call, so the loop runs unchanged against mock adapters.
//!
//! ```text
//!  ConnectivityPort ─┐                        ┌─▶ RenderPort
//!  RequestPort ──────┤   ┌────────────────┐   ├─▶ LogStorePort
//!  InputPort ────────┼──▶│   AppService    │──▶┼─▶ AlertPort
//!  ClockPort ────────┤   │ meter · tasks   │   ├─▶ BatteryPort
//!  EnvSensorPort ────┘   └────────────────┘   └─▶ EventSink
//! ```
//!
//! ## Iteration order
//!
//! 1. connectivity maintenance (back-off gated, skipped unless disconnected)
//! 2. service discovery housekeeping
//! 3. queued HTTP requests, at most [`MAX_REQUESTS_PER_ITERATION`]
//! 4. button events
//! 5. one rendering step → frame budget
//! 6. if budget > 0: beeper, battery, activity debounce, then the deferred
//!    tasks (log, log-indicator expiry, environment sample)

use log::{info, warn};

use crate::api::{self, StatusView};
use crate::config::MeterConfig;
use crate::logbook::LogRecord;
use crate::metering::PulseMeter;
use crate::render::UiView;
use crate::scheduler::{PeriodicTask, TaskClass, TaskId, TaskTable};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ButtonId, EnvReading, LinkStatus, LoopPorts, TaskDelegate, TaskOutcome};

/// Upper bound on HTTP requests answered in one iteration.
pub const MAX_REQUESTS_PER_ITERATION: usize = 4;

/// What one iteration did.  Returned for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Frame budget returned by the rendering step.
    pub frame_budget_ms: u32,
    pub requests_served: usize,
    pub housekeeping_run: usize,
    pub deferred_run: usize,
    /// Whether the low-priority phase ran at all.
    pub secondary_phase: bool,
}

/// Loop state the task delegate mutates.
#[derive(Debug)]
struct LoopState {
    link: LinkStatus,
    services_started: bool,
    log_written: bool,
    environment: Option<EnvReading>,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    config: MeterConfig,
    meter: PulseMeter,
    tasks: TaskTable,
    state: LoopState,
    display_on: bool,
    iterations: u64,
}

impl AppService {
    /// Build the service around an initialised meter.  `now_ms` seeds the
    /// log and sampling timers; the first reconnect attempt is due at once.
    pub fn new(meter: PulseMeter, config: MeterConfig, now_ms: u32) -> Self {
        Self {
            tasks: build_task_table(&config, now_ms),
            config,
            meter,
            state: LoopState {
                link: LinkStatus::Disconnected,
                services_started: false,
                log_written: false,
                environment: None,
            },
            display_on: true,
            iterations: 0,
        }
    }

    pub fn start(&mut self, now_ms: u32, ports: &mut LoopPorts<'_>) {
        // Link state is picked up by the first iteration, which also
        // starts services if the station is already associated.
        ports.sink.emit(&AppEvent::Started { now_ms });
        info!(
            "AppService started ({} tasks, link {:?})",
            self.tasks.len(),
            ports.connectivity.status()
        );
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// One pass of the main loop.  Never blocks and never fails: a
    /// collaborator error is logged and retried at its next slot.
    pub fn iterate(&mut self, now_ms: u32, ports: &mut LoopPorts<'_>) -> IterationReport {
        let mut report = IterationReport::default();

        // 1. Connectivity
        self.track_link(ports);
        if self.state.link == LinkStatus::Disconnected {
            report.housekeeping_run = self.tasks.run_due(
                TaskClass::Housekeeping,
                now_ms,
                &mut TaskRunner {
                    meter: &self.meter,
                    state: &mut self.state,
                    ports: &mut *ports,
                },
            );
        }

        // 2. Service discovery
        ports.services.maintain();

        // 3. HTTP
        report.requests_served = self.serve_requests(now_ms, ports);

        // 4. Buttons
        for button in [ButtonId::Menu, ButtonId::Enter] {
            if let Some(event) = ports.input.poll(button, now_ms) {
                self.handle_command(AppCommand::from_button(button, event), ports);
            }
        }

        // 5. Render
        let view = self.ui_view(ports);
        report.frame_budget_ms = ports.render.advance(now_ms, &view);

        // 6. Low-priority work, only with budget to spare
        if report.frame_budget_ms > 0 {
            report.secondary_phase = true;
            ports.alert.update(now_ms);
            ports.battery.update(now_ms);
            if let Some(activity) = self.meter.update(now_ms) {
                ports.sink.emit(&AppEvent::ActivityChanged(activity));
            }
            report.deferred_run = self.tasks.run_due(
                TaskClass::Deferred,
                now_ms,
                &mut TaskRunner {
                    meter: &self.meter,
                    state: &mut self.state,
                    ports: &mut *ports,
                },
            );
        }

        self.iterations = self.iterations.wrapping_add(1);
        report
    }

    // ── Command handling ──────────────────────────────────────

    /// Act on a front-panel command.
    pub fn handle_command(&mut self, cmd: AppCommand, ports: &mut LoopPorts<'_>) {
        match cmd {
            AppCommand::NextFrame => ports.render.next_frame(),
            AppCommand::PreviousFrame => ports.render.previous_frame(),
            AppCommand::ToggleDisplay => {
                self.display_on = !self.display_on;
                ports.render.set_display_power(self.display_on);
                ports.sink.emit(&AppEvent::DisplayToggled { on: self.display_on });
            }
            AppCommand::ClearMetering => {
                let pulses = self.meter.count();
                self.meter.clear();
                if let Err(e) = ports.log_store.remove() {
                    ports.sink.emit(&AppEvent::LogFailed(e));
                }
                ports.sink.emit(&AppEvent::MeterCleared { pulses });
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn meter(&self) -> &PulseMeter {
        &self.meter
    }

    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn log_written(&self) -> bool {
        self.state.log_written
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    pub fn environment(&self) -> Option<EnvReading> {
        self.state.environment
    }

    pub fn link(&self) -> LinkStatus {
        self.state.link
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Snapshot of everything the display shows.
    pub fn ui_view(&self, ports: &LoopPorts<'_>) -> UiView {
        let snap = self.meter.snapshot();
        UiView {
            pulse_count: snap.pulse_count,
            instant_power_w: snap.instant_power_w,
            energy_wh: energy_wh(snap.pulse_count, self.config.pulses_per_kwh),
            activity: self.meter.activity_status(),
            log_written: self.state.log_written,
            connected: self.state.link == LinkStatus::Connected,
            temperature_c: self.state.environment.map(|e| e.temperature_c),
            humidity_pct: self.state.environment.map(|e| e.humidity_pct),
            battery_percent: ports.battery.percent(),
        }
    }

    // ── Internals ─────────────────────────────────────────────

    /// Follow link transitions.  The first time the station link comes up,
    /// start service discovery and clock sync.
    fn track_link(&mut self, ports: &mut LoopPorts<'_>) {
        let link = ports.connectivity.status();
        if link == self.state.link {
            return;
        }
        match link {
            LinkStatus::Connected => {
                if !self.state.services_started {
                    if let Err(e) = ports.services.start() {
                        warn!("mDNS: {}", e);
                    }
                    ports.clock.begin();
                    self.state.services_started = true;
                }
                ports.sink.emit(&AppEvent::LinkUp);
            }
            LinkStatus::Disconnected if self.state.link == LinkStatus::Connected => {
                ports.sink.emit(&AppEvent::LinkDown);
            }
            _ => {}
        }
        self.state.link = link;
    }

    fn serve_requests(&mut self, now_ms: u32, ports: &mut LoopPorts<'_>) -> usize {
        let mut served = 0;
        while served < MAX_REQUESTS_PER_ITERATION {
            let Some(route) = ports.requests.poll_request() else {
                break;
            };
            let status = StatusView {
                watts: self.meter.instant_power(),
                environment: self.state.environment,
            };
            let response = api::handle(&route, &status, &mut *ports.alert, &*ports.log_store, now_ms);
            ports.requests.respond(response);
            served += 1;
        }
        served
    }
}

/// Energy in watt-hours for `pulses` at `pulses_per_kwh`.
pub fn energy_wh(pulses: u32, pulses_per_kwh: u32) -> u32 {
    if pulses_per_kwh == 0 {
        return 0;
    }
    (pulses as u64 * 1_000 / pulses_per_kwh as u64) as u32
}

fn build_task_table(config: &MeterConfig, now_ms: u32) -> TaskTable {
    let mut table = TaskTable::new();
    let tasks = [
        PeriodicTask::periodic(
            TaskId::Reconnect,
            "wifi-reconnect",
            TaskClass::Housekeeping,
            config.reconnect_interval_ms,
        ),
        PeriodicTask::periodic(TaskId::Log, "log", TaskClass::Deferred, config.log_interval_ms)
            .starting_at(now_ms),
        PeriodicTask::one_shot(
            TaskId::LogIndicator,
            "log-indicator",
            TaskClass::Deferred,
            config.log_indicator_ms,
        ),
        PeriodicTask::periodic(
            TaskId::Sample,
            "env-sample",
            TaskClass::Deferred,
            config.sample_interval_ms,
        )
        .starting_at(now_ms),
    ];
    for task in tasks {
        if let Err(task) = table.add(task) {
            warn!("Scheduler: table full, '{}' dropped", task.label);
        }
    }
    table
}

// ───────────────────────────────────────────────────────────────
// Task delegate
// ───────────────────────────────────────────────────────────────

/// Borrowed view of the service handed to the task table.
struct TaskRunner<'r, 'p> {
    meter: &'r PulseMeter,
    state: &'r mut LoopState,
    ports: &'r mut LoopPorts<'p>,
}

impl TaskRunner<'_, '_> {
    fn reconnect(&mut self) {
        match self.ports.connectivity.begin_connect() {
            Ok(()) => self.ports.sink.emit(&AppEvent::Connecting),
            Err(e) => warn!("WiFi: reconnect not started ({:?})", e),
        }
    }

    fn write_log(&mut self) -> TaskOutcome {
        self.ports.clock.update();
        let Some(epoch_secs) = self.ports.clock.epoch_secs() else {
            self.ports.sink.emit(&AppEvent::LogSkipped);
            return TaskOutcome::Done;
        };
        let record = LogRecord::new(epoch_secs, self.meter.instant_power());
        match self.ports.log_store.append(&record) {
            Ok(()) => {
                self.state.log_written = true;
                self.ports.sink.emit(&AppEvent::LogWritten {
                    epoch_secs: record.epoch_secs,
                    watts: record.watts,
                });
                TaskOutcome::Arm(TaskId::LogIndicator)
            }
            Err(e) => {
                self.ports.sink.emit(&AppEvent::LogFailed(e));
                TaskOutcome::Done
            }
        }
    }

    fn sample_environment(&mut self) {
        match self.ports.environment.sample() {
            Ok(reading) => {
                self.state.environment = Some(reading);
                self.ports.sink.emit(&AppEvent::EnvironmentSampled {
                    temperature_c: reading.temperature_c,
                    humidity_pct: reading.humidity_pct,
                });
            }
            Err(e) => self.ports.sink.emit(&AppEvent::SensorFailed(e)),
        }
    }
}

impl TaskDelegate for TaskRunner<'_, '_> {
    fn on_task_due(&mut self, id: TaskId, _now_ms: u32) -> TaskOutcome {
        match id {
            TaskId::Reconnect => {
                self.reconnect();
                TaskOutcome::Done
            }
            TaskId::Log => self.write_log(),
            TaskId::LogIndicator => {
                self.state.log_written = false;
                TaskOutcome::Done
            }
            TaskId::Sample => {
                self.sample_environment();
                TaskOutcome::Done
            }
        }
    }
}
