use std::sync::{Arc, Weak};
use std::time::Duration;

use foundation::VehicleId;
use link::{LinkManager, LinkState};
use parking_lot::Mutex;
use runtime::{Notification, NotificationBus, Subscription, Topic};
use scene::MapReconciler;
use serde_json::{Value, json};
use telemetry::{
    FleetAggregator, FleetSnapshot, PollOutput, PollTarget, SelectionChange, TelemetryPoller,
    TelemetrySnapshot, TelemetrySource, VehicleSummary,
};
use tracing::{debug, info};

/// System id the single-link vehicle is drawn under.
pub const SINGLE_LINK_VEHICLE: VehicleId = VehicleId(1);

#[derive(Default)]
struct Pollers {
    fleet: Option<Arc<TelemetryPoller>>,
    vehicle: Option<Arc<TelemetryPoller>>,
}

impl Pollers {
    fn stop_all(&mut self) {
        for poller in [self.fleet.take(), self.vehicle.take()].into_iter().flatten() {
            poller.stop();
        }
    }
}

struct Shared {
    bus: NotificationBus,
    link: Arc<LinkManager>,
    source: Arc<dyn TelemetrySource>,
    reconciler: Arc<Mutex<MapReconciler>>,
    period: Duration,
    aggregator: Mutex<FleetAggregator>,
    telemetry: Mutex<Option<(Option<VehicleId>, TelemetrySnapshot)>>,
    pollers: Mutex<Pollers>,
}

impl Shared {
    fn poller(self: &Arc<Self>, target: PollTarget) -> Arc<TelemetryPoller> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let poller = Arc::new(
            TelemetryPoller::new(
                target,
                self.source.clone(),
                move |_generation: u64, output: PollOutput| {
                    if let Some(shared) = weak.upgrade() {
                        shared.deliver(output);
                    }
                },
                self.link.watch_state(),
            )
            .with_period(self.period),
        );
        if self.link.attach(poller.clone()) {
            poller.start();
        }
        poller
    }

    fn on_connected(self: &Arc<Self>, fleet: bool) {
        let mut pollers = self.pollers.lock();
        pollers.stop_all();
        if fleet {
            pollers.fleet = Some(self.poller(PollTarget::Fleet));
        } else {
            pollers.vehicle = Some(self.poller(PollTarget::Vehicle(None)));
        }
        info!(fleet, "telemetry polling started");
    }

    fn on_disconnected(&self) {
        self.pollers.lock().stop_all();
        *self.telemetry.lock() = None;
        let change = self.aggregator.lock().reset();
        let removed = self.reconciler.lock().clear_vehicles();
        debug!(removed, "fleet view cleared");
        if let Some(change) = change {
            self.announce(change);
        }
    }

    fn deliver(self: &Arc<Self>, output: PollOutput) {
        match output {
            PollOutput::Fleet(snapshot) => {
                let change = self.aggregator.lock().apply(snapshot);
                self.redraw();
                if let Some(change) = change {
                    self.retarget();
                    self.announce(change);
                }
            }
            PollOutput::Telemetry { target, snapshot } => {
                let (current, single) = {
                    let pollers = self.pollers.lock();
                    (pollers.vehicle.as_ref().map(|p| p.target()), pollers.fleet.is_none())
                };
                if current != Some(PollTarget::Vehicle(target)) {
                    debug!(?target, "telemetry for a previous target dropped");
                    return;
                }
                if !snapshot.is_complete() {
                    debug!(missing = ?snapshot.missing_sections(), "incomplete telemetry");
                }
                if single {
                    self.draw_single(&snapshot);
                }
                *self.telemetry.lock() = Some((target, snapshot));
            }
        }
    }

    fn redraw(&self) {
        let aggregator = self.aggregator.lock();
        self.reconciler
            .lock()
            .reconcile_vehicles(aggregator.snapshot(), aggregator.selected());
    }

    /// Without a fleet poll the one linked vehicle is drawn from its own
    /// telemetry.
    fn draw_single(&self, snapshot: &TelemetrySnapshot) {
        let id = SINGLE_LINK_VEHICLE;
        let view: FleetSnapshot = [(id, VehicleSummary::from(snapshot))].into_iter().collect();
        self.reconciler.lock().reconcile_vehicles(&view, Some(id));
    }

    /// Points the per-vehicle poller at the current fleet selection.
    fn retarget(self: &Arc<Self>) {
        let selected = self.aggregator.lock().selected();
        let mut pollers = self.pollers.lock();
        if pollers.fleet.is_none() {
            return;
        }
        let wanted = selected.map(|id| PollTarget::Vehicle(Some(id)));
        if pollers.vehicle.as_ref().map(|p| p.target()) == wanted {
            return;
        }
        if let Some(old) = pollers.vehicle.take() {
            old.stop();
        }
        *self.telemetry.lock() = None;
        pollers.vehicle = wanted.map(|target| self.poller(target));
    }

    fn announce(&self, change: SelectionChange) {
        let payload = change.selected().map_or(Value::Null, |id| json!(id.0));
        self.bus.publish(Topic::VehicleSelected, payload);
    }

    fn on_vehicle_selected(self: &Arc<Self>, note: &Notification) {
        let change = match note.payload_u64().and_then(|v| u8::try_from(v).ok()) {
            Some(id) => self.aggregator.lock().select(VehicleId(id)),
            None if note.payload.is_null() => self.aggregator.lock().clear_selection(),
            None => {
                debug!(payload = %note.payload, "ignoring malformed vehicle selection");
                return;
            }
        };
        if change.is_some() {
            self.redraw();
            self.retarget();
        }
    }
}

/// Live fleet view: polls while a link is up, keeps the selection and draws
/// vehicle markers.
///
/// Mounting subscribes first and then checks the link, so a connection made
/// before the panel existed is still picked up. Dropping the panel stops its
/// pollers and removes its markers.
pub struct FleetPanel {
    shared: Arc<Shared>,
    subscriptions: Vec<Subscription>,
}

impl FleetPanel {
    pub fn mount(
        bus: NotificationBus,
        link: Arc<LinkManager>,
        source: Arc<dyn TelemetrySource>,
        reconciler: Arc<Mutex<MapReconciler>>,
        period: Duration,
    ) -> Self {
        let shared = Arc::new(Shared {
            bus: bus.clone(),
            link,
            source,
            reconciler,
            period,
            aggregator: Mutex::new(FleetAggregator::new()),
            telemetry: Mutex::new(None),
            pollers: Mutex::new(Pollers::default()),
        });

        let on_connect = shared.clone();
        let on_disconnect = shared.clone();
        let on_select = shared.clone();
        let subscriptions = vec![
            bus.subscribe(Topic::LinkConnected, move |note| {
                let fleet = note.payload.get("fleet").and_then(Value::as_bool).unwrap_or(false);
                on_connect.on_connected(fleet);
            }),
            bus.subscribe(Topic::LinkDisconnected, move |_| on_disconnect.on_disconnected()),
            bus.subscribe(Topic::VehicleSelected, move |note| on_select.on_vehicle_selected(note)),
        ];

        let status = shared.link.status();
        if status.state == LinkState::Connected {
            debug!("link already up at mount");
            shared.on_connected(status.fleet);
        }

        Self {
            shared,
            subscriptions,
        }
    }

    /// Operator selection; relayed over the bus so every panel follows it.
    pub fn select(&self, id: VehicleId) {
        self.shared.bus.publish(Topic::VehicleSelected, json!(id.0));
    }

    pub fn selected(&self) -> Option<VehicleId> {
        self.shared.aggregator.lock().selected()
    }

    pub fn fleet(&self) -> FleetSnapshot {
        self.shared.aggregator.lock().snapshot().clone()
    }

    /// Latest per-vehicle telemetry and the target it was polled for.
    pub fn telemetry(&self) -> Option<(Option<VehicleId>, TelemetrySnapshot)> {
        self.shared.telemetry.lock().clone()
    }

    pub fn is_polling(&self) -> bool {
        let pollers = self.shared.pollers.lock();
        pollers.fleet.is_some() || pollers.vehicle.is_some()
    }

    pub fn unmount(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        self.subscriptions.clear();
        self.shared.pollers.lock().stop_all();
        self.shared.reconciler.lock().clear_vehicles();
    }
}

impl Drop for FleetPanel {
    fn drop(&mut self) {
        self.unmount();
    }
}
