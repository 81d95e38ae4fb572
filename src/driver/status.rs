//! Point-in-time snapshots of a driver.

use crate::core::{Args, ControlState, Event, Kwargs, Machine};
use crate::driver::DriverState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Snapshot of machines, queued events and active timers.
///
/// `Display` renders the human-readable report:
///
/// ```text
/// === State Machines: ===
///     - stm_tick in state active (0 deferred)
/// === Events in Queue: ===
///     - tick for stm_tick with args:[] kwargs:{}
/// === Active Timers: 1 ===
///     - tick for stm_tick with timeout 1000 ms (998 ms left)
/// === ================ ===
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct DriverStatus {
    pub taken_at: DateTime<Utc>,
    pub state: DriverState,
    pub remaining_transitions: Option<usize>,
    pub machines: Vec<MachineStatus>,
    pub queue: Vec<QueuedEvent>,
    pub timers: Vec<TimerStatus>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MachineStatus {
    pub id: String,
    pub state: ControlState,
    pub deferred: usize,
}

impl From<&Machine> for MachineStatus {
    fn from(machine: &Machine) -> Self {
        Self {
            id: machine.id().to_string(),
            state: machine.state().clone(),
            deferred: machine.deferred_len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueuedEvent {
    pub machine: String,
    pub trigger: Option<String>,
    pub args: Args,
    pub kwargs: Kwargs,
}

impl From<&Event> for QueuedEvent {
    fn from(event: &Event) -> Self {
        Self {
            machine: event.machine.clone(),
            trigger: event.trigger.clone(),
            args: event.args.clone(),
            kwargs: event.kwargs.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimerStatus {
    pub machine: String,
    pub name: String,
    pub delay_ms: u64,
    pub remaining_ms: u64,
}

impl DriverStatus {
    pub fn machine(&self, id: &str) -> Option<&MachineStatus> {
        self.machines.iter().find(|m| m.id == id)
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== State Machines: ===")?;
        for machine in &self.machines {
            writeln!(
                f,
                "    - {} in state {} ({} deferred)",
                machine.id, machine.state, machine.deferred
            )?;
        }
        writeln!(f, "=== Events in Queue: ===")?;
        for event in &self.queue {
            writeln!(
                f,
                "    - {} for {} with args:{} kwargs:{}",
                event.trigger.as_deref().unwrap_or("<initial>"),
                event.machine,
                serde_json::Value::from(event.args.clone()),
                serde_json::Value::from(event.kwargs.clone()),
            )?;
        }
        writeln!(f, "=== Active Timers: {} ===", self.timers.len())?;
        for timer in &self.timers {
            writeln!(
                f,
                "    - {} for {} with timeout {} ms ({} ms left)",
                timer.name, timer.machine, timer.delay_ms, timer.remaining_ms
            )?;
        }
        writeln!(f, "=== ================ ===")
    }
}
