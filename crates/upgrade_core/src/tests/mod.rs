use super::*;
use crate::test_fixtures::{
    aid, base_content, base_device_state, base_graph, make_rng, TestDevice, TestHost, TestPawn,
};
use rand_chacha::ChaCha8Rng;

mod completion;
mod persistence;

// --- Shared test helpers ------------------------------------------------

struct Rig {
    graph: UpgradeGraph,
    state: DeviceState,
    device: TestDevice,
    host: TestHost,
    rng: ChaCha8Rng,
    next_command_id: u64,
}

impl Rig {
    fn new(abilities: &[&str], fuel: u32) -> Self {
        Self {
            graph: base_graph(),
            state: base_device_state(),
            device: TestDevice::occupied_by(TestPawn::with_abilities(abilities), fuel),
            host: TestHost::default(),
            rng: make_rng(),
            next_command_id: 0,
        }
    }

    fn command(&mut self, command: Command) -> CommandEnvelope {
        let id = CommandId(format!("cmd_{:06}", self.next_command_id));
        self.next_command_id += 1;
        CommandEnvelope {
            id,
            issued_tick: self.host.tick,
            execute_at_tick: self.host.tick,
            command,
        }
    }

    fn select(&mut self, ability: &str, edge_index: usize) -> CommandEnvelope {
        self.command(Command::SelectUpgrade {
            ability: aid(ability),
            edge_index,
        })
    }

    /// Run one tick at the host's current tick, then advance the clock.
    fn step(&mut self, commands: &[CommandEnvelope]) -> Vec<EventEnvelope> {
        let events = tick(
            &mut self.state,
            commands,
            &mut self.device,
            &mut self.host,
            &self.graph,
            &mut self.rng,
        );
        self.host.tick += 1;
        events
    }

    /// Step without commands until the host clock reaches `target`.
    fn run_until(&mut self, target: u64) -> Vec<EventEnvelope> {
        let mut events = Vec::new();
        while self.host.tick < target {
            events.extend(self.step(&[]));
        }
        events
    }

    fn occupant(&self) -> &TestPawn {
        self.device.occupant.as_ref().expect("device should be occupied")
    }
}

fn has_event(events: &[EventEnvelope], pred: impl Fn(&Event) -> bool) -> bool {
    events.iter().any(|envelope| pred(&envelope.event))
}
