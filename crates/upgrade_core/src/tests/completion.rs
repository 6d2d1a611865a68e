use super::*;

#[test]
fn start_deducts_cost_and_sets_deadline() {
    let mut rig = Rig::new(&["skip"], 10);
    rig.host.tick = 5;
    let cmd = rig.select("skip", 0);
    let events = rig.step(&[cmd]);

    assert!(rig.state.process.is_active());
    assert_eq!(rig.state.process.finish_tick, 105);
    assert_eq!(rig.device.fuel, 0, "exactly the edge cost is consumed");
    assert!(has_event(&events, |e| matches!(
        e,
        Event::UpgradeStarted { cost: 10, finish_tick: 105, .. }
    )));
}

#[test]
fn completes_at_deadline_and_ejects() {
    let mut rig = Rig::new(&["skip", "painblock"], 10);
    rig.host.tick = 5;
    let cmd = rig.select("skip", 0);
    rig.step(&[cmd]);

    let events = rig.run_until(105);
    assert!(rig.state.process.is_active(), "not done before the deadline");
    assert!(!has_event(&events, |e| matches!(e, Event::UpgradeCompleted { .. })));

    let events = rig.step(&[]);
    assert_eq!(rig.state.process.stage, UpgradeStage::NotStarted);
    assert!(rig.state.process.selection.is_none());
    assert!(rig.device.occupant.is_none(), "pawn is released on completion");

    let pawn = &rig.device.ejected[0];
    assert!(!pawn.abilities.contains(&aid("skip")));
    assert!(pawn.abilities.contains(&aid("skip_far")));
    assert!(pawn.abilities.contains(&aid("painblock")));
    assert!(has_event(&events, |e| matches!(e, Event::UpgradeCompleted { .. })));
    assert!(has_event(&events, |e| matches!(e, Event::OccupantEjected { .. })));
}

#[test]
fn completion_charges_nothing_extra() {
    let mut rig = Rig::new(&["skip"], 25);
    let cmd = rig.select("skip", 0);
    rig.step(&[cmd]);
    rig.run_until(101);

    assert!(rig.device.occupant.is_none());
    assert_eq!(rig.device.fuel, 15);
    assert_eq!(rig.host.spawned_total(), 0);
}

#[test]
fn waits_for_fuel_before_starting() {
    let mut rig = Rig::new(&["skip"], 4);
    let cmd = rig.select("skip", 0);
    rig.step(&[cmd]);
    rig.run_until(20);

    assert_eq!(rig.state.process.stage, UpgradeStage::NotStarted);
    assert!(rig.state.process.selection.is_some());
    assert_eq!(rig.device.fuel, 4, "nothing consumed while waiting");

    rig.device.fuel = 12;
    let events = rig.step(&[]);
    assert!(rig.state.process.is_active());
    assert_eq!(rig.state.process.finish_tick, 120);
    assert_eq!(rig.device.fuel, 2);
    assert!(has_event(&events, |e| matches!(e, Event::UpgradeStarted { .. })));
}

#[test]
fn device_runs_upgrades_back_to_back() {
    let mut rig = Rig::new(&["skip"], 40);
    let cmd = rig.select("skip", 0);
    rig.step(&[cmd]);
    rig.run_until(101);
    assert!(rig.device.occupant.is_none());

    // Put the upgraded pawn back in for the next step of the chain.
    rig.device.occupant = rig.device.ejected.pop();
    let cmd = rig.select("skip_far", 0);
    rig.step(&[cmd]);
    assert!(rig.state.process.is_active());
    rig.run_until(rig.state.process.finish_tick + 1);

    let pawn = &rig.device.ejected[0];
    assert_eq!(pawn.abilities, vec![aid("skip_mass")]);
    assert_eq!(rig.device.fuel, 0);
}

#[test]
fn zero_duration_upgrade_completes_next_evaluation() {
    let mut content = base_content();
    content.abilities[0].upgrades_to[1].upgrade_time = 0;
    let mut rig = Rig::new(&["skip"], 20);
    rig.graph = UpgradeGraph::from_content(&content);

    let cmd = rig.select("skip", 1);
    rig.step(&[cmd]);
    assert!(rig.state.process.is_active());
    assert_eq!(
        status_line(&rig.state, &rig.device, rig.host.tick, &rig.graph).as_deref(),
        Some("Upgrade progress: 100%")
    );

    rig.step(&[]);
    assert_eq!(rig.device.ejected[0].abilities, vec![aid("skip_group")]);
}

#[test]
fn huge_duration_deadline_saturates_instead_of_wrapping() {
    let mut content = base_content();
    content.abilities[0].upgrades_to[1].upgrade_time = u64::MAX;
    let mut rig = Rig::new(&["skip"], 20);
    rig.graph = UpgradeGraph::from_content(&content);
    rig.host.tick = 5;

    let cmd = rig.select("skip", 1);
    rig.step(&[cmd]);
    assert!(rig.state.process.is_active());
    assert_eq!(rig.state.process.finish_tick, u64::MAX);

    rig.run_until(50);
    assert!(rig.state.process.is_active(), "upgrade must not complete early");
    assert!(rig.device.ejected.is_empty());
    assert_eq!(
        status_line(&rig.state, &rig.device, rig.host.tick, &rig.graph).as_deref(),
        Some("Upgrade progress: 0%")
    );
}
