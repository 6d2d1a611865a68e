use super::*;

#[test]
fn device_state_survives_save_and_load() {
    let mut rig = Rig::new(&["skip"], 10);
    let cmd = rig.select("skip", 0);
    rig.step(&[cmd]);

    let json = serde_json::to_string(&rig.state).unwrap();
    let loaded: DeviceState = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.process, rig.state.process);
    assert_eq!(loaded.counters.next_event_id, rig.state.counters.next_event_id);

    rig.state = loaded;
    rig.state.process = rig.state.process.clone().restore(&rig.graph);
    rig.run_until(101);
    assert_eq!(rig.device.ejected[0].abilities, vec![aid("skip_far")]);
}

#[test]
fn restore_against_shrunken_content_resets() {
    let mut rig = Rig::new(&["skip"], 20);
    let cmd = rig.select("skip", 1);
    rig.step(&[cmd]);
    let json = serde_json::to_string(&rig.state.process).unwrap();

    let mut content = base_content();
    content.abilities[0].upgrades_to.truncate(1);
    let graph = UpgradeGraph::from_content(&content);

    let loaded: UpgradeProcess = serde_json::from_str(&json).unwrap();
    let restored = loaded.restore(&graph);
    assert_eq!(restored.stage, UpgradeStage::NotStarted);
    assert!(restored.selection.is_none());
}
