// End-to-end tests driving the controller against the simulated room
use std::sync::Arc;

use smart_thermostat::config::Config;
use smart_thermostat::hardware::{ConfigStore, SensorReading, SensorSource, StoreError, StoredGains};
use smart_thermostat::runtime::ControllerRuntime;
use smart_thermostat::sim::SimRoom;

use async_trait::async_trait;

#[derive(Default)]
struct NullStore;

#[async_trait]
impl ConfigStore for NullStore {
    async fn read_gains(&self) -> Result<Option<StoredGains>, StoreError> {
        Ok(None)
    }

    async fn write_gains(&self, _kp: f64, _ki: f64, _kd: f64) -> Result<(), StoreError> {
        Ok(())
    }
}

fn create_test_config() -> Config {
    let mut config = Config::default();
    config.controller.sensor = "sim.room".to_string();
    config.controller.actuators = vec!["sim.hvac".to_string()];
    config
}

// Advance the room in 1 s substeps so the first-order model stays stable
// at a 60 s tick interval.
fn advance_room(room: &SimRoom, seconds: u64) {
    for _ in 0..seconds {
        room.advance(1.0);
    }
}

#[tokio::test]
async fn test_cold_room_converges_near_target() {
    let mut config = create_test_config();
    // pure proportional control converges monotonically on the first-order
    // room, which keeps the settling assertion deterministic
    config.controller.ki = 0.0;
    config.controller.kd = 0.0;
    let target = config.controller.target;
    let tick = config.controller.update_interval;

    let room = Arc::new(SimRoom::new(19.0, 8.0, 0.0));
    let mut runtime = ControllerRuntime::new(
        config,
        room.clone(),
        room.clone(),
        Arc::new(NullStore),
    )
    .await
    .expect("valid test config");

    for i in 0..200u64 {
        advance_room(&room, tick);
        runtime.tick((i * tick) as f64).await;
        let sp = room.setpoint();
        assert!(sp >= 18.0 - 1e-9 && sp <= 30.0 + 1e-9, "setpoint {} escaped bounds", sp);
    }

    let final_temp = room.temperature();
    assert!(
        (final_temp - target).abs() < 1.5,
        "room should settle near {}, ended at {}",
        target,
        final_temp
    );
}

#[tokio::test]
async fn test_relay_autotune_produces_gains_on_oscillating_room() {
    let config = create_test_config();
    let tick = config.controller.update_interval;

    // Near-neutral outdoor temperature so the relay limit cycle actually
    // crosses the target instead of sagging below it.
    let room = Arc::new(SimRoom::new(21.0, 22.0, 0.0));
    let mut runtime = ControllerRuntime::new(
        config,
        room.clone(),
        room.clone(),
        Arc::new(NullStore),
    )
    .await
    .expect("valid test config");

    runtime.start_autotune();
    for i in 0..60u64 {
        advance_room(&room, tick);
        runtime.tick((i * tick) as f64).await;
        // relay only ever offsets the target by the configured amplitude
        let sp = room.setpoint();
        assert!(sp == 21.5 || sp == 22.5, "unexpected relay command {}", sp);
    }

    let res = runtime
        .stop_autotune()
        .await
        .expect("limit cycle should yield enough peaks");
    assert!(res.ku > 0.0);
    assert!(res.tu > 0.0);
    assert!(res.kp > 0.0 && res.ki > 0.0 && res.kd > 0.0);

    // back on the PID path afterwards
    assert!(!runtime.is_autotuning());
    assert_eq!(runtime.status().mode, "pid");
}

#[tokio::test]
async fn test_noisy_sensor_still_reads_as_value() {
    let room = SimRoom::new(20.0, 10.0, 0.2);
    match room.read("sim.room").await {
        SensorReading::Value(v) => assert!((v - 20.0).abs() <= 0.2 + 1e-9),
        other => panic!("unexpected reading {:?}", other),
    }
}
