use std::sync::Arc;
use std::time::{Duration, Instant};

use autoflow_comm::{DeviceConfig, DeviceError, DeviceManager, DeviceProfile, RegisterArea, SimulatedDevice};

fn manager() -> DeviceManager {
    DeviceManager::new(DeviceConfig::with_timeout(Duration::from_millis(300)))
}

#[tokio::test]
async fn connect_is_idempotent() {
    let device = SimulatedDevice::new();
    let dm = manager();
    dm.register_connector("press", Arc::new(device.connector()));

    assert!(dm.connect("press").await.unwrap());
    assert!(dm.connect("press").await.unwrap());
    assert_eq!(device.open_count(), 1);
    assert_eq!(dm.connected_devices(), vec!["press".to_string()]);
}

#[tokio::test]
async fn unknown_devices_are_not_found() {
    let dm = manager();
    assert!(!dm.is_connected("ghost"));
    assert_eq!(dm.connect("ghost").await, Err(DeviceError::DeviceNotFound("ghost".into())));
    assert!(matches!(dm.read_value::<u16>("ghost", "HR0").await, Err(DeviceError::DeviceNotFound(_))));
    // desconectar algo desconocido no es un error
    dm.disconnect("ghost");
}

#[tokio::test]
async fn registered_but_not_connected_is_not_found() {
    let dm = manager();
    dm.register_device("sim", &DeviceProfile::Simulated).unwrap();
    let err = dm.write_value("sim", "HR0", 1u16).await.unwrap_err();
    assert_eq!(err, DeviceError::DeviceNotFound("sim".into()));
}

#[tokio::test]
async fn refused_connection_returns_false() {
    let device = SimulatedDevice::new();
    device.refuse_connections(true);
    let dm = manager();
    dm.register_connector("press", Arc::new(device.connector()));

    assert!(!dm.connect("press").await.unwrap());
    assert!(!dm.is_connected("press"));
}

#[tokio::test]
async fn unreachable_tcp_device_returns_false() {
    let dm = manager();
    // puerto 1 en loopback: rechazo inmediato o timeout, ambos dan false
    dm.register_device("remote", &DeviceProfile::tcp("127.0.0.1", 1)).unwrap();
    assert!(!dm.connect("remote").await.unwrap());
}

#[tokio::test]
async fn communication_failure_marks_disconnected_and_reconnect_recovers() {
    let device = SimulatedDevice::new();
    device.set_word(RegisterArea::Holding, 5, 42);
    let dm = manager();
    dm.register_connector("press", Arc::new(device.connector()));
    dm.connect("press").await.unwrap();

    device.fail_next_io(1);
    let err = dm.read_value::<u16>("press", "D5").await.unwrap_err();
    assert!(matches!(err, DeviceError::Communication { ref device_id, .. } if device_id == "press"));
    assert!(!dm.is_connected("press"));
    assert!(matches!(dm.read_value::<u16>("press", "D5").await, Err(DeviceError::DeviceNotFound(_))));

    assert!(dm.connect("press").await.unwrap());
    assert_eq!(device.open_count(), 2);
    assert_eq!(dm.read_value::<u16>("press", "D5").await.unwrap(), 42);
}

#[tokio::test]
async fn disconnect_removes_the_entry() {
    let device = SimulatedDevice::new();
    let dm = manager();
    dm.register_connector("press", Arc::new(device.connector()));
    dm.connect("press").await.unwrap();

    dm.disconnect("press");
    assert!(!dm.is_connected("press"));
    assert!(dm.connected_devices().is_empty());
}

#[tokio::test]
async fn slow_device_does_not_block_other_devices() {
    let slow = SimulatedDevice::new();
    slow.set_latency(Some(Duration::from_millis(250)));
    let fast = SimulatedDevice::new();

    let dm = Arc::new(DeviceManager::new(DeviceConfig::with_timeout(Duration::from_secs(2))));
    dm.register_connector("slow", Arc::new(slow.connector()));
    dm.register_connector("fast", Arc::new(fast.connector()));
    dm.connect("slow").await.unwrap();

    let reader = {
        let dm = dm.clone();
        tokio::spawn(async move { dm.read_value::<u16>("slow", "HR0").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    assert!(dm.connect("fast").await.unwrap());
    dm.write_value("fast", "HR0", 9u16).await.unwrap();
    dm.disconnect("fast");
    assert!(started.elapsed() < Duration::from_millis(200));

    assert_eq!(reader.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn concurrent_writes_on_one_device_are_serialised() {
    let device = SimulatedDevice::new();
    let dm = Arc::new(manager());
    dm.register_connector("press", Arc::new(device.connector()));
    dm.connect("press").await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16u16 {
        let dm = dm.clone();
        tasks.push(tokio::spawn(async move { dm.write_value("press", &format!("HR{}", i * 2), i as u32 * 70_000).await }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    for i in 0..16u16 {
        assert_eq!(dm.read_value::<u32>("press", &format!("HR{}", i * 2)).await.unwrap(), i as u32 * 70_000);
    }
}
