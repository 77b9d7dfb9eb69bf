//! Presence monitor on a paused tokio clock

use biorig_core::link::PortInfo;
use biorig_core::presence::{DeviceIdentity, PresenceMonitor, PresenceState};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(100);

#[tokio::test(start_paused = true)]
async fn reports_absent_once_the_device_disappears() {
    let connected = Arc::new(AtomicBool::new(true));
    let polls = Arc::new(AtomicUsize::new(0));

    let enumerator = {
        let connected = connected.clone();
        let polls = polls.clone();
        move || {
            polls.fetch_add(1, Ordering::SeqCst);
            if connected.load(Ordering::SeqCst) {
                vec![PortInfo::named("COM3"), PortInfo::named("COM4")]
            } else {
                vec![PortInfo::named("COM3")]
            }
        }
    };

    let monitor = PresenceMonitor::new(enumerator, DeviceIdentity::port("COM4"), INTERVAL);
    let (mut state, handle) = monitor.spawn();

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(*state.borrow(), PresenceState::Present);
    assert_eq!(polls.load(Ordering::SeqCst), 4);

    connected.store(false, Ordering::SeqCst);
    tokio::time::timeout(INTERVAL, state.wait_for(|s| *s == PresenceState::Absent))
        .await
        .expect("absence noticed within one interval")
        .expect("monitor dropped its sender");

    handle.await.unwrap();
    assert_eq!(polls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn empty_enumeration_counts_as_absent() {
    let monitor = PresenceMonitor::new(
        || Vec::<PortInfo>::new(),
        DeviceIdentity::usb(0x2341, 0x0043),
        INTERVAL,
    );
    assert_eq!(monitor.poll(), PresenceState::Absent);
    assert_eq!(monitor.run().await, PresenceState::Absent);
}

#[tokio::test(start_paused = true)]
async fn matches_on_usb_identity_not_port_name() {
    let uno = PortInfo {
        vid: Some(0x2341),
        pid: Some(0x0043),
        ..PortInfo::named("/dev/ttyACM1")
    };
    let monitor = PresenceMonitor::new(
        move || vec![uno.clone()],
        DeviceIdentity::usb(0x2341, 0x0043),
        INTERVAL,
    );
    assert_eq!(monitor.poll(), PresenceState::Present);

    // Still present after many intervals
    let run = monitor.run();
    let outcome = tokio::time::timeout(INTERVAL * 20, run).await;
    assert!(outcome.is_err());
}
