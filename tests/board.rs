mod common;

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Barrier, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use common::{settle_config, Pad};
use fugit::MillisDurationU32;
use keyirq::{
    config::{BEEP_GPIO, KEY0_VALUE, KEY_TABLE, LED_GPIO},
    device::{OPEN_CMD, SETPERIOD_CMD},
    BlinkDevice, DeadlineTimer, Error, FileOperations, KeyDevice, KeyValue, LineId, LineRegistry,
    OutputDevice, Polarity, SlotState, TimerHandle,
};

static BOARD: LineRegistry = LineRegistry::new();

fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn key_bounce_settles_into_one_press() {
    let key = KEY_TABLE[0];
    let pad = Pad::high();
    let keys = KeyDevice::load(&BOARD, [(key, pad.clone())], &settle_config(40)).unwrap();

    for bounce in 0..8 {
        pad.set(bounce % 2 == 0);
        keys.handle_interrupt(key.gpio);
        thread::sleep(Duration::from_millis(2));
    }
    pad.set(false);
    keys.handle_interrupt(key.gpio);

    assert!(wait_until(Duration::from_secs(1), || {
        keys.debouncer().state(key.gpio) == Some(SlotState::Idle)
    }));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(keys.debouncer().classified(key.gpio), Some(1));
    assert_eq!(keys.value(key.gpio), Some(KeyValue::Pressed(KEY0_VALUE)));

    let session = keys.open().unwrap();
    let mut byte = [0u8];
    keys.read(&session, &mut byte).unwrap();
    assert_eq!(byte[0], KEY0_VALUE);
}

#[test]
fn rearm_fires_once_after_the_second_arm() {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let record = fired.clone();
    let timer = DeadlineTimer::new("scenario", move |_: &TimerHandle| {
        record.lock().unwrap().push(Instant::now());
    })
    .unwrap();

    timer.arm(MillisDurationU32::from_ticks(10));
    thread::sleep(Duration::from_millis(5));
    let second = Instant::now();
    timer.arm(MillisDurationU32::from_ticks(10));
    thread::sleep(Duration::from_millis(100));

    let fired = fired.lock().unwrap();
    assert_eq!(fired.len(), 1);
    assert!(fired[0].duration_since(second) >= Duration::from_millis(10));
}

#[test]
fn led_write_payloads() {
    let pad = Pad::default();
    let led =
        OutputDevice::load("led", &BOARD, LED_GPIO, pad.clone(), Polarity::ActiveLow).unwrap();
    let session = led.open().unwrap();

    led.write(&session, &[1]).unwrap();
    assert!(led.is_active().unwrap());
    assert!(!pad.get());

    led.write(&session, &[0]).unwrap();
    assert!(!led.is_active().unwrap());

    let before = led.level().unwrap();
    led.write(&session, &[7]).unwrap();
    assert_eq!(led.level().unwrap(), before);
}

#[test]
fn concurrent_open_admits_exactly_one() {
    let beep =
        OutputDevice::load("beep", &BOARD, BEEP_GPIO, Pad::default(), Polarity::ActiveLow).unwrap();
    let admitted = AtomicU32::new(0);
    let busy = AtomicU32::new(0);
    let start = Barrier::new(2);
    let tried = Barrier::new(2);

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                start.wait();
                let session = beep.open();
                match &session {
                    Ok(_) => admitted.fetch_add(1, Ordering::SeqCst),
                    Err(err) => {
                        assert_eq!(*err, Error::DeviceBusy);
                        busy.fetch_add(1, Ordering::SeqCst)
                    }
                };
                tried.wait();
                if let Ok(session) = session {
                    beep.release(session);
                }
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
    assert_eq!(busy.load(Ordering::SeqCst), 1);
    assert!(beep.open().is_ok());
}

#[test]
fn set_period_then_open_uses_the_new_period() {
    let blink = BlinkDevice::load(&BOARD, LineId(5), Pad::default(), Polarity::ActiveLow).unwrap();
    let session = blink.open().unwrap();

    blink.ioctl(&session, SETPERIOD_CMD, 500).unwrap();
    let opened = Instant::now();
    blink.ioctl(&session, OPEN_CMD, 0).unwrap();

    assert!(wait_until(Duration::from_secs(3), || blink.toggles() >= 1));
    assert!(opened.elapsed() >= Duration::from_millis(500));
    assert_eq!(blink.period().to_millis(), 500);
}

#[test]
fn unload_while_settling_is_clean() {
    let key = keyirq::KeyDesc { gpio: LineId(19), code: 0x02, name: "KEY1" };
    let pad = Pad::high();
    let keys = KeyDevice::load(&BOARD, [(key, pad.clone())], &settle_config(30)).unwrap();

    pad.set(false);
    keys.handle_interrupt(key.gpio);
    drop(keys);

    assert!(!BOARD.is_claimed(key.gpio));
    let again = KeyDevice::load(&BOARD, [(key, pad)], &settle_config(30));
    assert!(again.is_ok());
}
