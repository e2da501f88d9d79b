mod common;

use common::{dispatcher, send};
use hostctl_core::DeviceState;
use hostctl_core::led::LedMode;
use hostctl_core::power::{PowerState, TIMER_INACTIVE};
use hostctl_core::protocol::{CommandCode, encode_ascii};
use hostctl_core::switch::SwitchAction;
use hostctl_core::telemetry::Rejection;

#[test]
fn immediate_up_then_down_leaves_everything_idle() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::PowerUp, 0, 0);
    send(&mut dispatcher, CommandCode::PowerDown, 0, 0);

    assert_eq!(device.power().state(), PowerState::Down);
    assert_eq!(device.power().on_timer().raw(), TIMER_INACTIVE);
    assert_eq!(device.power().off_timer().raw(), TIMER_INACTIVE);
    assert_eq!(dispatcher.board().rail.history, vec![true, false]);
}

#[test]
fn delayed_power_up_fires_on_fifth_tick() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::PowerUp, 0, 5);
    assert_eq!(device.power().on_timer().raw(), 5);

    for tick in 1..5 {
        dispatcher.tick();
        assert_eq!(device.power().state(), PowerState::Down, "tick {tick}");
    }
    let outcome = dispatcher.tick();

    assert!(outcome.powered_on);
    assert_eq!(device.power().state(), PowerState::Up);
    assert_eq!(device.power().on_timer().raw(), TIMER_INACTIVE);

    dispatcher.tick();
    assert_eq!(dispatcher.board().rail.history, vec![true]);
}

#[test]
fn ascii_negative_delay_is_ignored() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    let result = dispatcher.on_write(&encode_ascii(CommandCode::PowerDown, 0, -1));
    assert_eq!(
        result,
        Err(Rejection::ValueOutOfRange {
            code: CommandCode::PowerDown,
            value: -1
        })
    );
    assert!(dispatcher.board().rail.history.is_empty());
    assert_eq!(device.power().off_timer().raw(), TIMER_INACTIVE);
}

#[test]
fn timers_arm_independently_and_both_fire() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::PowerUp, 0, 2);
    send(&mut dispatcher, CommandCode::PowerDown, 0, 3);

    dispatcher.tick();
    let first = dispatcher.tick();
    assert!(first.powered_on && !first.powered_off);
    assert_eq!(device.power().state(), PowerState::Up);

    let second = dispatcher.tick();
    assert!(second.powered_off);
    assert_eq!(device.power().state(), PowerState::Down);
}

#[test]
fn flash_pulses_once_per_tick_until_switched_off() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);
    dispatcher.boot();
    assert_eq!(device.led().mode(), LedMode::Flash);

    for _ in 0..3 {
        assert!(dispatcher.tick().pulse_started);
        assert!(dispatcher.board().led.level);
        dispatcher.end_pulse();
        assert!(!dispatcher.board().led.level);
    }

    assert!(dispatcher.tick().pulse_started);
    dispatcher
        .on_write(&[CommandCode::Led.to_raw(), 0, LedMode::Off as u8])
        .expect("led off");
    assert!(!dispatcher.board().led.level);
    dispatcher.end_pulse();

    let pulses_before = dispatcher.board().led.history.iter().filter(|level| **level).count();
    for _ in 0..3 {
        assert!(!dispatcher.tick().pulse_started);
    }
    let pulses_after = dispatcher.board().led.history.iter().filter(|level| **level).count();
    assert_eq!(pulses_before, pulses_after);
}

#[test]
fn manual_switch_toggles_on_release() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);
    dispatcher.boot();

    assert_eq!(dispatcher.poll_switch(true).0, SwitchAction::Debounce);
    assert_eq!(device.power().state(), PowerState::Up);

    let (action, state) = dispatcher.poll_switch(false);
    assert_eq!(action, SwitchAction::Toggle);
    assert_eq!(state, Some(PowerState::Down));
    assert!(!dispatcher.board().rail.level);
}
