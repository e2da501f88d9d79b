mod common;

use common::{dispatcher, send};
use hostctl_core::DeviceState;
use hostctl_core::config::FIRMWARE_VERSION;
use hostctl_core::led::LedMode;
use hostctl_core::protocol::{
    CommandCode, MODE_ASCII, MODE_BINARY, Packet, Query, encode_ascii, encode_binary,
};
use hostctl_core::telemetry::{DispatchEventKind, Rejection};

fn parse_ascii(bytes: &[u8]) -> i32 {
    let (terminator, digits) = bytes.split_last().expect("non-empty");
    assert_eq!(*terminator, 0);
    std::str::from_utf8(digits)
        .expect("utf8")
        .parse()
        .expect("decimal")
}

#[test]
fn version_is_two_bytes_regardless_of_history() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::PowerUp, 0, 3);
    send(&mut dispatcher, CommandCode::Led, 0, 0);
    dispatcher
        .on_write(&encode_binary(CommandCode::Version, 9, MODE_ASCII, 77))
        .expect("staged");

    let response = dispatcher.on_read();
    assert_eq!(response.as_slice(), &FIRMWARE_VERSION.to_le_bytes());
}

#[test]
fn digital_round_trip_in_both_encodings() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::DigitalOut, 2, 1);

    send(&mut dispatcher, CommandCode::DigitalIn, 2, 0);
    let binary = dispatcher.on_read();
    assert_eq!(binary.as_slice(), &1i32.to_le_bytes());

    dispatcher
        .on_write(&encode_binary(CommandCode::DigitalIn, 2, MODE_ASCII, 0))
        .expect("staged");
    let ascii = dispatcher.on_read();
    assert_eq!(ascii.as_slice(), b"1\0");
    assert_eq!(parse_ascii(&ascii), 1);

    send(&mut dispatcher, CommandCode::DigitalOut, 2, 0);
    send(&mut dispatcher, CommandCode::DigitalIn, 2, 0);
    assert_eq!(dispatcher.on_read().as_slice(), &0i32.to_le_bytes());
}

#[test]
fn nonzero_digital_values_drive_high() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    let packet = encode_ascii(CommandCode::DigitalOut, 1, -4);
    dispatcher.on_write(&packet).expect("executed");

    send(&mut dispatcher, CommandCode::DigitalIn, 1, 0);
    assert_eq!(dispatcher.on_read().as_slice(), &1i32.to_le_bytes());
}

#[test]
fn analog_read_scales_and_formats() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);
    dispatcher.board_mut().analog[1].0 = 0.75;

    send(&mut dispatcher, CommandCode::AnalogRead, 1, 0);
    assert_eq!(dispatcher.on_read().as_slice(), &768i32.to_le_bytes());

    dispatcher
        .on_write(&encode_binary(CommandCode::AnalogRead, 1, MODE_ASCII, 0))
        .expect("staged");
    assert_eq!(dispatcher.on_read().as_slice(), b"0.750000\0");
}

#[test]
fn write_class_and_unknown_commands_clear_the_descriptor() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::Version, 0, 0);
    send(&mut dispatcher, CommandCode::Led, 0, 0);
    assert_eq!(dispatcher.pending(), None);
    assert!(dispatcher.on_read().is_empty());

    send(&mut dispatcher, CommandCode::Version, 0, 0);
    assert_eq!(
        dispatcher.on_write(&[0x7e, 0, 0]),
        Err(Rejection::UnknownCommand(0x7e))
    );
    assert!(dispatcher.on_read().is_empty());
    assert_eq!(
        dispatcher.telemetry().latest().map(|record| record.event),
        Some(DispatchEventKind::Rejected(Rejection::NothingStaged))
    );
}

#[test]
fn new_read_class_command_overwrites_descriptor() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::AnalogRead, 0, 0);
    send(&mut dispatcher, CommandCode::Version, 0, 0);

    let pending = dispatcher.pending().expect("staged");
    assert_eq!(pending.query, Query::Version);
    assert_eq!(dispatcher.on_read().len(), 2);
}

#[test]
fn empty_write_leaves_descriptor_alone() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::Version, 0, 0);
    assert_eq!(dispatcher.on_write(&[]), Err(Rejection::EmptyPacket));
    assert_eq!(dispatcher.on_read().len(), 2);
}

#[test]
fn out_of_range_channels_are_silent_no_ops() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    for code in [
        CommandCode::DigitalOut,
        CommandCode::PwmOut,
        CommandCode::PwmPeriod,
        CommandCode::AnalogStart,
        CommandCode::AnalogStop,
        CommandCode::AnalogReset,
    ] {
        let result = dispatcher.on_write(&encode_binary(code, 9, MODE_BINARY, 100));
        assert_eq!(
            result,
            Err(Rejection::ChannelOutOfRange { code, channel: 9 }),
            "{code}"
        );
    }

    for code in [CommandCode::AnalogRead, CommandCode::AnalogLoad, CommandCode::DigitalIn] {
        send(&mut dispatcher, code, 9, 0);
        assert!(dispatcher.on_read().is_empty(), "{code}");
    }

    let board = dispatcher.board();
    assert!(board.pwm.iter().all(|pwm| pwm.duty.is_none() && pwm.period_us.is_none()));
    assert!(board.samplers.iter().all(|sampler| sampler.arms == 0));
}

#[test]
fn pwm_duty_and_period() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::PwmOut, 0, 512);
    send(&mut dispatcher, CommandCode::PwmOut, 1, 4096);
    assert_eq!(dispatcher.board().pwm[0].duty, Some(0.5));
    assert_eq!(dispatcher.board().pwm[1].duty, Some(4.0));

    send(&mut dispatcher, CommandCode::PwmPeriod, 1, 20_000);
    assert_eq!(dispatcher.board().pwm[1].period_us, Some(20_000));

    let rejected =
        dispatcher.on_write(&encode_binary(CommandCode::PwmPeriod, 1, MODE_BINARY, 40_000));
    assert_eq!(
        rejected,
        Err(Rejection::ValueOutOfRange {
            code: CommandCode::PwmPeriod,
            value: 40_000
        })
    );
    assert_eq!(dispatcher.board().pwm[1].period_us, Some(20_000));
}

#[test]
fn led_modes_drive_line_and_reject_unknown_modes() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    let led = |mode: u8| [CommandCode::Led.to_raw(), 0, mode];

    dispatcher.on_write(&led(1)).expect("on");
    assert!(dispatcher.board().led.level);
    assert_eq!(device.led().mode(), LedMode::On);

    dispatcher.on_write(&led(0)).expect("off");
    assert!(!dispatcher.board().led.level);

    assert_eq!(dispatcher.on_write(&led(7)), Err(Rejection::InvalidLedMode(7)));
    assert_eq!(device.led().mode(), LedMode::Off);
}

#[test]
fn telemetry_counts_every_outcome() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::PowerDown, 0, 0);
    send(&mut dispatcher, CommandCode::Version, 0, 0);
    dispatcher.on_read();
    let _ = dispatcher.on_write(&[0xff]);

    let counters = dispatcher.telemetry().counters();
    assert_eq!(counters.executed, 1);
    assert_eq!(counters.staged, 1);
    assert_eq!(counters.emitted, 1);
    assert_eq!(counters.rejected, 1);

    let decoded = Packet::decode(&[0xff]).expect("decodes");
    assert_eq!(decoded.command, 0xff);
}
