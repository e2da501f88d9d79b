mod common;

use std::time::Duration;

use common::{dispatcher, send};
use hostctl_core::DeviceState;
use hostctl_core::config::{ANALOG_CHANNELS, SAMPLE_CAPACITY};
use hostctl_core::protocol::CommandCode;
use hostctl_core::telemetry::DispatchEventKind;

fn decode_dump(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[test]
fn buffers_saturate_at_reserved_capacity() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    for channel in 0..ANALOG_CHANNELS {
        let channel_byte = u8::try_from(channel).expect("small channel");
        send(&mut dispatcher, CommandCode::AnalogStart, channel_byte, 10);
        for _ in 0..SAMPLE_CAPACITY * 2 {
            dispatcher.sample(channel);
        }

        let buffer = device.analog().buffer(channel).expect("buffer");
        assert_eq!(buffer.len(), SAMPLE_CAPACITY - 1);
        assert_eq!(buffer.dropped(), u32::try_from(SAMPLE_CAPACITY + 1).expect("fits"));
    }
}

#[test]
fn load_drains_exactly_once() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);
    dispatcher.board_mut().analog[0].0 = 0.5;

    send(&mut dispatcher, CommandCode::AnalogStart, 0, 100);
    for _ in 0..3 {
        dispatcher.sample(0);
    }

    send(&mut dispatcher, CommandCode::AnalogLoad, 0, 0);
    let first = decode_dump(&dispatcher.on_read());
    assert_eq!(first, vec![3, 512, 512, 512]);
    assert_eq!(device.analog().buffer(0).expect("buffer").len(), 0);

    send(&mut dispatcher, CommandCode::AnalogLoad, 0, 0);
    assert_eq!(decode_dump(&dispatcher.on_read()), vec![0]);
}

#[test]
fn start_resets_count_and_rearms() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::AnalogStart, 1, 50);
    dispatcher.sample(1);
    dispatcher.sample(1);
    send(&mut dispatcher, CommandCode::AnalogStart, 1, 250);

    let sampler = &dispatcher.board().samplers[1];
    assert_eq!(sampler.arms, 2);
    assert_eq!(sampler.period, Some(Duration::from_millis(250)));
    assert!(device.analog().buffer(1).expect("buffer").is_empty());
    assert_eq!(device.analog().period(1).map(|period| period.millis), Some(250));
}

#[test]
fn out_of_range_period_uses_default_and_still_resets() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::AnalogStart, 2, 20);
    dispatcher.sample(2);
    send(&mut dispatcher, CommandCode::AnalogStart, 2, 5);

    assert_eq!(
        dispatcher.board().samplers[2].period,
        Some(Duration::from_secs(1))
    );
    assert!(device.analog().buffer(2).expect("buffer").is_empty());
    assert!(dispatcher.telemetry().oldest_first().any(|record| matches!(
        record.event,
        DispatchEventKind::SamplePeriodDefaulted {
            channel: 2,
            requested: 5
        }
    )));
}

#[test]
fn stop_keeps_samples_and_reset_clears_them() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::AnalogStart, 0, 10);
    dispatcher.sample(0);
    send(&mut dispatcher, CommandCode::AnalogStop, 0, 0);

    assert_eq!(dispatcher.board().samplers[0].period, None);
    assert_eq!(device.analog().period(0), None);
    assert_eq!(device.analog().buffer(0).expect("buffer").len(), 1);

    send(&mut dispatcher, CommandCode::AnalogStart, 0, 10);
    dispatcher.sample(0);
    send(&mut dispatcher, CommandCode::AnalogReset, 0, 0);

    assert_eq!(dispatcher.board().samplers[0].period, None);
    assert!(device.analog().buffer(0).expect("buffer").is_empty());
}

#[test]
fn channels_fill_independently() {
    let device = DeviceState::new();
    let mut dispatcher = dispatcher(&device);

    send(&mut dispatcher, CommandCode::AnalogStart, 0, 10);
    send(&mut dispatcher, CommandCode::AnalogStart, 1, 10);
    for _ in 0..4 {
        dispatcher.sample(0);
    }
    dispatcher.sample(1);

    assert_eq!(device.analog().buffer(0).expect("buffer").len(), 4);
    assert_eq!(device.analog().buffer(1).expect("buffer").len(), 1);
    assert_eq!(device.analog().buffer(2).expect("buffer").len(), 0);
}
