use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use hostctl_core::config::{ANALOG_CHANNELS, LED_PULSE, SWITCH_DEBOUNCE, TICK_PERIOD};
use hostctl_core::hal::{Board, DigitalOutput};
use hostctl_core::protocol::{
    Command, CommandCode, MODE_BINARY, PendingResponse, Query, ValueMode, encode_ascii,
    encode_binary,
};
use hostctl_core::power::PowerState;
use hostctl_core::switch::SwitchAction;
use hostctl_core::telemetry::{DispatchEventKind, EventId};
use hostctl_core::{DeviceState, Dispatcher};

use crate::console::{self, ConsoleCommand, HELP_TOPICS, SendCommand};
use crate::sim::SimBoard;

/// Interactive emulator session: one device, one simulated board, one
/// virtual clock.
pub struct Session {
    dispatcher: Dispatcher<'static, SimBoard>,
    clock: VirtualClock,
    transcript: Option<TranscriptLogger>,
    last_seen_event: Option<EventId>,
}

#[derive(Default)]
struct VirtualClock {
    now: Duration,
    next_tick: Duration,
    samplers: [SamplerSchedule; ANALOG_CHANNELS],
}

#[derive(Clone, Copy, Default)]
struct SamplerSchedule {
    generation: u32,
    period: Duration,
    next_due: Option<Duration>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ClockEvent {
    Tick,
    Sample(usize),
}

impl Session {
    /// Boots a fresh device with no transcript.
    #[must_use]
    pub fn new() -> Self {
        // Each session owns its device for the rest of the process.
        let device: &'static DeviceState = Box::leak(Box::new(DeviceState::new()));
        let mut dispatcher = Dispatcher::new(device, SimBoard::default());
        dispatcher.boot();

        Self {
            dispatcher,
            clock: VirtualClock {
                next_tick: TICK_PERIOD,
                ..VirtualClock::default()
            },
            transcript: None,
            last_seen_event: None,
        }
    }

    /// Boots a fresh device and records every exchange to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transcript file cannot be created.
    pub fn with_transcript(path: &Path, header: &str) -> io::Result<Self> {
        let mut session = Self::new();
        session.transcript = Some(TranscriptLogger::new(path, header)?);
        Ok(session)
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher<'static, SimBoard> {
        &self.dispatcher
    }

    /// Virtual time since boot.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now
    }

    /// Runs one console line and returns the lines to show for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transcript cannot be written.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(self.clock.now, TranscriptRole::Host, trimmed)?;
        }

        let lines = match console::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        if let Some(transcript) = self.transcript.as_mut() {
            for line in &lines {
                transcript.append_line(self.clock.now, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(lines)
    }

    fn execute(&mut self, command: ConsoleCommand) -> Vec<String> {
        match command {
            ConsoleCommand::Write(bytes) => self.write(&bytes),
            ConsoleCommand::Send(send) => {
                let packet = encode_send(send);
                let mut lines = vec![format!("packet {}", hex(&packet))];
                lines.extend(self.write(&packet));
                lines
            }
            ConsoleCommand::Read => self.read(),
            ConsoleCommand::Tick(count) => {
                let mut lines = Vec::new();
                for _ in 0..count {
                    let next_tick = self.clock.next_tick;
                    lines.extend(self.run_until(next_tick));
                }
                lines
            }
            ConsoleCommand::Advance(duration) => {
                let Some(target) = self.clock.now.checked_add(duration) else {
                    return vec!["ERR clock overflow".to_string()];
                };
                let mut lines = self.run_until(target);
                lines.push(format!("time {}", format_time(self.clock.now)));
                lines
            }
            ConsoleCommand::Press => self.press(),
            ConsoleCommand::Analog { channel, level } => {
                match self
                    .dispatcher
                    .board_mut()
                    .analog
                    .get_mut(usize::from(channel))
                {
                    Some(input) => {
                        input.level = level;
                        vec![format!("analog {channel} level {level:.3}")]
                    }
                    None => vec![format!("ERR no analog channel {channel}")],
                }
            }
            ConsoleCommand::Digital { channel, level } => {
                match self.dispatcher.board_mut().digital_input(usize::from(channel)) {
                    Some(wire) => {
                        wire.set(level);
                        vec![format!("digital {channel} driven {}", u8::from(level))]
                    }
                    None => vec![format!("ERR no digital channel {channel}")],
                }
            }
            ConsoleCommand::Status => self.status(),
            ConsoleCommand::Help(topic) => help(topic.as_deref()),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Vec<String> {
        let result = self.dispatcher.on_write(bytes);
        self.sync_samplers();

        let mut lines = vec![match result {
            Ok(Command::Stage(pending)) => format!(
                "OK staged {} ch={} mode={}",
                pending.query.code(),
                pending.channel,
                mode_label(pending.mode)
            ),
            Ok(command) => match command.code() {
                Some(code) => format!("OK {code}"),
                None => "OK".to_string(),
            },
            Err(reason) => format!("IGNORED {reason}"),
        }];
        lines.extend(self.drain_notes());
        lines
    }

    fn read(&mut self) -> Vec<String> {
        let response = self.dispatcher.on_read();
        self.drain_notes();

        if response.is_empty() {
            return vec!["READ 0 bytes".to_string()];
        }

        let mut lines = vec![format!("READ {} bytes: {}", response.len(), hex(&response))];
        if let Some(pending) = self.dispatcher.pending() {
            lines.push(format!(
                "  {} ch{} => {}",
                pending.query.code(),
                pending.channel,
                decode_response(pending, &response)
            ));
        }
        lines
    }

    fn press(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.dispatcher.poll_switch(true).0 == SwitchAction::Debounce {
            let settle = self.clock.now + SWITCH_DEBOUNCE;
            lines.extend(self.run_until(settle));
        }
        match self.dispatcher.poll_switch(false) {
            (SwitchAction::Toggle, Some(state)) => {
                lines.push(format!("switch released: power {}", power_label(state)));
            }
            _ => lines.push("switch released: no change".to_string()),
        }
        lines
    }

    /// Fires every tick and sampler event due up to `target`, in time order.
    fn run_until(&mut self, target: Duration) -> Vec<String> {
        let mut lines = Vec::new();
        let mut taken = [0usize; ANALOG_CHANNELS];

        while let Some((at, event)) = self.next_event().filter(|(at, _)| *at <= target) {
            self.clock.now = at;
            match event {
                ClockEvent::Tick => lines.push(self.fire_tick()),
                ClockEvent::Sample(channel) => {
                    self.dispatcher.sample(channel);
                    taken[channel] += 1;
                    let schedule = &mut self.clock.samplers[channel];
                    schedule.next_due = Some(at + schedule.period);
                }
            }
        }
        self.clock.now = target;

        for (channel, count) in taken.iter().enumerate().filter(|(_, count)| **count > 0) {
            let held = self
                .dispatcher
                .device()
                .analog()
                .buffer(channel)
                .map_or(0, |buffer| buffer.len());
            lines.push(format!(
                "analog {channel}: {count} samples taken, {held} buffered"
            ));
        }
        lines
    }

    fn next_event(&self) -> Option<(Duration, ClockEvent)> {
        let samplers = self
            .clock
            .samplers
            .iter()
            .enumerate()
            .filter_map(|(channel, schedule)| {
                schedule
                    .next_due
                    .map(|due| (due, ClockEvent::Sample(channel)))
            });

        core::iter::once((self.clock.next_tick, ClockEvent::Tick))
            .chain(samplers)
            .min_by_key(|(at, _)| *at)
    }

    fn fire_tick(&mut self) -> String {
        let outcome = self.dispatcher.tick();
        self.clock.next_tick += TICK_PERIOD;

        let mut line = format!("tick @ {}", format_time(self.clock.now));
        if outcome.powered_on {
            line.push_str(" power-on");
        }
        if outcome.powered_off {
            line.push_str(" power-off");
        }
        if outcome.pulse_started {
            self.dispatcher.end_pulse();
            let _ = write!(line, " led-pulse {}ms", LED_PULSE.as_millis());
        }
        line
    }

    fn sync_samplers(&mut self) {
        let now = self.clock.now;
        for (schedule, sampler) in self
            .clock
            .samplers
            .iter_mut()
            .zip(self.dispatcher.board().samplers.iter())
        {
            if schedule.generation != sampler.generation {
                schedule.generation = sampler.generation;
                schedule.period = sampler.period.unwrap_or_default();
                schedule.next_due = sampler.period.map(|period| now + period);
            }
        }
    }

    /// Notes for telemetry records that have no line of their own.
    fn drain_notes(&mut self) -> Vec<String> {
        let last_seen = self.last_seen_event;
        let mut notes = Vec::new();
        for record in self
            .dispatcher
            .telemetry()
            .oldest_first()
            .filter(|record| last_seen.is_none_or(|seen| record.id > seen))
        {
            if let DispatchEventKind::SamplePeriodDefaulted { .. } = record.event {
                notes.push(format!("NOTE {}", record.event));
            }
            self.last_seen_event = Some(record.id);
        }
        notes
    }

    fn status(&self) -> Vec<String> {
        let device = self.dispatcher.device();
        let board = self.dispatcher.board();
        let power = device.power();
        let mut lines = vec![
            format!("time {}", format_time(self.clock.now)),
            format!(
                "power {} rail={} on_timer={} off_timer={}",
                power_label(power.state()),
                u8::from(board.rail.level),
                power.on_timer().raw(),
                power.off_timer().raw()
            ),
            format!(
                "led {} line={} pulses={}",
                device.led().mode(),
                u8::from(board.led.level),
                board.led.rising_edges
            ),
        ];

        for (channel, input) in board.analog.iter().enumerate() {
            let Some(buffer) = device.analog().buffer(channel) else {
                continue;
            };
            let sampler = device
                .analog()
                .period(channel)
                .map_or_else(|| "stopped".to_string(), |period| format!("{} ms", period.millis));
            lines.push(format!(
                "analog {channel} level={:.3} buffered={} dropped={} sampler={sampler}",
                input.level,
                buffer.len(),
                buffer.dropped()
            ));
        }

        let wires: Vec<String> = board
            .wires
            .iter()
            .map(|wire| u8::from(wire.level).to_string())
            .collect();
        lines.push(format!("digital {}", wires.join(" ")));

        for (channel, pwm) in board.pwm.iter().enumerate() {
            let period = pwm
                .period_us
                .map_or_else(|| "default".to_string(), |period| format!("{period} us"));
            lines.push(format!("pwm {channel} period={period} duty={:.3}", pwm.duty));
        }

        lines.push(match self.dispatcher.pending() {
            Some(pending) => format!(
                "pending {} ch={} mode={}",
                pending.query.code(),
                pending.channel,
                mode_label(pending.mode)
            ),
            None => "pending none".to_string(),
        });

        let counters = self.dispatcher.telemetry().counters();
        lines.push(format!(
            "telemetry executed={} staged={} emitted={} rejected={}",
            counters.executed, counters.staged, counters.emitted, counters.rejected
        ));
        lines
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_send(send: SendCommand) -> Vec<u8> {
    let SendCommand {
        command,
        channel,
        value,
        mode,
    } = send;

    match (CommandCode::from_raw(command), mode) {
        (Some(CommandCode::Led), _) => {
            vec![command, channel, u8::try_from(value).unwrap_or(u8::MAX)]
        }
        (Some(code), ValueMode::Binary) => {
            encode_binary(code, channel, MODE_BINARY, value).to_vec()
        }
        (Some(code), ValueMode::Ascii) => encode_ascii(code, channel, value).to_vec(),
        (None, mode) => {
            let mut packet = vec![command, channel, mode.to_raw()];
            packet.extend_from_slice(&value.to_le_bytes());
            packet
        }
    }
}

fn decode_response(pending: PendingResponse, bytes: &[u8]) -> String {
    match (pending.query, pending.mode) {
        (Query::Version, _) => match bytes {
            [low, high] => format!("version 0x{:04x}", u16::from_le_bytes([*low, *high])),
            _ => "malformed".to_string(),
        },
        (Query::AnalogLoad, _) => {
            let words: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            match words.split_first() {
                Some((count, samples)) => format!("count={count} samples={samples:?}"),
                None => "malformed".to_string(),
            }
        }
        (Query::AnalogRead | Query::DigitalIn, ValueMode::Ascii) => {
            let text = bytes.strip_suffix(&[0]).unwrap_or(bytes);
            format!("{:?}", String::from_utf8_lossy(text))
        }
        (Query::AnalogRead | Query::DigitalIn, ValueMode::Binary) => match bytes {
            [a, b, c, d] => i32::from_le_bytes([*a, *b, *c, *d]).to_string(),
            _ => "malformed".to_string(),
        },
    }
}

fn help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn mode_label(mode: ValueMode) -> &'static str {
    match mode {
        ValueMode::Binary => "binary",
        ValueMode::Ascii => "ascii",
    }
}

fn power_label(state: PowerState) -> &'static str {
    match state {
        PowerState::Up => "up",
        PowerState::Down => "down",
    }
}

fn format_time(time: Duration) -> String {
    format!("{:.3}s", time.as_secs_f64())
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        writeln!(logger.writer, "# {header}")?;
        writeln!(
            logger.writer,
            "# Timestamps are virtual milliseconds since boot"
        )?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
