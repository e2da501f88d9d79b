//! Command dispatcher.
//!
//! Write phases decode a packet and either act on the device immediately or
//! stage a [`PendingResponse`] for the next read phase. Read phases resolve
//! the staged descriptor into response bytes. Nothing here ever reports an
//! error to the bus: rejected input is recorded in [`DispatchTelemetry`] and
//! otherwise ignored.

use crate::analog::SamplePeriod;
use crate::config::{ANALOG_SCALE, FIRMWARE_VERSION, PWM_PERIOD_MAX_US};
use crate::device::DeviceState;
use crate::hal::{AnalogInput, Board, DigitalInput, DigitalOutput, PeriodicSource, PwmOutput};
use crate::led::LedMode;
use crate::power::{PowerRequest, PowerState};
use crate::protocol::{
    Command, CommandCode, DecodeError, Packet, PendingResponse, Query, Response, response,
};
use crate::switch::{ManualSwitch, SwitchAction};
use crate::telemetry::{DispatchEventKind, DispatchTelemetry, Rejection};
use crate::tick::TickOutcome;

/// Routes host packets onto the device state and the board's lines.
pub struct Dispatcher<'d, B: Board> {
    device: &'d DeviceState,
    board: B,
    pending: Option<PendingResponse>,
    switch: ManualSwitch,
    telemetry: DispatchTelemetry,
}

impl<'d, B: Board> Dispatcher<'d, B> {
    #[must_use]
    pub fn new(device: &'d DeviceState, board: B) -> Self {
        Self {
            device,
            board,
            pending: None,
            switch: ManualSwitch::new(),
            telemetry: DispatchTelemetry::new(),
        }
    }

    #[must_use]
    pub fn device(&self) -> &'d DeviceState {
        self.device
    }

    #[must_use]
    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Descriptor the next read phase will answer.
    #[must_use]
    pub fn pending(&self) -> Option<PendingResponse> {
        self.pending
    }

    #[must_use]
    pub fn telemetry(&self) -> &DispatchTelemetry {
        &self.telemetry
    }

    /// Applies the power-on defaults through this board.
    pub fn boot(&mut self) {
        let (rail, led) = self.board.status_outputs();
        self.device.boot(rail, led);
    }

    /// Handles a completed write phase.
    ///
    /// # Errors
    ///
    /// Returns the reason the packet had no effect. The rejection has already
    /// been recorded; callers only need it for logging.
    pub fn on_write(&mut self, bytes: &[u8]) -> Result<Command, Rejection> {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(DecodeError::Empty) => return Err(self.reject(Rejection::EmptyPacket)),
        };

        let command = Command::from_packet(&packet);
        match (command, command.code()) {
            (Command::Stage(pending), _) => {
                self.pending = Some(pending);
                self.telemetry.record(DispatchEventKind::Staged(pending.query));
                Ok(command)
            }
            (_, Some(code)) => {
                self.pending = None;
                match self.execute(code, command) {
                    Ok(()) => {
                        self.telemetry.record(DispatchEventKind::Executed(code));
                        Ok(command)
                    }
                    Err(reason) => Err(self.reject(reason)),
                }
            }
            (_, None) => {
                self.pending = None;
                Err(self.reject(Rejection::UnknownCommand(packet.command)))
            }
        }
    }

    /// Handles a read phase, returning the bytes to clock out. An empty
    /// response means the read has nothing to emit.
    pub fn on_read(&mut self) -> Response {
        let Some(pending) = self.pending else {
            self.reject(Rejection::NothingStaged);
            return Response::new();
        };

        match self.respond(pending) {
            Ok(response) => {
                self.telemetry.record(DispatchEventKind::Emitted {
                    query: pending.query,
                    bytes: u8::try_from(response.len()).unwrap_or(u8::MAX),
                });
                response
            }
            Err(reason) => {
                self.reject(reason);
                Response::new()
            }
        }
    }

    /// Runs one tick against this board's power rail and LED.
    pub fn tick(&mut self) -> TickOutcome {
        let (rail, led) = self.board.status_outputs();
        self.device.tick(rail, led)
    }

    /// Releases an LED pulse started by [`tick`](Self::tick).
    pub fn end_pulse(&mut self) {
        self.device.led().end_pulse(self.board.led());
    }

    /// Samples analog `channel` once into its buffer. This is the sampler
    /// callback body for boards whose sampler shares the dispatcher's lines.
    pub fn sample(&mut self, channel: usize) -> Option<bool> {
        let input = self.board.analog_input(channel)?;
        self.device.analog().sample(channel, input)
    }

    /// Feeds one manual switch reading, toggling power on release.
    pub fn poll_switch(&mut self, pressed: bool) -> (SwitchAction, Option<PowerState>) {
        self.switch.service(pressed, self.device, self.board.power_rail())
    }

    fn reject(&mut self, reason: Rejection) -> Rejection {
        self.telemetry.record(DispatchEventKind::Rejected(reason));
        reason
    }

    fn execute(&mut self, code: CommandCode, command: Command) -> Result<(), Rejection> {
        let device = self.device;

        match command {
            Command::PowerUp { delay } => {
                let request = device.power().request_up(delay, self.board.power_rail());
                power_outcome(code, delay, request)?;
            }
            Command::PowerDown { delay } => {
                let request = device.power().request_down(delay, self.board.power_rail());
                power_outcome(code, delay, request)?;
            }
            Command::Led { mode } => {
                let mode = LedMode::from_raw(mode).ok_or(Rejection::InvalidLedMode(mode))?;
                device.led().set_mode(mode, self.board.led());
            }
            Command::AnalogReset { channel } => {
                let index = usize::from(channel);
                let buffer = device
                    .analog()
                    .buffer(index)
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?;
                let sampler = self
                    .board
                    .sampler(index)
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?;
                sampler.disarm();
                device.analog().set_period(index, None);
                buffer.clear();
            }
            Command::AnalogStart { channel, period_ms } => {
                let index = usize::from(channel);
                let buffer = device
                    .analog()
                    .buffer(index)
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?;
                let sampler = self
                    .board
                    .sampler(index)
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?;

                let period = SamplePeriod::from_request(period_ms);
                buffer.clear();
                sampler.arm(period.duration());
                device.analog().set_period(index, Some(period));
                if period.defaulted {
                    self.telemetry.record(DispatchEventKind::SamplePeriodDefaulted {
                        channel,
                        requested: period_ms,
                    });
                }
            }
            Command::AnalogStop { channel } => {
                let index = usize::from(channel);
                self.board
                    .sampler(index)
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?
                    .disarm();
                device.analog().set_period(index, None);
            }
            Command::PwmOut { channel, value } => {
                self.board
                    .pwm_output(usize::from(channel))
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?
                    .set_duty(duty_fraction(value));
            }
            Command::PwmPeriod { channel, period_us } => {
                let pwm = self
                    .board
                    .pwm_output(usize::from(channel))
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?;
                let period = u32::try_from(period_us)
                    .ok()
                    .filter(|_| period_us <= PWM_PERIOD_MAX_US)
                    .ok_or(Rejection::ValueOutOfRange {
                        code,
                        value: period_us,
                    })?;
                pwm.set_period_us(period);
            }
            Command::DigitalOut { channel, value } => {
                self.board
                    .digital_output(usize::from(channel))
                    .ok_or(Rejection::ChannelOutOfRange { code, channel })?
                    .set(value != 0);
            }
            Command::Stage(_) | Command::Unrecognized(_) => {}
        }

        Ok(())
    }

    fn respond(&mut self, pending: PendingResponse) -> Result<Response, Rejection> {
        let PendingResponse {
            query,
            channel,
            mode,
        } = pending;
        let index = usize::from(channel);
        let out_of_range = Rejection::ChannelOutOfRange {
            code: query.code(),
            channel,
        };

        let response = match query {
            Query::Version => response::version(FIRMWARE_VERSION),
            Query::AnalogRead => {
                let input = self.board.analog_input(index).ok_or(out_of_range)?;
                response::analog(input.read(), mode)
            }
            Query::AnalogLoad => {
                let buffer = self.device.analog().buffer(index).ok_or(out_of_range)?;
                let mut response = Response::new();
                buffer.drain_into(&mut response);
                response
            }
            Query::DigitalIn => {
                let input = self.board.digital_input(index).ok_or(out_of_range)?;
                response::integer(i32::from(input.get()), mode)
            }
        };

        Ok(response)
    }
}

fn power_outcome(code: CommandCode, delay: i32, request: PowerRequest) -> Result<(), Rejection> {
    match request {
        PowerRequest::Ignored => Err(Rejection::ValueOutOfRange { code, value: delay }),
        PowerRequest::Immediate | PowerRequest::Scheduled(_) => Ok(()),
    }
}

/// PWM duty for a raw command value (`value / 1024`, unclamped).
#[allow(clippy::cast_precision_loss)]
fn duty_fraction(value: i32) -> f32 {
    value as f32 / ANALOG_SCALE
}

