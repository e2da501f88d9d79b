use defmt::{Debug2Format, Display2Format};
use embassy_stm32::i2c::{I2c, MultiMaster, SlaveCommandKind};
use embassy_stm32::mode::Async;
use hostctl_core::Dispatcher;
use hostctl_core::config::MAX_PACKET_SIZE;

use crate::hw::FirmwareBoard;

#[embassy_executor::task]
pub async fn run(
    mut dispatcher: Dispatcher<'static, FirmwareBoard>,
    mut bus: I2c<'static, Async, MultiMaster>,
) -> ! {
    let mut packet = [0u8; MAX_PACKET_SIZE];

    loop {
        let command = match bus.listen().await {
            Ok(command) => command,
            Err(err) => {
                defmt::warn!("i2c: listen error {}", Debug2Format(&err));
                continue;
            }
        };

        match command.kind {
            SlaveCommandKind::Write => match bus.respond_to_write(&mut packet).await {
                Ok(len) => handle_write(&mut dispatcher, &packet[..len]),
                Err(err) => defmt::warn!("i2c: write phase error {}", Debug2Format(&err)),
            },
            SlaveCommandKind::Read => {
                let response = dispatcher.on_read();
                if let Err(err) = bus.respond_to_read(&response).await {
                    defmt::warn!("i2c: read phase error {}", Debug2Format(&err));
                }
            }
        }
    }
}

fn handle_write(dispatcher: &mut Dispatcher<'static, FirmwareBoard>, bytes: &[u8]) {
    match dispatcher.on_write(bytes) {
        Ok(command) => {
            if let Some(code) = command.code() {
                defmt::debug!("i2c: {=str}", code.name());
            }
        }
        Err(reason) => defmt::warn!("i2c: ignored {}", Display2Format(&reason)),
    }
}
