use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../console.rs"]
mod console;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../sim.rs"]
mod sim;

use session::Session;

const EVIDENCE_DIR: &str = "evidence";

fn main() -> io::Result<()> {
    record(
        "emulator-power.log",
        "Host controller emulator power sequencing transcript",
        &[
            "status",
            "send power-down 0 3",
            "tick 3",
            "send power-up 0 2 ascii",
            "tick 2",
            "send led 0 0",
            "tick",
            "press",
            "status",
        ],
    )?;
    record(
        "emulator-analog.log",
        "Host controller emulator analog burst transcript",
        &[
            "analog 0 0.25",
            "analog 1 0.75",
            "send analog-start 0 100",
            "send analog-start 1 5",
            "advance 1s",
            "send analog-load 0",
            "read",
            "read",
            "send analog-stop 1",
            "send analog-read 1 0 ascii",
            "read",
            "status",
        ],
    )?;
    record(
        "emulator-io.log",
        "Host controller emulator digital and pwm transcript",
        &[
            "send version",
            "read",
            "send digital-out 2 1",
            "send digital-in 2",
            "read",
            "digital 2 0",
            "read",
            "send pwm-period 1 20000",
            "send pwm-out 1 512",
            "send pwm-period 0 40000",
            "write 0x7f 0x00",
            "status",
        ],
    )?;
    Ok(())
}

fn record(file: &str, header: &str, script: &[&str]) -> io::Result<()> {
    let path = Path::new(EVIDENCE_DIR).join(file);
    let mut session = Session::with_transcript(&path, header)?;
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}
