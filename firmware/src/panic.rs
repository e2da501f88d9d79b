use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    defmt::error!("firmware panic: {}", defmt::Display2Format(info));
    cortex_m::asm::udf();
}
