use core::panic::PanicInfo;

use crate::fatal;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    fatal!("kernel panic: {}", info);
    loop {
        core::hint::spin_loop();
    }
}
