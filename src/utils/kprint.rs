use alloc::sync::Arc;

use crate::utils::SpinMutex;
use crate::device::ConsoleOutput;
use lazy_static::*;

lazy_static!{
    pub static ref K_PRINT_HANDLER: SpinMutex<KPrintHandler> = SpinMutex::new("k print", KPrintHandler{sink: None});
}

pub struct KPrintHandler {
    sink: Option<Arc<dyn ConsoleOutput>>
}

impl KPrintHandler {
    pub fn set_sink(&mut self, sink: Arc<dyn ConsoleOutput>) {
        self.sink = Some(sink);
    }

    pub fn clear_sink(&mut self) {
        self.sink = None;
    }

    pub fn k_puts(&mut self, s: &str) {
        if let Some(sink) = self.sink.as_ref() {
            sink.put_bytes(s.as_bytes());
        }
    }
}
