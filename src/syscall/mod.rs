mod syscall;
mod syscall_num;

pub use syscall_num::*;

#[cfg(test)]
mod tests;
