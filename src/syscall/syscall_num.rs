include!(concat!(env!("OUT_DIR"), "/syscall_num.rs"));
