use mockall::mock;
use o3sim_core::SystemIf;

mock! {
    pub System {}
    impl SystemIf for System {
        fn notify_process_termination(&mut self, pid: u32);
        fn notify_syscall_read_file_to_memory(&mut self, addr: u64, size: u64);
        fn notify_syscall_write_file_from_memory(&mut self, addr: u64, size: u64);
        fn notify_memory_allocation(&mut self, addr: u64, size: u64, allocate: bool);
    }
}

/// A mock that accepts any number of termination notifications and nothing else.
pub fn quiet_system() -> MockSystem {
    let mut system = MockSystem::new();
    let _ = system.expect_notify_process_termination().return_const(());
    system
}
