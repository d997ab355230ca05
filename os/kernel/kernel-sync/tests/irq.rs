use kernel_sync::{InterruptControl, IrqGuard};
use std::cell::Cell;

#[derive(Default)]
struct SoftFlag {
    enabled: Cell<bool>,
    toggles: Cell<u32>,
}

impl InterruptControl for SoftFlag {
    fn enabled(&self) -> bool {
        self.enabled.get()
    }

    fn disable(&self) {
        self.enabled.set(false);
        self.toggles.set(self.toggles.get() + 1);
    }

    fn enable(&self) {
        self.enabled.set(true);
        self.toggles.set(self.toggles.get() + 1);
    }
}

#[test]
fn guard_disables_and_restores() {
    let cpu = SoftFlag::default();
    cpu.enabled.set(true);

    {
        let g = cpu.guard();
        assert!(g.were_enabled());
        assert!(!cpu.enabled());
    }
    assert!(cpu.enabled());
    assert_eq!(cpu.toggles.get(), 2);
}

#[test]
fn guard_keeps_disabled_state() {
    let cpu = SoftFlag::default();
    {
        let g = IrqGuard::new(&cpu);
        assert!(!g.were_enabled());
    }
    assert!(!cpu.enabled());
    assert_eq!(cpu.toggles.get(), 0);
}

#[test]
fn nested_guards_restore_once() {
    let cpu = SoftFlag::default();
    cpu.enabled.set(true);
    {
        let _outer = IrqGuard::new(&cpu);
        {
            let _inner = IrqGuard::new(&cpu);
        }
        assert!(!cpu.enabled(), "inner guard must not re-enable");
    }
    assert!(cpu.enabled());
}
