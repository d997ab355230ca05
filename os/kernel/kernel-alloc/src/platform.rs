use crate::task::CurrentTask;
use kernel_sync::InterruptControl;
use kernel_vmem::{PhysMapper, TlbFlush};

/// Everything the memory manager needs from the machine and the scheduler.
pub trait Platform {
    type Mapper: PhysMapper;
    type Tlb: TlbFlush;
    type Irq: InterruptControl;
    type Tasks: CurrentTask;

    fn mapper(&self) -> &Self::Mapper;
    fn tlb(&self) -> &Self::Tlb;
    fn irq(&self) -> &Self::Irq;
    fn tasks(&self) -> &Self::Tasks;
}

impl<P: Platform> Platform for &P {
    type Mapper = P::Mapper;
    type Tlb = P::Tlb;
    type Irq = P::Irq;
    type Tasks = P::Tasks;

    fn mapper(&self) -> &Self::Mapper {
        (**self).mapper()
    }

    fn tlb(&self) -> &Self::Tlb {
        (**self).tlb()
    }

    fn irq(&self) -> &Self::Irq {
        (**self).irq()
    }

    fn tasks(&self) -> &Self::Tasks {
        (**self).tasks()
    }
}
