use std::fmt;

/// Where the model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Accelerator(usize),
}

impl Device {
    /// The device the command line asks for.
    pub fn requested(cuda: bool, gpu: usize) -> Self {
        if cuda { Device::Accelerator(gpu) } else { Device::Cpu }
    }

    /// Picks the device that will actually be used.
    ///
    /// Only the CPU backend is available, so accelerators fall back to it.
    pub fn resolve(self) -> Self {
        if let Device::Accelerator(gpu) = self {
            log::warn!("no accelerator backend available for gpu {gpu}, using CPU for training");
        }

        Device::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Accelerator(gpu) => write!(f, "accelerator:{gpu}"),
        }
    }
}
