use ort::execution_providers::ExecutionProviderDispatch;

use crate::shared::settings::Device;

/// Execution providers to register for the selected device.
///
/// `cpu` registers nothing, so ONNX Runtime runs on its default CPU
/// provider and never on an accelerator. ONNX Runtime silently falls back
/// to CPU when CUDA cannot be registered, so a missing CUDA install
/// degrades instead of failing.
pub fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Cpu => Vec::new(),
        Device::Cuda(id) => vec![
            ort::execution_providers::CUDAExecutionProvider::default()
                .with_device_id(id as i32)
                .build(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuda_device_registers_one_provider() {
        assert_eq!(execution_providers(Device::Cuda(1)).len(), 1);
    }

    #[test]
    fn test_cpu_registers_no_accelerator() {
        assert!(execution_providers(Device::Cpu).is_empty());
    }
}
