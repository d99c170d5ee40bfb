use std::ops::Deref;

use ash::vk;

use crate::core::{device::RhiDevice, instance::RhiInstance, physical_device::RhiPhysicalDevice};

pub struct RhiAllocator {
    inner: vk_mem::Allocator,
}

impl Deref for RhiAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Drop for RhiAllocator {
    fn drop(&mut self) {
        log::info!("Destroying RhiAllocator");
        // vk_mem 是 RAII 的
    }
}

impl RhiAllocator {
    /// vma 需要引用 Instance 以及 Device，并确保在其生命周期之内这两个的引用是有效的。
    /// 因此需要在 VulkanContext 的其他部分都初始化完成后再初始化 vma
    pub fn new(instance: &RhiInstance, pdevice: &RhiPhysicalDevice, device: &RhiDevice) -> Self {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance.ash_instance(), &device.handle, pdevice.handle);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci).unwrap() };

        Self { inner: vma }
    }
}
