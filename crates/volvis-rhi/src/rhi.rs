use std::{ffi::CStr, rc::Rc};

use ash::vk;

use crate::{
    core::{
        allocator::RhiAllocator, command_pool::RhiCommandPool, command_queue::RhiQueue, device::RhiDevice,
        instance::RhiInstance, physical_device::RhiPhysicalDevice,
    },
    vulkan_context::VulkanContext,
};

pub struct Rhi {
    vk_ctx: VulkanContext,
    allocator: Rc<RhiAllocator>,

    /// 临时的 command pool，用于 one-shot 的命令缓冲区（texture 上传等）
    temp_graphics_command_pool: Rc<RhiCommandPool>,
    temp_transfer_command_pool: Rc<RhiCommandPool>,
}

/// 创建与销毁
impl Rhi {
    const ENGINE_NAME: &'static str = "Volvis";

    pub fn new(app_name: String, instance_extra_exts: Vec<&'static CStr>) -> Self {
        let vk_ctx = VulkanContext::new(app_name, Self::ENGINE_NAME.to_string(), instance_extra_exts);

        let temp_graphics_command_pool = Rc::new(RhiCommandPool::new(
            vk_ctx.device.clone(),
            vk_ctx.physical_device.graphics_queue_family.clone(),
            vk::CommandPoolCreateFlags::empty(),
            "rhi-temp-graphics",
        ));
        let temp_transfer_command_pool = Rc::new(RhiCommandPool::new(
            vk_ctx.device.clone(),
            vk_ctx.physical_device.transfer_queue_family.clone(),
            vk::CommandPoolCreateFlags::empty(),
            "rhi-temp-transfer",
        ));

        let allocator = Rc::new(RhiAllocator::new(&vk_ctx.instance, &vk_ctx.physical_device, &vk_ctx.device));

        Self {
            vk_ctx,
            allocator,
            temp_graphics_command_pool,
            temp_transfer_command_pool,
        }
    }

    /// caller 需要保证所有由 Rhi 创建的资源都已经销毁
    pub fn destroy(self) {
        drop(self.temp_graphics_command_pool);
        drop(self.temp_transfer_command_pool);
        drop(self.allocator);
        self.vk_ctx.destroy();
    }
}

/// getter
impl Rhi {
    #[inline]
    pub fn instance(&self) -> &RhiInstance {
        &self.vk_ctx.instance
    }

    #[inline]
    pub fn device(&self) -> &RhiDevice {
        &self.vk_ctx.device
    }

    #[inline]
    pub fn device_rc(&self) -> &Rc<RhiDevice> {
        &self.vk_ctx.device
    }

    #[inline]
    pub fn physical_device(&self) -> &RhiPhysicalDevice {
        &self.vk_ctx.physical_device
    }

    #[inline]
    pub fn allocator(&self) -> &RhiAllocator {
        &self.allocator
    }

    #[inline]
    pub fn allocator_rc(&self) -> &Rc<RhiAllocator> {
        &self.allocator
    }

    #[inline]
    pub fn graphics_queue(&self) -> &RhiQueue {
        &self.vk_ctx.graphics_queue
    }

    #[inline]
    pub fn transfer_queue(&self) -> &RhiQueue {
        &self.vk_ctx.transfer_queue
    }

    /// 根据 queue family 找到对应的临时 command pool
    ///
    /// one-shot 的 command buffer 必须从和 queue 同一个 family 的 pool 中分配
    pub fn temp_command_pool(&self, queue_family_index: u32) -> Rc<RhiCommandPool> {
        let graphics_family = &self.vk_ctx.physical_device.graphics_queue_family;
        let transfer_family = &self.vk_ctx.physical_device.transfer_queue_family;

        if queue_family_index == graphics_family.queue_family_index {
            self.temp_graphics_command_pool.clone()
        } else if queue_family_index == transfer_family.queue_family_index {
            self.temp_transfer_command_pool.clone()
        } else {
            panic!("no temp command pool for queue family {}", queue_family_index)
        }
    }
}

/// tools
impl Rhi {
    /// 查询某个 format 的 device 支持情况
    #[inline]
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance().ash_instance().get_physical_device_format_properties(self.physical_device().handle, format)
        }
    }

    /// linear tiling 下，该 format 是否支持 sampled image
    ///
    /// linear tiling 的 feature 支持大多很有限，texture 上传默认走 staging 路径，
    /// 只有确认了这个查询的 caller 才应该使用 force_linear
    #[inline]
    pub fn linear_tiling_supports_sampled_image(&self, format: vk::Format) -> bool {
        self.format_properties(format).linear_tiling_features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE)
    }
}
