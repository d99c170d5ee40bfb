use std::{ffi::CStr, rc::Rc};

use ash::vk;
use itertools::Itertools;

use crate::core::{
    command_queue::RhiQueue, device::RhiDevice, instance::RhiInstance, physical_device::RhiPhysicalDevice,
};

pub struct VulkanContext {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_pf: ash::Entry,

    pub(crate) instance: RhiInstance,
    pub(crate) physical_device: Rc<RhiPhysicalDevice>,
    pub(crate) device: Rc<RhiDevice>,

    pub(crate) graphics_queue: RhiQueue,
    pub(crate) transfer_queue: RhiQueue,
}

/// 创建与销毁
impl VulkanContext {
    pub fn new(app_name: String, engine_name: String, instance_extra_exts: Vec<&'static CStr>) -> Self {
        let vk_pf = unsafe { ash::Entry::load() }.expect("Failed to load vulkan entry");
        let instance = RhiInstance::new(&vk_pf, app_name, engine_name, instance_extra_exts);
        let physical_device = Rc::new(RhiPhysicalDevice::new_discrete_physical_device(instance.ash_instance()));

        // graphics 和 transfer 可能是同一个 queue family，create info 需要去重
        let queue_create_infos = [&physical_device.graphics_queue_family, &physical_device.transfer_queue_family]
            .iter()
            .unique_by(|f| f.queue_family_index)
            .map(|f| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(f.queue_family_index)
                    .queue_priorities(&[1.0])
            })
            .collect_vec();

        let device = Rc::new(RhiDevice::new(&vk_pf, &instance, physical_device.clone(), &queue_create_infos));

        let get_queue = |queue_family: &crate::core::command_queue::RhiQueueFamily| RhiQueue {
            handle: unsafe { device.get_device_queue(queue_family.queue_family_index, 0) },
            queue_family: queue_family.clone(),
            device: device.clone(),
        };
        let graphics_queue = get_queue(&physical_device.graphics_queue_family);
        let transfer_queue = get_queue(&physical_device.transfer_queue_family);

        log::info!("graphics queue's queue family:\n{:#?}", graphics_queue.queue_family);
        log::info!("transfer queue's queue family:\n{:#?}", transfer_queue.queue_family);

        // 在 device 以及 debug_utils 之前创建的 vk::Handle
        {
            let debug_utils = device.debug_utils();
            debug_utils.set_object_debug_name(instance.vk_instance(), "RhiInstance");
            debug_utils.set_object_debug_name(physical_device.handle, "RhiPhysicalDevice");

            debug_utils.set_object_debug_name(device.vk_handle(), "RhiDevice");
            debug_utils.set_object_debug_name(graphics_queue.handle, "graphics_queue");
            debug_utils.set_object_debug_name(transfer_queue.handle, "transfer_queue");
        }

        Self {
            vk_pf,
            instance,
            physical_device,
            device,
            graphics_queue,
            transfer_queue,
        }
    }

    /// 销毁前，caller 需要保证所有资源（buffer、image、command pool 等）都已销毁
    pub fn destroy(self) {
        unsafe {
            self.device.destroy_device(None);
        }
        // device 的最后一个 Rc drop 时，debug messenger 随之销毁，需要 instance 仍然有效
        drop(self.graphics_queue);
        drop(self.transfer_queue);
        drop(self.device);
        drop(self.physical_device);
        self.instance.destroy();
    }
}
