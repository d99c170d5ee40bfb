use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    basic::color::LabelColor,
    core::{
        command_pool::RhiCommandPool,
        command_queue::{RhiQueue, RhiSubmitInfo},
        device::RhiDevice,
        synchronize::RhiImageBarrier,
    },
    rhi::Rhi,
};

/// 不能实现 Drop，因为需要手动去 free；cmd 支持 clone，不应该在意外的地方 free
#[derive(Clone)]
pub struct RhiCommandBuffer {
    handle: vk::CommandBuffer,

    /// command buffer 需要通过 command pool 进行 free，因此需要保存 command pool 的引用
    pub command_pool: Rc<RhiCommandPool>,

    pub device: Rc<RhiDevice>,
}

// basic 命令
impl RhiCommandBuffer {
    pub fn new(device: Rc<RhiDevice>, command_pool: Rc<RhiCommandPool>, debug_name: &str) -> Self {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { device.allocate_command_buffers(&info).unwrap()[0] };
        device.debug_utils().set_object_debug_name(command_buffer, debug_name);
        RhiCommandBuffer {
            handle: command_buffer,
            command_pool,

            device,
        }
    }

    /// getter
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// 立即执行某个 command，并同步等待执行结果
    ///
    /// 是 allocate-record-submit-wait-free 的一站式封装，每次调用独占一个 command buffer
    pub fn one_time_exec<F, R>(rhi: &Rhi, command_pool: Rc<RhiCommandPool>, queue: &RhiQueue, func: F, name: &str) -> R
    where
        F: FnOnce(&RhiCommandBuffer) -> R,
    {
        let command_buffer = RhiCommandBuffer::new(rhi.device_rc().clone(), command_pool, &format!("one-time-{}", name));

        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name);
        let result = func(&command_buffer);
        command_buffer.end();

        queue.submit(vec![RhiSubmitInfo::new(&[command_buffer.clone()])], None);
        queue.wait_idle();
        command_buffer.free();

        result
    }

    /// 释放 command buffer 在 command pool 中所占用的内存
    ///
    /// 释放之后 command buffer 就不存在了
    #[inline]
    pub fn free(self) {
        unsafe {
            self.device.free_command_buffers(self.command_pool.handle(), std::slice::from_ref(&self.handle));
        }
    }

    /// 开始录制 command
    ///
    /// 自动设置 debug label
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) {
        unsafe {
            self.device
                .begin_command_buffer(self.handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))
                .unwrap();
        }
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
    }

    /// 结束录制 command
    ///
    /// 结束 debug label
    #[inline]
    pub fn end(&self) {
        self.end_label();
        unsafe { self.device.end_command_buffer(self.handle).unwrap() }
    }
}

// transfer 类型的命令
impl RhiCommandBuffer {
    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_buffer_to_image(&self, copy_info: &vk::CopyBufferToImageInfo2) {
        unsafe { self.device.cmd_copy_buffer_to_image2(self.handle, copy_info) }
    }
}

// 同步类型的命令
impl RhiCommandBuffer {
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    #[inline]
    pub fn image_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[RhiImageBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info =
            vk::DependencyInfo::default().image_memory_barriers(&barriers).dependency_flags(dependency_flags);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.handle, &dependency_info);
        }
    }
}

// debug label 命令
impl RhiCommandBuffer {
    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        self.device.debug_utils.cmd_begin_debug_label(self.handle, label_name, label_color);
    }

    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn end_label(&self) {
        self.device.debug_utils.cmd_end_debug_label(self.handle);
    }
}
