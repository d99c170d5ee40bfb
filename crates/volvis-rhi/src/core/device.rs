use std::{ffi::CStr, ops::Deref, rc::Rc};

use ash::vk;
use itertools::Itertools;

use crate::core::debug_utils::RhiDebugUtils;
use crate::core::{instance::RhiInstance, physical_device::RhiPhysicalDevice};

pub struct RhiDevice {
    pub handle: ash::Device,

    pub pdevice: Rc<RhiPhysicalDevice>,

    /// 创建 device 时实际启用的 features，sampler 等对象的创建需要参考这个
    pub enabled_features: vk::PhysicalDeviceFeatures,

    pub debug_utils: Rc<RhiDebugUtils>,
}

impl Deref for RhiDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl RhiDevice {
    pub fn new(
        vk_pf: &ash::Entry,
        instance: &RhiInstance,
        pdevice: Rc<RhiPhysicalDevice>,
        queue_create_info: &[vk::DeviceQueueCreateInfo],
    ) -> Self {
        // device 所需的所有 extension
        let device_exts = Self::basic_device_exts().iter().map(|e| e.as_ptr()).collect_vec();
        let mut exts_str = String::new();
        for ext in &device_exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("device exts: {}", exts_str);

        // device 所需的所有 features
        let basic_features = Self::physical_device_basic_features(&pdevice);
        let mut all_features = vk::PhysicalDeviceFeatures2::default().features(basic_features);
        let mut physical_device_ext_features = Self::physical_device_extra_features();
        unsafe {
            physical_device_ext_features.iter_mut().for_each(|f| {
                let ptr = <*mut dyn vk::ExtendsPhysicalDeviceFeatures2>::cast::<vk::BaseOutStructure>(f.as_mut());
                (*ptr).p_next = all_features.p_next as _;
                all_features.p_next = ptr as _;
            });
        }

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(queue_create_info)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        let device = unsafe { instance.handle.create_device(pdevice.handle, &device_create_info, None).unwrap() };

        let debug_utils = Rc::new(RhiDebugUtils::new(vk_pf, &instance.handle, &device));

        Self {
            handle: device,
            pdevice,
            enabled_features: basic_features,
            debug_utils,
        }
    }

    /// 必要的 physical device core features
    ///
    /// anisotropy 只有在显卡支持的情况下才会启用，sampler 的创建会参考 enabled_features
    fn physical_device_basic_features(pdevice: &RhiPhysicalDevice) -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default().sampler_anisotropy(pdevice.features.sampler_anisotropy == vk::TRUE)
    }

    /// 必要的 physical device extension features
    fn physical_device_extra_features() -> Vec<Box<dyn vk::ExtendsPhysicalDeviceFeatures2>> {
        vec![
            // barrier2 / queue_submit2 / copy_buffer_to_image2 都需要这个
            Box::new(vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true)),
        ]
    }

    /// 必要的 device extensions
    ///
    /// synchronization2 在 vulkan 1.3 中已经是 core，无需额外的 extension
    fn basic_device_exts() -> Vec<&'static CStr> {
        Vec::new()
    }
}

impl RhiDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.handle.handle()
    }

    #[inline]
    pub fn debug_utils(&self) -> &RhiDebugUtils {
        &self.debug_utils
    }

    /// 显卡支持且 device 已启用 anisotropy 时，sampler 可以使用的最大各向异性值
    #[inline]
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.pdevice.basic_props.limits.max_sampler_anisotropy
    }
}
