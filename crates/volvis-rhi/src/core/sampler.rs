use std::rc::Rc;

use ash::vk;

use crate::{core::device::RhiDevice, rhi::Rhi};

pub struct RhiSamplerCreateInfo {
    inner: vk::SamplerCreateInfo<'static>,
}

impl Default for RhiSamplerCreateInfo {
    fn default() -> Self {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .mip_lod_bias(0.0)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .compare_enable(false)
            .compare_op(vk::CompareOp::NEVER)
            .min_lod(0.0)
            .max_lod(0.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .unnormalized_coordinates(false);

        Self { inner: sampler_info }
    }
}

impl RhiSamplerCreateInfo {
    /// 默认配置：linear，repeat
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn info(&self) -> &vk::SamplerCreateInfo<'_> {
        &self.inner
    }

    /// builder
    /// 三个轴向使用同一个 address mode
    #[inline]
    pub fn address_mode(mut self, mode: vk::SamplerAddressMode) -> Self {
        self.inner.address_mode_u = mode;
        self.inner.address_mode_v = mode;
        self.inner.address_mode_w = mode;
        self
    }

    /// builder
    /// max lod 应该和 mip level count 保持一致
    #[inline]
    pub fn lod(mut self, min_lod: f32, max_lod: f32) -> Self {
        self.inner.min_lod = min_lod;
        self.inner.max_lod = max_lod;
        self
    }

    /// builder
    /// 只有 device 启用了 samplerAnisotropy 才可以 enable，max 值不能超过显卡上限
    #[inline]
    pub fn anisotropy(mut self, enable: bool, device_max_anisotropy: f32) -> Self {
        self.inner.anisotropy_enable = if enable { vk::TRUE } else { vk::FALSE };
        self.inner.max_anisotropy = if enable { device_max_anisotropy } else { 1.0 };
        self
    }
}

pub struct RhiSampler {
    handle: vk::Sampler,

    _info: Rc<RhiSamplerCreateInfo>,
    device: Rc<RhiDevice>,
}
impl Drop for RhiSampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.handle, None);
        }
    }
}

impl RhiSampler {
    #[inline]
    pub fn new(rhi: &Rhi, info: Rc<RhiSamplerCreateInfo>, debug_name: &str) -> Self {
        let handle = unsafe { rhi.device().create_sampler(&info.inner, None).unwrap() };
        rhi.device().debug_utils().set_object_debug_name(handle, debug_name);

        Self {
            handle,
            _info: info,
            device: rhi.device_rc().clone(),
        }
    }

    /// getter
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_mode_is_uniform_on_all_axes() {
        let info = RhiSamplerCreateInfo::new().address_mode(vk::SamplerAddressMode::CLAMP_TO_EDGE);

        assert_eq!(info.info().address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.info().address_mode_v, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.info().address_mode_w, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    }

    #[test]
    fn anisotropy_follows_device_feature() {
        let info = RhiSamplerCreateInfo::new().anisotropy(true, 16.0);
        assert_eq!(info.info().anisotropy_enable, vk::TRUE);
        assert_eq!(info.info().max_anisotropy, 16.0);

        // feature 未启用时强制回到 1.0
        let info = RhiSamplerCreateInfo::new().anisotropy(false, 16.0);
        assert_eq!(info.info().anisotropy_enable, vk::FALSE);
        assert_eq!(info.info().max_anisotropy, 1.0);
    }

    #[test]
    fn default_is_linear_repeat() {
        let info = RhiSamplerCreateInfo::new();
        assert_eq!(info.info().mag_filter, vk::Filter::LINEAR);
        assert_eq!(info.info().min_filter, vk::Filter::LINEAR);
        assert_eq!(info.info().address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.info().compare_op, vk::CompareOp::NEVER);
        assert_eq!(info.info().border_color, vk::BorderColor::FLOAT_OPAQUE_WHITE);
    }
}
