use std::rc::Rc;

use ash::vk;

use crate::{
    basic::color::LabelColor,
    core::{
        buffer::RhiBuffer,
        command_buffer::RhiCommandBuffer,
        command_queue::RhiQueue,
        image::{RhiImage3D, RhiImage3DView, RhiImageViewCreateInfo, format_byte_count},
        sampler::{RhiSampler, RhiSamplerCreateInfo},
        synchronize::RhiImageBarrier,
    },
    rhi::Rhi,
};

/// 3D texture 上传的描述信息
///
/// 体素数据的来源是 caller 持有的一段连续内存，这里只描述尺寸、格式和上传策略
pub struct RhiTexture3DCreateInfo {
    width: u32,
    height: u32,
    depth: u32,
    format: vk::Format,

    image_usage: vk::ImageUsageFlags,
    image_layout: vk::ImageLayout,

    /// true 时不经过 stage buffer，直接写入 linear tiling 的 image
    ///
    /// linear tiling 支持的 format 和 feature 都很有限，默认优先 optimal tiling。
    /// caller 需要自行确认 device 支持（见 Rhi::linear_tiling_supports_sampled_image），
    /// 这里不会自动回退到 staging
    force_linear: bool,
}

impl RhiTexture3DCreateInfo {
    #[inline]
    pub fn new(width: u32, height: u32, depth: u32, format: vk::Format) -> Self {
        debug_assert!(width >= 1 && height >= 1 && depth >= 1);
        Self {
            width,
            height,
            depth,
            format,
            image_usage: vk::ImageUsageFlags::SAMPLED,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            force_linear: false,
        }
    }

    /// builder
    #[inline]
    pub fn image_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.image_usage = usage;
        self
    }

    /// builder
    /// 上传完成后 image 所处的 layout
    #[inline]
    pub fn image_layout(mut self, layout: vk::ImageLayout) -> Self {
        self.image_layout = layout;
        self
    }

    /// builder
    #[inline]
    pub fn force_linear(mut self, force_linear: bool) -> Self {
        self.force_linear = force_linear;
        self
    }

    /// getter
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// getter
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.image_layout
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }

    /// 体素数据的总字节数，texel 大小由 format 决定
    #[inline]
    pub fn byte_size(&self) -> vk::DeviceSize {
        self.width as vk::DeviceSize
            * self.height as vk::DeviceSize
            * self.depth as vk::DeviceSize
            * format_byte_count(self.format) as vk::DeviceSize
    }

    #[inline]
    pub fn use_staging(&self) -> bool {
        !self.force_linear
    }

    /// staging 路径下 image 实际使用的 usage
    ///
    /// buffer copy 要求 image 具有 TRANSFER_DST，无条件补上
    #[inline]
    pub fn staging_image_usage(&self) -> vk::ImageUsageFlags {
        self.image_usage | vk::ImageUsageFlags::TRANSFER_DST
    }

    /// 唯一的一个 copy region：mip 0，layer 0，无偏移，覆盖整个 extent
    pub fn copy_region(&self) -> vk::BufferImageCopy2<'static> {
        vk::BufferImageCopy2::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(self.extent())
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
    }
}

#[derive(PartialOrd, PartialEq, Hash, Copy, Clone, Ord, Eq)]
pub struct Texture3DUUID(pub uuid::Uuid);

/// 体素数据的 texture：3D image + view + sampler + descriptor info
///
/// 上传是同步阻塞的：每次 upload 独占一个 one-shot command buffer，
/// 等待 queue 完成后才返回。不提供内部加锁，并发访问由 caller 负责串行化
pub struct RhiTexture3D {
    image: RhiImage3D,
    image_view: RhiImage3DView,
    sampler: RhiSampler,

    /// 上传完成后 image 所处的 layout
    image_layout: vk::ImageLayout,
    mip_levels: u32,

    /// sampler 三个轴向共用的 address mode。
    /// setter 只修改这个配置，在下一次 upload 时才会被消费
    address_mode: vk::SamplerAddressMode,

    /// view + sampler + layout，可以直接用于 descriptor set 的更新
    descriptor: vk::DescriptorImageInfo,

    name: String,

    _uuid: Texture3DUUID,
}

impl RhiTexture3D {
    /// 从 caller 持有的体素数据创建 texture，address mode 默认 REPEAT
    ///
    /// 返回时 image 已经填充完毕并处于 info 指定的 layout，staging 路径的
    /// stage buffer 在返回前一定已被销毁
    pub fn from_bytes(
        rhi: &Rhi,
        queue: &RhiQueue,
        info: &RhiTexture3DCreateInfo,
        data: &[u8],
        name: impl AsRef<str>,
    ) -> Self {
        let name = name.as_ref().to_string();
        let address_mode = vk::SamplerAddressMode::REPEAT;

        let image = Self::upload(rhi, queue, info, data, &name);
        let (image_view, sampler, descriptor) = Self::finalize(rhi, info, &image, address_mode, &name);

        Self {
            mip_levels: image.mip_levels(),
            image,
            image_view,
            sampler,
            image_layout: info.layout(),
            address_mode,
            descriptor,
            name,
            _uuid: Texture3DUUID(uuid::Uuid::new_v4()),
        }
    }

    /// 任意 Pod 类型的体素数组，转成字节后上传
    #[inline]
    pub fn from_pod_slice<T: bytemuck::Pod>(
        rhi: &Rhi,
        queue: &RhiQueue,
        info: &RhiTexture3DCreateInfo,
        data: &[T],
        name: impl AsRef<str>,
    ) -> Self {
        Self::from_bytes(rhi, queue, info, bytemuck::cast_slice(data), name)
    }

    /// 设置 sampler 的 address mode（U/V/W 三个轴向统一）
    ///
    /// 只影响之后的 upload，不会修改已经创建出来的 sampler
    #[inline]
    pub fn set_address_mode(&mut self, mode: vk::SamplerAddressMode) {
        self.address_mode = mode;
    }

    /// 重新上传体素数据，消费当前的 address mode 配置
    ///
    /// image/view/sampler/descriptor 会被整体替换，旧资源在此处销毁
    pub fn reload(&mut self, rhi: &Rhi, queue: &RhiQueue, info: &RhiTexture3DCreateInfo, data: &[u8]) {
        let image = Self::upload(rhi, queue, info, data, &self.name);
        let (image_view, sampler, descriptor) = Self::finalize(rhi, info, &image, self.address_mode, &self.name);

        self.mip_levels = image.mip_levels();
        self.image = image;
        self.image_view = image_view;
        self.sampler = sampler;
        self.image_layout = info.layout();
        self.descriptor = descriptor;
    }
}

// getter
impl RhiTexture3D {
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    #[inline]
    pub fn image_view(&self) -> &RhiImage3DView {
        &self.image_view
    }

    #[inline]
    pub fn sampler(&self) -> &RhiSampler {
        &self.sampler
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.image_layout
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn address_mode(&self) -> vk::SamplerAddressMode {
        self.address_mode
    }

    #[inline]
    pub fn descriptor_image_info(&self) -> vk::DescriptorImageInfo {
        self.descriptor
    }
}

// 上传路径
impl RhiTexture3D {
    fn upload(rhi: &Rhi, queue: &RhiQueue, info: &RhiTexture3DCreateInfo, data: &[u8], name: &str) -> RhiImage3D {
        assert_eq!(data.len() as vk::DeviceSize, info.byte_size());

        if info.use_staging() {
            Self::upload_staged(rhi, queue, info, data, name)
        } else {
            Self::upload_linear(rhi, queue, info, data, name)
        }
    }

    /// staging 路径：host visible 的 stage buffer -> device local 的 optimal tiling image
    ///
    /// 1. 数据全量写入 stage buffer（一次 map/copy/unmap，不分块）
    /// 2. barrier: UNDEFINED -> TRANSFER_DST_OPTIMAL
    /// 3. buffer to image copy，单个 region
    /// 4. barrier: TRANSFER_DST_OPTIMAL -> 目标 layout
    ///
    /// 三个操作录制在同一个 command buffer 中，同步等待执行完成。
    /// stage buffer 在本函数返回前销毁
    fn upload_staged(
        rhi: &Rhi,
        queue: &RhiQueue,
        info: &RhiTexture3DCreateInfo,
        data: &[u8],
        name: &str,
    ) -> RhiImage3D {
        let mut stage_buffer =
            RhiBuffer::new_stage_buffer(rhi, info.byte_size(), format!("{}-stage-buffer", name));
        stage_buffer.transfer_data_by_mem_map(data);

        let image = RhiImage3D::new_device_image_3d(rhi, info.extent(), info.format(), info.staging_image_usage(), name);

        RhiCommandBuffer::one_time_exec(
            rhi,
            rhi.temp_command_pool(queue.queue_family().queue_family_index),
            queue,
            |cmd| {
                cmd.begin_label(&format!("{}-staged-upload", name), LabelColor::COLOR_STAGE);

                // optimal image 作为 copy 的 destination
                let image_barrier = RhiImageBarrier::new()
                    .image(image.handle())
                    .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                    .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                    .mip_levels(image.mip_levels());
                cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&image_barrier));

                let buffer_image_copy = info.copy_region();
                cmd.cmd_copy_buffer_to_image(
                    &vk::CopyBufferToImageInfo2::default()
                        .src_buffer(stage_buffer.handle())
                        .dst_image(image.handle())
                        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                        .regions(std::slice::from_ref(&buffer_image_copy)),
                );

                // copy 完成后转换到 caller 指定的 layout，供 shader 读取
                let image_barrier = RhiImageBarrier::new()
                    .image(image.handle())
                    .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                    .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
                    .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, info.layout())
                    .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                    .mip_levels(image.mip_levels());
                cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&image_barrier));

                cmd.end_label();
            },
            name,
        );

        // stage buffer 在此处销毁
        image
    }

    /// linear 路径：不经过 stage buffer，数据直接 memcpy 进 image 的映射内存
    ///
    /// 前置条件：device 的 linear tiling 必须支持 sampled image，否则直接 panic，
    /// 不会回退到 staging 路径
    fn upload_linear(
        rhi: &Rhi,
        queue: &RhiQueue,
        info: &RhiTexture3DCreateInfo,
        data: &[u8],
        name: &str,
    ) -> RhiImage3D {
        assert!(
            rhi.linear_tiling_supports_sampled_image(info.format()),
            "linear tiling of format {:?} does not support sampled image",
            info.format()
        );

        let mut image = RhiImage3D::new_linear_image_3d(rhi, info.extent(), info.format(), info.image_usage, name);

        // mip 0 的 row pitch、offset 等
        let subres_layout = image.subresource_layout(rhi.device());
        log::debug!(
            "linear image {} mip 0 subresource layout: offset={}, row_pitch={}",
            name,
            subres_layout.offset,
            subres_layout.row_pitch
        );
        // 全量 memcpy 假定数据紧密排布，row pitch 不能有 padding
        debug_assert_eq!(subres_layout.row_pitch, info.extent().width as u64 * format_byte_count(info.format()) as u64);

        image.transfer_data_by_mem_map(data);

        // 没有 device 侧的 copy，直接从 UNDEFINED 转换到目标 layout
        RhiCommandBuffer::one_time_exec(
            rhi,
            rhi.temp_command_pool(queue.queue_family().queue_family_index),
            queue,
            |cmd| {
                cmd.begin_label(&format!("{}-linear-upload", name), LabelColor::COLOR_UPLOAD);

                let image_barrier = RhiImageBarrier::new()
                    .image(image.handle())
                    .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                    .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, info.layout())
                    .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                    .mip_levels(1);
                cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&image_barrier));

                cmd.end_label();
            },
            name,
        );

        image
    }

    /// 构建 sampler、image view 和 descriptor info
    fn finalize(
        rhi: &Rhi,
        info: &RhiTexture3DCreateInfo,
        image: &RhiImage3D,
        address_mode: vk::SamplerAddressMode,
        name: &str,
    ) -> (RhiImage3DView, RhiSampler, vk::DescriptorImageInfo) {
        // linear tiling 通常不支持 mip map，只有 staging 路径才把 lod 范围
        // 和 view 的 level count 设置为完整的 mip chain
        let view_mip_levels = if info.use_staging() { image.mip_levels() } else { 1 };
        let max_lod = if info.use_staging() { image.mip_levels() as f32 } else { 0.0 };

        let anisotropy_enabled = rhi.device().enabled_features.sampler_anisotropy == vk::TRUE;
        let sampler_ci = RhiSamplerCreateInfo::new()
            .address_mode(address_mode)
            .lod(0.0, max_lod)
            .anisotropy(anisotropy_enabled, rhi.device().max_sampler_anisotropy());
        let sampler = RhiSampler::new(rhi, Rc::new(sampler_ci), &format!("{}-sampler", name));

        let image_view = RhiImage3DView::new(
            rhi,
            image.handle(),
            RhiImageViewCreateInfo::new_image_view_3d_info(info.format(), vk::ImageAspectFlags::COLOR, view_mip_levels),
            format!("{}-view", name),
        );

        let descriptor = vk::DescriptorImageInfo::default()
            .sampler(sampler.handle())
            .image_view(image_view.handle())
            .image_layout(info.layout());

        (image_view, sampler, descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_info_defaults() {
        let info = RhiTexture3DCreateInfo::new(64, 64, 64, vk::Format::R8_UNORM);

        assert!(info.use_staging());
        assert_eq!(info.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(info.staging_image_usage(), vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST);
    }

    /// 64x64x64 的单通道 8bit 体数据，stage buffer 大小应该是 262144 字节
    #[test]
    fn byte_size_64_cubed_r8() {
        let info = RhiTexture3DCreateInfo::new(64, 64, 64, vk::Format::R8_UNORM);
        assert_eq!(info.byte_size(), 262144);
    }

    #[test]
    fn byte_size_respects_format() {
        let info = RhiTexture3DCreateInfo::new(16, 16, 16, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(info.byte_size(), 16 * 16 * 16 * 4);
    }

    #[test]
    fn copy_region_covers_full_extent() {
        let info = RhiTexture3DCreateInfo::new(64, 32, 16, vk::Format::R8_UNORM);
        let region = info.copy_region();

        assert_eq!(region.buffer_offset, 0);
        assert_eq!(
            region.image_extent,
            vk::Extent3D {
                width: 64,
                height: 32,
                depth: 16
            }
        );
        assert_eq!(region.image_subresource.mip_level, 0);
        assert_eq!(region.image_subresource.base_array_layer, 0);
        assert_eq!(region.image_subresource.layer_count, 1);
    }

    #[test]
    fn force_linear_disables_staging() {
        let info = RhiTexture3DCreateInfo::new(8, 8, 8, vk::Format::R8_UNORM).force_linear(true);
        assert!(!info.use_staging());
    }

    /// usage 中已经有 TRANSFER_DST 时不会重复添加
    #[test]
    fn staging_usage_is_idempotent() {
        let info = RhiTexture3DCreateInfo::new(8, 8, 8, vk::Format::R8_UNORM)
            .image_usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST);
        assert_eq!(info.staging_image_usage(), vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST);
    }
}
