use std::{ffi::c_void, rc::Rc};

use ash::vk;
use vk_mem::Alloc;

use crate::{
    core::{allocator::RhiAllocator, device::RhiDevice},
    rhi::Rhi,
};

/// 计算某种 format 的一个 texel 需要的存储空间
///
/// 根据 vulkan specification 得到的 format 顺序，每个区间都是闭区间
pub fn format_byte_count(format: vk::Format) -> usize {
    const BYTE_1_FORMAT: [(vk::Format, vk::Format); 1] = [(vk::Format::R8_UNORM, vk::Format::R8_SRGB)];
    const BYTE_2_FORMAT: [(vk::Format, vk::Format); 2] =
        [(vk::Format::R8G8_UNORM, vk::Format::R8G8_SRGB), (vk::Format::R16_UNORM, vk::Format::R16_SFLOAT)];
    const BYTE_3_FORMAT: [(vk::Format, vk::Format); 1] = [(vk::Format::R8G8B8_UNORM, vk::Format::B8G8R8_SRGB)];
    const BYTE_4_FORMAT: [(vk::Format, vk::Format); 2] =
        [(vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_SRGB), (vk::Format::R32_UINT, vk::Format::R32_SFLOAT)];

    let is_in_format_region = |format: vk::Format, regions: &[(vk::Format, vk::Format)]| {
        let n = format.as_raw();
        regions.iter().any(|(begin, end)| begin.as_raw() <= n && n <= end.as_raw())
    };

    match format {
        f if is_in_format_region(f, &BYTE_1_FORMAT) => 1,
        f if is_in_format_region(f, &BYTE_2_FORMAT) => 2,
        f if is_in_format_region(f, &BYTE_3_FORMAT) => 3,
        f if is_in_format_region(f, &BYTE_4_FORMAT) => 4,
        _ => panic!("unsupported format."),
    }
}

pub struct RhiImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,
}

impl RhiImageCreateInfo {
    /// 3D image 的 create info
    ///
    /// extent 必须携带完整的 depth：image type 是 TYPE_3D，体素数据的第三个维度
    /// 体现在 extent.depth 上，而不是 array layer 上
    #[inline]
    pub fn new_image_3d_info(
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        tiling: vk::ImageTiling,
    ) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_3D,
                format,
                extent,
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // vulkan 规定这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn create_info(&self) -> &vk::ImageCreateInfo<'_> {
        &self.inner
    }

    /// getter
    #[inline]
    pub fn extent(&self) -> &vk::Extent3D {
        &self.inner.extent
    }

    /// getter
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.inner.format
    }

    /// getter
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.inner.mip_levels
    }
}

pub struct RhiImageViewCreateInfo {
    inner: vk::ImageViewCreateInfo<'static>,
}

impl RhiImageViewCreateInfo {
    #[inline]
    pub fn new_image_view_3d_info(format: vk::Format, aspect: vk::ImageAspectFlags, level_count: u32) -> Self {
        Self {
            inner: vk::ImageViewCreateInfo {
                format,
                view_type: vk::ImageViewType::TYPE_3D,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    level_count,
                    layer_count: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageViewCreateInfo<'_> {
        &self.inner
    }
}

pub struct RhiImage3D {
    handle: vk::Image,

    allocation: vk_mem::Allocation,
    map_ptr: Option<*mut u8>,

    _name: String,
    image_info: Rc<RhiImageCreateInfo>,

    allocator: Rc<RhiAllocator>,
}
impl Drop for RhiImage3D {
    fn drop(&mut self) {
        unsafe { self.allocator.destroy_image(self.handle, &mut self.allocation) }
    }
}
// getter
impl RhiImage3D {
    #[inline]
    pub fn width(&self) -> u32 {
        self.image_info.extent().width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image_info.extent().height
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.image_info.extent().depth
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        *self.image_info.extent()
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image_info.format()
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.image_info.mip_levels()
    }
}
impl RhiImage3D {
    pub fn new(
        rhi: &Rhi,
        image_info: Rc<RhiImageCreateInfo>,
        alloc_info: &vk_mem::AllocationCreateInfo,
        debug_name: &str,
    ) -> Self {
        let (image, alloc) = unsafe { rhi.allocator().create_image(image_info.create_info(), alloc_info).unwrap() };
        rhi.device().debug_utils().set_object_debug_name(image, debug_name);
        Self {
            _name: debug_name.to_string(),

            handle: image,
            allocation: alloc,
            map_ptr: None,

            image_info,
            allocator: rhi.allocator_rc().clone(),
        }
    }

    /// device local 的 3D image，optimal tiling，数据需要经过 stage buffer 传入
    pub fn new_device_image_3d(
        rhi: &Rhi,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        debug_name: &str,
    ) -> Self {
        Self::new(
            rhi,
            Rc::new(RhiImageCreateInfo::new_image_3d_info(extent, format, usage, vk::ImageTiling::OPTIMAL)),
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            debug_name,
        )
    }

    /// host visible 的 3D image，linear tiling，数据直接 memcpy 进映射的内存
    pub fn new_linear_image_3d(
        rhi: &Rhi,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        debug_name: &str,
    ) -> Self {
        Self::new(
            rhi,
            Rc::new(RhiImageCreateInfo::new_image_3d_info(extent, format, usage, vk::ImageTiling::LINEAR)),
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                ..Default::default()
            },
            debug_name,
        )
    }

    /// 查询 mip 0 的 subresource layout（row pitch、offset 等）
    ///
    /// 只有 linear tiling 的 image 才可以查询
    pub fn subresource_layout(&self, device: &RhiDevice) -> vk::SubresourceLayout {
        let subres = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: 0,
        };
        unsafe { device.get_image_subresource_layout(self.handle, subres) }
    }

    #[inline]
    pub fn map(&mut self) {
        if self.map_ptr.is_some() {
            return;
        }
        unsafe {
            self.map_ptr = Some(self.allocator.map_memory(&mut self.allocation).unwrap());
        }
    }

    #[inline]
    pub fn unmap(&mut self) {
        if self.map_ptr.is_none() {
            return;
        }
        unsafe {
            self.allocator.unmap_memory(&mut self.allocation);
            self.map_ptr = None;
        }
    }

    /// 通过 mem map 的方式将 data 写入 image 的内存
    ///
    /// 注：假定数据是紧密排布的，不考虑 row pitch 的 padding
    pub fn transfer_data_by_mem_map(&mut self, data: &[u8]) {
        self.map();
        unsafe {
            let mut slice = ash::util::Align::new(
                self.map_ptr.unwrap() as *mut c_void,
                align_of::<u8>() as u64,
                size_of_val(data) as vk::DeviceSize,
            );
            slice.copy_from_slice(data);
            self.allocator.flush_allocation(&self.allocation, 0, size_of_val(data) as vk::DeviceSize).unwrap();
        }
        self.unmap();
    }
}

pub struct RhiImage3DView {
    handle: vk::ImageView,

    _info: Rc<RhiImageViewCreateInfo>,
    _name: String,

    device: Rc<RhiDevice>,
}
impl Drop for RhiImage3DView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.handle, None);
        }
    }
}
impl RhiImage3DView {
    pub fn new(rhi: &Rhi, image: vk::Image, mut info: RhiImageViewCreateInfo, name: impl AsRef<str>) -> Self {
        info.inner.image = image;
        let handle = unsafe { rhi.device().create_image_view(&info.inner, None).unwrap() };
        rhi.device().debug_utils().set_object_debug_name(handle, &name);
        Self {
            handle,
            _info: Rc::new(info),
            _name: name.as_ref().to_string(),
            device: rhi.device_rc().clone(),
        }
    }

    /// getter
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_byte_count_basic() {
        assert_eq!(format_byte_count(vk::Format::R8_UNORM), 1);
        assert_eq!(format_byte_count(vk::Format::R8G8_UNORM), 2);
        assert_eq!(format_byte_count(vk::Format::R16_SFLOAT), 2);
        assert_eq!(format_byte_count(vk::Format::R8G8B8_UNORM), 3);
        assert_eq!(format_byte_count(vk::Format::R8G8B8A8_UNORM), 4);
        assert_eq!(format_byte_count(vk::Format::B8G8R8A8_SRGB), 4);
        assert_eq!(format_byte_count(vk::Format::R32_SFLOAT), 4);
    }

    #[test]
    #[should_panic]
    fn format_byte_count_unsupported() {
        format_byte_count(vk::Format::BC7_UNORM_BLOCK);
    }

    /// create info 中的 extent 必须携带完整的 depth，不能折叠成 (w, h, 1)
    #[test]
    fn image_3d_info_keeps_full_extent() {
        let extent = vk::Extent3D {
            width: 64,
            height: 64,
            depth: 64,
        };
        let info = RhiImageCreateInfo::new_image_3d_info(
            extent,
            vk::Format::R8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
            vk::ImageTiling::OPTIMAL,
        );

        assert_eq!(info.create_info().image_type, vk::ImageType::TYPE_3D);
        assert_eq!(*info.extent(), extent);
        assert_eq!(info.mip_levels(), 1);
        assert_eq!(info.create_info().array_layers, 1);
        assert_eq!(info.create_info().initial_layout, vk::ImageLayout::UNDEFINED);
    }

    #[test]
    fn image_view_3d_info() {
        let info = RhiImageViewCreateInfo::new_image_view_3d_info(vk::Format::R8_UNORM, vk::ImageAspectFlags::COLOR, 1);

        assert_eq!(info.inner().view_type, vk::ImageViewType::TYPE_3D);
        assert_eq!(info.inner().subresource_range.layer_count, 1);
        assert_eq!(info.inner().subresource_range.level_count, 1);
    }
}
