//! 无窗口的上传演示：生成一个 64^3 的程序化体数据，上传为 3D texture

use ash::vk;
use volvis_rhi::core::texture::{RhiTexture3D, RhiTexture3DCreateInfo};
use volvis_rhi::rhi::Rhi;

const VOLUME_SIZE: u32 = 64;

/// 以体积中心为球心的密度场，用于填充测试体数据
fn build_density_volume(size: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((size * size * size) as usize);
    let center = (size as f32 - 1.0) / 2.0;
    let max_dist = center * 3.0_f32.sqrt();

    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let dz = z as f32 - center;
                let dist = (dx * dx + dy * dy + dz * dz).sqrt();
                let density = (1.0 - dist / max_dist).clamp(0.0, 1.0);
                data.push((density * 255.0) as u8);
            }
        }
    }
    data
}

fn main() {
    env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Info).init();

    let rhi = Rhi::new("volvis-app".to_string(), vec![]);

    let volume = build_density_volume(VOLUME_SIZE);
    let info = RhiTexture3DCreateInfo::new(VOLUME_SIZE, VOLUME_SIZE, VOLUME_SIZE, vk::Format::R8_UNORM);

    let mut texture = RhiTexture3D::from_bytes(&rhi, rhi.graphics_queue(), &info, &volume, "density-volume");
    log::info!(
        "uploaded staged volume texture: layout={:?}, mip_levels={}",
        texture.layout(),
        texture.mip_levels()
    );

    // address mode 的修改在下一次 upload 时生效
    texture.set_address_mode(vk::SamplerAddressMode::CLAMP_TO_EDGE);
    texture.reload(&rhi, rhi.graphics_queue(), &info, &volume);
    log::info!("reloaded with address mode {:?}", texture.address_mode());

    // linear 路径只有在 device 支持时才能使用
    if rhi.linear_tiling_supports_sampled_image(vk::Format::R32_SFLOAT) {
        let float_volume: Vec<f32> = volume.iter().map(|&v| v as f32 / 255.0).collect();
        let linear_info = RhiTexture3DCreateInfo::new(VOLUME_SIZE, VOLUME_SIZE, VOLUME_SIZE, vk::Format::R32_SFLOAT)
            .force_linear(true);
        let linear_texture = RhiTexture3D::from_pod_slice(
            &rhi,
            rhi.graphics_queue(),
            &linear_info,
            &float_volume,
            "density-volume-linear",
        );
        log::info!("uploaded linear volume texture: layout={:?}", linear_texture.layout());
        drop(linear_texture);
    } else {
        log::info!("linear tiling does not support sampled R32_SFLOAT on this device, skipping direct path");
    }

    drop(texture);
    rhi.destroy();
}
