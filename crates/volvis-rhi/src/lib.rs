//! Vulkan RHI (Rendering Hardware Interface) 抽象层
//!
//! 提供对 Vulkan API 的封装，核心是体素数据（3D texture）的上传管线：
//! staging 路径（stage buffer -> optimal tiling image）和 linear 路径
//! （直接写入 host visible 的 linear tiling image），以及配套的
//! sampler / image view / descriptor info 构建。

pub mod basic;
pub mod core;
pub mod rhi;
pub mod vulkan_context;
