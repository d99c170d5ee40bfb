pub mod allocator;
pub mod buffer;
pub mod command_buffer;
pub mod command_pool;
pub mod command_queue;
pub mod debug_utils;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod sampler;
pub mod synchronize;
pub mod texture;
