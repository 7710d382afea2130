pub mod swapchain;
