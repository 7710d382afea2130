pub mod app_config;
pub mod headless_app;
