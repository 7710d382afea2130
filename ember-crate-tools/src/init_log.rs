use std::io::Write;

/// 构建带颜色的日志格式：`[时间] LEVEL [文件:行号] 内容`
fn log_builder(filter: log::LevelFilter) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let info_style = buf
                .default_level_style(log::Level::Info)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
            let warn_style = buf
                .default_level_style(log::Level::Warn)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
            let error_style = buf
                .default_level_style(log::Level::Error)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

            let level_style = match record.level() {
                log::Level::Info => info_style,
                log::Level::Warn => warn_style,
                log::Level::Error => error_style,
                _ => buf.default_level_style(record.level()),
            };
            let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));
            let black_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(75, 75, 75))));

            let line = record.line().unwrap_or(!0);
            let file = record.file().unwrap_or("").split(['\\', '/']).last().unwrap_or("");
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();
            // 多线程执行 node 时，线程名可以区分是哪个 worker
            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("?");

            writeln!(
                buf,
                "{level_style}[{time}] {level}{level_style:#} {grey_style}[{file}:{line}] <{thread_name}>{grey_style:#} \
                 {black_style}{}{black_style:#}",
                record.args()
            )
        })
        .filter(None, filter)
        // RUST_LOG 可以覆盖默认的过滤等级
        .parse_default_env();
    builder
}

pub fn init_log() {
    log_builder(log::LevelFilter::Info).init();
}

/// 用于测试：允许多次调用，日志输出会被 test harness 捕获
pub fn init_test_log() {
    let _ = log_builder(log::LevelFilter::Debug).is_test(true).try_init();
}
