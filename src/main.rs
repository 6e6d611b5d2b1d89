// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
use clap::Parser;
use macroquad::prelude::*;

use yolo_detector::app::{theme, App};
use yolo_detector::logging::init_logging;
use yolo_detector::{AppSettings, Args};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: "YOLO Object Detection - Dark Mode".to_owned(),
        window_width: 1400,
        window_height: 850,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_level, args.log_json) {
        eprintln!("⚠️ 日志初始化失败: {:#}", e);
    }
    tracing::info!("🚀 YOLO 目标检测启动");

    let settings = AppSettings::load(&args.settings);
    let mut app = App::new(args, settings);

    // 关闭窗口前保存设置
    prevent_quit();
    loop {
        clear_background(theme::CLEAR_COLOR);
        app.frame();

        if is_quit_requested() {
            app.shutdown();
            break;
        }
        next_frame().await;
    }
}
