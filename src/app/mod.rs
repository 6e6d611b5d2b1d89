// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 桌面界面 (macroquad + egui)

pub mod control_panel;
pub mod dialogs;
pub mod renderer;
pub mod results_panel;
pub mod state;
pub mod theme;

pub use control_panel::{ControlPanel, ControlPanelActions};
pub use renderer::App;
pub use state::{AppState, StatusTone};
