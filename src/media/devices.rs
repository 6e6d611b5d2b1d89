// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 摄像头设备枚举

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDevice {
    pub index: usize,
    pub name: String,
}

pub const DEFAULT_CAMERA: &str = "Default camera";

/// 获取可用的摄像头设备列表; 枚举失败或为空时返回默认摄像头 0
pub fn get_video_devices() -> Vec<VideoDevice> {
    let names = match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("⚠️ 获取摄像头列表失败: {}", e);
            Vec::new()
        }
    };
    let devices = with_fallback(names);
    tracing::info!("📷 摄像头: {:?}", devices);
    devices
}

fn with_fallback(names: Vec<String>) -> Vec<VideoDevice> {
    if names.is_empty() {
        return vec![VideoDevice {
            index: 0,
            name: DEFAULT_CAMERA.to_string(),
        }];
    }
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| VideoDevice { index, name })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_to_default_camera() {
        let devices = with_fallback(vec![]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].index, 0);
        assert_eq!(devices[0].name, DEFAULT_CAMERA);
    }

    #[test]
    fn test_devices_are_indexed_in_order() {
        let devices = with_fallback(vec!["Front".into(), "USB Cam".into()]);
        assert_eq!(
            devices,
            vec![
                VideoDevice { index: 0, name: "Front".into() },
                VideoDevice { index: 1, name: "USB Cam".into() },
            ]
        );
    }
}
