// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 结果列表的数据模型: 统计、按类汇总、逐个检测卡片

use std::collections::HashMap;

use crate::DetectionResult;

/// 置信度等级 (决定进度条颜色)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn of(confidence: f32) -> Self {
        if confidence > 0.7 {
            Self::High
        } else if confidence > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub index: usize, // 从1开始
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Detection {
    /// 首字母大写
    pub fn display_name(&self) -> String {
        capitalize(&self.class_name)
    }

    pub fn box_text(&self) -> String {
        format!(
            "Box: ({:.0}, {:.0}) → ({:.0}, {:.0})",
            self.x1, self.y1, self.x2, self.y2
        )
    }

    pub fn percent_text(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }

    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::of(self.confidence)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    pub frame: Option<u64>, // 视频帧号; 图片为 None
    pub detections: Vec<Detection>,
    summary: Vec<(String, usize)>,
}

impl DetectionReport {
    pub fn from_result(result: &DetectionResult, names: &[String], frame: Option<u64>) -> Self {
        let detections: Vec<Detection> = result
            .bboxes()
            .iter()
            .enumerate()
            .map(|(i, b)| Detection {
                index: i + 1,
                class_id: b.id(),
                class_name: names
                    .get(b.id())
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", b.id())),
                confidence: b.confidence(),
                x1: b.xmin(),
                y1: b.ymin(),
                x2: b.xmax(),
                y2: b.ymax(),
            })
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for d in &detections {
            *counts.entry(d.class_name.as_str()).or_default() += 1;
        }
        let mut summary: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, n)| (name.to_string(), n))
            .collect();
        summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            frame,
            detections,
            summary,
        }
    }

    pub fn total(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// (类名, 数量), 数量降序, 同数量按类名升序
    pub fn summary(&self) -> &[(String, usize)] {
        &self.summary
    }

    pub fn status_text(&self) -> String {
        match self.frame {
            Some(frame) => format!("Frame {} - {} objects detected", frame, self.total()),
            None => format!("✓ Detection complete: {} objects found", self.total()),
        }
    }
}

/// 类别名首字母大写, 其余小写
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bbox;

    fn names() -> Vec<String> {
        vec!["person".into(), "car".into(), "dog".into()]
    }

    #[test]
    fn test_summary_sorted_by_count_then_name() {
        let result = DetectionResult::new(vec![
            Bbox::new(0.0, 0.0, 10.0, 10.0, 2, 0.9),
            Bbox::new(0.0, 0.0, 10.0, 10.0, 1, 0.8),
            Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.7),
            Bbox::new(0.0, 0.0, 10.0, 10.0, 0, 0.6),
        ]);
        let report = DetectionReport::from_result(&result, &names(), None);

        assert_eq!(report.total(), 4);
        assert_eq!(
            report.summary(),
            &[
                ("person".to_string(), 2),
                ("car".to_string(), 1),
                ("dog".to_string(), 1)
            ]
        );
        assert_eq!(report.detections[0].index, 1);
    }

    #[test]
    fn test_detection_text() {
        let result = DetectionResult::new(vec![Bbox::new(10.4, 20.6, 100.0, 50.0, 1, 0.873)]);
        let report = DetectionReport::from_result(&result, &names(), Some(12));
        let d = &report.detections[0];

        assert_eq!(d.display_name(), "Car");
        assert_eq!(d.percent_text(), "87.3%");
        assert_eq!(d.box_text(), "Box: (10, 21) → (110, 71)");
        assert_eq!(d.level(), ConfidenceLevel::High);
        assert_eq!(report.status_text(), "Frame 12 - 1 objects detected");
    }

    #[test]
    fn test_unknown_class_and_empty_report() {
        let result = DetectionResult::new(vec![Bbox::new(0.0, 0.0, 1.0, 1.0, 7, 0.3)]);
        let report = DetectionReport::from_result(&result, &names(), None);
        assert_eq!(report.detections[0].class_name, "class_7");

        let empty = DetectionReport::from_result(&DetectionResult::default(), &names(), None);
        assert!(empty.is_empty());
        assert!(empty.summary().is_empty());
        assert_eq!(empty.status_text(), "✓ Detection complete: 0 objects found");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("traffic light"), "Traffic light");
        assert_eq!(capitalize("TV"), "Tv");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(ConfidenceLevel::of(0.71), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::of(0.7), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::of(0.41), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::of(0.4), ConfidenceLevel::Low);
    }
}
