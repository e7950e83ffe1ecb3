use serde::{Deserialize, Serialize};

use crate::result::RawResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: i64,
    pub class_name: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Response envelope for transports: `{"detections": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub detections: Vec<Detection>,
}

impl From<Vec<Detection>> for DetectionResponse {
    fn from(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

/// Flatten a raw model result into detection records, preserving model order.
///
/// Missing boxes or class ids give an empty list. Missing confidences or
/// coordinates shorten the zip to nothing. Ids absent from the name map are
/// named by their decimal form.
pub fn serialize_detections(raw: &RawResult) -> Vec<Detection> {
    let Some(boxes) = raw.boxes.as_ref() else {
        return Vec::new();
    };
    let Some(cls) = boxes.cls.as_deref() else {
        return Vec::new();
    };
    let conf = boxes.conf.as_deref().unwrap_or_default();
    let xyxy = boxes.xyxy.as_deref().unwrap_or_default();

    cls.iter()
        .zip(conf)
        .zip(xyxy)
        .map(|((&cls_id, &confidence), &[xmin, ymin, xmax, ymax])| {
            let class_id = cls_id as i64;
            let class_name = raw
                .names
                .as_ref()
                .and_then(|names| names.get(&class_id))
                .cloned()
                .unwrap_or_else(|| class_id.to_string());

            Detection {
                class_id,
                class_name,
                confidence,
                bbox: BoundingBox {
                    xmin,
                    ymin,
                    xmax,
                    ymax,
                },
            }
        })
        .collect()
}
