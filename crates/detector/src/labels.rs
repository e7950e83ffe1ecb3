use std::collections::HashMap;

use crate::weights::WeightsSource;

/// COCO 80-class names, in training index order.
#[rustfmt::skip]
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat", "traffic light",
    "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog", "horse", "sheep", "cow",
    "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove", "skateboard", "surfboard",
    "tennis racket", "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard",
    "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase",
    "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// COCO category ids for [`COCO_CLASSES`], position for position. DETR-style
/// heads index their logits by these ids, leaving the unused ids empty.
#[rustfmt::skip]
pub const COCO_CATEGORY_IDS: [i64; 80] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 14, 15, 16, 17, 18, 19, 20, 21,
    22, 23, 24, 25, 27, 28, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42,
    43, 44, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63,
    64, 65, 67, 70, 72, 73, 74, 75, 76, 77, 78, 79, 80, 81, 82, 84, 85, 86,
    87, 88, 89, 90,
];

/// Logit width of a DETR head trained on COCO category ids (0 plus 1..=90).
pub const COCO_CATEGORY_SLOTS: usize = 91;

/// Contiguous 0..80 class index to name, the YOLO training layout.
pub fn coco_names() -> HashMap<i64, String> {
    COCO_CLASSES
        .iter()
        .enumerate()
        .map(|(id, name)| (id as i64, name.to_string()))
        .collect()
}

/// COCO category id to name.
pub fn coco_category_names() -> HashMap<i64, String> {
    COCO_CATEGORY_IDS
        .iter()
        .zip(COCO_CLASSES)
        .map(|(id, name)| (*id, name.to_string()))
        .collect()
}

/// Class names for a loaded model.
///
/// Names embedded in the model's `names` metadata win. The built-in default
/// model is known to use the 80-class COCO layout. Any other model without
/// metadata gets no mapping, so its detections are named by their id.
pub fn class_names(metadata: Option<&str>, source: &WeightsSource) -> Option<HashMap<i64, String>> {
    match metadata.map(parse_names) {
        Some(names) if !names.is_empty() => Some(names),
        _ => match source {
            WeightsSource::Remote { .. } => Some(coco_names()),
            WeightsSource::Local(_) => None,
        },
    }
}

/// Names implied by a DETR head's logit width: a 91-wide head is indexed by
/// COCO category id. Other widths have no known layout.
pub fn detr_head_names(num_logits: usize) -> Option<HashMap<i64, String>> {
    (num_logits == COCO_CATEGORY_SLOTS).then(coco_category_names)
}

/// Parse a Python-dict style mapping such as `{0: 'person', 1: "traffic light"}`.
///
/// Malformed input yields an empty map rather than an error.
pub fn parse_names(raw: &str) -> HashMap<i64, String> {
    let mut names = HashMap::new();

    let Some(body) = raw
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return names;
    };

    let mut rest = body.trim_start();
    while !rest.is_empty() {
        let Some((key, after_key)) = rest.split_once(':') else {
            return HashMap::new();
        };
        let Ok(id) = key.trim().parse::<i64>() else {
            return HashMap::new();
        };

        let value = after_key.trim_start();
        let Some(quote) = value.chars().next().filter(|c| *c == '\'' || *c == '"') else {
            return HashMap::new();
        };
        let Some(end) = value[1..].find(quote) else {
            return HashMap::new();
        };

        names.insert(id, value[1..1 + end].to_string());

        rest = value[end + 2..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    names
}
