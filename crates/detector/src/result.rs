use std::collections::HashMap;

/// Per-image output of a [`crate::backend::DetectionModel`].
///
/// Every field may be absent independently; the serializer decides what an
/// absent field means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub names: Option<HashMap<i64, String>>,
    pub boxes: Option<RawBoxes>,
}

/// Parallel per-detection columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBoxes {
    pub cls: Option<Vec<f32>>,
    pub conf: Option<Vec<f32>>,
    /// `[xmin, ymin, xmax, ymax]` in original image pixels.
    pub xyxy: Option<Vec<[f32; 4]>>,
}

/// One decoded detection before it is split into columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub class_id: i64,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

impl FromIterator<Candidate> for RawBoxes {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();

        let mut cls = Vec::with_capacity(lower);
        let mut conf = Vec::with_capacity(lower);
        let mut xyxy = Vec::with_capacity(lower);

        for candidate in iter {
            cls.push(candidate.class_id as f32);
            conf.push(candidate.confidence);
            xyxy.push(candidate.bbox);
        }

        Self {
            cls: Some(cls),
            conf: Some(conf),
            xyxy: Some(xyxy),
        }
    }
}

impl RawBoxes {
    pub fn len(&self) -> usize {
        self.xyxy.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
